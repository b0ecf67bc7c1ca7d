mod backend;
mod handlers;
pub(crate) mod password;
mod routes;
pub(crate) mod store;

use axum::Router;
use axum_login::AuthManagerLayerBuilder;
use tower_sessions::{SessionManagerLayer, SessionStore};

pub use backend::{AuthBackend, AuthSession};
pub use handlers::SessionResponse;
pub use routes::router;

use crate::db::DB;

pub fn add_auth_layer(app: Router, session_layer: SessionManagerLayer<impl SessionStore + Clone>, db: DB) -> Router {
    let auth_backend = AuthBackend::new(db);
    let auth_layer = AuthManagerLayerBuilder::new(auth_backend, session_layer).build();

    app.layer(auth_layer)
}
