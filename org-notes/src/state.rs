use axum::extract::FromRef;

use crate::{db::DB, realtime::Changes};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub conn: DB,
    pub changes: Changes,
}
