mod access;
mod export;
mod handlers;
mod model;
mod pdf;
mod routes;

pub use access::{can_delete, can_read, can_update};
pub use export::ExportFormat;
pub(crate) use handlers::find_notes;
pub use model::*;
pub(crate) use model::NOTE_COLUMNS;

use crate::{openapi::aide::axum::ApiRouter, state::AppState};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new().merge(routes::router(state.clone()))
}
