use axum::{
    extract::OriginalUri,
    response::{IntoResponse, Redirect},
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{routing::get_with, ApiRouter, IntoApiResponse},
            NoApi,
        },
        Json, Path,
    },
    state::AppState,
};

use super::handlers::{self, Dashboard, DashboardOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
struct DashboardPath {
    org_slug: String,
    #[serde(default)]
    role: Option<String>,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/{org_slug}/dashboard",
            get_with(dashboard, |t| t.response::<200, Json<Dashboard>>()),
        )
        .api_route(
            "/{org_slug}/dashboard/{role}",
            get_with(dashboard, |t| t.response::<200, Json<Dashboard>>()),
        )
        .with_state(state)
}

async fn dashboard(
    Path(DashboardPath { org_slug, role }): Path<DashboardPath>,
    NoApi(OriginalUri(uri)): NoApi<OriginalUri>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::dashboard(org_slug, role, uri.path(), base)
        .await
        .map(|outcome| match outcome {
            DashboardOutcome::Redirect(to) => Redirect::temporary(&to).into_response(),
            DashboardOutcome::Render(dashboard) => Json(dashboard).into_response(),
        })
}
