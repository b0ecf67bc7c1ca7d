use axum::http::StatusCode;
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::store::Invite,
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{
                routing::{delete, get, post_with},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json, Path,
    },
    state::AppState,
};

use super::handlers::{self, InviteMemberArgs};

#[derive(Debug, Deserialize, JsonSchema)]
struct UserIdPath {
    user_id: Uuid,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/api/v1/members", get(find_members))
        .api_route(
            "/api/v1/members/invites",
            post_with(invite_member, |t| t.response::<201, Json<Invite>>()),
        )
        .api_route("/api/v1/members/{user_id}", delete(delete_member))
        .api_route("/api/v1/profile", get(profile))
        .with_state(state)
}

async fn find_members(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::find_members(base).await.map(Json)
}

async fn invite_member(NoApi(base): NoApi<BaseParams>, Json(args): Json<InviteMemberArgs>) -> impl IntoApiResponse {
    handlers::invite_member(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn delete_member(
    Path(UserIdPath { user_id }): Path<UserIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::delete_member(user_id, base).await.map(Json)
}

async fn profile(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::profile(base).await.map(Json)
}
