use aide::scalar::Scalar;
use axum::{middleware, response::IntoResponse, routing::get, Extension, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, SessionManagerLayer,
};
use tower_sessions_rusqlite_store::RusqliteStore;

use crate::config;

use rand::Rng;
use serde_json::json;

use crate::{
    auth,
    ctx::with_ctx,
    dashboard,
    db::{self, DB},
    errors::{self, on_error, ErrorResponseDocs},
    members, notes,
    openapi::{
        self,
        aide::axum::{ApiRouter, IntoApiResponse},
        OpenApi,
    },
    realtime::{self, Changes},
    state::AppState,
};

pub struct AppParams {
    pub db: DB,
}

pub async fn create(AppParams { db }: AppParams) -> errors::Result<(Router, OpenApi)> {
    let config = config();
    let mut api = OpenApi::default();

    let session_store = RusqliteStore::new(db.clone());
    session_store.migrate().await.map_err(db::Error::from)?;
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.session_secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_inactivity_days)));

    let changes = Changes::new(config.realtime_capacity);
    let state = AppState {
        conn: db.clone(),
        changes: changes.clone(),
    };

    let docs_router = axum::Router::new()
        .route(
            "/__docs__",
            get(Scalar::new("/__docs__/spec.json")
                .with_title("Org Notes API")
                .axum_handler()),
        )
        .route("/__docs__/spec.json", get(serve_docs));

    let app = ApiRouter::new()
        .route("/__version__", get(version))
        .route("/__heartbeat__", get(heartbeat))
        .route("/__lbheartbeat__", get(lbheartbeat))
        .merge(docs_router)
        .merge(auth::router(state.clone()))
        .merge(notes::router(state.clone()))
        .merge(members::router(state.clone()))
        .merge(realtime::router(state.clone()))
        .merge(dashboard::router(state))
        .finish_api_with(&mut api, |t| {
            t.title("Org Notes")
                .default_response::<openapi::Json<ErrorResponseDocs>>()
        })
        .layer(
            ServiceBuilder::new()
                .layer(Extension(db.clone()))
                .layer(Extension(changes))
                .layer(Extension(Arc::new(api.clone())))
                .layer(middleware::from_fn(with_ctx))
                .layer(middleware::from_fn(on_error)),
        );

    let app = auth::add_auth_layer(app, session_layer, db);

    Ok((app, api))
}

async fn version() -> impl IntoResponse {
    let config = &config();
    Json(json!({
        "source" : config.source,
        "version": config.version,
        "commit" : config.git_commit,
        "build"  : config.pipeline_id
    }))
}

async fn heartbeat() -> impl IntoResponse {
    let mut rng = rand::thread_rng();
    let random: u32 = rng.gen_range(0..=10000);

    Json(json!({
        "status" : "ok",
        "random": random,
    }))
}

async fn lbheartbeat() -> impl IntoResponse {
    ""
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    openapi::Json(api.as_ref()).into_response()
}
