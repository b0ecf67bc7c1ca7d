use crate::{
    ctx::BaseParams,
    openapi::{
        aide::{
            axum::{routing::get, ApiRouter, IntoApiResponse},
            NoApi,
        },
        Json, Path, Query,
    },
    state::AppState,
    Error,
};
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

use schemars::JsonSchema;

use serde::Deserialize;
use uuid::Uuid;

use super::{export::ExportFormat, CreateNote, Note, Scope, ScopeQuery, UpdateNote};

use super::handlers;

#[derive(Debug, Deserialize, JsonSchema)]
struct NoteIdPath {
    note_id: Uuid,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ExportQuery {
    #[serde(default)]
    scope: Scope,
    #[serde(default)]
    format: ExportFormat,
    /// Comma separated note ids. Everything in scope when omitted.
    ids: Option<String>,
}

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/api/v1/notes",
            get(find_notes).post_with(create_note, |t| t.response::<201, Json<Note>>()),
        )
        .api_route(
            "/api/v1/notes/public",
            get(find_public_notes).post_with(create_public_note, |t| t.response::<201, Json<Note>>()),
        )
        .api_route("/api/v1/notes/export", get(export_notes))
        .api_route(
            "/api/v1/notes/{note_id}",
            get(get_note).patch(update_note).delete(delete_note),
        )
        .with_state(state)
}

async fn find_notes(NoApi(base): NoApi<BaseParams>, Query(ScopeQuery { scope }): Query<ScopeQuery>) -> impl IntoApiResponse {
    handlers::find_notes(scope, base).await.map(Json)
}

async fn find_public_notes(NoApi(base): NoApi<BaseParams>) -> impl IntoApiResponse {
    handlers::find_notes(Scope::Public, base).await.map(Json)
}

async fn create_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<CreateNote>) -> impl IntoApiResponse {
    handlers::create_note(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn create_public_note(NoApi(base): NoApi<BaseParams>, Json(args): Json<CreateNote>) -> impl IntoApiResponse {
    handlers::create_public_note(args, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn get_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::get_note(note_id, base).await.map(Json)
}

async fn update_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<UpdateNote>,
) -> impl IntoApiResponse {
    handlers::update_note(note_id, args, base).await.map(Json)
}

async fn delete_note(
    Path(NoteIdPath { note_id }): Path<NoteIdPath>,
    NoApi(base): NoApi<BaseParams>,
) -> impl IntoApiResponse {
    handlers::delete_note(note_id, base).await.map(Json)
}

fn parse_ids(ids: &str) -> crate::Result<Vec<Uuid>> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Uuid::parse_str(id).map_err(|_| Error::Validation(format!("'{id}' is not a note id"))))
        .collect()
}

async fn export_notes(
    NoApi(base): NoApi<BaseParams>,
    Query(ExportQuery { scope, format, ids }): Query<ExportQuery>,
) -> impl IntoApiResponse {
    let ids = match ids.as_deref().map(parse_ids).transpose() {
        Ok(ids) => ids,
        Err(error) => return Err(error),
    };

    handlers::export_notes(scope, format, ids, base).await.map(|file| {
        (
            [
                (header::CONTENT_TYPE, file.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file.file_name),
                ),
            ],
            file.body,
        )
            .into_response()
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{init_test_db, DB},
        errors::{ErrorResponse, Result},
        notes::{FindNotesResponse, Note},
        tests::{sign_in_as, signup},
        users::Role,
    };
    use axum_test::TestServer;
    use serde_json::json;

    async fn test_server(db: DB) -> Result<TestServer> {
        crate::tests::test_server(db).await
    }

    async fn create(server: &TestServer, title: &str, is_public: bool) -> Note {
        server
            .post("/api/v1/notes")
            .json(&json!({ "title": title, "content": "body", "is_public": is_public }))
            .await
            .json::<Note>()
    }

    #[tokio::test]
    async fn create_and_list_newest_first() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        let user = signup(&server, "owner@acme.com", "acme").await;

        let first = create(&server, "first", false).await;
        let second = create(&server, "  second  ", false).await;

        assert_eq!(first.user_id, Some(user.id));
        assert_eq!(first.organization_slug, "acme");
        assert_eq!(second.title, "second");

        let response = server.get("/api/v1/notes").add_query_param("scope", "mine").await;
        let titles = response
            .json::<FindNotesResponse>()
            .results
            .into_iter()
            .map(|n| n.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["second", "first"]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_title_is_rejected() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;

        let response = server
            .post("/api/v1/notes")
            .json(&json!({ "title": "   " }))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 400);
        assert_eq!(
            response.json::<ErrorResponse>().message.as_deref(),
            Some("Note title cannot be empty")
        );
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_callers_cannot_create_organization_notes() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;

        let response = server
            .post("/api/v1/notes")
            .json(&json!({ "title": "hello" }))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 401);
        Ok(())
    }

    #[tokio::test]
    async fn organization_listing_hides_colleagues_private_notes() -> Result<()> {
        let db = init_test_db().await?;
        let admin = test_server(db.clone()).await?;
        signup(&admin, "admin@acme.com", "acme").await;
        let member = test_server(db.clone()).await?;
        signup(&member, "member@acme.com", "acme").await;

        create(&member, "shared", true).await;
        create(&member, "secret", false).await;
        create(&admin, "admin private", false).await;

        let colleague = test_server(db).await?;
        signup(&colleague, "colleague@acme.com", "acme").await;
        let seen_by_colleague = colleague.get("/api/v1/notes").await.json::<FindNotesResponse>().results;
        assert_eq!(seen_by_colleague.len(), 1);
        assert_eq!(seen_by_colleague[0].title, "shared");

        let seen_by_admin = admin.get("/api/v1/notes").await.json::<FindNotesResponse>().results;
        assert_eq!(seen_by_admin.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn private_notes_of_others_are_not_found() -> Result<()> {
        let db = init_test_db().await?;
        let owner = test_server(db.clone()).await?;
        signup(&owner, "admin@acme.com", "acme").await;
        let note = create(&owner, "secret", false).await;

        let stranger = test_server(db).await?;
        signup(&stranger, "someone@globex.com", "globex").await;
        let response = stranger
            .get(&format!("/api/v1/notes/{}", note.id))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 404);
        Ok(())
    }

    #[tokio::test]
    async fn update_note() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;
        let note = create(&server, "first", false).await;

        let response = server
            .patch(&format!("/api/v1/notes/{}", note.id))
            .json(&json!({ "content": "2", "is_public": true }))
            .await;

        let updated = response.json::<Note>();
        assert_eq!(updated.title, "first");
        assert_eq!(updated.content.as_deref(), Some("2"));
        assert!(updated.is_public);
        assert!(updated.updated_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn null_clears_description_and_content() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;
        let note = server
            .post("/api/v1/notes")
            .json(&json!({ "title": "first", "description": "d", "content": "body" }))
            .await
            .json::<Note>();

        let untouched = server
            .patch(&format!("/api/v1/notes/{}", note.id))
            .json(&json!({ "title": "renamed" }))
            .await
            .json::<Note>();
        assert_eq!(untouched.description.as_deref(), Some("d"));
        assert_eq!(untouched.content.as_deref(), Some("body"));

        let cleared = server
            .patch(&format!("/api/v1/notes/{}", note.id))
            .json(&json!({ "description": null, "content": null }))
            .await
            .json::<Note>();
        assert_eq!(cleared.title, "renamed");
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.content, None);
        Ok(())
    }

    #[tokio::test]
    async fn viewers_cannot_edit_public_notes_of_others() -> Result<()> {
        let db = init_test_db().await?;
        let owner = test_server(db.clone()).await?;
        signup(&owner, "admin@acme.com", "acme").await;
        let note = create(&owner, "public", true).await;

        let viewer = test_server(db.clone()).await?;
        sign_in_as(&viewer, &db, "viewer@acme.com", "acme", Role::Viewer).await;

        viewer.get(&format!("/api/v1/notes/{}", note.id)).await;
        let response = viewer
            .patch(&format!("/api/v1/notes/{}", note.id))
            .json(&json!({ "title": "mine now" }))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 403);
        Ok(())
    }

    #[tokio::test]
    async fn delete_note() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db.clone()).await?;
        signup(&server, "owner@acme.com", "acme").await;
        let note = create(&server, "first", false).await;

        let response = server.delete(&format!("/api/v1/notes/{}", note.id)).await;
        assert_eq!(response.json::<Note>().title, "first");

        let count = db
            .call(|conn| {
                conn.query_row::<u32, _, _>("select count(*) from notes", [], |r| r.get(0))
                    .map_err(|e| e.into())
            })
            .await
            .unwrap();

        assert_eq!(count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn public_board_is_anonymous() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;

        let response = server
            .post("/api/v1/notes/public")
            .json(&json!({ "title": "hello world" }))
            .await;
        assert_eq!(response.status_code(), 201);
        let note = response.json::<Note>();
        assert_eq!(note.user_id, None);
        assert!(note.is_public);
        assert_eq!(note.organization_slug, "public-notes");

        let board = server.get("/api/v1/notes/public").await.json::<FindNotesResponse>().results;
        assert_eq!(board, vec![note.clone()]);

        server.delete(&format!("/api/v1/notes/{}", note.id)).await;
        Ok(())
    }

    #[tokio::test]
    async fn export_selection_as_markdown() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;
        let picked = create(&server, "Picked Note", false).await;
        create(&server, "Left out", false).await;

        let response = server
            .get("/api/v1/notes/export")
            .add_query_param("format", "markdown")
            .add_query_param("ids", picked.id.to_string())
            .await;

        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"picked_note.md\""
        );
        let body = response.text();
        assert!(body.contains("# Picked Note"));
        assert!(!body.contains("Left out"));
        Ok(())
    }

    #[tokio::test]
    async fn export_single_note_as_pdf() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;
        let note = create(&server, "Board Minutes", false).await;

        let response = server
            .get("/api/v1/notes/export")
            .add_query_param("format", "pdf")
            .add_query_param("ids", note.id.to_string())
            .await;

        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"board_minutes.pdf\""
        );
        assert!(response.as_bytes().starts_with(b"%PDF"));
        Ok(())
    }

    #[tokio::test]
    async fn export_rejects_malformed_ids() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "owner@acme.com", "acme").await;

        let response = server
            .get("/api/v1/notes/export")
            .add_query_param("ids", "not-a-uuid")
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 400);
        Ok(())
    }
}
