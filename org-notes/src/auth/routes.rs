use axum::http::StatusCode;

use crate::{
    ctx::{BaseParams, Ctx},
    openapi::{
        aide::{
            axum::{
                routing::{get, post, post_with},
                ApiRouter, IntoApiResponse,
            },
            NoApi,
        },
        Json,
    },
    state::AppState,
};

use super::{
    handlers::{
        self, AcceptInviteArgs, LoginArgs, PasswordResetArgs, SessionResponse, SignupArgs, UpdatePasswordArgs,
    },
    AuthSession,
};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/auth/signup",
            post_with(signup, |t| t.response::<201, Json<SessionResponse>>()),
        )
        .api_route("/auth/login", post(login))
        .api_route("/auth/logout", post_with(logout, |t| t.response::<204, ()>()))
        .api_route("/auth/session", get(current_session))
        .api_route(
            "/auth/password/reset",
            post_with(request_password_reset, |t| t.response::<202, ()>()),
        )
        .api_route("/auth/password/update", post(update_password))
        .api_route(
            "/auth/invites/accept",
            post_with(accept_invite, |t| t.response::<201, Json<SessionResponse>>()),
        )
        .with_state(state)
}

async fn signup(
    NoApi(auth_session): NoApi<AuthSession>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<SignupArgs>,
) -> impl IntoApiResponse {
    handlers::signup(args, auth_session, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

async fn login(NoApi(auth_session): NoApi<AuthSession>, Json(args): Json<LoginArgs>) -> impl IntoApiResponse {
    handlers::login(args, auth_session).await.map(Json)
}

async fn logout(NoApi(auth_session): NoApi<AuthSession>) -> impl IntoApiResponse {
    handlers::logout(auth_session).await.map(|_| (StatusCode::NO_CONTENT, ()))
}

async fn current_session(NoApi(ctx): NoApi<Ctx>) -> impl IntoApiResponse {
    handlers::current_session(ctx).await.map(Json)
}

async fn request_password_reset(
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<PasswordResetArgs>,
) -> impl IntoApiResponse {
    handlers::request_password_reset(args, base)
        .await
        .map(|_| (StatusCode::ACCEPTED, ()))
}

async fn update_password(
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<UpdatePasswordArgs>,
) -> impl IntoApiResponse {
    handlers::update_password(args, base).await.map(Json)
}

async fn accept_invite(
    NoApi(auth_session): NoApi<AuthSession>,
    NoApi(base): NoApi<BaseParams>,
    Json(args): Json<AcceptInviteArgs>,
) -> impl IntoApiResponse {
    handlers::accept_invite(args, auth_session, base)
        .await
        .map(|r| (StatusCode::CREATED, Json(r)))
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        auth::handlers::SessionResponse,
        db::{init_test_db, DB},
        errors::{ErrorResponse, Result},
        tests::{signup, PASSWORD},
        users::{Role, User},
    };

    async fn test_server(db: DB) -> Result<TestServer> {
        crate::tests::test_server(db).await
    }

    #[tokio::test]
    async fn first_signup_becomes_admin() -> Result<()> {
        let db = init_test_db().await?;
        let first = test_server(db.clone()).await?;
        let second = test_server(db).await?;

        let admin = signup(&first, "admin@acme.com", "acme").await;
        let member = signup(&second, "member@acme.com", "acme").await;

        assert_eq!(admin.role, Role::Admin);
        assert_eq!(member.role, Role::User);

        let session = first.get("/auth/session").await.json::<SessionResponse>();
        assert_eq!(session.user.id, admin.id);
        assert!(session.capabilities.is_admin);
        assert_eq!(session.dashboard_path, "/acme/dashboard/admin");
        Ok(())
    }

    #[tokio::test]
    async fn signup_validation() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;

        let mismatch = server
            .post("/auth/signup")
            .json(&json!({ "email": "a@acme.com", "password": "secret1", "confirm_password": "secret2" }))
            .expect_failure()
            .await;
        assert_eq!(mismatch.status_code(), 400);
        assert_eq!(
            mismatch.json::<ErrorResponse>().message.as_deref(),
            Some("Passwords do not match")
        );

        let missing_field = server
            .post("/auth/signup")
            .json(&json!({ "email": "a@acme.com" }))
            .expect_failure()
            .await;
        assert_eq!(missing_field.status_code(), 422);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_conflict() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "taken@acme.com", "acme").await;

        let response = server
            .post("/auth/signup")
            .json(&json!({ "email": "Taken@acme.com", "password": PASSWORD, "confirm_password": PASSWORD }))
            .expect_failure()
            .await;

        assert_eq!(response.status_code(), 409);
        Ok(())
    }

    #[tokio::test]
    async fn login_and_logout() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        let user = signup(&server, "someone@acme.com", "acme").await;
        server.post("/auth/logout").await;

        let anonymous = server.get("/auth/session").expect_failure().await;
        assert_eq!(anonymous.status_code(), 401);

        let wrong = server
            .post("/auth/login")
            .json(&json!({ "email": "someone@acme.com", "password": "wrong-password" }))
            .expect_failure()
            .await;
        assert_eq!(wrong.status_code(), 401);
        assert_eq!(
            wrong.json::<ErrorResponse>().message.as_deref(),
            Some("Invalid email or password")
        );

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "someone@acme.com", "password": PASSWORD }))
            .await;
        assert_eq!(response.json::<SessionResponse>().user.id, user.id);

        server.get("/auth/session").await;
        Ok(())
    }

    #[tokio::test]
    async fn password_update_while_signed_in() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;
        signup(&server, "someone@acme.com", "acme").await;

        server
            .post("/auth/password/update")
            .json(&json!({ "password": "brand-new", "confirm_password": "brand-new" }))
            .await;
        server.post("/auth/logout").await;

        server
            .post("/auth/login")
            .json(&json!({ "email": "someone@acme.com", "password": PASSWORD }))
            .expect_failure()
            .await;
        server
            .post("/auth/login")
            .json(&json!({ "email": "someone@acme.com", "password": "brand-new" }))
            .await;
        Ok(())
    }

    #[tokio::test]
    async fn password_reset_does_not_reveal_accounts() -> Result<()> {
        let db = init_test_db().await?;
        let server = test_server(db).await?;

        let response = server
            .post("/auth/password/reset")
            .json(&json!({ "email": "nobody@acme.com" }))
            .await;

        assert_eq!(response.status_code(), 202);
        Ok(())
    }

    #[tokio::test]
    async fn invite_round_trip() -> Result<()> {
        let db = init_test_db().await?;
        let admin = test_server(db.clone()).await?;
        signup(&admin, "admin@acme.com", "acme").await;

        let invite = admin
            .post("/api/v1/members/invites")
            .json(&json!({ "email": "viewer@acme.com", "role": "viewer" }))
            .await
            .json::<serde_json::Value>();
        let token = invite["token"].as_str().unwrap_or_default().to_string();

        let invited = test_server(db).await?;
        let response = invited
            .post("/auth/invites/accept")
            .json(&json!({ "token": token, "password": PASSWORD, "confirm_password": PASSWORD }))
            .await;
        assert_eq!(response.status_code(), 201);

        let session = response.json::<SessionResponse>();
        assert_eq!(session.user.role, Role::Viewer);
        assert_eq!(session.dashboard_path, "/acme/dashboard/viewer");
        assert!(!session.capabilities.can_edit);

        let profile = invited.get("/api/v1/profile").await.json::<User>();
        assert_eq!(profile.email, "viewer@acme.com");
        Ok(())
    }
}
