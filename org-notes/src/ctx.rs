use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::AuthSession,
    realtime::Changes,
    users::{Capabilities, User},
    Error, Result, DB,
};

#[derive(Clone, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub db: DB,
    #[from_request(via(Extension))]
    pub changes: Changes,
}

impl BaseParams {
    pub fn new(db: DB, changes: Changes, ctx: Ctx) -> Self {
        Self { db, changes, ctx }
    }
}

/// Who is calling. Resolved once per request from the auth session.
#[derive(Clone, Debug, Default)]
pub struct Ctx {
    pub user: Option<User>,
}

impl Ctx {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }

    pub fn get_user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or_else(Error::unauthorized)
    }

    /// Anonymous visitors get no capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.user.as_ref().map(|u| u.role.capabilities()).unwrap_or_default()
    }

    pub fn is_admin_of(&self, organization_slug: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.role.capabilities().is_admin && u.organization_slug == organization_slug)
    }

    pub fn require_admin(&self) -> Result<&User> {
        let user = self.require_user()?;
        if !user.role.capabilities().is_admin {
            return Err(Error::Forbidden("Only organization admins can do this".into()));
        }
        Ok(user)
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(ctx) = parts.extensions.get::<Ctx>() {
            return Ok(ctx.clone());
        }

        let user = parts
            .extract::<AuthSession>()
            .await
            .map_err(|(_, message)| Error::Unexpected(message.into()))?
            .user;

        let ctx = Ctx::new(user);
        parts.extensions.insert(ctx.clone());

        Ok(ctx)
    }
}

/// Resolves the caller up front and runs the rest of the request inside a span carrying it.
pub async fn with_ctx(ctx: Ctx, request: Request, next: Next) -> Response {
    let span = match &ctx.user {
        Some(user) => tracing::info_span!(
            "ctx",
            user_id = %user.id,
            organization = %user.organization_slug,
            role = %user.role
        ),
        None => tracing::info_span!("ctx", user_id = "anonymous"),
    };

    next.run(request).instrument(span).await
}
