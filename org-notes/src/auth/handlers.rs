use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    config,
    ctx::{BaseParams, Ctx},
    realtime::ChangeEvent,
    users::{self, store::NewUser, Capabilities, User},
    Error, Result,
};

use super::{
    password::{self, validate_new_password},
    store::{self, AcceptInvite},
    AuthSession,
};

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SignupArgs {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    /// Organization to join. The configured default organization when omitted.
    pub organization_slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct LoginArgs {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PasswordResetArgs {
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdatePasswordArgs {
    pub password: String,
    pub confirm_password: String,
    /// Reset token from a password reset request. The signed-in user is updated when omitted.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AcceptInviteArgs {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
    pub username: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SessionResponse {
    pub user: User,
    pub capabilities: Capabilities,
    /// Where this session's dashboard lives, e.g. `/acme/dashboard/admin`.
    pub dashboard_path: String,
}

impl From<User> for SessionResponse {
    fn from(user: User) -> Self {
        Self {
            capabilities: user.role.capabilities(),
            dashboard_path: user.dashboard_path(),
            user,
        }
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::Validation("Email is required".into()));
    }
    if !email.contains('@') {
        return Err(Error::Validation("Email is not valid".into()));
    }
    Ok(email.to_lowercase())
}

fn validate_organization_slug(slug: Option<String>) -> Result<String> {
    let config = config();
    let slug = slug
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| config.default_org_slug.clone());

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::Validation(
            "Organization may only contain lowercase letters, digits and dashes".into(),
        ));
    }
    if slug == config.public_org_slug {
        return Err(Error::Validation(format!("'{slug}' is reserved for the public board")));
    }
    Ok(slug)
}

pub async fn signup(
    args: SignupArgs,
    mut auth_session: AuthSession,
    BaseParams { db, changes, .. }: BaseParams,
) -> Result<SessionResponse> {
    let email = normalize_email(&args.email)?;
    validate_new_password(&args.password, &args.confirm_password)?;
    let organization_slug = validate_organization_slug(args.organization_slug)?;

    let password_hash = password::hash_blocking(args.password).await?;
    let user = users::store::create(
        db,
        NewUser {
            email,
            username: args.username,
            phone: args.phone,
            password_hash,
            role: None,
            organization_slug,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, organization = %user.organization_slug, role = %user.role, "user signed up");
    auth_session.login(&user).await?;
    changes.users.publish(ChangeEvent::Created { new: user.clone() });

    Ok(user.into())
}

pub async fn login(args: LoginArgs, mut auth_session: AuthSession) -> Result<SessionResponse> {
    let user = match auth_session.authenticate(args).await? {
        Some(user) => user,
        None => return Err(Error::Unauthorized("Invalid email or password".into())),
    };

    auth_session.login(&user).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(user.into())
}

pub async fn logout(mut auth_session: AuthSession) -> Result<()> {
    if let Some(user) = auth_session.logout().await? {
        tracing::info!(user_id = %user.id, "user logged out");
    }
    Ok(())
}

pub async fn current_session(ctx: Ctx) -> Result<SessionResponse> {
    let user = ctx.require_user()?;
    Ok(user.clone().into())
}

/// Always succeeds, whether or not the email belongs to an account.
pub async fn request_password_reset(args: PasswordResetArgs, BaseParams { db, .. }: BaseParams) -> Result<()> {
    let Ok(email) = normalize_email(&args.email) else {
        return Ok(());
    };

    let ttl = Duration::minutes(config().reset_token_ttl_minutes);
    match store::create_password_reset(db, email, ttl).await? {
        Some((user, token)) => {
            // no mail transport: the token is handed over through the logs
            tracing::info!(user_id = %user.id, %token, "password reset requested");
        }
        None => tracing::debug!("password reset requested for an unknown email"),
    }

    Ok(())
}

pub async fn update_password(args: UpdatePasswordArgs, BaseParams { db, ctx, .. }: BaseParams) -> Result<User> {
    validate_new_password(&args.password, &args.confirm_password)?;
    let password_hash = password::hash_blocking(args.password).await?;

    let user = match args.token {
        Some(token) => store::reset_password(db, token, password_hash).await?,
        None => {
            let user = ctx.require_user()?;
            users::store::update_password(db, user.id, password_hash).await?
        }
    };

    tracing::info!(user_id = %user.id, "password updated");
    Ok(user)
}

pub async fn accept_invite(
    args: AcceptInviteArgs,
    mut auth_session: AuthSession,
    BaseParams { db, changes, .. }: BaseParams,
) -> Result<SessionResponse> {
    validate_new_password(&args.password, &args.confirm_password)?;
    let password_hash = password::hash_blocking(args.password).await?;

    let user = store::accept_invite(
        db,
        AcceptInvite {
            token: args.token,
            password_hash,
            username: args.username,
            phone: args.phone,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, organization = %user.organization_slug, role = %user.role, "invite accepted");
    auth_session.login(&user).await?;
    changes.users.publish(ChangeEvent::Created { new: user.clone() });

    Ok(user.into())
}
