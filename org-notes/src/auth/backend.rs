use async_trait::async_trait;
use axum_login::AuthUser;

use crate::{
    db::{self, DB},
    users::{self, store::Credentials, User, UserId},
    Error,
};

use super::{handlers::LoginArgs, password};

impl AuthUser for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.id.as_bytes()
    }
}

#[derive(Clone)]
pub struct AuthBackend {
    db: DB,
}

impl AuthBackend {
    pub fn new(db: DB) -> Self {
        Self { db }
    }
}

#[async_trait]
impl axum_login::AuthnBackend for AuthBackend {
    type User = User;
    type Credentials = LoginArgs;
    type Error = Error;

    async fn authenticate(&self, creds: Self::Credentials) -> Result<Option<Self::User>, Self::Error> {
        let email = creds.email.trim().to_lowercase();
        let Some(Credentials { user, password_hash }) =
            users::store::find_credentials_by_email(self.db.clone(), email).await?
        else {
            return Ok(None);
        };

        if !password::verify_blocking(creds.password, password_hash).await? {
            tracing::info!(user_id = %user.id, "login rejected");
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// A user deleted since signing in ends the session.
    async fn get_user(&self, user_id: &axum_login::UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        match users::store::find_one_by_id(self.db.clone(), *user_id).await {
            Ok(user) => Ok(Some(user)),
            Err(db::Error::NotFound(_)) => {
                tracing::debug!(%user_id, "session points at a deleted user");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl<AuthBackend> From<axum_login::Error<AuthBackend>> for Error
where
    AuthBackend: axum_login::AuthnBackend<Error = Error>,
{
    fn from(error: axum_login::Error<AuthBackend>) -> Self {
        match error {
            axum_login::Error::Session(err) => Error::Session(err),
            axum_login::Error::Backend(err) => err,
        }
    }
}

pub type AuthSession = axum_login::AuthSession<AuthBackend>;
