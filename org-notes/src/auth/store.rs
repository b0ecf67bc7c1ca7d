use chrono::{DateTime, Duration, Utc};
use rusqlite::{named_params, params, OptionalExtension, Row};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{self, DB},
    users::{self, store::NewUser, Role, User, UserId, USER_COLUMNS, USER_COLUMNS_PREFIXED},
    Error, Result,
};

use super::password;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Invite {
    pub id: Uuid,
    pub token: String,
    pub email: String,
    pub role: Role,
    pub organization_slug: String,
    pub invited_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

const INVITE_COLUMNS: &str =
    "id, token, email, role, organization_slug, invited_by, created_at, expires_at, accepted_at";

impl<'a> TryFrom<&Row<'a>> for Invite {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            token: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            organization_slug: row.get(4)?,
            invited_by: row.get(5)?,
            created_at: row.get(6)?,
            expires_at: row.get(7)?,
            accepted_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub email: String,
    pub role: Role,
    pub organization_slug: String,
    pub invited_by: UserId,
    pub ttl: Duration,
}

pub async fn create_invite(db: DB, invite: NewInvite) -> Result<Invite> {
    let invite = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let already_member = tx
                .query_row("SELECT 1 FROM users WHERE email = ?", params![invite.email], |_| Ok(()))
                .optional()?
                .is_some();
            if already_member {
                return Err(Error::Conflict(format!("'{}' already has an account", invite.email)).into());
            }

            let now = Utc::now();
            let invite = tx.query_row(
                &format!(
                    r#"INSERT INTO invites (token, email, role, organization_slug, invited_by, created_at, expires_at)
                    VALUES (:token, :email, :role, :organization_slug, :invited_by, :created_at, :expires_at)
                    RETURNING {INVITE_COLUMNS}"#
                ),
                named_params! {
                    ":token": password::token(),
                    ":email": invite.email,
                    ":role": invite.role,
                    ":organization_slug": invite.organization_slug,
                    ":invited_by": invite.invited_by,
                    ":created_at": now,
                    ":expires_at": now + invite.ttl,
                },
                |row| Invite::try_from(row),
            )?;

            tx.commit()?;
            Ok(invite)
        })
        .await?;

    Ok(invite)
}

#[derive(Debug, Clone)]
pub struct AcceptInvite {
    pub token: String,
    pub password_hash: String,
    pub username: Option<String>,
    pub phone: Option<String>,
}

/// Turns a pending invite into a member with the invited role and organization.
pub async fn accept_invite(db: DB, args: AcceptInvite) -> Result<User> {
    let user = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let invite = tx
                .query_row(
                    &format!("SELECT {INVITE_COLUMNS} FROM invites WHERE token = ? AND accepted_at IS NULL"),
                    params![args.token],
                    |row| Invite::try_from(row),
                )
                .optional()?
                .ok_or_else(|| Error::Validation("Invite is invalid or has already been used".into()))?;

            let now = Utc::now();
            if invite.expires_at <= now {
                return Err(Error::Validation("Invite has expired".into()).into());
            }

            let user = users::store::insert(
                &tx,
                NewUser {
                    email: invite.email,
                    username: args.username,
                    phone: args.phone,
                    password_hash: args.password_hash,
                    role: Some(invite.role),
                    organization_slug: invite.organization_slug,
                },
            )
            .map_err(|e| Error::from(db::Error::from(e).conflict_message("This email is already registered")))?;
            tx.execute(
                "UPDATE invites SET accepted_at = ? WHERE id = ?",
                params![now, invite.id],
            )?;

            tx.commit()?;
            Ok(user)
        })
        .await?;

    Ok(user)
}

/// `None` when no account uses `email`.
pub async fn create_password_reset(db: DB, email: String, ttl: Duration) -> Result<Option<(User, String)>> {
    let reset = db
        .call(move |conn| {
            let Some(user) = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                    params![email],
                    |row| User::try_from(row),
                )
                .optional()?
            else {
                return Ok(None);
            };

            let token = password::token();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO password_resets (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
                params![token, user.id, now, now + ttl],
            )?;

            Ok(Some((user, token)))
        })
        .await?;

    Ok(reset)
}

/// Spends a reset token and stores the new password hash.
pub async fn reset_password(db: DB, token: String, password_hash: String) -> Result<User> {
    let user = db
        .call(move |conn| {
            let tx = conn.transaction()?;

            let (user, expires_at) = tx
                .query_row(
                    &format!(
                        r#"SELECT {USER_COLUMNS_PREFIXED}, r.expires_at
                        FROM password_resets r JOIN users u ON u.id = r.user_id
                        WHERE r.token = ? AND r.used_at IS NULL"#
                    ),
                    params![token],
                    |row| Ok((User::try_from(row)?, row.get::<_, DateTime<Utc>>(8)?)),
                )
                .optional()?
                .ok_or_else(|| Error::Validation("Reset link is invalid or has already been used".into()))?;

            let now = Utc::now();
            if expires_at <= now {
                return Err(Error::Validation("Reset link has expired".into()).into());
            }

            tx.execute(
                "UPDATE users SET password = ?, updated_at = ? WHERE id = ?",
                params![password_hash, now, user.id],
            )?;
            tx.execute(
                "UPDATE password_resets SET used_at = ? WHERE token = ?",
                params![now, token],
            )?;

            tx.commit()?;
            Ok(user)
        })
        .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::init_test_db,
        users::store::{create, find_credentials_by_email, new_user},
    };

    async fn admin(db: &DB) -> User {
        create(db.clone(), new_user("admin@acme.com", "acme", None)).await.unwrap()
    }

    fn invite(email: &str, invited_by: UserId, ttl: Duration) -> NewInvite {
        NewInvite {
            email: email.into(),
            role: Role::Editor,
            organization_slug: "acme".into(),
            invited_by,
            ttl,
        }
    }

    fn accept(token: &str) -> AcceptInvite {
        AcceptInvite {
            token: token.into(),
            password_hash: "hash".into(),
            username: Some("newbie".into()),
            phone: None,
        }
    }

    #[tokio::test]
    async fn invite_is_accepted_once() {
        let db = init_test_db().await.unwrap();
        let admin = admin(&db).await;

        let invite = create_invite(db.clone(), invite("new@acme.com", admin.id, Duration::hours(1)))
            .await
            .unwrap();
        let user = accept_invite(db.clone(), accept(&invite.token)).await.unwrap();

        assert_eq!(user.role, Role::Editor);
        assert_eq!(user.organization_slug, "acme");
        assert_eq!(user.username.as_deref(), Some("newbie"));

        let again = accept_invite(db, accept(&invite.token)).await;
        assert!(matches!(again, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn expired_invites_are_rejected() {
        let db = init_test_db().await.unwrap();
        let admin = admin(&db).await;

        let invite = create_invite(db.clone(), invite("late@acme.com", admin.id, Duration::seconds(-1)))
            .await
            .unwrap();

        let result = accept_invite(db, accept(&invite.token)).await;
        assert!(matches!(result, Err(Error::Validation(message)) if message == "Invite has expired"));
    }

    #[tokio::test]
    async fn members_cannot_be_invited_twice() {
        let db = init_test_db().await.unwrap();
        let admin = admin(&db).await;

        let result = create_invite(db, invite("admin@acme.com", admin.id, Duration::hours(1))).await;

        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn reset_token_changes_the_password_once() {
        let db = init_test_db().await.unwrap();
        let admin = admin(&db).await;

        assert!(create_password_reset(db.clone(), "nobody@acme.com".into(), Duration::hours(1))
            .await
            .unwrap()
            .is_none());

        let (user, token) = create_password_reset(db.clone(), admin.email.clone(), Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, admin.id);

        let updated = reset_password(db.clone(), token.clone(), "new-hash".into()).await.unwrap();
        assert_eq!(updated.id, admin.id);

        let credentials = find_credentials_by_email(db.clone(), admin.email).await.unwrap().unwrap();
        assert_eq!(credentials.password_hash, "new-hash");

        let reused = reset_password(db, token, "other-hash".into()).await;
        assert!(matches!(reused, Err(Error::Validation(_))));
    }
}
