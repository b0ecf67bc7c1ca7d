use rusqlite::{named_params, params, OptionalExtension};

use crate::db::{self, DB};

use super::*;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    /// `None` makes the first member of an organization its admin and everyone after a plain user.
    pub role: Option<Role>,
    pub organization_slug: String,
}

#[derive(Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password_hash", &"[redacted]")
            .finish()
    }
}

/// Inserts inside an already open transaction so callers can pair it with other writes.
pub fn insert(conn: &rusqlite::Connection, user: NewUser) -> rusqlite::Result<User> {
    let role = match user.role {
        Some(role) => role,
        None => {
            let members: u32 = conn.query_row(
                "SELECT count(*) FROM users WHERE organization_slug = ?",
                params![user.organization_slug],
                |r| r.get(0),
            )?;
            if members == 0 {
                Role::Admin
            } else {
                Role::User
            }
        }
    };

    conn.query_row(
        &format!(
            r#"INSERT INTO users (email, username, phone, password, role, organization_slug, created_at)
            VALUES (:email, :username, :phone, :password, :role, :organization_slug, :created_at)
            RETURNING {USER_COLUMNS}"#
        ),
        named_params! {
            ":email": user.email,
            ":username": user.username,
            ":phone": user.phone,
            ":password": user.password_hash,
            ":role": role,
            ":organization_slug": user.organization_slug,
            ":created_at": chrono::Utc::now(),
        },
        |r| User::try_from(r),
    )
}

pub async fn create(db: DB, user: NewUser) -> db::Result<User> {
    db.call(move |conn| {
        let tx = conn.transaction()?;
        let user = insert(&tx, user)?;
        tx.commit()?;
        Ok(user)
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.conflict_message("This email is already registered"))
}

pub async fn find_one_by_id(db: DB, user_id: UserId) -> db::Result<User> {
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
            [user_id],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("User '{user_id}' not found")))
}

pub async fn find_credentials_by_email(db: DB, email: String) -> db::Result<Option<Credentials>> {
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS}, password FROM users WHERE email = ?"),
            [email],
            |r| {
                Ok(Credentials {
                    user: User::try_from(r)?,
                    password_hash: r.get(8)?,
                })
            },
        )
        .optional()
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
}

pub async fn find_by_email(db: DB, email: String) -> db::Result<Option<User>> {
    db.call(move |conn| {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
            [email],
            |r| User::try_from(r),
        )
        .optional()
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
}

pub async fn find_by_organization(db: DB, organization_slug: String) -> db::Result<Vec<User>> {
    db.call(move |conn| {
        let users = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE organization_slug = ? ORDER BY created_at DESC, id DESC"
            ))?
            .query_map([organization_slug], |r| User::try_from(r))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    })
    .await
    .map_err(db::Error::from)
}

pub async fn update_password(db: DB, user_id: UserId, password_hash: String) -> db::Result<User> {
    db.call(move |conn| {
        conn.query_row(
            &format!("UPDATE users SET password = ?, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"),
            params![password_hash, chrono::Utc::now(), user_id],
            |r| User::try_from(r),
        )
        .map_err(|e| e.into())
    })
    .await
    .map_err(db::Error::from)
    .map_err(|e| e.not_found_message(format!("User '{user_id}' not found")))
}

#[cfg(test)]
pub(crate) fn new_user(email: &str, organization_slug: &str, role: Option<Role>) -> NewUser {
    NewUser {
        email: email.into(),
        username: None,
        phone: None,
        password_hash: "not-a-real-hash".into(),
        role,
        organization_slug: organization_slug.into(),
    }
}
