mod migrations;

use rusqlite::{ffi, functions::FunctionFlags, ErrorCode};
use uuid::Uuid;

pub use rusqlite;
pub use tokio_rusqlite;

use migrations::MIGRATIONS;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),
    #[error("conflict")]
    Conflict(String),
    #[error(transparent)]
    TokioRusqlite(tokio_rusqlite::Error),
    #[error(transparent)]
    Rusqlite(rusqlite::Error),
}

impl Error {
    pub fn not_found_message(self, message: impl Into<String>) -> Self {
        if matches!(self, Self::NotFound(_)) {
            return Self::NotFound(message.into());
        }
        self
    }

    pub fn conflict_message(self, message: impl Into<String>) -> Self {
        if matches!(self, Self::Conflict(_)) {
            return Self::Conflict(message.into());
        }
        self
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(ffi::Error { code: ErrorCode::ConstraintViolation, extended_code }, _)
            if *extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE || *extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl From<tokio_rusqlite::Error> for Error {
    fn from(error: tokio_rusqlite::Error) -> Self {
        match error {
            tokio_rusqlite::Error::Rusqlite(error) => Self::from(error),
            error => Self::TokioRusqlite(error),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("Not found".into()),
            error if is_unique_violation(&error) => Self::Conflict(error.to_string()),
            error => Self::Rusqlite(error),
        }
    }
}

pub type DB = tokio_rusqlite::Connection;

pub async fn init_db(database_url: &str) -> Result<DB> {
    let conn = tokio_rusqlite::Connection::open(database_url).await?;

    conn.call(|conn| {
        add_uuid_functions(conn)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        MIGRATIONS
            .to_latest(conn)
            .map_err(|e| tokio_rusqlite::Error::Other(e.into()))?;

        Ok(())
    })
    .await?;

    Ok(conn)
}

#[cfg(test)]
pub async fn init_test_db() -> Result<DB> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;

    conn.call(|conn| {
        add_uuid_functions(conn)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;

        MIGRATIONS
            .to_latest(conn)
            .map_err(|e| tokio_rusqlite::Error::Other(e.into()))?;

        Ok(())
    })
    .await?;

    Ok(conn)
}

fn add_uuid_functions(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("uuid7_now", 0, FunctionFlags::SQLITE_UTF8, |_| Ok(Uuid::now_v7()))?;

    conn.create_scalar_function("uuid_blob", 1, FunctionFlags::SQLITE_UTF8, |ctx| {
        let value = ctx.get::<String>(0)?;
        let uuid = Uuid::parse_str(&value).map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;

        Ok(uuid)
    })?;

    Ok(())
}
