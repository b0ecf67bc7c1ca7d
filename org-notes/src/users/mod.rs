use std::{fmt::Display, str::FromStr};

use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput},
    Row, ToSql,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod store;

pub type UserId = Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    User,
}

/// What a role may do with notes. Dashboards and handlers branch on this,
/// never on the role itself.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_admin: bool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
            Role::User => "user",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Admin => Capabilities {
                can_edit: true,
                can_delete: true,
                is_admin: true,
            },
            Role::Editor | Role::User => Capabilities {
                can_edit: true,
                can_delete: true,
                is_admin: false,
            },
            Role::Viewer => Capabilities::default(),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl FromSql for Role {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|v| v.parse().map_err(|_| FromSqlError::InvalidType))
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Organization member as exposed over the API. The password hash never leaves `store`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub organization_slug: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl User {
    pub fn dashboard_path(&self) -> String {
        dashboard_path(&self.organization_slug, self.role)
    }
}

pub fn dashboard_path(organization_slug: &str, role: Role) -> String {
    format!("/{organization_slug}/dashboard/{role}")
}

pub(crate) const USER_COLUMNS: &str = "id, email, username, phone, role, organization_slug, created_at, updated_at";
pub(crate) const USER_COLUMNS_PREFIXED: &str =
    "u.id, u.email, u.username, u.phone, u.role, u.organization_slug, u.created_at, u.updated_at";

impl<'a> TryFrom<&Row<'a>> for User {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            phone: row.get(3)?,
            role: row.get(4)?,
            organization_slug: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Admin, Role::Editor, Role::Viewer, Role::User] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn viewers_are_read_only() {
        assert_eq!(Role::Viewer.capabilities(), Capabilities::default());
        assert!(Role::Editor.capabilities().can_edit);
        assert!(!Role::User.capabilities().is_admin);
        assert!(Role::Admin.capabilities().is_admin);
    }

    #[test]
    fn dashboard_path_has_no_grouping_segment() {
        assert_eq!(dashboard_path("acme", Role::Admin), "/acme/dashboard/admin");
    }
}
