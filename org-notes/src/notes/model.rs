use std::str::FromStr;

use rusqlite::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::users::UserId;

pub type NoteId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: NoteId,
    /// Absent for notes posted anonymously to the public board.
    pub user_id: Option<UserId>,
    pub organization_slug: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub is_public: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub(crate) const NOTE_COLUMNS: &str =
    "id, user_id, organization_slug, title, description, content, is_public, created_at, updated_at";

impl<'a> TryFrom<&Row<'a>> for Note {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'a>) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            organization_slug: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            content: row.get(5)?,
            is_public: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateNote {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Absent fields are left unchanged. `description` and `content` are
/// cleared by an explicit `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub content: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

/// A present field, `null` included, becomes `Some`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindNotesResponse {
    pub results: Vec<Note>,
}

/// Which slice of notes a listing or subscription covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Notes owned by the caller.
    Mine,
    /// Notes of the caller's organization they may read.
    #[default]
    Organization,
    /// Every public note, across organizations.
    Public,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Mine => "mine",
            Scope::Organization => "organization",
            Scope::Public => "public",
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mine" => Ok(Scope::Mine),
            "organization" => Ok(Scope::Organization),
            "public" => Ok(Scope::Public),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: Scope,
}
