//! Shared data model

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Table holding diary rows on the backend
pub const DIARY_ENTRIES_TABLE: &str = "diary_entries";

/// User as issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session; tokens are owned by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

impl Session {
    /// Identifier of the user owning this session
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Opaque row identifier; the backend may key rows by integer or string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum EntryId {
    Int(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Int(id) => write!(f, "{id}"),
            EntryId::Text(id) => f.write_str(id),
        }
    }
}

/// One diary entry; at most one per (user_id, date)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiaryEntry {
    pub id: EntryId,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub content: String,
}

/// Insert payload for a new diary row
#[derive(Debug, Clone, Serialize)]
pub struct NewDiaryEntry<'a> {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub content: &'a str,
}

/// Update payload for an existing diary row
#[derive(Debug, Clone, Serialize)]
pub struct UpdateDiaryEntry<'a> {
    pub content: &'a str,
}
