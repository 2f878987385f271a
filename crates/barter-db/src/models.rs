//! Database row types. These map directly to SQLite rows and are kept apart
//! from the barter-types view models so the storage layer stays independent.

use barter_types::models::{Condition, ProposalStatus};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// An ad joined with its owner's username.
#[derive(Debug, Clone)]
pub struct AdRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: Condition,
    pub created_at: DateTime<Utc>,
}

/// Fields written on ad insert and update.
#[derive(Debug, Clone, PartialEq)]
pub struct AdFields {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: Condition,
}

impl From<&AdRow> for AdFields {
    fn from(row: &AdRow) -> Self {
        Self {
            title: row.title.clone(),
            description: row.description.clone(),
            image_url: row.image_url.clone(),
            category: row.category.clone(),
            condition: row.condition,
        }
    }
}

/// A proposal with its sender ad fully loaded and the receiver ad's owner
/// resolved, which is everything the permission checks need.
#[derive(Debug, Clone)]
pub struct ProposalRow {
    pub id: i64,
    pub sender: AdRow,
    pub ad_receiver_id: i64,
    pub receiver_owner_id: i64,
    pub receiver_title: String,
    pub receiver_owner_username: String,
    pub comment: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user_id: i64,
    pub flash: Option<String>,
    pub expires_at: DateTime<Utc>,
}
