use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write (duplicate post link or feed URL)
    #[error("Duplicate value violates a unique constraint: {0}")]
    UniqueViolation(String),

    /// The feed row does not exist (deleted by the CRUD layer mid-cycle)
    #[error("Feed {0} not found")]
    NotFound(i64),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, separating unique-constraint violations.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
        }
        StoreError::Other(err)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

// ============================================================================
// Timestamp Helpers
// ============================================================================

/// Timestamps are stored as Unix milliseconds.
pub(crate) fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for feed queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub owner: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: self.name,
            url: self.url,
            owner: self.owner,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            last_fetched_at: self.last_fetched_at.map(from_millis),
        }
    }
}

/// Internal row type for post queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostDbRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: i64,
    pub feed_id: i64,
}

impl PostDbRow {
    pub(crate) fn into_post(self) -> Post {
        Post {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            title: self.title,
            description: self.description,
            url: self.url,
            published_at: from_millis(self.published_at),
            feed_id: self.feed_id,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A tracked syndication source.
///
/// `last_fetched_at` stays `None` until the scraper first attempts the feed;
/// after that it only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Owning user in the external CRUD layer, opaque to the scraper
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A persisted feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    /// `None` when the feed item carried no description
    pub description: Option<String>,
    /// Canonical link, unique across the store
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: i64,
}

/// Insert payload for [`Post`]; identity and timestamps are chosen by the caller.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub feed_id: i64,
}
