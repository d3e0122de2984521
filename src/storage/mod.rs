//! SQLite store shared by the scraper and the external CRUD layer.
//!
//! The scraper depends on exactly three queries:
//! [`Database::select_next_feeds_to_fetch`], [`Database::mark_feed_fetched`]
//! and [`Database::insert_post`]. The remaining methods exist for feed
//! administration and tests.

mod feeds;
mod posts;
mod schema;
mod types;

pub use schema::Database;
pub use types::{Feed, NewPost, Post, StoreError};
