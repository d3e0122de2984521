//! Periodic RSS scraper.
//!
//! Feeds are selected by staleness, fetched concurrently, and their items
//! inserted into SQLite with duplicate links suppressed by the store.

pub mod config;
pub mod feed;
pub mod scraper;
pub mod storage;
