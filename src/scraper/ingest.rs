use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::feed::{fetch_feed, normalize_pub_date, DateParseError, RawFeedItem};
use crate::storage::{Database, Feed, NewPost, StoreError};

/// How a single feed's ingestion ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Items were fetched and processed (possibly zero of them)
    Completed,
    /// The feed could not be stamped as fetched; nothing else was attempted
    MarkFailed(String),
    /// Fetching or decoding the feed failed; no items were processed
    FetchFailed(String),
}

/// Per-feed result, used by the scheduler for cycle logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub feed_id: i64,
    pub outcome: IngestOutcome,
    /// Items present in the fetched channel
    pub items: usize,
    /// New posts written
    pub inserted: usize,
    /// Items whose link was already stored
    pub duplicates: usize,
    /// Items dropped for a bad date, a missing link, or a store error
    pub skipped: usize,
}

impl IngestReport {
    fn new(feed_id: i64, outcome: IngestOutcome) -> Self {
        Self {
            feed_id,
            outcome,
            items: 0,
            inserted: 0,
            duplicates: 0,
            skipped: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == IngestOutcome::Completed
    }
}

/// Ingest one feed: stamp it, fetch it, store its new items.
///
/// The feed is stamped before fetching, so a failing feed still rotates to
/// the back of the staleness queue. Failures never escape this function;
/// they are logged and summarised in the returned report.
pub async fn ingest_feed(
    db: &Database,
    client: &reqwest::Client,
    feed: &Feed,
    fetch_timeout: Duration,
) -> IngestReport {
    if let Err(e) = db.mark_feed_fetched(feed.id).await {
        tracing::warn!(
            feed_id = feed.id,
            name = %feed.name,
            error = %e,
            "Failed to mark feed as fetched"
        );
        return IngestReport::new(feed.id, IngestOutcome::MarkFailed(e.to_string()));
    }

    let channel = match fetch_feed(client, &feed.url, fetch_timeout).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(
                feed_id = feed.id,
                name = %feed.name,
                url = %feed.url,
                transport = e.is_transport(),
                error = %e,
                "Failed to fetch feed"
            );
            return IngestReport::new(feed.id, IngestOutcome::FetchFailed(e.to_string()));
        }
    };

    let report = store_items(db, feed.id, channel.items).await;

    if report.skipped > 0 {
        tracing::warn!(
            feed_id = feed.id,
            name = %feed.name,
            skipped = report.skipped,
            "Some feed items were skipped"
        );
    }
    tracing::info!(
        feed_id = feed.id,
        name = %feed.name,
        items = report.items,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "Feed collected"
    );

    report
}

/// Convert and insert fetched items for `feed_id`.
///
/// Each item is handled on its own: a bad date or a failed insert drops only
/// that item. Duplicate links are counted but not logged, since every
/// re-scrape of an unchanged feed produces them.
pub async fn store_items(db: &Database, feed_id: i64, items: Vec<RawFeedItem>) -> IngestReport {
    let mut report = IngestReport::new(feed_id, IngestOutcome::Completed);
    report.items = items.len();

    for item in items {
        let post = match prepare_post(feed_id, item, Utc::now()) {
            Ok(post) => post,
            Err(skip) => {
                tracing::debug!(feed_id = feed_id, reason = %skip, "Skipping feed item");
                report.skipped += 1;
                continue;
            }
        };

        match db.insert_post(&post).await {
            Ok(_) => report.inserted += 1,
            Err(StoreError::UniqueViolation(_)) => report.duplicates += 1,
            Err(e) => {
                tracing::error!(
                    feed_id = feed_id,
                    title = %post.title,
                    url = %post.url,
                    error = %e,
                    "Failed to save post"
                );
                report.skipped += 1;
            }
        }
    }

    report
}

/// Why an item was not turned into a post.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ItemSkip {
    #[error("item has no link")]
    MissingLink,
    #[error(transparent)]
    BadDate(#[from] DateParseError),
}

/// Build the insert payload for one raw item.
///
/// An empty description becomes `None`; a present description is kept
/// verbatim. Items without a link cannot be deduplicated and are refused.
pub fn prepare_post(
    feed_id: i64,
    item: RawFeedItem,
    now: DateTime<Utc>,
) -> Result<NewPost, ItemSkip> {
    if item.link.trim().is_empty() {
        return Err(ItemSkip::MissingLink);
    }

    let published_at = normalize_pub_date(&item.pub_date)?;
    let description = Some(item.description).filter(|d| !d.is_empty());

    Ok(NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: item.title,
        description,
        url: item.link.trim().to_string(),
        published_at,
        feed_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_item(link: &str, description: &str, pub_date: &str) -> RawFeedItem {
        RawFeedItem {
            title: format!("Title for {}", link),
            link: link.to_string(),
            description: description.to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    const GOOD_DATE: &str = "Mon, 02 Jan 2006 15:04:05 -0700";

    async fn test_db_with_feed() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .insert_feed("Ingest Feed", "https://ingest.example.com/rss", None)
            .await
            .unwrap();
        (db, feed.id)
    }

    #[test]
    fn test_prepare_post_empty_description_is_none() {
        let now = Utc::now();
        let post = prepare_post(1, raw_item("https://a.example/1", "", GOOD_DATE), now).unwrap();
        assert_eq!(post.description, None);
        assert_eq!(post.created_at, now);
        assert_eq!(post.updated_at, now);
    }

    #[test]
    fn test_prepare_post_keeps_description() {
        let post = prepare_post(
            1,
            raw_item("https://a.example/1", " spaced ", GOOD_DATE),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(post.description.as_deref(), Some(" spaced "));
    }

    #[test]
    fn test_prepare_post_bad_date() {
        let err = prepare_post(1, raw_item("https://a.example/1", "", "not-a-date"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ItemSkip::BadDate(DateParseError::Unrecognized(_))));
    }

    #[test]
    fn test_prepare_post_empty_date() {
        let err = prepare_post(1, raw_item("https://a.example/1", "", ""), Utc::now()).unwrap_err();
        assert_eq!(err, ItemSkip::BadDate(DateParseError::Empty));
    }

    #[test]
    fn test_prepare_post_missing_link() {
        let err = prepare_post(1, raw_item("  ", "", GOOD_DATE), Utc::now()).unwrap_err();
        assert_eq!(err, ItemSkip::MissingLink);
    }

    #[test]
    fn test_prepare_post_fresh_ids() {
        let now = Utc::now();
        let a = prepare_post(1, raw_item("https://a.example/1", "", GOOD_DATE), now).unwrap();
        let b = prepare_post(1, raw_item("https://a.example/1", "", GOOD_DATE), now).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_store_items_bad_date_skips_only_that_item() {
        let (db, feed_id) = test_db_with_feed().await;
        let items = vec![
            raw_item("https://a.example/1", "first", GOOD_DATE),
            raw_item("https://a.example/2", "second", "not-a-date"),
            raw_item("https://a.example/3", "", "Mon, 02 Jan 2006 15:04:05 MST"),
        ];

        let report = store_items(&db, feed_id, items).await;
        assert_eq!(report.items, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.duplicates, 0);

        let mut urls: Vec<String> = db
            .get_posts_for_feed(feed_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        urls.sort();
        assert_eq!(urls, vec!["https://a.example/1", "https://a.example/3"]);
    }

    #[tokio::test]
    async fn test_store_items_twice_is_idempotent() {
        let (db, feed_id) = test_db_with_feed().await;
        let items = vec![
            raw_item("https://a.example/1", "", GOOD_DATE),
            raw_item("https://a.example/2", "", GOOD_DATE),
        ];

        let first = store_items(&db, feed_id, items.clone()).await;
        assert_eq!(first.inserted, 2);
        let count_after_first = db.count_posts().await.unwrap();

        let second = store_items(&db, feed_id, items).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.skipped, 0);
        assert_eq!(db.count_posts().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn test_store_items_duplicate_within_one_batch() {
        let (db, feed_id) = test_db_with_feed().await;
        let items = vec![
            raw_item("https://a.example/same", "", GOOD_DATE),
            raw_item("https://a.example/same", "", GOOD_DATE),
        ];

        let report = store_items(&db, feed_id, items).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_store_items_insert_error_continues() {
        let (db, _) = test_db_with_feed().await;
        // Feed 9999 does not exist, so every insert hits the foreign key
        let items = vec![
            raw_item("https://a.example/1", "", GOOD_DATE),
            raw_item("https://a.example/2", "", GOOD_DATE),
        ];

        let report = store_items(&db, 9999, items).await;
        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_ingest_deleted_feed_reports_mark_failure() {
        let (db, feed_id) = test_db_with_feed().await;
        let feed = db.get_feed(feed_id).await.unwrap().unwrap();
        db.delete_feed(feed_id).await.unwrap();

        let client = reqwest::Client::new();
        let report = ingest_feed(&db, &client, &feed, Duration::from_secs(1)).await;
        assert!(matches!(report.outcome, IngestOutcome::MarkFailed(_)));
        assert!(!report.is_success());
    }
}
