use chrono::Utc;

use super::schema::Database;
use super::types::{to_millis, Feed, FeedDbRow, StoreError};

const FEED_COLUMNS: &str = "id, name, url, owner, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Scraper Queries
    // ========================================================================

    /// Returns up to `limit` feeds, never-fetched first, then oldest fetch first.
    ///
    /// Ties (including the never-fetched group) are broken by ascending id so
    /// the selection is deterministic.
    pub async fn select_next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds \
             ORDER BY last_fetched_at ASC NULLS FIRST, id ASC \
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Stamp `last_fetched_at` with the current time and return the updated row.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the feed no longer exists.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<Feed, StoreError> {
        let now = to_millis(Utc::now());
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ? \
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(FeedDbRow::into_feed)
            .ok_or(StoreError::NotFound(feed_id))
    }

    // ========================================================================
    // Feed Administration
    // ========================================================================

    /// Register a feed. A URL that is already tracked yields `UniqueViolation`.
    pub async fn insert_feed(
        &self,
        name: &str,
        url: &str,
        owner: Option<&str>,
    ) -> Result<Feed, StoreError> {
        let now = to_millis(Utc::now());
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "INSERT INTO feeds (name, url, owner, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(name)
        .bind(url)
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.into_feed())
    }

    /// Delete a feed and (by cascade) its posts. Returns whether a row was removed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// All feeds ordered by id.
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let rows = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, StoreError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(FeedDbRow::into_feed))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, StoreError};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feeds(db: &Database, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let feed = db
                .insert_feed(
                    &format!("Test Feed {}", i),
                    &format!("https://feed{}.example.com/rss", i),
                    None,
                )
                .await
                .unwrap();
            ids.push(feed.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_insert_feed_starts_unfetched() {
        let db = test_db().await;
        let feed = db
            .insert_feed("Example", "https://example.com/rss", Some("user-1"))
            .await
            .unwrap();

        assert!(feed.id > 0);
        assert_eq!(feed.name, "Example");
        assert_eq!(feed.owner.as_deref(), Some("user-1"));
        assert!(feed.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_url_is_unique_violation() {
        let db = test_db().await;
        db.insert_feed("A", "https://example.com/rss", None)
            .await
            .unwrap();

        let err = db
            .insert_feed("B", "https://example.com/rss", None)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_mark_feed_fetched_sets_timestamp() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 1).await;
        let before = chrono::Utc::now();

        let feed = db.mark_feed_fetched(ids[0]).await.unwrap();
        let fetched_at = feed.last_fetched_at.expect("last_fetched_at should be set");
        assert!(fetched_at.timestamp_millis() >= before.timestamp_millis());

        let stored = db.get_feed(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.last_fetched_at, Some(fetched_at));
    }

    #[tokio::test]
    async fn test_mark_missing_feed_is_not_found() {
        let db = test_db().await;
        let err = db.mark_feed_fetched(4242).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(4242)));
    }

    #[tokio::test]
    async fn test_select_orders_by_staleness() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 3).await;

        // Fetch order: 2 then 0, leaving 1 never fetched
        db.mark_feed_fetched(ids[2]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        db.mark_feed_fetched(ids[0]).await.unwrap();

        let selected: Vec<i64> = db
            .select_next_feeds_to_fetch(3)
            .await
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(selected, vec![ids[1], ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn test_select_respects_limit() {
        let db = test_db().await;
        seed_feeds(&db, 5).await;

        assert_eq!(db.select_next_feeds_to_fetch(2).await.unwrap().len(), 2);
        assert_eq!(db.select_next_feeds_to_fetch(10).await.unwrap().len(), 5);
        assert!(db.select_next_feeds_to_fetch(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_feed() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 2).await;

        assert!(db.delete_feed(ids[0]).await.unwrap());
        assert!(!db.delete_feed(ids[0]).await.unwrap());

        let feeds = db.get_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_select_after_close_fails() {
        let db = test_db().await;
        seed_feeds(&db, 1).await;
        db.close().await;

        assert!(db.select_next_feeds_to_fetch(1).await.is_err());
    }
}
