use super::schema::Database;
use super::types::{to_millis, NewPost, Post, PostDbRow, StoreError};

const POST_COLUMNS: &str =
    "id, created_at, updated_at, title, description, url, published_at, feed_id";

impl Database {
    /// Insert a post and return the stored row.
    ///
    /// The link is unique across the store; inserting a link that already
    /// exists fails with `StoreError::UniqueViolation` and leaves the
    /// existing post untouched.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostDbRow>(&format!(
            "INSERT INTO posts ({POST_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(post.id)
        .bind(to_millis(post.created_at))
        .bind(to_millis(post.updated_at))
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.url)
        .bind(to_millis(post.published_at))
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.into_post())
    }

    /// Posts of one feed, newest publication first.
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, PostDbRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE feed_id = ? \
             ORDER BY published_at DESC, created_at DESC"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(PostDbRow::into_post).collect())
    }

    pub async fn count_posts(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewPost, StoreError};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    async fn test_db_with_feed() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .insert_feed("Posts Feed", "https://posts.example.com/rss", None)
            .await
            .unwrap();
        (db, feed.id)
    }

    fn new_post(feed_id: i64, url: &str, description: Option<&str>) -> NewPost {
        let now = Utc::now();
        NewPost {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: "A post".to_string(),
            description: description.map(str::to_string),
            url: url.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            feed_id,
        }
    }

    #[tokio::test]
    async fn test_insert_post_roundtrips_fields() {
        let (db, feed_id) = test_db_with_feed().await;
        let post = new_post(feed_id, "https://posts.example.com/1", Some("body"));

        let stored = db.insert_post(&post).await.unwrap();
        assert_eq!(stored.id, post.id);
        assert_eq!(stored.url, post.url);
        assert_eq!(stored.description.as_deref(), Some("body"));
        assert_eq!(stored.published_at, post.published_at);
        assert_eq!(stored.feed_id, feed_id);
    }

    #[tokio::test]
    async fn test_absent_and_empty_description_are_distinct() {
        let (db, feed_id) = test_db_with_feed().await;
        db.insert_post(&new_post(feed_id, "https://posts.example.com/none", None))
            .await
            .unwrap();
        db.insert_post(&new_post(feed_id, "https://posts.example.com/empty", Some("")))
            .await
            .unwrap();

        let (nulls,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE description IS NULL")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        let (empties,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM posts WHERE description = ''")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(nulls, 1);
        assert_eq!(empties, 1);
    }

    #[tokio::test]
    async fn test_duplicate_link_is_unique_violation() {
        let (db, feed_id) = test_db_with_feed().await;
        let first = new_post(feed_id, "https://posts.example.com/dup", None);
        db.insert_post(&first).await.unwrap();

        let err = db
            .insert_post(&new_post(feed_id, "https://posts.example.com/dup", Some("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)), "got {:?}", err);

        let posts = db.get_posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, first.id);
    }

    #[tokio::test]
    async fn test_post_for_missing_feed_is_other_error() {
        let (db, _) = test_db_with_feed().await;
        let err = db
            .insert_post(&new_post(9999, "https://posts.example.com/orphan", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Other(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_deleting_feed_cascades_to_posts() {
        let (db, feed_id) = test_db_with_feed().await;
        db.insert_post(&new_post(feed_id, "https://posts.example.com/a", None))
            .await
            .unwrap();
        assert_eq!(db.count_posts().await.unwrap(), 1);

        db.delete_feed(feed_id).await.unwrap();
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }
}
