use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Post, PostPage, PostWithCreator, User};
use crate::error::ServiceResult;

/// Feed row: post columns plus the creator, flattened by the join
#[derive(Debug, sqlx::FromRow)]
struct FeedRow {
    id: i32,
    creator_id: i32,
    title: String,
    text: String,
    points: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    creator_username: String,
    creator_email: String,
    creator_created_at: DateTime<Utc>,
    creator_updated_at: DateTime<Utc>,
}

impl From<FeedRow> for PostWithCreator {
    fn from(row: FeedRow) -> Self {
        PostWithCreator {
            creator: User {
                id: row.creator_id,
                username: row.creator_username,
                email: row.creator_email,
                created_at: row.creator_created_at,
                updated_at: row.creator_updated_at,
            },
            post: Post {
                id: row.id,
                creator_id: row.creator_id,
                title: row.title,
                text: row.text,
                points: row.points,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// Repository for Post operations
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest-first page of posts strictly older than `before`.
    ///
    /// Fetches one row past `limit` to learn whether more posts remain.
    pub async fn list_page(
        &self,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> ServiceResult<PostPage> {
        let rows = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT p.id, p.creator_id, p.title, p.text, p.points, p.created_at, p.updated_at,
                   u.username AS creator_username,
                   u.email AS creator_email,
                   u.created_at AS creator_created_at,
                   u.updated_at AS creator_updated_at
            FROM posts p
            INNER JOIN users u ON u.id = p.creator_id
            WHERE ($2::timestamptz IS NULL OR p.created_at < $2)
            ORDER BY p.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit + 1)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        let (posts, has_more_posts) = split_page(rows, limit as usize);

        Ok(PostPage {
            posts: posts.into_iter().map(PostWithCreator::from).collect(),
            has_more_posts,
        })
    }

    pub async fn find_by_id(&self, post_id: i32) -> ServiceResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, creator_id, title, text, points, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    pub async fn create(&self, creator_id: i32, title: &str, text: &str) -> ServiceResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (creator_id, title, text)
            VALUES ($1, $2, $3)
            RETURNING id, creator_id, title, text, points, created_at, updated_at
            "#,
        )
        .bind(creator_id)
        .bind(title)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    /// Retitle a post; `None` when the post does not exist
    pub async fn update_title(&self, post_id: i32, title: &str) -> ServiceResult<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET title = $2, updated_at = date_trunc('milliseconds', NOW())
            WHERE id = $1
            RETURNING id, creator_id, title, text, points, created_at, updated_at
            "#,
        )
        .bind(post_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Delete a post and, through the foreign key, its votes
    pub async fn delete(&self, post_id: i32) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Trim the look-ahead row and report whether it was there
fn split_page<T>(mut rows: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    (rows, has_more)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_page_with_lookahead_row() {
        let (rows, more) = split_page(vec![10, 9, 8, 7], 3);
        assert_eq!(rows, vec![10, 9, 8]);
        assert!(more);
    }

    #[test]
    fn test_split_page_short_page() {
        let (rows, more) = split_page(vec![7, 6], 3);
        assert_eq!(rows, vec![7, 6]);
        assert!(!more);
    }
}
