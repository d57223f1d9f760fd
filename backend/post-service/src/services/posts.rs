use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::domain::{Post, PostPage};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::repository::PostRepository;

/// Largest page the feed will return
pub const MAX_PAGE_SIZE: i32 = 50;

/// Characters of `text` exposed as `textSnippet`
pub const SNIPPET_LENGTH: usize = 255;

/// Arguments of one feed page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPageArgs {
    pub limit: i32,
    pub before: Option<DateTime<Utc>>,
}

impl FeedPageArgs {
    /// Clamp `limit` to [`MAX_PAGE_SIZE`] and decode the cursor
    pub fn parse(limit: i32, cursor: Option<&str>) -> ServiceResult<Self> {
        if limit < 1 {
            return Err(ServiceError::InvalidInput(format!(
                "limit must be at least 1, got {}",
                limit
            )));
        }
        let before = cursor.map(decode_cursor).transpose()?;
        Ok(Self {
            limit: limit.min(MAX_PAGE_SIZE),
            before,
        })
    }
}

/// Timestamps render as decimal epoch milliseconds, so the `createdAt` of
/// the last post on a page is the cursor for the next one
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.timestamp_millis().to_string()
}

pub fn decode_cursor(cursor: &str) -> ServiceResult<DateTime<Utc>> {
    let millis: i64 = cursor
        .trim()
        .parse()
        .map_err(|_| ServiceError::InvalidInput(format!("invalid cursor: {:?}", cursor)))?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| ServiceError::InvalidInput(format!("cursor out of range: {}", millis)))
}

pub fn text_snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LENGTH).collect()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPost {
    #[validate(length(min = 1, max = 300, message = "title must be 1-300 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub text: String,
}

impl NewPost {
    /// Trim both fields, then validate what would be stored
    pub fn normalized(self) -> ServiceResult<Self> {
        let post = NewPost {
            title: self.title.trim().to_string(),
            text: self.text.trim().to_string(),
        };
        post.validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
        Ok(post)
    }
}

#[derive(Debug, Validate)]
struct TitleUpdate<'a> {
    #[validate(length(min = 1, max = 300, message = "title must be 1-300 characters"))]
    title: &'a str,
}

/// Post operations with ownership rules applied
#[derive(Clone)]
pub struct PostService {
    posts: PostRepository,
}

impl PostService {
    pub fn new(posts: PostRepository) -> Self {
        Self { posts }
    }

    pub async fn feed(&self, args: &FeedPageArgs) -> ServiceResult<PostPage> {
        self.posts.list_page(args.limit as i64, args.before).await
    }

    pub async fn get(&self, post_id: i32) -> ServiceResult<Option<Post>> {
        self.posts.find_by_id(post_id).await
    }

    pub async fn create(&self, creator_id: i32, input: NewPost) -> ServiceResult<Post> {
        let input = input.normalized()?;

        let post = self
            .posts
            .create(creator_id, &input.title, &input.text)
            .await?;

        metrics::record_post_created();
        info!(post_id = post.id, creator_id, "Post created");
        Ok(post)
    }

    pub async fn update_title(
        &self,
        user_id: i32,
        post_id: i32,
        title: String,
    ) -> ServiceResult<Option<Post>> {
        let update = TitleUpdate {
            title: title.trim(),
        };
        update
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        match self.posts.find_by_id(post_id).await? {
            None => Ok(None),
            Some(post) => {
                ensure_owner(&post, user_id)?;
                self.posts.update_title(post_id, update.title).await
            }
        }
    }

    pub async fn delete(&self, user_id: i32, post_id: i32) -> ServiceResult<bool> {
        match self.posts.find_by_id(post_id).await? {
            None => Ok(false),
            Some(post) => {
                ensure_owner(&post, user_id)?;
                let deleted = self.posts.delete(post_id).await?;
                if deleted {
                    info!(post_id, user_id, "Post deleted");
                }
                Ok(deleted)
            }
        }
    }
}

fn ensure_owner(post: &Post, user_id: i32) -> ServiceResult<()> {
    if post.creator_id != user_id {
        return Err(ServiceError::Forbidden(format!(
            "user {} does not own post {}",
            user_id, post.id
        )));
    }
    Ok(())
}
