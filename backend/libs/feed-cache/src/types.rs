//! Feed payloads as the server returns them

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Arguments of one `posts` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsArgs {
    pub limit: i32,
    pub cursor: Option<String>,
}

impl PostsArgs {
    pub fn first_page(limit: i32) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }

    pub fn after(limit: i32, cursor: impl Into<String>) -> Self {
        Self {
            limit,
            cursor: Some(cursor.into()),
        }
    }

    pub fn to_arguments(&self) -> Map<String, Value> {
        let mut arguments = Map::new();
        arguments.insert("limit".into(), json!(self.limit));
        arguments.insert("cursor".into(), json!(self.cursor));
        arguments
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: i32,
    pub username: String,
}

/// A post as selected by the feed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    pub id: i32,
    pub created_at: String,
    pub updated_at: String,
    pub title: String,
    pub points: i32,
    pub text_snippet: String,
    pub creator: Creator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPosts {
    pub posts: Vec<FeedPost>,
    pub has_more_posts: bool,
}

impl PaginatedPosts {
    /// Cursor for the page after this one
    pub fn next_cursor(&self) -> Option<&str> {
        self.posts.last().map(|p| p.created_at.as_str())
    }
}

/// A post as returned by `createPost`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub id: i32,
    pub creator_id: i32,
    pub title: String,
    pub text: String,
    pub points: i32,
    pub created_at: String,
    pub updated_at: String,
}
