//! Read-through feed client
//!
//! Serves the feed from the cache when it can, fetches through a
//! [`GraphqlTransport`] when it cannot, and keeps the cache coherent after
//! votes and new posts.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::metrics::FeedCacheMetrics;
use crate::reconciler::{FeedCache, SharedFeedCache};
use crate::store::{CacheStore, MemoryStore};
use crate::types::{CreatedPost, PaginatedPosts, PostsArgs};

pub const POSTS_QUERY: &str = r#"query Posts($limit: Int!, $cursor: String) {
  posts(limit: $limit, cursor: $cursor) {
    hasMorePosts
    posts {
      id
      createdAt
      updatedAt
      title
      points
      textSnippet
      creator {
        id
        username
      }
    }
  }
}"#;

pub const POST_POINTS_QUERY: &str = r#"query Post($id: Int!) {
  post(id: $id) {
    id
    points
  }
}"#;

pub const VOTE_MUTATION: &str = r#"mutation Vote($postId: Int!, $value: Int!) {
  vote(postId: $postId, value: $value)
}"#;

pub const CREATE_POST_MUTATION: &str = r#"mutation CreatePost($input: PostInput!) {
  createPost(input: $input) {
    id
    creatorId
    title
    text
    points
    createdAt
    updatedAt
  }
}"#;

const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";
const SESSION_COOKIE: &str = "qid";

/// Executes one GraphQL operation and returns its `data`
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> CacheResult<Value>;
}

#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Raw `qid` cookie value forwarded with every request
    pub session_cookie: Option<String>,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session_cookie: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// JSON-over-HTTP transport
pub struct HttpGraphqlTransport {
    client: Client,
    config: FeedClientConfig,
}

impl HttpGraphqlTransport {
    pub fn new(config: FeedClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl GraphqlTransport for HttpGraphqlTransport {
    async fn execute(&self, query: &str, variables: Value) -> CacheResult<Value> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(session) = &self.config.session_cookie {
            request = request.header(COOKIE, format!("{}={}", SESSION_COOKIE, session));
        }

        let response: GraphqlResponse = request.send().await?.error_for_status()?.json().await?;
        into_data(response)
    }
}

fn into_data(response: GraphqlResponse) -> CacheResult<Value> {
    if !response.errors.is_empty() {
        return Err(CacheError::Graphql(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    response
        .data
        .ok_or_else(|| CacheError::InvalidData("response carried no data".into()))
}

/// Take `data.<field>` and deserialize it
fn field<T: DeserializeOwned>(mut data: Value, name: &str) -> CacheResult<T> {
    let value = data
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| CacheError::InvalidData(format!("response has no `{}` field", name)))?;
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
struct PostPoints {
    id: i32,
    points: i32,
}

pub struct FeedClient<T: GraphqlTransport, S: CacheStore = MemoryStore> {
    transport: T,
    cache: SharedFeedCache<S>,
}

impl<T: GraphqlTransport> FeedClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_cache(transport, FeedCache::new().shared())
    }
}

impl FeedClient<HttpGraphqlTransport> {
    pub fn from_config(config: FeedClientConfig) -> Self {
        Self::new(HttpGraphqlTransport::new(config))
    }
}

impl<T: GraphqlTransport, S: CacheStore> FeedClient<T, S> {
    pub fn with_cache(transport: T, cache: SharedFeedCache<S>) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &SharedFeedCache<S> {
        &self.cache
    }

    /// The merged feed window including the page at `cursor`
    pub async fn posts(&self, limit: i32, cursor: Option<String>) -> CacheResult<PaginatedPosts> {
        let args = PostsArgs { limit, cursor };

        let cached = self.cache.lock().await.read_posts(&args)?;
        match cached.data {
            Some(page) if !cached.partial => {
                FeedCacheMetrics::record_read("hit");
                return Ok(page);
            }
            Some(_) => FeedCacheMetrics::record_read("partial"),
            None => FeedCacheMetrics::record_read("miss"),
        }

        debug!(limit, cursor = ?args.cursor, "Fetching feed page");
        let data = self
            .transport
            .execute(
                POSTS_QUERY,
                json!({ "limit": args.limit, "cursor": args.cursor }),
            )
            .await?;
        let page: PaginatedPosts = field(data, "posts")?;

        let mut cache = self.cache.lock().await;
        cache.write_page(&args, &page);
        cache
            .read_posts(&args)?
            .data
            .ok_or_else(|| CacheError::InvalidData("feed page missing after write".into()))
    }

    /// Vote on a post and refresh its cached points
    pub async fn vote(&self, post_id: i32, value: i32) -> CacheResult<bool> {
        let data = self
            .transport
            .execute(VOTE_MUTATION, json!({ "postId": post_id, "value": value }))
            .await?;
        let applied: bool = field(data, "vote")?;
        if !applied {
            return Ok(false);
        }

        let data = self
            .transport
            .execute(POST_POINTS_QUERY, json!({ "id": post_id }))
            .await?;
        if let Some(post) = field::<Option<PostPoints>>(data, "post")? {
            let mut fields = Map::new();
            fields.insert("points".into(), json!(post.points));
            self.cache.lock().await.write_post_fields(post.id, fields);
            debug!(post_id, points = post.points, "Cached points refreshed");
        }
        Ok(true)
    }

    /// Create a post; every cached feed page is dropped so the next read
    /// starts again from the newest post
    pub async fn create_post(&self, title: &str, text: &str) -> CacheResult<CreatedPost> {
        let data = self
            .transport
            .execute(
                CREATE_POST_MUTATION,
                json!({ "input": { "title": title, "text": text } }),
            )
            .await?;
        let post: CreatedPost = field(data, "createPost")?;

        let dropped = self.cache.lock().await.invalidate_feed();
        FeedCacheMetrics::record_invalidation();
        info!(post_id = post.id, dropped, "Post created, feed cache invalidated");
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_take_precedence_over_data() {
        let response: GraphqlResponse = serde_json::from_value(json!({
            "data": { "vote": null },
            "errors": [{ "message": "Unauthorized: authentication required" }]
        }))
        .unwrap();

        match into_data(response) {
            Err(CacheError::Graphql(messages)) => {
                assert_eq!(messages, vec!["Unauthorized: authentication required"])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_data_is_invalid() {
        let response: GraphqlResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(into_data(response), Err(CacheError::InvalidData(_))));
    }

    #[test]
    fn test_field_extracts_nested_value() {
        let data = json!({ "post": { "id": 3, "points": 7 } });
        let post: Option<PostPoints> = field(data, "post").unwrap();
        let post = post.unwrap();
        assert_eq!((post.id, post.points), (3, 7));

        assert!(field::<bool>(json!({}), "vote").is_err());
    }

    #[test]
    fn test_default_config_points_at_local_server() {
        let config = FeedClientConfig::default();
        assert_eq!(config.endpoint, "http://localhost:4000/graphql");
        assert!(config.session_cookie.is_none());
    }

    #[test]
    fn test_http_transport_reports_unreachable_server() {
        let transport = HttpGraphqlTransport::new(FeedClientConfig {
            endpoint: "http://127.0.0.1:9/graphql".into(),
            session_cookie: Some("abc".into()),
        });
        let result = tokio_test::block_on(transport.execute("{ me { id } }", json!({})));
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }

    #[test]
    fn test_client_from_config_surfaces_transport_errors() {
        let client = FeedClient::from_config(FeedClientConfig {
            endpoint: "http://127.0.0.1:9/graphql".into(),
            session_cookie: None,
        });
        let result = tokio_test::block_on(client.posts(10, None));
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }
}
