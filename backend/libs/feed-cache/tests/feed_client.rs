//! Read-through client against a scripted transport

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use feed_cache::{CacheError, CacheResult, FeedClient, GraphqlTransport, PostsArgs};
use serde_json::{json, Value};

/// Replies with queued `data` payloads in order
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<CacheResult<Value>>>,
}

impl ScriptedTransport {
    fn reply(self, data: Value) -> Self {
        self.replies.lock().unwrap().push_back(Ok(data));
        self
    }

    fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(CacheError::Graphql(vec![message.to_string()])));
        self
    }
}

#[async_trait]
impl GraphqlTransport for ScriptedTransport {
    async fn execute(&self, _query: &str, _variables: Value) -> CacheResult<Value> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CacheError::InvalidData("no scripted reply".into())))
    }
}

fn post_json(id: i64, points: i32) -> Value {
    let created_at = (1_630_000_000_000i64 + id * 1000).to_string();
    json!({
        "id": id,
        "createdAt": created_at,
        "updatedAt": created_at,
        "title": format!("post {}", id),
        "points": points,
        "textSnippet": "body",
        "creator": { "id": 1, "username": "ben" }
    })
}

fn posts_reply(ids: &[i64], has_more: bool) -> Value {
    json!({
        "posts": {
            "hasMorePosts": has_more,
            "posts": ids.iter().map(|id| post_json(*id, 0)).collect::<Vec<_>>()
        }
    })
}

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let transport = ScriptedTransport::default().reply(posts_reply(&[10, 9, 8], true));
    let client = FeedClient::new(transport);

    let first = client.posts(3, None).await.unwrap();
    let again = client.posts(3, None).await.unwrap();

    assert_eq!(first, again);
    let ids: Vec<i32> = again.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![10, 9, 8]);
}

#[tokio::test]
async fn test_load_more_fetches_and_merges() {
    let transport = ScriptedTransport::default()
        .reply(posts_reply(&[10, 9, 8], true))
        .reply(posts_reply(&[7, 6], false));
    let client = FeedClient::new(transport);

    let first = client.posts(3, None).await.unwrap();
    let cursor = first.next_cursor().map(str::to_string);
    let merged = client.posts(3, cursor.clone()).await.unwrap();

    let ids: Vec<i32> = merged.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![10, 9, 8, 7, 6]);
    assert!(!merged.has_more_posts);

    let cached = client
        .cache()
        .lock()
        .await
        .read_posts(&PostsArgs { limit: 3, cursor })
        .unwrap();
    assert!(cached.is_complete());
}

#[tokio::test]
async fn test_vote_refreshes_cached_points() {
    let transport = ScriptedTransport::default()
        .reply(posts_reply(&[10, 9], false))
        .reply(json!({ "vote": true }))
        .reply(json!({ "post": { "id": 9, "points": 1 } }));
    let client = FeedClient::new(transport);
    client.posts(2, None).await.unwrap();

    assert!(client.vote(9, 1).await.unwrap());

    // Served from cache with the refreshed score, order untouched
    let feed = client.posts(2, None).await.unwrap();
    let scores: Vec<(i32, i32)> = feed.posts.iter().map(|p| (p.id, p.points)).collect();
    assert_eq!(scores, vec![(10, 0), (9, 1)]);
}

#[tokio::test]
async fn test_failed_vote_leaves_cache_alone() {
    let transport = ScriptedTransport::default()
        .reply(posts_reply(&[10], false))
        .fail("Unauthorized: authentication required");
    let client = FeedClient::new(transport);
    client.posts(1, None).await.unwrap();

    let err = client.vote(10, 1).await.unwrap_err();

    assert!(matches!(err, CacheError::Graphql(_)));
    let feed = client.posts(1, None).await.unwrap();
    assert_eq!(feed.posts[0].points, 0);
}

#[tokio::test]
async fn test_create_post_invalidates_feed() {
    let transport = ScriptedTransport::default()
        .reply(posts_reply(&[10, 9], true))
        .reply(json!({
            "createPost": {
                "id": 11,
                "creatorId": 1,
                "title": "fresh",
                "text": "hello",
                "points": 0,
                "createdAt": "1630000011000",
                "updatedAt": "1630000011000"
            }
        }))
        .reply(posts_reply(&[11, 10], true));
    let client = FeedClient::new(transport);
    client.posts(2, None).await.unwrap();

    let created = client.create_post("fresh", "hello").await.unwrap();
    assert_eq!(created.id, 11);

    let feed = client.posts(2, None).await.unwrap();
    assert_eq!(feed.posts[0].id, 11);
}

#[tokio::test]
async fn test_vote_on_vanished_post_still_succeeds() {
    let transport = ScriptedTransport::default()
        .reply(posts_reply(&[10], false))
        .reply(json!({ "vote": true }))
        .reply(json!({ "post": null }));
    let client = FeedClient::new(transport);

    client.posts(1, None).await.unwrap();
    assert!(client.vote(10, -1).await.unwrap());

    let feed = client.posts(1, None).await.unwrap();
    assert_eq!(feed.posts[0].points, 0);
}
