//! Cursor-paginated feed over the normalized store
//!
//! Every page fetched for the feed is cached as its own `posts(...)` field on
//! the root entity. Reading any page merges all of them into one window, so
//! "load more" grows the list instead of replacing it.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::keys::{self, ROOT_KEY};
use crate::store::{CacheStore, CacheValue, FieldInfo, MemoryStore};
use crate::types::{FeedPost, PaginatedPosts, PostsArgs};

const POSTS_FIELD: &str = "posts";
const PAGE_TYPENAME: &str = "PaginatedPosts";

/// Outcome of a cache read.
///
/// `partial` means the exact page asked for has never been fetched, so the
/// caller should go to the network even when `data` holds a merged window.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub data: Option<PaginatedPosts>,
    pub partial: bool,
}

impl Resolution {
    fn miss() -> Self {
        Self {
            data: None,
            partial: true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_some() && !self.partial
    }
}

/// Feed cache shared between tasks
pub type SharedFeedCache<S = MemoryStore> = Arc<Mutex<FeedCache<S>>>;

pub struct FeedCache<S: CacheStore = MemoryStore> {
    store: S,
}

impl FeedCache<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for FeedCache<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CacheStore> FeedCache<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn shared(self) -> SharedFeedCache<S> {
        Arc::new(Mutex::new(self))
    }

    /// Merge every cached page into one newest-first window.
    ///
    /// Pages are concatenated in cursor order (first page, then older
    /// cursors), repeated posts keep their first position, and
    /// `hasMorePosts` holds only if every page says so.
    pub fn read_posts(&self, args: &PostsArgs) -> CacheResult<Resolution> {
        let fields: Vec<FieldInfo> = self
            .store
            .inspect_fields(ROOT_KEY)
            .into_iter()
            .filter(|f| f.field_name == POSTS_FIELD)
            .collect();

        if fields.is_empty() {
            debug!(limit = args.limit, cursor = ?args.cursor, "Feed cache miss");
            return Ok(Resolution::miss());
        }

        let requested = keys::field_key(POSTS_FIELD, &args.to_arguments());
        let partial = self.store.resolve(ROOT_KEY, &requested).is_none();

        let mut pages = fields
            .into_iter()
            .map(|f| -> CacheResult<(Option<i64>, String)> {
                Ok((page_cursor(&f)?, f.field_key))
            })
            .collect::<CacheResult<Vec<_>>>()?;
        pages.sort_by(|(a, _), (b, _)| cursor_order(*a, *b));

        let mut seen = HashSet::new();
        let mut post_keys = Vec::new();
        let mut has_more_posts = true;

        for (_, field_key) in &pages {
            let Some((page_keys, has_more)) = self.load_page(field_key)? else {
                return Ok(Resolution::miss());
            };
            has_more_posts &= has_more;
            for key in page_keys {
                if seen.insert(key.clone()) {
                    post_keys.push(key);
                }
            }
        }

        let mut posts = Vec::with_capacity(post_keys.len());
        for key in &post_keys {
            match self.read_entity(key)? {
                Some(post) => posts.push(post),
                None => return Ok(Resolution::miss()),
            }
        }

        debug!(
            pages = pages.len(),
            posts = posts.len(),
            partial,
            "Feed cache read"
        );

        Ok(Resolution {
            data: Some(PaginatedPosts {
                posts,
                has_more_posts,
            }),
            partial,
        })
    }

    /// A single cached post, if every field the feed selects is present
    pub fn read_post(&self, post_id: i32) -> CacheResult<Option<FeedPost>> {
        self.read_entity(&keys::post_key(post_id))
    }

    /// Store one fetched page under its own `posts(...)` field
    pub fn write_page(&mut self, args: &PostsArgs, page: &PaginatedPosts) {
        let field = FieldInfo::new(POSTS_FIELD, args.to_arguments());
        let record_key = keys::embedded_key(ROOT_KEY, &field.field_key);

        let post_keys = page.posts.iter().map(|p| self.write_post(p)).collect();

        self.write_scalar(&record_key, "__typename", json!(PAGE_TYPENAME));
        self.write_scalar(&record_key, "hasMorePosts", json!(page.has_more_posts));
        self.store.write(
            &record_key,
            FieldInfo::plain(POSTS_FIELD),
            CacheValue::Links(post_keys),
        );
        self.store
            .write(ROOT_KEY, field, CacheValue::Link(record_key));
    }

    /// Overwrite scalar fields of one post entity, leaving every page as is
    pub fn write_post_fields(&mut self, post_id: i32, fields: Map<String, Value>) {
        let key = keys::post_key(post_id);
        for (name, value) in fields {
            self.write_scalar(&key, &name, value);
        }
    }

    /// Drop every cached feed page together with its page record.
    /// Returns how many pages were dropped.
    pub fn invalidate_feed(&mut self) -> usize {
        let pages: Vec<FieldInfo> = self
            .store
            .inspect_fields(ROOT_KEY)
            .into_iter()
            .filter(|f| f.field_name == POSTS_FIELD)
            .collect();

        let mut dropped = 0;
        for page in pages {
            if let Some(CacheValue::Link(record_key)) =
                self.store.resolve(ROOT_KEY, &page.field_key).cloned()
            {
                for field in self.store.inspect_fields(&record_key) {
                    self.store.invalidate(&record_key, &field.field_key);
                }
            }
            if self.store.invalidate(ROOT_KEY, &page.field_key) {
                dropped += 1;
            }
        }

        debug!(dropped, "Feed cache invalidated");
        dropped
    }

    fn write_post(&mut self, post: &FeedPost) -> String {
        let creator_key = keys::user_key(post.creator.id);
        self.write_scalar(&creator_key, "__typename", json!("User"));
        self.write_scalar(&creator_key, "id", json!(post.creator.id));
        self.write_scalar(&creator_key, "username", json!(post.creator.username));

        let key = keys::post_key(post.id);
        self.write_scalar(&key, "__typename", json!("Post"));
        self.write_scalar(&key, "id", json!(post.id));
        self.write_scalar(&key, "createdAt", json!(post.created_at));
        self.write_scalar(&key, "updatedAt", json!(post.updated_at));
        self.write_scalar(&key, "title", json!(post.title));
        self.write_scalar(&key, "points", json!(post.points));
        self.write_scalar(&key, "textSnippet", json!(post.text_snippet));
        self.store
            .write(&key, FieldInfo::plain("creator"), CacheValue::Link(creator_key));
        key
    }

    fn write_scalar(&mut self, entity_key: &str, field_name: &str, value: Value) {
        self.store.write(
            entity_key,
            FieldInfo::plain(field_name),
            CacheValue::Scalar(value),
        );
    }

    /// Post keys and `hasMorePosts` of one cached page
    fn load_page(&self, field_key: &str) -> CacheResult<Option<(Vec<String>, bool)>> {
        let record_key = match self.store.resolve(ROOT_KEY, field_key) {
            Some(CacheValue::Link(key)) => key.clone(),
            Some(other) => {
                return Err(CacheError::InvalidData(format!(
                    "{} is not a link: {:?}",
                    field_key, other
                )))
            }
            None => return Ok(None),
        };

        let post_keys = match self.store.resolve(&record_key, POSTS_FIELD) {
            Some(CacheValue::Links(keys)) => keys.clone(),
            Some(other) => {
                return Err(CacheError::InvalidData(format!(
                    "{}.posts is not a list of links: {:?}",
                    record_key, other
                )))
            }
            None => return Ok(None),
        };

        let has_more = match self.store.resolve(&record_key, "hasMorePosts") {
            Some(CacheValue::Scalar(Value::Bool(flag))) => *flag,
            Some(other) => {
                return Err(CacheError::InvalidData(format!(
                    "{}.hasMorePosts is not a boolean: {:?}",
                    record_key, other
                )))
            }
            None => return Ok(None),
        };

        Ok(Some((post_keys, has_more)))
    }

    fn read_entity(&self, post_key: &str) -> CacheResult<Option<FeedPost>> {
        const POST_FIELDS: [&str; 6] = [
            "id",
            "createdAt",
            "updatedAt",
            "title",
            "points",
            "textSnippet",
        ];

        let mut object = Map::new();
        for name in POST_FIELDS {
            match self.scalar(post_key, name) {
                Some(value) => object.insert(name.to_string(), value.clone()),
                None => return Ok(None),
            };
        }

        let creator_key = match self.store.resolve(post_key, "creator") {
            Some(CacheValue::Link(key)) => key,
            _ => return Ok(None),
        };
        let mut creator = Map::new();
        for name in ["id", "username"] {
            match self.scalar(creator_key, name) {
                Some(value) => creator.insert(name.to_string(), value.clone()),
                None => return Ok(None),
            };
        }
        object.insert("creator".into(), Value::Object(creator));

        Ok(Some(serde_json::from_value(Value::Object(object))?))
    }

    fn scalar(&self, entity_key: &str, field_name: &str) -> Option<&Value> {
        match self.store.resolve(entity_key, field_name) {
            Some(CacheValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }
}

/// Millisecond cursor of a cached page; `None` for the first page
fn page_cursor(field: &FieldInfo) -> CacheResult<Option<i64>> {
    match field.arguments.get("cursor") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| {
            CacheError::InvalidData(format!("unparseable cursor in {}", field.field_key))
        }),
        Some(other) => Err(CacheError::InvalidData(format!(
            "cursor is not a string: {}",
            other
        ))),
    }
}

/// First page first, then older cursors
fn cursor_order(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Creator;

    fn post(id: i32, created_at: i64) -> FeedPost {
        FeedPost {
            id,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            title: format!("post {}", id),
            points: 0,
            text_snippet: "body".into(),
            creator: Creator {
                id: 1,
                username: "ben".into(),
            },
        }
    }

    #[test]
    fn test_cursor_order() {
        let mut cursors = vec![Some(100), None, Some(300), Some(200)];
        cursors.sort_by(|a, b| cursor_order(*a, *b));
        assert_eq!(cursors, vec![None, Some(300), Some(200), Some(100)]);
    }

    #[test]
    fn test_page_cursor_rejects_garbage() {
        let field = FieldInfo::new(
            POSTS_FIELD,
            PostsArgs::after(10, "soon").to_arguments(),
        );
        assert!(matches!(
            page_cursor(&field),
            Err(CacheError::InvalidData(_))
        ));
    }

    #[test]
    fn test_page_stored_under_embedded_record() {
        let mut cache = FeedCache::new();
        let args = PostsArgs::first_page(10);
        cache.write_page(
            &args,
            &PaginatedPosts {
                posts: vec![post(10, 1000)],
                has_more_posts: false,
            },
        );

        let record = r#"Query.posts({"cursor":null,"limit":10})"#;
        assert_eq!(
            cache
                .store()
                .resolve(ROOT_KEY, r#"posts({"cursor":null,"limit":10})"#),
            Some(&CacheValue::Link(record.to_string()))
        );
        assert_eq!(
            cache.store().resolve(record, "__typename"),
            Some(&CacheValue::Scalar(json!("PaginatedPosts")))
        );
        assert_eq!(
            cache.store().resolve(record, "posts"),
            Some(&CacheValue::Links(vec!["Post:10".into()]))
        );
    }

    #[test]
    fn test_invalidation_drops_page_records() {
        let mut cache = FeedCache::new();
        cache.write_page(
            &PostsArgs::first_page(10),
            &PaginatedPosts {
                posts: vec![post(10, 1000)],
                has_more_posts: true,
            },
        );
        cache.write_page(
            &PostsArgs::after(10, "1000"),
            &PaginatedPosts {
                posts: vec![post(9, 900)],
                has_more_posts: false,
            },
        );
        // Query, two page records, Post:10, Post:9, User:1
        assert_eq!(cache.store().entity_count(), 6);

        assert_eq!(cache.invalidate_feed(), 2);

        let record = r#"Query.posts({"cursor":null,"limit":10})"#;
        assert!(cache.store().inspect_fields(record).is_empty());
        assert!(cache.store().inspect_fields(ROOT_KEY).is_empty());
        // Only the normalized entities survive
        assert_eq!(cache.store().entity_count(), 3);
        assert!(cache.read_post(10).unwrap().is_some());
    }

    #[test]
    fn test_read_post_needs_every_field() {
        let mut cache = FeedCache::new();
        let mut fields = Map::new();
        fields.insert("points".into(), json!(4));
        cache.write_post_fields(5, fields);

        assert_eq!(cache.read_post(5).unwrap(), None);
    }
}
