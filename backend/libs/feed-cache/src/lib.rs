//! Client-side feed cache
//!
//! A normalized cache for the posts feed:
//! - Entities stored once under `Typename:id` keys, pages hold links
//! - Cursor pages merged into one de-duplicated newest-first window
//! - Explicit writes for vote results, explicit invalidation on new posts
//! - Read-through [`FeedClient`] over a pluggable GraphQL transport

mod error;
mod metrics;

pub mod client;
pub mod keys;
pub mod reconciler;
pub mod store;
pub mod types;

pub use client::{FeedClient, FeedClientConfig, GraphqlTransport, HttpGraphqlTransport};
pub use error::{CacheError, CacheResult};
pub use metrics::FeedCacheMetrics;
pub use reconciler::{FeedCache, Resolution, SharedFeedCache};
pub use store::{CacheStore, CacheValue, FieldInfo, MemoryStore};
pub use types::{Creator, CreatedPost, FeedPost, PaginatedPosts, PostsArgs};
