//! Cursor pagination merge and invalidation

use feed_cache::{Creator, FeedCache, FeedPost, PaginatedPosts, PostsArgs};
use serde_json::{json, Map};

fn post(id: i32) -> FeedPost {
    // Newer posts have larger ids and later timestamps
    let created_at = (1_630_000_000_000i64 + id as i64 * 1000).to_string();
    FeedPost {
        id,
        created_at: created_at.clone(),
        updated_at: created_at,
        title: format!("post {}", id),
        points: 0,
        text_snippet: format!("text of post {}", id),
        creator: Creator {
            id: 1,
            username: "ben".into(),
        },
    }
}

fn page(ids: &[i32], has_more_posts: bool) -> PaginatedPosts {
    PaginatedPosts {
        posts: ids.iter().copied().map(post).collect(),
        has_more_posts,
    }
}

fn ids(page: &PaginatedPosts) -> Vec<i32> {
    page.posts.iter().map(|p| p.id).collect()
}

#[test]
fn test_empty_cache_is_a_miss() {
    let cache = FeedCache::new();

    let res = cache.read_posts(&PostsArgs::first_page(3)).unwrap();

    assert!(res.data.is_none());
    assert!(res.partial);
}

#[test]
fn test_load_more_appends_older_page() {
    let mut cache = FeedCache::new();
    let first = page(&[10, 9, 8], true);
    let first_args = PostsArgs::first_page(3);
    cache.write_page(&first_args, &first);

    let cursor = first.next_cursor().unwrap().to_string();
    assert_eq!(cursor, post(8).created_at);
    let second_args = PostsArgs::after(3, cursor);
    cache.write_page(&second_args, &page(&[7, 6], false));

    let res = cache.read_posts(&second_args).unwrap();
    assert!(!res.partial);
    let merged = res.data.unwrap();
    assert_eq!(ids(&merged), vec![10, 9, 8, 7, 6]);
    assert!(!merged.has_more_posts);

    // Any cached signature sees the same merged window
    let res = cache.read_posts(&first_args).unwrap();
    assert!(res.is_complete());
    assert_eq!(ids(&res.data.unwrap()), vec![10, 9, 8, 7, 6]);
}

#[test]
fn test_merge_is_independent_of_write_order() {
    let first_args = PostsArgs::first_page(3);
    let second_args = PostsArgs::after(3, post(8).created_at);

    let mut cache = FeedCache::new();
    cache.write_page(&second_args, &page(&[7, 6], false));
    cache.write_page(&first_args, &page(&[10, 9, 8], true));

    let merged = cache.read_posts(&first_args).unwrap().data.unwrap();
    assert_eq!(ids(&merged), vec![10, 9, 8, 7, 6]);
    assert!(!merged.has_more_posts);
}

#[test]
fn test_has_more_requires_every_page() {
    let mut cache = FeedCache::new();
    cache.write_page(&PostsArgs::first_page(2), &page(&[10, 9], true));
    cache.write_page(&PostsArgs::after(2, post(9).created_at), &page(&[8, 7], true));

    let merged = cache
        .read_posts(&PostsArgs::first_page(2))
        .unwrap()
        .data
        .unwrap();
    assert!(merged.has_more_posts);
}

#[test]
fn test_overlapping_pages_are_deduplicated() {
    let mut cache = FeedCache::new();
    cache.write_page(&PostsArgs::first_page(3), &page(&[10, 9, 8], true));
    // A page fetched with a stale cursor repeats post 8
    cache.write_page(&PostsArgs::after(3, post(9).created_at), &page(&[8, 7, 6], false));

    let merged = cache
        .read_posts(&PostsArgs::first_page(3))
        .unwrap()
        .data
        .unwrap();
    assert_eq!(ids(&merged), vec![10, 9, 8, 7, 6]);
}

#[test]
fn test_unseen_signature_is_partial() {
    let mut cache = FeedCache::new();
    cache.write_page(&PostsArgs::first_page(3), &page(&[10, 9, 8], true));

    let res = cache
        .read_posts(&PostsArgs::after(3, post(8).created_at))
        .unwrap();

    assert!(res.partial);
    assert_eq!(ids(res.data.as_ref().unwrap()), vec![10, 9, 8]);
    assert!(!res.is_complete());
}

#[test]
fn test_invalidation_then_refetch_puts_new_post_first() {
    let mut cache = FeedCache::new();
    let first_args = PostsArgs::first_page(3);
    cache.write_page(&first_args, &page(&[10, 9, 8], true));
    cache.write_page(&PostsArgs::after(3, post(8).created_at), &page(&[7, 6], false));

    assert_eq!(cache.invalidate_feed(), 2);
    let res = cache.read_posts(&first_args).unwrap();
    assert!(res.data.is_none());
    assert!(res.partial);

    cache.write_page(&first_args, &page(&[11, 10, 9], true));
    let merged = cache.read_posts(&first_args).unwrap().data.unwrap();
    assert_eq!(ids(&merged), vec![11, 10, 9]);
    assert!(merged.has_more_posts);
}

#[test]
fn test_post_fields_update_every_page_in_place() {
    let mut cache = FeedCache::new();
    cache.write_page(&PostsArgs::first_page(3), &page(&[10, 9, 8], true));

    let mut fields = Map::new();
    fields.insert("points".into(), json!(5));
    cache.write_post_fields(9, fields);

    let merged = cache
        .read_posts(&PostsArgs::first_page(3))
        .unwrap()
        .data
        .unwrap();
    assert_eq!(ids(&merged), vec![10, 9, 8]);
    assert_eq!(merged.posts[1].points, 5);
    assert_eq!(cache.read_post(9).unwrap().unwrap().points, 5);
}
