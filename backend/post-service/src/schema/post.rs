//! Post, feed and vote schema

use async_graphql::{
    ComplexObject, Context, ErrorExtensions, InputObject, Object, Result as GraphQLResult,
    SimpleObject,
};

use super::auth::require_auth;
use super::user::UserNode;
use crate::domain::{Post, PostWithCreator};
use crate::error::ServiceError;
use crate::repository::UserRepository;
use crate::services::posts::{format_timestamp, text_snippet};
use crate::services::{FeedPageArgs, NewPost, PostService, VoteOutcome, VoteService};

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "Post", complex)]
pub struct PostNode {
    pub id: i32,
    pub creator_id: i32,
    pub title: String,
    pub text: String,
    pub points: i32,
    pub created_at: String,
    pub updated_at: String,
    #[graphql(skip)]
    pub preloaded_creator: Option<UserNode>,
}

#[ComplexObject]
impl PostNode {
    /// First 255 characters of the text
    async fn text_snippet(&self) -> String {
        text_snippet(&self.text)
    }

    async fn creator(&self, ctx: &Context<'_>) -> GraphQLResult<UserNode> {
        if let Some(creator) = &self.preloaded_creator {
            return Ok(creator.clone());
        }
        let users = ctx.data::<UserRepository>()?;
        users
            .find_by_id(self.creator_id)
            .await
            .map_err(|e| e.extend())?
            .map(UserNode::from)
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", self.creator_id)).extend())
    }
}

impl From<Post> for PostNode {
    fn from(post: Post) -> Self {
        PostNode {
            id: post.id,
            creator_id: post.creator_id,
            title: post.title,
            text: post.text,
            points: post.points,
            created_at: format_timestamp(&post.created_at),
            updated_at: format_timestamp(&post.updated_at),
            preloaded_creator: None,
        }
    }
}

impl From<PostWithCreator> for PostNode {
    fn from(row: PostWithCreator) -> Self {
        PostNode {
            preloaded_creator: Some(row.creator.into()),
            ..row.post.into()
        }
    }
}

#[derive(SimpleObject, Clone, Debug)]
pub struct PaginatedPosts {
    pub posts: Vec<PostNode>,
    pub has_more_posts: bool,
}

#[derive(InputObject, Clone, Debug)]
pub struct PostInput {
    pub title: String,
    pub text: String,
}

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    /// Newest-first posts, at most 50 per page, older than `cursor` when given
    async fn posts(
        &self,
        ctx: &Context<'_>,
        limit: i32,
        cursor: Option<String>,
    ) -> GraphQLResult<PaginatedPosts> {
        let args = FeedPageArgs::parse(limit, cursor.as_deref()).map_err(|e| e.extend())?;
        let service = ctx.data::<PostService>()?;
        let page = service.feed(&args).await.map_err(|e| e.extend())?;

        Ok(PaginatedPosts {
            posts: page.posts.into_iter().map(PostNode::from).collect(),
            has_more_posts: page.has_more_posts,
        })
    }

    /// A single post, or null
    async fn post(&self, ctx: &Context<'_>, id: i32) -> GraphQLResult<Option<PostNode>> {
        let service = ctx.data::<PostService>()?;
        let post = service.get(id).await.map_err(|e| e.extend())?;
        Ok(post.map(PostNode::from))
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    /// Upvote (1) or downvote (-1) a post; repeating a vote cancels it
    async fn vote(&self, ctx: &Context<'_>, post_id: i32, value: i32) -> GraphQLResult<bool> {
        let user_id = require_auth(ctx).map_err(|e| e.extend())?;
        let votes = ctx.data::<VoteService>()?;

        match votes
            .apply_vote(post_id, user_id, value)
            .await
            .map_err(|e| e.extend())?
        {
            VoteOutcome::Applied { .. } | VoteOutcome::Duplicate => Ok(true),
        }
    }

    async fn create_post(&self, ctx: &Context<'_>, input: PostInput) -> GraphQLResult<PostNode> {
        let user_id = require_auth(ctx).map_err(|e| e.extend())?;
        let service = ctx.data::<PostService>()?;

        let post = service
            .create(
                user_id,
                NewPost {
                    title: input.title,
                    text: input.text,
                },
            )
            .await
            .map_err(|e| e.extend())?;

        Ok(post.into())
    }

    /// Retitle one of the caller's posts; null when the post does not exist
    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: i32,
        title: String,
    ) -> GraphQLResult<Option<PostNode>> {
        let user_id = require_auth(ctx).map_err(|e| e.extend())?;
        let service = ctx.data::<PostService>()?;

        let post = service
            .update_title(user_id, id, title)
            .await
            .map_err(|e| e.extend())?;

        Ok(post.map(PostNode::from))
    }

    /// Delete one of the caller's posts together with its votes
    async fn delete_post(&self, ctx: &Context<'_>, id: i32) -> GraphQLResult<bool> {
        let user_id = require_auth(ctx).map_err(|e| e.extend())?;
        let service = ctx.data::<PostService>()?;

        service.delete(user_id, id).await.map_err(|e| e.extend())
    }
}
