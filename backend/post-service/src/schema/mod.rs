//! GraphQL schema: feed, posts, votes and the current user

pub mod auth;
pub mod post;
pub mod user;

use async_graphql::{EmptySubscription, MergedObject, Schema};

use crate::config::GraphqlConfig;
use crate::repository::UserRepository;
use crate::services::{PostService, VoteService};

/// Root query object
#[derive(MergedObject, Default)]
pub struct QueryRoot(post::PostQuery, user::UserQuery);

/// Root mutation object
#[derive(MergedObject, Default)]
pub struct MutationRoot(post::PostMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema with the services resolvers pull from context
pub fn build_schema(
    posts: PostService,
    users: UserRepository,
    votes: VoteService,
    config: &GraphqlConfig,
) -> AppSchema {
    let builder = Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(posts)
    .data(users)
    .data(votes)
    .limit_depth(config.max_depth)
    .limit_complexity(config.max_complexity);

    if config.introspection {
        builder.finish()
    } else {
        builder.disable_introspection().finish()
    }
}
