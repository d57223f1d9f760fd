//! Authorization helpers for GraphQL resolvers

use async_graphql::Context;

use crate::error::{ServiceError, ServiceResult};
use crate::session::CurrentUser;

/// Verify the caller is authenticated and return their user id
pub fn require_auth(ctx: &Context<'_>) -> ServiceResult<i32> {
    current_user(ctx).ok_or(ServiceError::Unauthorized)
}

pub fn current_user(ctx: &Context<'_>) -> Option<i32> {
    ctx.data_opt::<CurrentUser>().map(|user| user.0)
}
