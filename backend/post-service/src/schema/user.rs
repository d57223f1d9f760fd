//! User schema

use async_graphql::{
    ComplexObject, Context, ErrorExtensions, Object, Result as GraphQLResult, SimpleObject,
};

use super::auth::current_user;
use crate::domain::User;
use crate::repository::UserRepository;
use crate::services::posts::format_timestamp;

#[derive(SimpleObject, Clone, Debug)]
#[graphql(name = "User", complex)]
pub struct UserNode {
    pub id: i32,
    pub username: String,
    #[graphql(skip)]
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

#[ComplexObject]
impl UserNode {
    /// Only visible to the user it belongs to
    async fn email(&self, ctx: &Context<'_>) -> String {
        if current_user(ctx) == Some(self.id) {
            self.email.clone()
        } else {
            String::new()
        }
    }
}

impl From<User> for UserNode {
    fn from(user: User) -> Self {
        UserNode {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: format_timestamp(&user.created_at),
            updated_at: format_timestamp(&user.updated_at),
        }
    }
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The logged-in user, or null
    async fn me(&self, ctx: &Context<'_>) -> GraphQLResult<Option<UserNode>> {
        let Some(user_id) = current_user(ctx) else {
            return Ok(None);
        };
        let users = ctx.data::<UserRepository>()?;
        let user = users
            .find_by_id(user_id)
            .await
            .map_err(|e| e.extend())?;
        Ok(user.map(UserNode::from))
    }
}
