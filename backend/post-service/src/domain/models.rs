use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Post entity - a link/text submission with a denormalized vote score
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i32,
    pub creator_id: i32,
    pub title: String,
    pub text: String,
    /// Sum of every vote value recorded for this post
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User entity (read-only here; written by the authentication flow)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post joined with its creator, as returned by the feed query
#[derive(Debug, Clone)]
pub struct PostWithCreator {
    pub post: Post,
    pub creator: User,
}

/// A page of the feed plus whether older posts remain
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostWithCreator>,
    pub has_more_posts: bool,
}

/// Direction of a ledger entry. Only +1 and -1 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }

    pub fn as_i32(self) -> i32 {
        self.as_i16() as i32
    }
}

impl TryFrom<i32> for VoteValue {
    type Error = ServiceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(ServiceError::InvalidInput(format!(
                "vote value must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = ServiceError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        VoteValue::try_from(value as i32)
    }
}

/// Vote ledger entry - one per (user, post)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: i32,
    pub post_id: i32,
    pub value: VoteValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_value_accepts_only_unit_values() {
        assert_eq!(VoteValue::try_from(1i32).unwrap(), VoteValue::Up);
        assert_eq!(VoteValue::try_from(-1i32).unwrap(), VoteValue::Down);
        assert!(VoteValue::try_from(0i32).is_err());
        assert!(VoteValue::try_from(-5i32).is_err());
        assert!(VoteValue::try_from(2i32).is_err());
    }
}
