//! Session lookup
//!
//! Sessions are issued by the login flow and stored in Redis as JSON under
//! `sess:<id>`; the browser carries the id in the `qid` cookie, optionally in
//! the signed `s:<id>.<signature>` form. This module only reads them.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Deserialize;
use tracing::debug;

use crate::error::ServiceResult;

pub const SESSION_COOKIE: &str = "qid";
const SESSION_KEY_PREFIX: &str = "sess:";

/// Authenticated caller, placed into GraphQL request data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i32);

#[derive(Debug, Deserialize)]
struct SessionData {
    #[serde(rename = "userId")]
    user_id: Option<i32>,
}

#[derive(Clone)]
pub struct SessionStore {
    redis: ConnectionManager,
}

impl SessionStore {
    pub async fn connect(url: &str) -> ServiceResult<Self> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }

    /// Resolve the user behind a raw `qid` cookie value
    pub async fn user_for_cookie(&self, cookie_value: &str) -> ServiceResult<Option<CurrentUser>> {
        let Some(session_id) = session_id_from_cookie(cookie_value) else {
            return Ok(None);
        };

        let key = format!("{}{}", SESSION_KEY_PREFIX, session_id);
        let raw: Option<String> = self.redis.clone().get(&key).await?;

        let user = raw.as_deref().and_then(parse_session_user).map(CurrentUser);
        debug!(session_found = raw.is_some(), authenticated = user.is_some(), "Session resolved");
        Ok(user)
    }
}

/// Extract the session id from a cookie value, unwrapping the signed form
pub fn session_id_from_cookie(cookie_value: &str) -> Option<String> {
    let value = cookie_value.trim();
    let signed = value
        .strip_prefix("s%3A")
        .or_else(|| value.strip_prefix("s:"));

    let id = match signed {
        Some(rest) => rest.rsplit_once('.').map_or(rest, |(id, _sig)| id),
        None => value,
    };

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// `userId` from a stored session document, if the session is logged in
pub fn parse_session_user(raw: &str) -> Option<i32> {
    serde_json::from_str::<SessionData>(raw)
        .ok()
        .and_then(|session| session.user_id)
}
