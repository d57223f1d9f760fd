/// Error types for post-service
use async_graphql::ErrorExtensions;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unauthorized: authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// GraphQL `extensions.code` reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized => "UNAUTHENTICATED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::InvalidInput(_) => "BAD_USER_INPUT",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Database(_) | ServiceError::Redis(_) | ServiceError::Internal(_) => {
                "INTERNAL"
            }
        }
    }
}

/// GraphQL error with `extensions.code`; storage details stay in the logs.
///
/// Resolvers convert with `.map_err(|e| e.extend())` rather than `?`, which
/// would go through async-graphql's `Display` conversion and drop the code.
impl ErrorExtensions for ServiceError {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                "Internal server error".to_string()
            }
            ServiceError::Redis(e) => {
                tracing::error!(error = %e, "redis failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
