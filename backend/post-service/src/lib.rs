//! Post Service Library
//!
//! Posts, the vote ledger and the paginated feed behind a GraphQL endpoint.

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod repository;
pub mod schema;
pub mod services;
pub mod session;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
