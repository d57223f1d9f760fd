pub mod models;

pub use models::{Post, PostPage, PostWithCreator, User, Vote, VoteValue};
