pub mod posts;
pub mod votes;

pub use posts::{FeedPageArgs, NewPost, PostService};
pub use votes::{VoteOutcome, VoteService, VoteTransition};
