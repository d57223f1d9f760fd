pub mod memory;
pub mod posts;
pub mod users;
pub mod votes;

pub use memory::MemoryLedgerStore;
pub use posts::PostRepository;
pub use users::UserRepository;
pub use votes::PgLedgerStore;

use async_trait::async_trait;

use crate::domain::{Vote, VoteValue};
use crate::error::ServiceResult;

/// Source of vote-ledger transactions.
///
/// Everything done through one [`LedgerTx`] becomes visible together on
/// `commit`, or not at all when the transaction is dropped or rolled back.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> ServiceResult<Box<dyn LedgerTx>>;
}

/// One unit of work over the vote ledger and the post scores.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the post for the rest of the transaction.
    /// Returns `false` when the post does not exist.
    async fn lock_post(&mut self, post_id: i32) -> ServiceResult<bool>;

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<Option<VoteValue>>;

    /// Insert a new ledger entry.
    /// Fails with `ServiceError::Conflict` when one already exists for the pair.
    async fn insert_vote(&mut self, vote: Vote) -> ServiceResult<()>;

    /// Overwrite the value of an existing entry. Returns rows affected.
    async fn update_vote(&mut self, vote: Vote) -> ServiceResult<u64>;

    /// Returns rows affected.
    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<u64>;

    /// Add `delta` to the post's points and return the new total,
    /// or `None` when the post row is gone.
    async fn increment_points(&mut self, post_id: i32, delta: i32) -> ServiceResult<Option<i32>>;

    async fn commit(&mut self) -> ServiceResult<()>;

    async fn rollback(&mut self) -> ServiceResult<()>;
}
