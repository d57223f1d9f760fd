use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{Vote, VoteValue};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::repository::{LedgerStore, LedgerTx};

/// What a vote request does to the ledger, given the caller's prior vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior vote: insert one
    Cast(VoteValue),
    /// Same direction again: remove the prior vote
    Cancel(VoteValue),
    /// Opposite direction: overwrite the prior vote
    Flip { from: VoteValue, to: VoteValue },
}

impl VoteTransition {
    pub fn decide(prior: Option<VoteValue>, requested: VoteValue) -> Self {
        match prior {
            None => VoteTransition::Cast(requested),
            Some(prior) if prior == requested => VoteTransition::Cancel(prior),
            Some(prior) => VoteTransition::Flip {
                from: prior,
                to: requested,
            },
        }
    }

    /// Change to the post's points that keeps them equal to the ledger sum
    pub fn score_delta(&self) -> i32 {
        match self {
            VoteTransition::Cast(value) => value.as_i32(),
            VoteTransition::Cancel(value) => -value.as_i32(),
            VoteTransition::Flip { to, .. } => 2 * to.as_i32(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoteTransition::Cast(_) => "cast",
            VoteTransition::Cancel(_) => "cancel",
            VoteTransition::Flip { .. } => "flip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Applied {
        transition: VoteTransition,
        points: i32,
    },
    /// A concurrent request for the same (user, post) won the race;
    /// nothing was written
    Duplicate,
}

/// Vote ledger and score updater
#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn LedgerStore>,
}

impl VoteService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Apply `value` (exactly 1 or -1) from `user_id` to `post_id`.
    ///
    /// The ledger write and the score update commit together or not at all.
    pub async fn apply_vote(
        &self,
        post_id: i32,
        user_id: i32,
        value: i32,
    ) -> ServiceResult<VoteOutcome> {
        let requested = VoteValue::try_from(value)?;

        let mut tx = self.store.begin().await?;
        if !tx.lock_post(post_id).await? {
            tx.rollback().await?;
            return Err(ServiceError::NotFound(format!("post {}", post_id)));
        }

        let prior = tx.find_vote(user_id, post_id).await?;
        let transition = VoteTransition::decide(prior, requested);

        match Self::write_ledger(&mut tx, user_id, post_id, transition).await {
            Ok(()) => {}
            Err(ServiceError::Conflict(reason)) => {
                debug!(post_id, user_id, %reason, "Concurrent vote detected, treating as no-op");
                tx.rollback().await?;
                metrics::record_vote("duplicate");
                return Ok(VoteOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        let points = match tx.increment_points(post_id, transition.score_delta()).await? {
            Some(points) => points,
            None => {
                tx.rollback().await?;
                return Err(ServiceError::NotFound(format!("post {}", post_id)));
            }
        };

        tx.commit().await?;

        metrics::record_vote(transition.label());
        info!(
            post_id,
            user_id,
            transition = transition.label(),
            points,
            "Vote applied"
        );

        Ok(VoteOutcome::Applied { transition, points })
    }

    async fn write_ledger(
        tx: &mut Box<dyn LedgerTx>,
        user_id: i32,
        post_id: i32,
        transition: VoteTransition,
    ) -> ServiceResult<()> {
        let affected = match transition {
            VoteTransition::Cast(value) => {
                tx.insert_vote(Vote {
                    user_id,
                    post_id,
                    value,
                })
                .await?;
                1
            }
            VoteTransition::Cancel(_) => tx.delete_vote(user_id, post_id).await?,
            VoteTransition::Flip { to, .. } => {
                tx.update_vote(Vote {
                    user_id,
                    post_id,
                    value: to,
                })
                .await?
            }
        };

        // The prior vote vanished between read and write
        if affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "vote by user {} on post {} changed concurrently",
                user_id, post_id
            )));
        }
        Ok(())
    }
}
