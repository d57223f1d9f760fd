//! In-process vote ledger.
//!
//! Holds the whole ledger behind one async mutex; a transaction owns the lock
//! from `begin` until it finishes and works on a staged copy, so partial work
//! is never observable.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTx};
use crate::domain::{Vote, VoteValue};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    points: HashMap<i32, i32>,
    votes: HashMap<(i32, i32), VoteValue>,
    failing_posts: HashSet<i32>,
    conflicting_posts: HashSet<i32>,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post with zero points
    pub async fn add_post(&self, post_id: i32) {
        self.state.lock().await.points.entry(post_id).or_insert(0);
    }

    pub async fn points(&self, post_id: i32) -> Option<i32> {
        self.state.lock().await.points.get(&post_id).copied()
    }

    pub async fn vote(&self, user_id: i32, post_id: i32) -> Option<VoteValue> {
        self.state
            .lock()
            .await
            .votes
            .get(&(user_id, post_id))
            .copied()
    }

    pub async fn vote_count(&self, post_id: i32) -> usize {
        self.state
            .lock()
            .await
            .votes
            .keys()
            .filter(|(_, p)| *p == post_id)
            .count()
    }

    /// Make every score update on `post_id` fail, to exercise rollback
    pub async fn fail_score_updates(&self, post_id: i32) {
        self.state.lock().await.failing_posts.insert(post_id);
    }

    /// Make every new vote on `post_id` hit a uniqueness conflict, as when a
    /// concurrent request inserted the same (user, post) first
    pub async fn conflict_on_insert(&self, post_id: i32) {
        self.state.lock().await.conflicting_posts.insert(post_id);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> ServiceResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTx {
            guard: Some(guard),
            staged,
        }))
    }
}

pub struct MemoryLedgerTx {
    guard: Option<OwnedMutexGuard<LedgerState>>,
    staged: LedgerState,
}

impl MemoryLedgerTx {
    fn ensure_open(&self) -> ServiceResult<()> {
        if self.guard.is_some() {
            Ok(())
        } else {
            Err(ServiceError::Internal(
                "ledger transaction already finished".into(),
            ))
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_post(&mut self, post_id: i32) -> ServiceResult<bool> {
        self.ensure_open()?;
        Ok(self.staged.points.contains_key(&post_id))
    }

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<Option<VoteValue>> {
        self.ensure_open()?;
        Ok(self.staged.votes.get(&(user_id, post_id)).copied())
    }

    async fn insert_vote(&mut self, vote: Vote) -> ServiceResult<()> {
        self.ensure_open()?;
        let key = (vote.user_id, vote.post_id);
        if self.staged.votes.contains_key(&key)
            || self.staged.conflicting_posts.contains(&vote.post_id)
        {
            return Err(ServiceError::Conflict(format!(
                "vote by user {} on post {} already exists",
                vote.user_id, vote.post_id
            )));
        }
        self.staged.votes.insert(key, vote.value);
        Ok(())
    }

    async fn update_vote(&mut self, vote: Vote) -> ServiceResult<u64> {
        self.ensure_open()?;
        match self.staged.votes.get_mut(&(vote.user_id, vote.post_id)) {
            Some(value) => {
                *value = vote.value;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<u64> {
        self.ensure_open()?;
        Ok(self.staged.votes.remove(&(user_id, post_id)).map_or(0, |_| 1))
    }

    async fn increment_points(&mut self, post_id: i32, delta: i32) -> ServiceResult<Option<i32>> {
        self.ensure_open()?;
        if self.staged.failing_posts.contains(&post_id) {
            return Err(ServiceError::Internal(format!(
                "score update failed for post {}",
                post_id
            )));
        }
        Ok(self.staged.points.get_mut(&post_id).map(|points| {
            *points += delta;
            *points
        }))
    }

    async fn commit(&mut self) -> ServiceResult<()> {
        match self.guard.take() {
            Some(mut guard) => {
                *guard = std::mem::take(&mut self.staged);
                Ok(())
            }
            None => Err(ServiceError::Internal(
                "ledger transaction already finished".into(),
            )),
        }
    }

    async fn rollback(&mut self) -> ServiceResult<()> {
        self.guard.take();
        Ok(())
    }
}
