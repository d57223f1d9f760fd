use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{LedgerStore, LedgerTx};
use crate::domain::{Vote, VoteValue};
use crate::error::{ServiceError, ServiceResult};

/// Vote ledger backed by the `votes` and `posts` tables
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current ledger entry for a (user, post) pair, outside any transaction
    pub async fn get_vote(&self, user_id: i32, post_id: i32) -> ServiceResult<Option<VoteValue>> {
        let value: Option<i16> =
            sqlx::query_scalar("SELECT value FROM votes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?;

        value.map(VoteValue::try_from).transpose()
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> ServiceResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx: Some(tx) }))
    }
}

/// Open transaction; dropping it without `commit` rolls everything back
pub struct PgLedgerTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLedgerTx {
    fn conn(&mut self) -> ServiceResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| ServiceError::Internal("ledger transaction already finished".into()))
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_post(&mut self, post_id: i32) -> ServiceResult<bool> {
        let tx = self.conn()?;
        let found: Option<i32> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(found.is_some())
    }

    async fn find_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<Option<VoteValue>> {
        let tx = self.conn()?;
        let value: Option<i16> =
            sqlx::query_scalar("SELECT value FROM votes WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .fetch_optional(&mut **tx)
                .await?;

        value.map(VoteValue::try_from).transpose()
    }

    async fn insert_vote(&mut self, vote: Vote) -> ServiceResult<()> {
        let tx = self.conn()?;
        let result = sqlx::query("INSERT INTO votes (user_id, post_id, value) VALUES ($1, $2, $3)")
            .bind(vote.user_id)
            .bind(vote.post_id)
            .bind(vote.value.as_i16())
            .execute(&mut **tx)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ServiceError::Conflict(format!(
                    "vote by user {} on post {} already exists",
                    vote.user_id, vote.post_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_vote(&mut self, vote: Vote) -> ServiceResult<u64> {
        let tx = self.conn()?;
        let result = sqlx::query("UPDATE votes SET value = $3 WHERE user_id = $1 AND post_id = $2")
            .bind(vote.user_id)
            .bind(vote.post_id)
            .bind(vote.value.as_i16())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_vote(&mut self, user_id: i32, post_id: i32) -> ServiceResult<u64> {
        let tx = self.conn()?;
        let result = sqlx::query("DELETE FROM votes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn increment_points(&mut self, post_id: i32, delta: i32) -> ServiceResult<Option<i32>> {
        let tx = self.conn()?;
        let points: Option<i32> = sqlx::query_scalar(
            "UPDATE posts SET points = points + $2 WHERE id = $1 RETURNING points",
        )
        .bind(post_id)
        .bind(delta)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(points)
    }

    async fn commit(&mut self) -> ServiceResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(ServiceError::Internal(
                "ledger transaction already finished".into(),
            )),
        }
    }

    async fn rollback(&mut self) -> ServiceResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
