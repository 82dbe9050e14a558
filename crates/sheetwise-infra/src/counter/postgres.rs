//! PostgreSQL counter store via SeaORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QuerySelect, SqlErr, TransactionTrait,
};

use sheetwise_core::domain::WindowWrite;
use sheetwise_core::ports::{AtomicCounterStore, CounterStore, CounterSweep, StoreError};
use sheetwise_core::{Decision, RateKey, RateRecord, WindowPolicy};

use crate::database::entity::rate_record::{self, Entity as RateRecordEntity};

/// Attempts before a contended first insert is reported as a failure.
const MAX_ATTEMPTS: u32 = 3;

/// Counter store backed by the `rate_records` table.
pub struct PostgresCounterStore {
    db: DbConn,
}

impl PostgresCounterStore {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

fn unavailable(err: DbErr) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn by_key(key: &RateKey) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(rate_record::Column::ClientKey.eq(key.client.as_str()))
        .add(rate_record::Column::Endpoint.eq(key.endpoint.as_str()))
}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    async fn get(&self, key: &RateKey) -> Result<Option<RateRecord>, StoreError> {
        let model = RateRecordEntity::find_by_id(rate_record::primary_key(key))
            .one(&self.db)
            .await
            .map_err(unavailable)?;

        model.map(RateRecord::try_from).transpose()
    }

    async fn create(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let window_start = rate_record::column_instant(window_start);
        RateRecordEntity::insert(rate_record::active_model(key, count, window_start))
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict,
                _ => unavailable(e),
            })?;

        Ok(RateRecord::new(key, count, window_start))
    }

    async fn update(
        &self,
        key: &RateKey,
        count: u32,
        window_start: DateTime<Utc>,
    ) -> Result<RateRecord, StoreError> {
        let window_start = rate_record::column_instant(window_start);
        let result = RateRecordEntity::update_many()
            .col_expr(
                rate_record::Column::Count,
                Expr::value(rate_record::count_column(count)),
            )
            .col_expr(rate_record::Column::WindowStart, Expr::value(window_start))
            .filter(by_key(key))
            .exec(&self.db)
            .await
            .map_err(unavailable)?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(RateRecord::new(key, count, window_start))
    }
}

#[async_trait]
impl AtomicCounterStore for PostgresCounterStore {
    async fn apply_window(
        &self,
        key: &RateKey,
        policy: &WindowPolicy,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let now = rate_record::column_instant(now);
        for attempt in 1..=MAX_ATTEMPTS {
            let txn = self.db.begin().await.map_err(unavailable)?;

            // SELECT ... FOR UPDATE serialises concurrent steps on an existing row.
            let current = RateRecordEntity::find_by_id(rate_record::primary_key(key))
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(unavailable)?
                .map(RateRecord::try_from)
                .transpose()?;

            let evaluation = policy.evaluate(current.as_ref(), now);

            match evaluation.write {
                WindowWrite::None => {}
                WindowWrite::Create {
                    count,
                    window_start,
                } => {
                    // No row to lock yet; a concurrent first insert wins and we retry.
                    let inserted =
                        RateRecordEntity::insert(rate_record::active_model(key, count, window_start))
                            .on_conflict(
                                OnConflict::columns([
                                    rate_record::Column::ClientKey,
                                    rate_record::Column::Endpoint,
                                ])
                                .do_nothing()
                                .to_owned(),
                            )
                            .exec_without_returning(&txn)
                            .await
                            .map_err(unavailable)?;

                    if inserted == 0 {
                        txn.rollback().await.map_err(unavailable)?;
                        tracing::debug!(key = %key, attempt, "Lost first-insert race, retrying");
                        continue;
                    }
                }
                WindowWrite::Update {
                    count,
                    window_start,
                } => {
                    RateRecordEntity::update_many()
                        .col_expr(
                            rate_record::Column::Count,
                            Expr::value(rate_record::count_column(count)),
                        )
                        .col_expr(rate_record::Column::WindowStart, Expr::value(window_start))
                        .filter(by_key(key))
                        .exec(&txn)
                        .await
                        .map_err(unavailable)?;
                }
            }

            txn.commit().await.map_err(unavailable)?;
            return Ok(evaluation.decision);
        }

        Err(StoreError::Unavailable(format!(
            "insert of {} kept conflicting after {} attempts",
            key, MAX_ATTEMPTS
        )))
    }
}

#[async_trait]
impl CounterSweep for PostgresCounterStore {
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = RateRecordEntity::delete_many()
            .filter(rate_record::Column::WindowStart.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected)
    }
}
