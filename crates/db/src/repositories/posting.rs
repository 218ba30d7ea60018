//! Postgres-backed posting store.
//!
//! Implements the core `LedgerStore`/`LedgerTx` seam over a `SeaORM`
//! transaction. Touched account rows are locked with `SELECT ... FOR
//! UPDATE`, the advisory posting lock serializes whole closes, and the
//! unique index on `posting_batches.batch_date` backs the idempotency guard
//! when two closes race past the advisory lock on different connections.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use postbook_core::posting::{
    AccountSnapshot, DeltaSet, LedgerEntry, LedgerStore, LedgerTx, PostingBatch, StoreError,
};
use postbook_shared::types::{LedgerEntryId, PostingBatchId, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{
    detail_accounts, general_accounts, ledger_entries, posting_batches, sea_orm_active_enums,
};

use super::convert;

/// Advisory lock key for period closes. One per database; closes are rare
/// and whole-ledger.
const POSTING_LOCK_KEY: i64 = 0x706F_7374;

/// Ledger store over a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PostingStore {
    db: DatabaseConnection,
}

impl PostingStore {
    /// Creates a new posting store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerStore for PostingStore {
    type Tx = PostingTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), None)
            .await
            .map_err(map_db_err)?;
        Ok(PostingTx { txn })
    }
}

/// One posting transaction over Postgres.
#[derive(Debug)]
pub struct PostingTx {
    txn: DatabaseTransaction,
}

#[async_trait]
impl LedgerTx for PostingTx {
    async fn lock_posting(&mut self) -> Result<(), StoreError> {
        // Transaction-scoped; released automatically on commit or rollback.
        self.txn
            .execute_unprepared(&format!("SELECT pg_advisory_xact_lock({POSTING_LOCK_KEY})"))
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn find_batch_by_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<Option<PostingBatch>, StoreError> {
        let model = posting_batches::Entity::find()
            .filter(posting_batches::Column::BatchDate.eq(date))
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        model
            .map(convert::batch_from_model)
            .transpose()
            .map_err(corrupt)
    }

    async fn load_entries(
        &mut self,
        ids: &[LedgerEntryId],
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let raw: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        let models = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::Id.is_in(raw))
            .filter(ledger_entries::Column::DeletedAt.is_null())
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(convert::entry_from_model).collect())
    }

    async fn load_pending_through(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let models = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::DeletedAt.is_null())
            .filter(
                ledger_entries::Column::PostingStatus
                    .eq(sea_orm_active_enums::PostingStatus::Pending),
            )
            .filter(ledger_entries::Column::LedgerDate.lte(cutoff))
            .order_by_asc(ledger_entries::Column::LedgerDate)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(convert::entry_from_model).collect())
    }

    async fn load_posted_on(&mut self, date: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError> {
        let models = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::DeletedAt.is_null())
            .filter(
                ledger_entries::Column::PostingStatus
                    .eq(sea_orm_active_enums::PostingStatus::Posted),
            )
            .filter(ledger_entries::Column::LedgerDate.eq(date))
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(models.into_iter().map(convert::entry_from_model).collect())
    }

    async fn load_accounts_for(
        &mut self,
        entries: &[LedgerEntry],
    ) -> Result<AccountSnapshot, StoreError> {
        let mut detail_ids: Vec<Uuid> = entries
            .iter()
            .map(|e| e.detail_account_id.into_inner())
            .collect();
        detail_ids.sort_unstable();
        detail_ids.dedup();

        // Row locks in sorted ID order; soft-deleted rows included so the
        // validator can reject them.
        let detail_models = detail_accounts::Entity::find()
            .filter(detail_accounts::Column::Id.is_in(detail_ids))
            .order_by_asc(detail_accounts::Column::Id)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;

        let mut parent_numbers: Vec<String> = detail_models
            .iter()
            .map(|d| d.general_account_number.clone())
            .collect();
        parent_numbers.sort_unstable();
        parent_numbers.dedup();

        let general_models = general_accounts::Entity::find()
            .filter(general_accounts::Column::AccountNumber.is_in(parent_numbers))
            .order_by_asc(general_accounts::Column::AccountNumber)
            .lock_exclusive()
            .all(&self.txn)
            .await
            .map_err(map_db_err)?;

        let details = detail_models
            .into_iter()
            .map(convert::detail_from_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(corrupt)?;
        let generals = general_models
            .into_iter()
            .map(convert::general_from_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(corrupt)?;

        Ok(AccountSnapshot::new(details, generals))
    }

    async fn apply_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError> {
        self.shift_balances(deltas, false).await
    }

    async fn reverse_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError> {
        self.shift_balances(deltas, true).await
    }

    async fn mark_posted(
        &mut self,
        ids: &[LedgerEntryId],
        posted_at: DateTime<Utc>,
        posted_by: UserId,
    ) -> Result<(), StoreError> {
        let raw: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        let result = ledger_entries::Entity::update_many()
            .col_expr(
                ledger_entries::Column::PostingStatus,
                sea_orm_active_enums::PostingStatus::Posted.as_enum(),
            )
            .col_expr(
                ledger_entries::Column::PostedAt,
                Expr::value(sea_orm::Value::from(posted_at)),
            )
            .col_expr(
                ledger_entries::Column::PostedBy,
                Expr::value(posted_by.into_inner()),
            )
            .col_expr(
                ledger_entries::Column::UpdatedAt,
                Expr::value(sea_orm::Value::from(Utc::now())),
            )
            .filter(ledger_entries::Column::Id.is_in(raw))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected != ids.len() as u64 {
            return Err(StoreError::Conflict(format!(
                "expected to post {} entries, matched {}",
                ids.len(),
                result.rows_affected
            )));
        }
        Ok(())
    }

    async fn mark_pending(&mut self, ids: &[LedgerEntryId]) -> Result<(), StoreError> {
        let raw: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        let result = ledger_entries::Entity::update_many()
            .col_expr(
                ledger_entries::Column::PostingStatus,
                sea_orm_active_enums::PostingStatus::Pending.as_enum(),
            )
            .col_expr(
                ledger_entries::Column::PostedAt,
                Expr::value(sea_orm::Value::ChronoDateTimeUtc(None)),
            )
            .col_expr(
                ledger_entries::Column::PostedBy,
                Expr::value(sea_orm::Value::Uuid(None)),
            )
            .col_expr(
                ledger_entries::Column::UpdatedAt,
                Expr::value(sea_orm::Value::from(Utc::now())),
            )
            .filter(ledger_entries::Column::Id.is_in(raw))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected != ids.len() as u64 {
            return Err(StoreError::Conflict(format!(
                "expected to unpost {} entries, matched {}",
                ids.len(),
                result.rows_affected
            )));
        }
        Ok(())
    }

    async fn insert_batch(&mut self, batch: &PostingBatch) -> Result<(), StoreError> {
        let entry_count = i64::try_from(batch.entry_count)
            .map_err(|_| StoreError::Backend(format!("entry count {} overflows", batch.entry_count)))?;

        posting_batches::ActiveModel {
            id: Set(batch.id.into_inner()),
            batch_date: Set(batch.batch_date),
            closed_at: Set(batch.closed_at.into()),
            closed_by: Set(batch.closed_by.into_inner()),
            entry_count: Set(entry_count),
            total_debit: Set(batch.total_debit.amount()),
            total_credit: Set(batch.total_credit.amount()),
        }
        .insert(&self.txn)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn delete_batch(&mut self, id: PostingBatchId) -> Result<(), StoreError> {
        let result = posting_batches::Entity::delete_by_id(id.into_inner())
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected == 0 {
            return Err(StoreError::Backend(format!("posting batch {id} missing")));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().await.map_err(map_db_err)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback().await.map_err(map_db_err)
    }
}

impl PostingTx {
    async fn shift_balances(&self, deltas: &DeltaSet, reverse: bool) -> Result<(), StoreError> {
        let now = Utc::now();

        for (id, delta) in &deltas.details {
            let debit_col = Expr::col(detail_accounts::Column::BalanceDebit);
            let credit_col = Expr::col(detail_accounts::Column::BalanceCredit);
            let (debit_expr, credit_expr) = if reverse {
                (
                    debit_col.sub(delta.debit.amount()),
                    credit_col.sub(delta.credit.amount()),
                )
            } else {
                (
                    debit_col.add(delta.debit.amount()),
                    credit_col.add(delta.credit.amount()),
                )
            };

            let result = detail_accounts::Entity::update_many()
                .col_expr(detail_accounts::Column::BalanceDebit, debit_expr)
                .col_expr(detail_accounts::Column::BalanceCredit, credit_expr)
                .col_expr(
                    detail_accounts::Column::UpdatedAt,
                    Expr::value(sea_orm::Value::from(now)),
                )
                .filter(detail_accounts::Column::Id.eq(id.into_inner()))
                .exec(&self.txn)
                .await
                .map_err(map_db_err)?;
            if result.rows_affected != 1 {
                return Err(StoreError::Backend(format!("detail account {id} missing")));
            }
        }

        for (id, delta) in &deltas.generals {
            let debit_col = Expr::col(general_accounts::Column::BalanceDebit);
            let credit_col = Expr::col(general_accounts::Column::BalanceCredit);
            let (debit_expr, credit_expr) = if reverse {
                (
                    debit_col.sub(delta.debit.amount()),
                    credit_col.sub(delta.credit.amount()),
                )
            } else {
                (
                    debit_col.add(delta.debit.amount()),
                    credit_col.add(delta.credit.amount()),
                )
            };

            let result = general_accounts::Entity::update_many()
                .col_expr(general_accounts::Column::BalanceDebit, debit_expr)
                .col_expr(general_accounts::Column::BalanceCredit, credit_expr)
                .col_expr(
                    general_accounts::Column::UpdatedAt,
                    Expr::value(sea_orm::Value::from(now)),
                )
                .filter(general_accounts::Column::Id.eq(id.into_inner()))
                .exec(&self.txn)
                .await
                .map_err(map_db_err)?;
            if result.rows_affected != 1 {
                return Err(StoreError::Backend(format!("general account {id} missing")));
            }
        }

        Ok(())
    }
}

fn corrupt(err: convert::ConvertError) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Classifies a `SeaORM` error for the retry policy.
fn map_db_err(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
        return StoreError::Conflict(message);
    }

    match &err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Transient(err.to_string()),
        _ => {
            let message = err.to_string();
            let lowered = message.to_lowercase();
            // Postgres 40001 (serialization failure) and 40P01 (deadlock).
            if lowered.contains("deadlock")
                || lowered.contains("could not serialize")
                || lowered.contains("40001")
                || lowered.contains("40p01")
            {
                StoreError::Transient(message)
            } else {
                StoreError::Backend(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_connection_errors_are_transient() {
        let err = DbErr::Conn(RuntimeErr::Internal("connection refused".to_string()));
        assert!(matches!(map_db_err(err), StoreError::Transient(_)));
    }

    #[test]
    fn test_deadlocks_are_transient() {
        let err = DbErr::Custom("deadlock detected".to_string());
        assert!(matches!(map_db_err(err), StoreError::Transient(_)));

        let err = DbErr::Custom("ERROR 40001: could not serialize access".to_string());
        assert!(matches!(map_db_err(err), StoreError::Transient(_)));
    }

    #[test]
    fn test_other_errors_are_permanent() {
        let err = DbErr::Custom("check constraint violated".to_string());
        assert!(matches!(map_db_err(err), StoreError::Backend(_)));
    }
}
