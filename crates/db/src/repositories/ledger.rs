//! Ledger entry repository.
//!
//! Writes are restricted to pending entries; a posted entry can only change
//! through the posting store's unpost path.

use chrono::NaiveDate;
use postbook_core::posting::{LedgerEntry, PostingStatus, TransactionType};
use postbook_shared::types::{DetailAccountId, LedgerEntryId, Money, MoneyError};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{
    detail_accounts, ledger_entries,
    sea_orm_active_enums::{self, LedgerType},
};

use super::convert;

/// Error types for ledger entry operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Entry not found.
    #[error("ledger entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Detail account does not exist or is deleted.
    #[error("detail account not found: {0}")]
    AccountNotFound(Uuid),

    /// Amount is not a positive two-decimal value.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// Amount must be positive.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// Posted entries are immutable.
    #[error("ledger entry {0} is posted and cannot be modified")]
    CannotModifyPosted(Uuid),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a ledger entry.
#[derive(Debug, Clone)]
pub struct CreateEntryInput {
    /// Human-readable batch/transaction tag.
    pub reference_number: Option<String>,
    /// Entry amount; admitted through `Money` before storage.
    pub amount: rust_decimal::Decimal,
    /// Description of the line item.
    pub description: String,
    /// Entry polarity.
    pub transaction_type: TransactionType,
    /// Business classification.
    pub ledger_type: LedgerType,
    /// Accounting date.
    pub ledger_date: NaiveDate,
    /// The detail account to post to.
    pub detail_account_id: DetailAccountId,
}

/// Filters for listing ledger entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Restrict to one detail account.
    pub detail_account_id: Option<DetailAccountId>,
    /// Restrict to one posting status.
    pub posting_status: Option<PostingStatus>,
    /// Earliest ledger date, inclusive.
    pub from_date: Option<NaiveDate>,
    /// Latest ledger date, inclusive.
    pub to_date: Option<NaiveDate>,
}

/// Ledger entry repository.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a pending entry. New rows always store the canonical
    /// polarity spelling.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive money, the account is
    /// missing or deleted, or the database operation fails.
    #[tracing::instrument(skip(self, input), fields(detail_account_id = %input.detail_account_id))]
    pub async fn create_entry(&self, input: CreateEntryInput) -> Result<LedgerEntry, LedgerError> {
        let amount = Money::new(input.amount)?;
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount);
        }

        let txn = self.db.begin().await?;

        // Shared lock on the account row; soft_delete_detail takes it
        // exclusively, so a live account stays live until this commits.
        let account_exists = detail_accounts::Entity::find_by_id(input.detail_account_id.into_inner())
            .filter(detail_accounts::Column::DeletedAt.is_null())
            .lock_shared()
            .one(&txn)
            .await?
            .is_some();
        if !account_exists {
            txn.rollback().await?;
            return Err(LedgerError::AccountNotFound(
                input.detail_account_id.into_inner(),
            ));
        }

        let now = chrono::Utc::now();
        let model = ledger_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            reference_number: Set(input.reference_number),
            amount: Set(amount.amount()),
            description: Set(input.description),
            transaction_type: Set(input.transaction_type.as_str().to_string()),
            ledger_type: Set(input.ledger_type),
            ledger_date: Set(input.ledger_date),
            posting_status: Set(sea_orm_active_enums::PostingStatus::Pending),
            detail_account_id: Set(input.detail_account_id.into_inner()),
            posted_at: Set(None),
            posted_by: Set(None),
            deleted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        Ok(convert::entry_from_model(model))
    }

    /// Finds a live entry by ID.
    pub async fn find_by_id(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, LedgerError> {
        let model = ledger_entries::Entity::find_by_id(id.into_inner())
            .filter(ledger_entries::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model.map(convert::entry_from_model))
    }

    /// Lists live entries matching the filter, oldest ledger date first.
    pub async fn list(&self, filter: EntryFilter) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut query = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::DeletedAt.is_null());

        if let Some(account) = filter.detail_account_id {
            query = query.filter(ledger_entries::Column::DetailAccountId.eq(account.into_inner()));
        }
        if let Some(status) = filter.posting_status {
            let status: sea_orm_active_enums::PostingStatus = status.into();
            query = query.filter(ledger_entries::Column::PostingStatus.eq(status));
        }
        if let Some(from) = filter.from_date {
            query = query.filter(ledger_entries::Column::LedgerDate.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(ledger_entries::Column::LedgerDate.lte(to));
        }

        let models = query
            .order_by_asc(ledger_entries::Column::LedgerDate)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(convert::entry_from_model).collect())
    }

    /// Updates a pending entry's description and reference.
    ///
    /// The write carries the pending predicate in its WHERE clause, so a
    /// concurrent close that posts the entry first makes this a no-op
    /// instead of a write to an immutable row.
    ///
    /// # Errors
    ///
    /// Returns `CannotModifyPosted` if the entry has been posted.
    #[tracing::instrument(skip(self, description, reference_number))]
    pub async fn update_entry(
        &self,
        id: LedgerEntryId,
        description: String,
        reference_number: Option<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        let now = chrono::Utc::now();
        let result = ledger_entries::Entity::update_many()
            .col_expr(ledger_entries::Column::Description, Expr::value(description))
            .col_expr(
                ledger_entries::Column::ReferenceNumber,
                Expr::value(reference_number),
            )
            .col_expr(
                ledger_entries::Column::UpdatedAt,
                Expr::value(sea_orm::Value::from(now)),
            )
            .filter(pending_row(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let model = ledger_entries::Entity::find_by_id(id.into_inner())
                .one(&self.db)
                .await?;
            return Err(mutation_rejection(model.as_ref(), id.into_inner()));
        }

        let model = ledger_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(id.into_inner()))?;
        Ok(convert::entry_from_model(model))
    }

    /// Soft-deletes a pending entry.
    ///
    /// # Errors
    ///
    /// Returns `CannotModifyPosted` if the entry has been posted.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete_entry(&self, id: LedgerEntryId) -> Result<(), LedgerError> {
        let now = chrono::Utc::now();
        let result = ledger_entries::Entity::update_many()
            .col_expr(
                ledger_entries::Column::DeletedAt,
                Expr::value(sea_orm::Value::from(now)),
            )
            .col_expr(
                ledger_entries::Column::UpdatedAt,
                Expr::value(sea_orm::Value::from(now)),
            )
            .filter(pending_row(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let model = ledger_entries::Entity::find_by_id(id.into_inner())
                .one(&self.db)
                .await?;
            return Err(mutation_rejection(model.as_ref(), id.into_inner()));
        }
        Ok(())
    }
}

/// Predicate a mutable entry row must satisfy: live and still pending.
fn pending_row(id: LedgerEntryId) -> Condition {
    Condition::all()
        .add(ledger_entries::Column::Id.eq(id.into_inner()))
        .add(ledger_entries::Column::DeletedAt.is_null())
        .add(
            ledger_entries::Column::PostingStatus
                .eq(sea_orm_active_enums::PostingStatus::Pending),
        )
}

/// Classifies a zero-row conditional mutation from the row's current state.
fn mutation_rejection(model: Option<&ledger_entries::Model>, id: Uuid) -> LedgerError {
    match model {
        Some(m)
            if m.deleted_at.is_none()
                && m.posting_status == sea_orm_active_enums::PostingStatus::Posted =>
        {
            LedgerError::CannotModifyPosted(id)
        }
        _ => LedgerError::EntryNotFound(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry_model(
        status: sea_orm_active_enums::PostingStatus,
        deleted: bool,
    ) -> ledger_entries::Model {
        let now = chrono::Utc::now();
        ledger_entries::Model {
            id: Uuid::now_v7(),
            reference_number: None,
            amount: dec!(100.00),
            description: "office rent".to_string(),
            transaction_type: "DEBIT".to_string(),
            ledger_type: LedgerType::CashOut,
            ledger_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            posting_status: status,
            detail_account_id: Uuid::now_v7(),
            posted_at: None,
            posted_by: None,
            deleted_at: deleted.then(|| now.into()),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_missing_row_rejects_as_not_found() {
        let id = Uuid::now_v7();
        assert!(matches!(
            mutation_rejection(None, id),
            LedgerError::EntryNotFound(got) if got == id
        ));
    }

    #[test]
    fn test_posted_row_rejects_as_immutable() {
        let model = entry_model(sea_orm_active_enums::PostingStatus::Posted, false);
        let id = model.id;
        assert!(matches!(
            mutation_rejection(Some(&model), id),
            LedgerError::CannotModifyPosted(got) if got == id
        ));
    }

    #[test]
    fn test_deleted_row_rejects_as_not_found_even_if_posted() {
        let model = entry_model(sea_orm_active_enums::PostingStatus::Posted, true);
        let id = model.id;
        assert!(matches!(
            mutation_rejection(Some(&model), id),
            LedgerError::EntryNotFound(_)
        ));
    }
}
