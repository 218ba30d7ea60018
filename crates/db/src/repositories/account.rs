//! Chart-of-accounts repository.
//!
//! Balance accumulators are never written here; only the posting store
//! mutates them.

use postbook_core::posting::{DetailAccount, GeneralAccount};
use postbook_shared::types::DetailAccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{
    detail_accounts, general_accounts, ledger_entries, sea_orm_active_enums::AccountCategory,
};

use super::convert::{self, ConvertError};

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Account number is already in use.
    #[error("account number already in use: {0}")]
    NumberTaken(String),

    /// Parent general account does not exist or is deleted.
    #[error("general account not found: {0}")]
    GeneralNotFound(String),

    /// Account not found.
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),

    /// Cannot delete a general account that live detail accounts reference.
    #[error("general account {0} still has live detail accounts")]
    HasLiveDetails(String),

    /// Cannot delete a detail account that live ledger entries reference.
    #[error("detail account {0} still has live ledger entries")]
    HasLiveEntries(Uuid),

    /// A stored row violates domain invariants.
    #[error("corrupt account row: {0}")]
    Corrupt(#[from] ConvertError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a general account.
#[derive(Debug, Clone)]
pub struct CreateGeneralAccountInput {
    /// Stable business key, unique across general accounts.
    pub account_number: String,
    /// Human-readable name.
    pub account_name: String,
    /// Category (asset, liability, ...).
    pub category: AccountCategory,
}

/// Input for creating a detail account.
#[derive(Debug, Clone)]
pub struct CreateDetailAccountInput {
    /// Stable business key, unique across detail accounts.
    pub account_number: String,
    /// Human-readable name.
    pub account_name: String,
    /// Business key of the parent general account.
    pub general_account_number: String,
    /// Category (asset, liability, ...).
    pub category: AccountCategory,
}

/// Chart-of-accounts repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a general account with zeroed balances.
    ///
    /// # Errors
    ///
    /// Returns an error if the account number is taken or the database
    /// operation fails.
    #[tracing::instrument(skip(self, input), fields(account_number = %input.account_number))]
    pub async fn create_general(
        &self,
        input: CreateGeneralAccountInput,
    ) -> Result<GeneralAccount, AccountError> {
        if self
            .find_general_by_number(&input.account_number)
            .await?
            .is_some()
        {
            return Err(AccountError::NumberTaken(input.account_number));
        }

        let number = input.account_number.clone();
        let now = chrono::Utc::now();
        let model = general_accounts::ActiveModel {
            id: Set(Uuid::now_v7()),
            account_number: Set(input.account_number),
            account_name: Set(input.account_name),
            category: Set(input.category),
            balance_debit: Set(rust_decimal::Decimal::ZERO),
            balance_credit: Set(rust_decimal::Decimal::ZERO),
            deleted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(|err| unique_to_number_taken(err, number))?;

        Ok(convert::general_from_model(model)?)
    }

    /// Creates a detail account under a live general account.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is missing or deleted, the number is
    /// taken, or the database operation fails.
    #[tracing::instrument(skip(self, input), fields(account_number = %input.account_number))]
    pub async fn create_detail(
        &self,
        input: CreateDetailAccountInput,
    ) -> Result<DetailAccount, AccountError> {
        let txn = self.db.begin().await?;

        // Shared lock on the parent row; soft_delete_general takes it
        // exclusively, so a live parent stays live until this commits.
        let parent_live = general_accounts::Entity::find()
            .filter(general_accounts::Column::AccountNumber.eq(input.general_account_number.as_str()))
            .filter(general_accounts::Column::DeletedAt.is_null())
            .lock_shared()
            .one(&txn)
            .await?
            .is_some();
        if !parent_live {
            txn.rollback().await?;
            return Err(AccountError::GeneralNotFound(input.general_account_number));
        }

        if self
            .find_detail_by_number(&input.account_number)
            .await?
            .is_some()
        {
            txn.rollback().await?;
            return Err(AccountError::NumberTaken(input.account_number));
        }

        let number = input.account_number.clone();
        let now = chrono::Utc::now();
        let model = detail_accounts::ActiveModel {
            id: Set(Uuid::now_v7()),
            account_number: Set(input.account_number),
            account_name: Set(input.account_name),
            general_account_number: Set(input.general_account_number),
            category: Set(input.category),
            balance_debit: Set(rust_decimal::Decimal::ZERO),
            balance_credit: Set(rust_decimal::Decimal::ZERO),
            deleted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|err| unique_to_number_taken(err, number))?;
        txn.commit().await?;

        Ok(convert::detail_from_model(model)?)
    }

    /// Finds a live general account by business key.
    pub async fn find_general_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<GeneralAccount>, AccountError> {
        let model = general_accounts::Entity::find()
            .filter(general_accounts::Column::AccountNumber.eq(account_number))
            .filter(general_accounts::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model.map(convert::general_from_model).transpose()?)
    }

    /// Finds a live detail account by business key.
    pub async fn find_detail_by_number(
        &self,
        account_number: &str,
    ) -> Result<Option<DetailAccount>, AccountError> {
        let model = detail_accounts::Entity::find()
            .filter(detail_accounts::Column::AccountNumber.eq(account_number))
            .filter(detail_accounts::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;
        Ok(model.map(convert::detail_from_model).transpose()?)
    }

    /// Lists live general accounts in account-number order.
    pub async fn list_generals(&self) -> Result<Vec<GeneralAccount>, AccountError> {
        let models = general_accounts::Entity::find()
            .filter(general_accounts::Column::DeletedAt.is_null())
            .order_by_asc(general_accounts::Column::AccountNumber)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(convert::general_from_model)
            .collect::<Result<_, _>>()?)
    }

    /// Lists live detail accounts in account-number order.
    pub async fn list_details(&self) -> Result<Vec<DetailAccount>, AccountError> {
        let models = detail_accounts::Entity::find()
            .filter(detail_accounts::Column::DeletedAt.is_null())
            .order_by_asc(detail_accounts::Column::AccountNumber)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(convert::detail_from_model)
            .collect::<Result<_, _>>()?)
    }

    /// Soft-deletes a general account.
    ///
    /// # Errors
    ///
    /// Returns `HasLiveDetails` while non-deleted detail accounts still
    /// reference it.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete_general(&self, account_number: &str) -> Result<(), AccountError> {
        let txn = self.db.begin().await?;

        // Exclusive lock blocks concurrent create_detail, which takes this
        // row FOR SHARE; the child count below cannot go stale.
        let Some(model) = general_accounts::Entity::find()
            .filter(general_accounts::Column::AccountNumber.eq(account_number))
            .filter(general_accounts::Column::DeletedAt.is_null())
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(AccountError::GeneralNotFound(account_number.to_string()));
        };

        let live_details = detail_accounts::Entity::find()
            .filter(detail_accounts::Column::GeneralAccountNumber.eq(account_number))
            .filter(detail_accounts::Column::DeletedAt.is_null())
            .count(&txn)
            .await?;
        if let Err(err) = ensure_no_live_details(live_details, account_number) {
            txn.rollback().await?;
            return Err(err);
        }

        let now = chrono::Utc::now();
        let mut active: general_accounts::ActiveModel = model.into();
        active.deleted_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Soft-deletes a detail account.
    ///
    /// # Errors
    ///
    /// Returns `HasLiveEntries` while non-deleted ledger entries still
    /// reference it.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete_detail(&self, id: DetailAccountId) -> Result<(), AccountError> {
        let txn = self.db.begin().await?;

        // Exclusive lock blocks concurrent entry creation, which takes this
        // row FOR SHARE; the entry count below cannot go stale.
        let Some(model) = detail_accounts::Entity::find_by_id(id.into_inner())
            .filter(detail_accounts::Column::DeletedAt.is_null())
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Err(AccountError::AccountNotFound(id.into_inner()));
        };

        let live_entries = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::DetailAccountId.eq(id.into_inner()))
            .filter(ledger_entries::Column::DeletedAt.is_null())
            .count(&txn)
            .await?;
        if let Err(err) = ensure_no_live_entries(live_entries, id.into_inner()) {
            txn.rollback().await?;
            return Err(err);
        }

        let now = chrono::Utc::now();
        let mut active: detail_accounts::ActiveModel = model.into();
        active.deleted_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}

/// A general account may only be soft-deleted once no live detail accounts
/// reference it.
fn ensure_no_live_details(live_details: u64, account_number: &str) -> Result<(), AccountError> {
    if live_details > 0 {
        return Err(AccountError::HasLiveDetails(account_number.to_string()));
    }
    Ok(())
}

/// A detail account may only be soft-deleted once no live ledger entries
/// reference it.
fn ensure_no_live_entries(live_entries: u64, id: Uuid) -> Result<(), AccountError> {
    if live_entries > 0 {
        return Err(AccountError::HasLiveEntries(id));
    }
    Ok(())
}

/// Maps the unique index race on account_number to `NumberTaken`.
fn unique_to_number_taken(err: DbErr, account_number: String) -> AccountError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        AccountError::NumberTaken(account_number)
    } else {
        AccountError::Database(err)
    }
}
