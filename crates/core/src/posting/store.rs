//! Storage seam for the posting engine.
//!
//! The engine never talks to a database directly; it drives a
//! [`LedgerStore`] that hands out one [`LedgerTx`] per posting attempt.
//! Every read and write of a close happens inside that single transaction,
//! so a failure anywhere rolls the whole attempt back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use postbook_shared::types::{LedgerEntryId, PostingBatchId, UserId};
use thiserror::Error;

use super::balance::DeltaSet;
use super::types::{AccountSnapshot, LedgerEntry, PostingBatch};

/// Errors surfaced by a ledger store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Permanent backend failure; retrying the same attempt will not help.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Transient failure (lost connection, timeout). A fresh attempt may
    /// succeed.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// A concurrent writer got there first (serialization failure, lock
    /// conflict, duplicate batch insert racing this one).
    #[error("write conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Returns true if a fresh transaction attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_))
    }
}

/// Hands out posting transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The transaction type this store produces.
    type Tx: LedgerTx;

    /// Opens a new posting transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One posting transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) must
/// discard all of its writes.
#[async_trait]
pub trait LedgerTx: Send {
    /// Takes the exclusive posting lock, serializing closes against each
    /// other for the lifetime of this transaction.
    async fn lock_posting(&mut self) -> Result<(), StoreError>;

    /// Finds the committed posting batch for a ledger date, if any.
    async fn find_batch_by_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<Option<PostingBatch>, StoreError>;

    /// Loads live entries by ID. Missing IDs are absent from the result,
    /// not errors.
    async fn load_entries(
        &mut self,
        ids: &[LedgerEntryId],
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Loads all live pending entries with `ledger_date <= cutoff`.
    async fn load_pending_through(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Loads all live posted entries with `ledger_date == date`.
    async fn load_posted_on(&mut self, date: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Loads the detail accounts referenced by `entries` plus their parent
    /// general accounts, soft-deleted rows included.
    async fn load_accounts_for(
        &mut self,
        entries: &[LedgerEntry],
    ) -> Result<AccountSnapshot, StoreError>;

    /// Adds each delta to its account's debit/credit accumulators.
    async fn apply_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError>;

    /// Subtracts each delta from its account's debit/credit accumulators.
    async fn reverse_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError>;

    /// Transitions entries to posted, stamping audit fields.
    async fn mark_posted(
        &mut self,
        ids: &[LedgerEntryId],
        posted_at: DateTime<Utc>,
        posted_by: UserId,
    ) -> Result<(), StoreError>;

    /// Transitions entries back to pending, clearing audit fields.
    async fn mark_pending(&mut self, ids: &[LedgerEntryId]) -> Result<(), StoreError>;

    /// Records the idempotency batch for a closed date.
    async fn insert_batch(&mut self, batch: &PostingBatch) -> Result<(), StoreError>;

    /// Removes the idempotency batch when its date is reopened.
    async fn delete_batch(&mut self, id: PostingBatchId) -> Result<(), StoreError>;

    /// Commits every write of this transaction atomically.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<(), StoreError>;
}
