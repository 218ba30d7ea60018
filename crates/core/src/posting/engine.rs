//! The posting state machine.
//!
//! [`PostingEngine`] owns the only two transitions a ledger entry can make:
//! Pending -> Posted (`post_batch`) and Posted -> Pending (`unpost_batch`).
//! Both operate inside a caller-provided transaction and leave commit or
//! rollback to the caller, so a period close spanning several dates stays
//! all-or-nothing.

use chrono::{NaiveDate, Utc};
use postbook_shared::types::{LedgerEntryId, Money, PostingBatchId, UserId};

use super::balance::DeltaSet;
use super::error::PostingError;
use super::store::LedgerTx;
use super::types::{LedgerEntry, PostingBatch, ValidatedEntry};
use super::validation;

/// Per-date statistics returned by the engine to the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct BatchStats {
    /// Entries transitioned in this date group.
    pub entry_count: u64,
    /// Debit-side total of the group.
    pub total_debit: Money,
    /// Credit-side total of the group.
    pub total_credit: Money,
}

/// Stateless executor of the two posting transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostingEngine;

impl PostingEngine {
    /// Creates a new engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Posts one date group of pending entries.
    ///
    /// The idempotency guard, the account snapshot read, the balance writes
    /// and the batch record insert all share `tx`; the caller decides when
    /// (and whether) to commit.
    #[tracing::instrument(skip(self, tx, entries), fields(entry_count = entries.len()))]
    pub async fn post_batch<T: LedgerTx>(
        &self,
        tx: &mut T,
        date: NaiveDate,
        entries: &[LedgerEntry],
        actor: UserId,
    ) -> Result<BatchStats, PostingError> {
        if tx.find_batch_by_date(date).await?.is_some() {
            return Err(PostingError::AlreadyPostedForDate(date));
        }

        let accounts = tx.load_accounts_for(entries).await?;
        let outcome = validation::validate_batch(entries, &accounts, date);
        if !outcome.is_clean() {
            return Err(PostingError::ValidationFailed(outcome.rejected));
        }

        let deltas = DeltaSet::from_entries(&outcome.accepted);
        let stats = BatchStats {
            entry_count: outcome.accepted.len() as u64,
            total_debit: deltas.total_debit(),
            total_credit: deltas.total_credit(),
        };

        tx.apply_deltas(&deltas).await?;
        tx.mark_posted(&entry_ids(&outcome.accepted), Utc::now(), actor)
            .await?;
        tx.insert_batch(&PostingBatch {
            id: PostingBatchId::new(),
            batch_date: date,
            closed_at: Utc::now(),
            closed_by: actor,
            entry_count: stats.entry_count,
            total_debit: stats.total_debit,
            total_credit: stats.total_credit,
        })
        .await?;

        tracing::info!(
            %date,
            entry_count = stats.entry_count,
            total_debit = %stats.total_debit,
            total_credit = %stats.total_credit,
            "date group posted"
        );

        Ok(stats)
    }

    /// Reverses a posted date group: negates its balance movement, returns
    /// its entries to pending, and removes the batch record.
    #[tracing::instrument(skip(self, tx))]
    pub async fn unpost_batch<T: LedgerTx>(
        &self,
        tx: &mut T,
        date: NaiveDate,
        actor: UserId,
    ) -> Result<BatchStats, PostingError> {
        let Some(batch) = tx.find_batch_by_date(date).await? else {
            return Err(PostingError::NothingToUnpost(date));
        };

        let entries = tx.load_posted_on(date).await?;
        if entries.is_empty() {
            return Err(PostingError::NothingToUnpost(date));
        }

        let accounts = tx.load_accounts_for(&entries).await?;
        let admitted = validation::admit_posted(&entries, &accounts).map_err(|rejected| {
            PostingError::Internal(format!(
                "posted entry {} no longer re-admits: {}",
                rejected.id, rejected.reason
            ))
        })?;

        let deltas = DeltaSet::from_entries(&admitted);
        let stats = BatchStats {
            entry_count: admitted.len() as u64,
            total_debit: deltas.total_debit(),
            total_credit: deltas.total_credit(),
        };

        tx.reverse_deltas(&deltas).await?;
        tx.mark_pending(&entry_ids(&admitted)).await?;
        tx.delete_batch(batch.id).await?;

        tracing::info!(
            %date,
            entry_count = stats.entry_count,
            "date group reversed"
        );

        Ok(stats)
    }
}

fn entry_ids(entries: &[ValidatedEntry]) -> Vec<LedgerEntryId> {
    entries.iter().map(|e| e.id).collect()
}
