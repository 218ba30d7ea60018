//! Closing-period coordinator.
//!
//! [`ClosingService`] is the public posting surface: it owns a
//! [`LedgerStore`], opens one transaction per close or reopen, drives the
//! [`PostingEngine`] per date group, and retries whole attempts on transient
//! storage failures. A retried attempt is always a fresh transaction, so a
//! failed one leaves nothing behind.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use postbook_shared::config::PostingConfig;
use postbook_shared::types::{LedgerEntryId, Money, UserId};

use super::engine::PostingEngine;
use super::error::PostingError;
use super::store::{LedgerStore, LedgerTx, StoreError};
use super::types::{LedgerEntry, PostPeriodOutcome, ReopenOutcome};
use super::validation::{self, BatchValidation, RejectedEntry, RejectionReason};

/// Coordinates period closes and reopens over a ledger store.
#[derive(Debug)]
pub struct ClosingService<S> {
    store: S,
    engine: PostingEngine,
    config: PostingConfig,
}

impl<S: LedgerStore> ClosingService<S> {
    /// Creates a service with the given retry policy.
    pub fn new(store: S, config: PostingConfig) -> Self {
        Self {
            store,
            engine: PostingEngine::new(),
            config,
        }
    }

    /// Read-only dry run: validates the given entries against a cutoff
    /// exactly as a close would, without changing anything.
    ///
    /// IDs that resolve to no live entry are rejected with `EntryNotFound`.
    #[tracing::instrument(skip(self, entry_ids), fields(requested = entry_ids.len()))]
    pub async fn validate_batch(
        &self,
        entry_ids: &[LedgerEntryId],
        cutoff: NaiveDate,
    ) -> Result<BatchValidation, PostingError> {
        let mut tx = self.store.begin().await?;

        let result = Self::validate_in(&mut tx, entry_ids, cutoff).await;
        // Read-only; discard the transaction either way.
        if let Err(err) = tx.rollback().await {
            tracing::warn!(error = %err, "rollback failed after read-only validation");
        }
        result
    }

    async fn validate_in(
        tx: &mut S::Tx,
        entry_ids: &[LedgerEntryId],
        cutoff: NaiveDate,
    ) -> Result<BatchValidation, PostingError> {
        let entries = tx.load_entries(entry_ids).await?;
        let accounts = tx.load_accounts_for(&entries).await?;

        let by_id: HashMap<LedgerEntryId, &LedgerEntry> =
            entries.iter().map(|e| (e.id, e)).collect();

        // Preserve the caller's order, folding missing IDs into the
        // rejection list alongside real validation failures.
        let mut outcome = BatchValidation::default();
        for &id in entry_ids {
            match by_id.get(&id) {
                None => outcome.rejected.push(RejectedEntry {
                    id,
                    reason: RejectionReason::EntryNotFound,
                }),
                Some(entry) => match validation::validate_entry(entry, &accounts, cutoff) {
                    Ok(validated) => outcome.accepted.push(validated),
                    Err(reason) => outcome.rejected.push(RejectedEntry { id, reason }),
                },
            }
        }
        Ok(outcome)
    }

    /// Closes the period ending at `upto_date`: posts every pending entry
    /// dated on or before it, one engine pass per distinct ledger date, all
    /// inside one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn post_period(
        &self,
        upto_date: NaiveDate,
        actor: UserId,
    ) -> Result<PostPeriodOutcome, PostingError> {
        self.with_retry(|| self.post_period_attempt(upto_date, actor))
            .await
    }

    /// Reopens a closed ledger date: reverses its balance movement and
    /// returns its entries to pending.
    #[tracing::instrument(skip(self))]
    pub async fn reopen_period(
        &self,
        date: NaiveDate,
        actor: UserId,
    ) -> Result<ReopenOutcome, PostingError> {
        self.with_retry(|| self.reopen_attempt(date, actor)).await
    }

    async fn post_period_attempt(
        &self,
        upto_date: NaiveDate,
        actor: UserId,
    ) -> Result<PostPeriodOutcome, PostingError> {
        let mut tx = self.store.begin().await?;
        match self.post_period_in(&mut tx, upto_date, actor).await {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::info!(
                    %upto_date,
                    posted_count = outcome.posted_count,
                    total_debit = %outcome.total_debit,
                    total_credit = %outcome.total_credit,
                    "period closed"
                );
                Ok(outcome)
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    async fn post_period_in(
        &self,
        tx: &mut S::Tx,
        upto_date: NaiveDate,
        actor: UserId,
    ) -> Result<PostPeriodOutcome, PostingError> {
        tx.lock_posting().await?;

        if tx.find_batch_by_date(upto_date).await?.is_some() {
            return Err(PostingError::AlreadyPostedForDate(upto_date));
        }

        let pending = tx.load_pending_through(upto_date).await?;
        if pending.is_empty() {
            return Err(PostingError::NoPendingEntries(upto_date));
        }

        // Date groups in ascending order; each gets its own batch record.
        let mut groups: BTreeMap<NaiveDate, Vec<LedgerEntry>> = BTreeMap::new();
        for entry in pending {
            groups.entry(entry.ledger_date).or_default().push(entry);
        }

        let mut posted_count = 0u64;
        let mut total_debit = Money::ZERO;
        let mut total_credit = Money::ZERO;
        for (date, group) in groups {
            let stats = self.engine.post_batch(tx, date, &group, actor).await?;
            posted_count += stats.entry_count;
            total_debit += stats.total_debit;
            total_credit += stats.total_credit;
        }

        Ok(PostPeriodOutcome {
            posted_count,
            total_debit,
            total_credit,
            batch_date: upto_date,
        })
    }

    async fn reopen_attempt(
        &self,
        date: NaiveDate,
        actor: UserId,
    ) -> Result<ReopenOutcome, PostingError> {
        let mut tx = self.store.begin().await?;

        let result = async {
            tx.lock_posting().await?;
            self.engine.unpost_batch(&mut tx, date, actor).await
        }
        .await;

        match result {
            Ok(stats) => {
                tx.commit().await?;
                tracing::info!(%date, unposted_count = stats.entry_count, "period reopened");
                Ok(ReopenOutcome {
                    unposted_count: stats.entry_count,
                    total_debit: stats.total_debit,
                    total_credit: stats.total_credit,
                })
            }
            Err(err) => {
                rollback_quietly(tx).await;
                Err(err)
            }
        }
    }

    /// Runs `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent. Backoff doubles per retry.
    async fn with_retry<T, F, Fut>(&self, attempt: F) -> Result<T, PostingError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, PostingError>>,
    {
        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);

        for attempt_no in 1..=max_attempts {
            match attempt().await {
                Err(PostingError::PostingFailed(store_err))
                    if store_err.is_transient() && attempt_no < max_attempts =>
                {
                    tracing::warn!(
                        attempt = attempt_no,
                        error = %store_err,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient storage failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(finalize(err)),
                Ok(value) => return Ok(value),
            }
        }
        unreachable!("retry loop always returns on its final attempt")
    }
}

/// Surfaces an exhausted write conflict as a retryable 409 rather than a
/// storage failure.
fn finalize(err: PostingError) -> PostingError {
    match err {
        PostingError::PostingFailed(StoreError::Conflict(message)) => {
            PostingError::Conflict(message)
        }
        other => other,
    }
}

async fn rollback_quietly<T: LedgerTx>(tx: T) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "rollback failed after posting error");
    }
}
