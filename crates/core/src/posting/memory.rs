//! In-memory ledger store.
//!
//! Backs the posting scenario tests: transactions clone the whole store
//! state and commit with optimistic version checking, so concurrent
//! transactions race exactly one winner. Faults can be scripted per
//! operation to exercise rollback and retry paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use postbook_shared::types::{
    DetailAccountId, LedgerEntryId, Money, PostingBatchId, UserId,
};

use super::balance::DeltaSet;
use super::store::{LedgerStore, LedgerTx, StoreError};
use super::types::{
    AccountSnapshot, DetailAccount, GeneralAccount, LedgerEntry, PostingBatch, PostingStatus,
};

/// Where a scripted fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// During `apply_deltas` or `reverse_deltas`.
    ApplyDeltas,
    /// During `commit`.
    Commit,
}

#[derive(Debug, Default)]
struct State {
    details: HashMap<DetailAccountId, DetailAccount>,
    generals: HashMap<String, GeneralAccount>,
    entries: HashMap<LedgerEntryId, LedgerEntry>,
    batches: HashMap<NaiveDate, PostingBatch>,
    version: u64,
}

impl State {
    fn cloned(&self) -> Self {
        Self {
            details: self.details.clone(),
            generals: self.generals.clone(),
            entries: self.entries.clone(),
            batches: self.batches.clone(),
            version: self.version,
        }
    }
}

/// Shared in-memory store handle. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<VecDeque<(FaultPoint, StoreError)>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a general account.
    pub fn insert_general(&self, account: GeneralAccount) {
        let mut state = self.lock();
        state.generals.insert(account.account_number.clone(), account);
    }

    /// Seeds a detail account.
    pub fn insert_detail(&self, account: DetailAccount) {
        let mut state = self.lock();
        state.details.insert(account.id, account);
    }

    /// Seeds a ledger entry.
    pub fn insert_entry(&self, entry: LedgerEntry) {
        let mut state = self.lock();
        state.entries.insert(entry.id, entry);
    }

    /// Schedules `error` to fire on the next operation at `point`.
    pub fn inject_fault(&self, point: FaultPoint, error: StoreError) {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        faults.push_back((point, error));
    }

    /// Current debit/credit accumulators of a detail account.
    #[must_use]
    pub fn detail_balances(&self, id: DetailAccountId) -> Option<(Money, Money)> {
        let state = self.lock();
        state
            .details
            .get(&id)
            .map(|d| (d.balance_debit, d.balance_credit))
    }

    /// Current debit/credit accumulators of a general account.
    #[must_use]
    pub fn general_balances(&self, account_number: &str) -> Option<(Money, Money)> {
        let state = self.lock();
        state
            .generals
            .get(account_number)
            .map(|g| (g.balance_debit, g.balance_credit))
    }

    /// Current posting status of an entry.
    #[must_use]
    pub fn entry_status(&self, id: LedgerEntryId) -> Option<PostingStatus> {
        let state = self.lock();
        state.entries.get(&id).map(|e| e.posting_status)
    }

    /// The committed posting batch for a date, if any.
    #[must_use]
    pub fn batch_for(&self, date: NaiveDate) -> Option<PostingBatch> {
        let state = self.lock();
        state.batches.get(&date).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_fault(&self, point: FaultPoint) -> Result<(), StoreError> {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(position) = faults.iter().position(|(p, _)| *p == point) {
            let (_, error) = faults
                .remove(position)
                .ok_or_else(|| StoreError::Backend("fault queue desynced".into()))?;
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let base = self.lock().cloned();
        Ok(MemoryTx {
            store: self.clone(),
            base_version: base.version,
            working: base,
        })
    }
}

/// One transaction over a clone of the store state.
#[derive(Debug)]
pub struct MemoryTx {
    store: MemoryStore,
    base_version: u64,
    working: State,
}

impl MemoryTx {
    fn apply_signed(&mut self, deltas: &DeltaSet, reverse: bool) -> Result<(), StoreError> {
        self.store.take_fault(FaultPoint::ApplyDeltas)?;

        for (id, delta) in &deltas.details {
            let account = self
                .working
                .details
                .get_mut(id)
                .ok_or_else(|| StoreError::Backend(format!("detail account {id} missing")))?;
            let (debit, credit) = if reverse {
                (
                    account.balance_debit - delta.debit,
                    account.balance_credit - delta.credit,
                )
            } else {
                (
                    account.balance_debit + delta.debit,
                    account.balance_credit + delta.credit,
                )
            };
            if debit.is_negative() || credit.is_negative() {
                return Err(StoreError::Backend(format!(
                    "balance underflow on detail account {id}"
                )));
            }
            account.balance_debit = debit;
            account.balance_credit = credit;
        }

        let generals_by_id: HashMap<_, _> = self
            .working
            .generals
            .values()
            .map(|g| (g.id, g.account_number.clone()))
            .collect();
        for (id, delta) in &deltas.generals {
            let number = generals_by_id
                .get(id)
                .ok_or_else(|| StoreError::Backend(format!("general account {id} missing")))?;
            let account = self
                .working
                .generals
                .get_mut(number)
                .ok_or_else(|| StoreError::Backend(format!("general account {id} missing")))?;
            let (debit, credit) = if reverse {
                (
                    account.balance_debit - delta.debit,
                    account.balance_credit - delta.credit,
                )
            } else {
                (
                    account.balance_debit + delta.debit,
                    account.balance_credit + delta.credit,
                )
            };
            if debit.is_negative() || credit.is_negative() {
                return Err(StoreError::Backend(format!(
                    "balance underflow on general account {id}"
                )));
            }
            account.balance_debit = debit;
            account.balance_credit = credit;
        }

        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_posting(&mut self) -> Result<(), StoreError> {
        // Optimistic: conflicts surface at commit via the version check.
        Ok(())
    }

    async fn find_batch_by_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<Option<PostingBatch>, StoreError> {
        Ok(self.working.batches.get(&date).cloned())
    }

    async fn load_entries(
        &mut self,
        ids: &[LedgerEntryId],
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.entries.get(id))
            .filter(|e| e.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn load_pending_through(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = self
            .working
            .entries
            .values()
            .filter(|e| {
                e.deleted_at.is_none()
                    && e.posting_status == PostingStatus::Pending
                    && e.ledger_date <= cutoff
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.ledger_date, e.id));
        Ok(entries)
    }

    async fn load_posted_on(&mut self, date: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = self
            .working
            .entries
            .values()
            .filter(|e| {
                e.deleted_at.is_none()
                    && e.posting_status == PostingStatus::Posted
                    && e.ledger_date == date
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.ledger_date, e.id));
        Ok(entries)
    }

    async fn load_accounts_for(
        &mut self,
        entries: &[LedgerEntry],
    ) -> Result<AccountSnapshot, StoreError> {
        let mut snapshot = AccountSnapshot::default();
        for entry in entries {
            let Some(detail) = self.working.details.get(&entry.detail_account_id) else {
                continue;
            };
            snapshot.details.insert(detail.id, detail.clone());
            if let Some(general) = self.working.generals.get(&detail.general_account_number) {
                snapshot
                    .generals
                    .insert(general.account_number.clone(), general.clone());
            }
        }
        Ok(snapshot)
    }

    async fn apply_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError> {
        self.apply_signed(deltas, false)
    }

    async fn reverse_deltas(&mut self, deltas: &DeltaSet) -> Result<(), StoreError> {
        self.apply_signed(deltas, true)
    }

    async fn mark_posted(
        &mut self,
        ids: &[LedgerEntryId],
        posted_at: DateTime<Utc>,
        posted_by: UserId,
    ) -> Result<(), StoreError> {
        for id in ids {
            let entry = self
                .working
                .entries
                .get_mut(id)
                .ok_or_else(|| StoreError::Backend(format!("entry {id} missing")))?;
            entry.posting_status = PostingStatus::Posted;
            entry.posted_at = Some(posted_at);
            entry.posted_by = Some(posted_by);
        }
        Ok(())
    }

    async fn mark_pending(&mut self, ids: &[LedgerEntryId]) -> Result<(), StoreError> {
        for id in ids {
            let entry = self
                .working
                .entries
                .get_mut(id)
                .ok_or_else(|| StoreError::Backend(format!("entry {id} missing")))?;
            entry.posting_status = PostingStatus::Pending;
            entry.posted_at = None;
            entry.posted_by = None;
        }
        Ok(())
    }

    async fn insert_batch(&mut self, batch: &PostingBatch) -> Result<(), StoreError> {
        if self.working.batches.contains_key(&batch.batch_date) {
            return Err(StoreError::Conflict(format!(
                "posting batch already exists for {}",
                batch.batch_date
            )));
        }
        self.working.batches.insert(batch.batch_date, batch.clone());
        Ok(())
    }

    async fn delete_batch(&mut self, id: PostingBatchId) -> Result<(), StoreError> {
        let date = self
            .working
            .batches
            .values()
            .find(|b| b.id == id)
            .map(|b| b.batch_date)
            .ok_or_else(|| StoreError::Backend(format!("posting batch {id} missing")))?;
        self.working.batches.remove(&date);
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.store.take_fault(FaultPoint::Commit)?;

        let mut state = self.store.lock();
        if state.version != self.base_version {
            return Err(StoreError::Conflict(
                "store changed since transaction began".into(),
            ));
        }
        let mut working = self.working;
        working.version = state.version + 1;
        *state = working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
