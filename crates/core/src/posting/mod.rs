//! Ledger posting and period closing.
//!
//! The flow of a close: the [`ClosingService`] opens one storage
//! transaction, selects pending entries through the cutoff, and drives the
//! [`PostingEngine`] once per ledger date. The engine re-validates each date
//! group against an account snapshot read in the same transaction, collapses
//! it into per-account balance deltas, flips entry statuses, and records a
//! [`PostingBatch`] as the idempotency guard. Any failure rolls the whole
//! close back.

pub mod balance;
pub mod closing;
pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;
pub mod validation;

pub use balance::{BalanceDelta, DeltaSet};
pub use closing::ClosingService;
pub use engine::{BatchStats, PostingEngine};
pub use error::PostingError;
pub use memory::{FaultPoint, MemoryStore};
pub use store::{LedgerStore, LedgerTx, StoreError};
pub use types::{
    AccountCategory, AccountSnapshot, DetailAccount, GeneralAccount, LedgerEntry, LedgerType,
    NaturalSide, PostPeriodOutcome, PostingBatch, PostingStatus, ReopenOutcome, ReportType,
    TransactionType, ValidatedEntry,
};
pub use validation::{BatchValidation, RejectedEntry, RejectionReason};
