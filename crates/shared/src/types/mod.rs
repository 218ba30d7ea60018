//! Shared domain primitives.

pub mod id;
pub mod money;

pub use id::{DetailAccountId, GeneralAccountId, LedgerEntryId, PostingBatchId, UserId};
pub use money::{Money, MoneyError};
