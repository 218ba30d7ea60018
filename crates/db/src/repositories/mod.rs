//! Repository abstractions for data access.

pub mod account;
pub mod ledger;
pub mod posting;

mod convert;

pub use account::{AccountError, AccountRepository, CreateDetailAccountInput, CreateGeneralAccountInput};
pub use convert::ConvertError;
pub use ledger::{CreateEntryInput, EntryFilter, LedgerError, LedgerRepository};
pub use posting::PostingStore;
