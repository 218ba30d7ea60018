//! Batch validation for ledger entries.
//!
//! Validation is pure: it runs against an [`AccountSnapshot`] read inside
//! the posting transaction and produces data, never side effects. Rejections
//! are collected per entry so a batch's full rejection list is visible at
//! once.

use chrono::NaiveDate;
use postbook_shared::types::{LedgerEntryId, Money};
use serde::{Deserialize, Serialize};

use super::types::{AccountSnapshot, LedgerEntry, PostingStatus, TransactionType, ValidatedEntry};

/// Why a single entry was refused admission to a posting batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    /// The entry ID was not found in storage.
    EntryNotFound,
    /// The detail account or its parent general account is missing or
    /// soft-deleted.
    AccountNotFound,
    /// The amount is not a positive two-decimal value.
    InvalidAmount,
    /// The stored polarity string is not a recognized debit/credit value.
    InvalidTransactionType,
    /// The ledger date falls after the requested cutoff.
    InvalidDate,
    /// The entry has already been posted.
    AlreadyPosted,
}

impl RejectionReason {
    /// Stable code for API responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntryNotFound => "ENTRY_NOT_FOUND",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidTransactionType => "INVALID_TRANSACTION_TYPE",
            Self::InvalidDate => "INVALID_DATE",
            Self::AlreadyPosted => "ALREADY_POSTED",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected entry with its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    /// The rejected entry.
    pub id: LedgerEntryId,
    /// Why it was rejected.
    pub reason: RejectionReason,
}

/// Outcome of validating a candidate batch.
#[derive(Debug, Clone, Default)]
pub struct BatchValidation {
    /// Entries admitted to the batch, in input order.
    pub accepted: Vec<ValidatedEntry>,
    /// Entries refused, with reasons, in input order.
    pub rejected: Vec<RejectedEntry>,
}

impl BatchValidation {
    /// Returns true if every candidate was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validates a batch of candidate entries against a consistent account
/// snapshot and a cutoff date.
///
/// Checks run in order per entry: detail account live, parent general
/// account live, positive two-decimal amount, recognized polarity,
/// `ledger_date <= cutoff`, and status still pending.
#[must_use]
pub fn validate_batch(
    entries: &[LedgerEntry],
    accounts: &AccountSnapshot,
    cutoff: NaiveDate,
) -> BatchValidation {
    let mut outcome = BatchValidation::default();

    for entry in entries {
        match validate_entry(entry, accounts, cutoff) {
            Ok(validated) => outcome.accepted.push(validated),
            Err(reason) => outcome.rejected.push(RejectedEntry {
                id: entry.id,
                reason,
            }),
        }
    }

    outcome
}

/// Validates one entry; returns its typed, admitted form or the first
/// failing check's reason.
pub fn validate_entry(
    entry: &LedgerEntry,
    accounts: &AccountSnapshot,
    cutoff: NaiveDate,
) -> Result<ValidatedEntry, RejectionReason> {
    let typed = admit_accounts_and_amount(entry, accounts)?;

    if entry.ledger_date > cutoff {
        return Err(RejectionReason::InvalidDate);
    }

    if entry.posting_status != PostingStatus::Pending {
        return Err(RejectionReason::AlreadyPosted);
    }

    Ok(typed)
}

/// Re-admits entries that are already posted, for reversal.
///
/// Un-posting must reverse exactly the effect the forward close applied, so
/// the same account/amount/polarity admission runs again; a failure here
/// means stored state no longer re-admits and is surfaced to the engine as
/// an invariant breach rather than a rejection list.
pub fn admit_posted(
    entries: &[LedgerEntry],
    accounts: &AccountSnapshot,
) -> Result<Vec<ValidatedEntry>, RejectedEntry> {
    entries
        .iter()
        .map(|entry| {
            admit_accounts_and_amount(entry, accounts).map_err(|reason| RejectedEntry {
                id: entry.id,
                reason,
            })
        })
        .collect()
}

/// Shared admission core: account referential checks, amount, polarity.
fn admit_accounts_and_amount(
    entry: &LedgerEntry,
    accounts: &AccountSnapshot,
) -> Result<ValidatedEntry, RejectionReason> {
    let detail = accounts
        .detail(entry.detail_account_id)
        .filter(|d| !d.is_deleted())
        .ok_or(RejectionReason::AccountNotFound)?;

    let general = accounts
        .general(&detail.general_account_number)
        .filter(|g| !g.is_deleted())
        .ok_or(RejectionReason::AccountNotFound)?;

    let amount = Money::new(entry.amount)
        .ok()
        .filter(Money::is_positive)
        .ok_or(RejectionReason::InvalidAmount)?;

    let transaction_type = TransactionType::parse(&entry.transaction_type)
        .ok_or(RejectionReason::InvalidTransactionType)?;

    Ok(ValidatedEntry {
        id: entry.id,
        detail_account_id: detail.id,
        general_account_id: general.id,
        transaction_type,
        amount,
        ledger_date: entry.ledger_date,
    })
}
