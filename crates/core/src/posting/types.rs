//! Posting domain types.
//!
//! This module defines the chart-of-accounts and ledger-entry types the
//! posting engine operates on, as loaded from storage. Raw fields coming
//! from legacy data (entry side, amount) are kept untyped here and admitted
//! into [`ValidatedEntry`] by the validator.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use postbook_shared::types::{
    DetailAccountId, GeneralAccountId, LedgerEntryId, Money, PostingBatchId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Chart-of-accounts category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    /// Asset accounts (cash, receivables, inventory).
    Asset,
    /// Liability accounts (payables, loans).
    Liability,
    /// Equity accounts.
    Equity,
    /// Revenue accounts.
    Revenue,
    /// Expense accounts.
    Expense,
}

impl AccountCategory {
    /// The financial statement this category reports under.
    #[must_use]
    pub const fn report_type(self) -> ReportType {
        match self {
            Self::Asset | Self::Liability | Self::Equity => ReportType::BalanceSheet,
            Self::Revenue | Self::Expense => ReportType::IncomeStatement,
        }
    }

    /// The polarity that increases this category's balance.
    #[must_use]
    pub const fn natural_side(self) -> NaturalSide {
        match self {
            Self::Asset | Self::Expense => NaturalSide::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NaturalSide::Credit,
        }
    }
}

/// Which financial statement an account reports under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Balance sheet accounts (assets, liabilities, equity).
    BalanceSheet,
    /// Income statement accounts (revenue, expenses).
    IncomeStatement,
}

/// Which polarity increases an account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaturalSide {
    /// Debit-normal accounts (assets, expenses).
    Debit,
    /// Credit-normal accounts (liabilities, equity, revenue).
    Credit,
}

impl NaturalSide {
    /// Net balance of the two raw accumulators, interpreted per side.
    ///
    /// This is informational; posting only ever mutates the raw
    /// `balance_debit`/`balance_credit` accumulators, never the net.
    #[must_use]
    pub fn net(self, balance_debit: Money, balance_credit: Money) -> Money {
        match self {
            Self::Debit => balance_debit - balance_credit,
            Self::Credit => balance_credit - balance_debit,
        }
    }
}

/// The polarity of one ledger entry: debit or credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

impl TransactionType {
    /// Parses a stored polarity string.
    ///
    /// Legacy rows carry Indonesian spellings ("DEBET", "KREDIT") alongside
    /// the English ones; both are accepted and normalized here, at the one
    /// parse boundary, rather than migrated ad hoc per call site.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBIT" | "DEBET" => Some(Self::Debit),
            "CREDIT" | "KREDIT" => Some(Self::Credit),
            _ => None,
        }
    }

    /// Canonical storage spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business classification of a ledger entry. Does not affect posting math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    /// Cash received.
    CashIn,
    /// Cash paid out.
    CashOut,
    /// Any other classification.
    Other,
}

/// Posting status of a ledger entry - the two-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingStatus {
    /// Entry has been created but not yet closed into balances.
    Pending,
    /// Entry has been posted; immutable except via un-posting.
    Posted,
}

impl PostingStatus {
    /// Returns true if the entry may no longer be edited or hard-deleted.
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Posted)
    }
}

/// A top-level chart-of-accounts node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralAccount {
    /// Unique identifier.
    pub id: GeneralAccountId,
    /// Stable business key, unique across general accounts.
    pub account_number: String,
    /// Human-readable name.
    pub account_name: String,
    /// Category (asset, liability, ...).
    pub category: AccountCategory,
    /// Statement this account reports under.
    pub report_type: ReportType,
    /// Polarity that increases this account's balance.
    pub natural_side: NaturalSide,
    /// Running debit accumulator (non-negative).
    pub balance_debit: Money,
    /// Running credit accumulator (non-negative).
    pub balance_credit: Money,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl GeneralAccount {
    /// Returns true if the account has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Net balance per natural side (informational).
    #[must_use]
    pub fn net_balance(&self) -> Money {
        self.natural_side.net(self.balance_debit, self.balance_credit)
    }
}

/// A child account under exactly one general account; where ledger entries
/// actually post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailAccount {
    /// Unique identifier.
    pub id: DetailAccountId,
    /// Stable business key, unique across detail accounts.
    pub account_number: String,
    /// Human-readable name.
    pub account_name: String,
    /// Business key of the parent general account.
    pub general_account_number: String,
    /// Category (asset, liability, ...).
    pub category: AccountCategory,
    /// Statement this account reports under.
    pub report_type: ReportType,
    /// Polarity that increases this account's balance.
    pub natural_side: NaturalSide,
    /// Running debit accumulator (non-negative).
    pub balance_debit: Money,
    /// Running credit accumulator (non-negative).
    pub balance_credit: Money,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DetailAccount {
    /// Returns true if the account has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Net balance per natural side (informational).
    #[must_use]
    pub fn net_balance(&self) -> Money {
        self.natural_side.net(self.balance_debit, self.balance_credit)
    }
}

/// One ledger line item, as loaded from storage.
///
/// `transaction_type` and `amount` are kept raw here; the validator admits
/// them into [`ValidatedEntry`] or rejects the entry with a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier.
    pub id: LedgerEntryId,
    /// Human-readable batch/transaction tag; not required unique.
    pub reference_number: Option<String>,
    /// Raw amount as stored. Must be a positive two-decimal value.
    pub amount: Decimal,
    /// Description of the line item.
    pub description: String,
    /// Raw polarity string as stored ("DEBIT"/"CREDIT", legacy spellings).
    pub transaction_type: String,
    /// Business classification; no effect on posting math.
    pub ledger_type: LedgerType,
    /// The accounting date, distinct from the creation timestamp.
    pub ledger_date: NaiveDate,
    /// Current state in the posting state machine.
    pub posting_status: PostingStatus,
    /// The detail account this entry posts to.
    pub detail_account_id: DetailAccountId,
    /// When the entry was posted, if posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Who posted the entry, if posted.
    pub posted_by: Option<UserId>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A ledger entry admitted by the validator: typed polarity, exact amount,
/// and both affected accounts resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    /// The underlying ledger entry.
    pub id: LedgerEntryId,
    /// The detail account the entry posts to.
    pub detail_account_id: DetailAccountId,
    /// The parent general account the posting propagates to.
    pub general_account_id: GeneralAccountId,
    /// Typed polarity.
    pub transaction_type: TransactionType,
    /// Positive two-decimal amount.
    pub amount: Money,
    /// Accounting date.
    pub ledger_date: NaiveDate,
}

/// The idempotency record proving a ledger date has been closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingBatch {
    /// Unique identifier.
    pub id: PostingBatchId,
    /// The closed ledger date.
    pub batch_date: NaiveDate,
    /// When the close committed.
    pub closed_at: DateTime<Utc>,
    /// Actor who requested the close.
    pub closed_by: UserId,
    /// Number of entries posted for this date.
    pub entry_count: u64,
    /// Sum of debit-side amounts posted for this date.
    pub total_debit: Money,
    /// Sum of credit-side amounts posted for this date.
    pub total_credit: Money,
}

/// Consistent view of the accounts a batch touches, read inside the posting
/// transaction.
///
/// Soft-deleted accounts are carried (not filtered) so the validator can
/// distinguish "deleted" from "never existed" while still rejecting both.
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    /// Detail accounts keyed by ID.
    pub details: HashMap<DetailAccountId, DetailAccount>,
    /// General accounts keyed by business account number.
    pub generals: HashMap<String, GeneralAccount>,
}

impl AccountSnapshot {
    /// Builds a snapshot from account lists.
    #[must_use]
    pub fn new(details: Vec<DetailAccount>, generals: Vec<GeneralAccount>) -> Self {
        Self {
            details: details.into_iter().map(|d| (d.id, d)).collect(),
            generals: generals
                .into_iter()
                .map(|g| (g.account_number.clone(), g))
                .collect(),
        }
    }

    /// Looks up a detail account, deleted or not.
    #[must_use]
    pub fn detail(&self, id: DetailAccountId) -> Option<&DetailAccount> {
        self.details.get(&id)
    }

    /// Looks up a general account by business key, deleted or not.
    #[must_use]
    pub fn general(&self, account_number: &str) -> Option<&GeneralAccount> {
        self.generals.get(account_number)
    }
}

/// Result of a successful period close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPeriodOutcome {
    /// Entries transitioned to posted.
    pub posted_count: u64,
    /// Sum of posted debit-side amounts.
    pub total_debit: Money,
    /// Sum of posted credit-side amounts.
    pub total_credit: Money,
    /// The cutoff date the close was requested for.
    pub batch_date: NaiveDate,
}

/// Result of a successful period reopen (un-post).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenOutcome {
    /// Entries transitioned back to pending.
    pub unposted_count: u64,
    /// Sum of reversed debit-side amounts.
    pub total_debit: Money,
    /// Sum of reversed credit-side amounts.
    pub total_credit: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d).unwrap()
    }

    #[test]
    fn test_category_report_type() {
        assert_eq!(AccountCategory::Asset.report_type(), ReportType::BalanceSheet);
        assert_eq!(AccountCategory::Liability.report_type(), ReportType::BalanceSheet);
        assert_eq!(AccountCategory::Equity.report_type(), ReportType::BalanceSheet);
        assert_eq!(AccountCategory::Revenue.report_type(), ReportType::IncomeStatement);
        assert_eq!(AccountCategory::Expense.report_type(), ReportType::IncomeStatement);
    }

    #[test]
    fn test_category_natural_side() {
        assert_eq!(AccountCategory::Asset.natural_side(), NaturalSide::Debit);
        assert_eq!(AccountCategory::Expense.natural_side(), NaturalSide::Debit);
        assert_eq!(AccountCategory::Liability.natural_side(), NaturalSide::Credit);
        assert_eq!(AccountCategory::Equity.natural_side(), NaturalSide::Credit);
        assert_eq!(AccountCategory::Revenue.natural_side(), NaturalSide::Credit);
    }

    #[rstest::rstest]
    #[case("DEBIT", TransactionType::Debit)]
    #[case("debit", TransactionType::Debit)]
    #[case("DEBET", TransactionType::Debit)]
    #[case(" debet ", TransactionType::Debit)]
    #[case("CREDIT", TransactionType::Credit)]
    #[case("KREDIT", TransactionType::Credit)]
    #[case("kredit", TransactionType::Credit)]
    fn test_transaction_type_parse(#[case] raw: &str, #[case] expected: TransactionType) {
        assert_eq!(TransactionType::parse(raw), Some(expected));
    }

    #[rstest::rstest]
    #[case("TRANSFER")]
    #[case("")]
    #[case("DEBITCREDIT")]
    fn test_transaction_type_parse_rejects_unknown(#[case] raw: &str) {
        assert_eq!(TransactionType::parse(raw), None);
    }

    #[test]
    fn test_posting_status_immutability() {
        assert!(!PostingStatus::Pending.is_immutable());
        assert!(PostingStatus::Posted.is_immutable());
    }

    #[test]
    fn test_net_balance_debit_normal() {
        let net = NaturalSide::Debit.net(money(dec!(800.00)), money(dec!(300.00)));
        assert_eq!(net, money(dec!(500.00)));
    }

    #[test]
    fn test_net_balance_credit_normal() {
        let net = NaturalSide::Credit.net(money(dec!(300.00)), money(dec!(800.00)));
        assert_eq!(net, money(dec!(500.00)));
    }
}
