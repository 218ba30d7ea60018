//! Database enum types.

use postbook_core::posting::{AccountCategory as CoreCategory, LedgerType as CoreLedgerType, PostingStatus as CorePostingStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Chart-of-accounts category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_category")]
pub enum AccountCategory {
    /// Asset accounts.
    #[sea_orm(string_value = "asset")]
    Asset,
    /// Liability accounts.
    #[sea_orm(string_value = "liability")]
    Liability,
    /// Equity accounts.
    #[sea_orm(string_value = "equity")]
    Equity,
    /// Revenue accounts.
    #[sea_orm(string_value = "revenue")]
    Revenue,
    /// Expense accounts.
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl From<AccountCategory> for CoreCategory {
    fn from(value: AccountCategory) -> Self {
        match value {
            AccountCategory::Asset => Self::Asset,
            AccountCategory::Liability => Self::Liability,
            AccountCategory::Equity => Self::Equity,
            AccountCategory::Revenue => Self::Revenue,
            AccountCategory::Expense => Self::Expense,
        }
    }
}

impl From<CoreCategory> for AccountCategory {
    fn from(value: CoreCategory) -> Self {
        match value {
            CoreCategory::Asset => Self::Asset,
            CoreCategory::Liability => Self::Liability,
            CoreCategory::Equity => Self::Equity,
            CoreCategory::Revenue => Self::Revenue,
            CoreCategory::Expense => Self::Expense,
        }
    }
}

/// Business classification of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ledger_type")]
pub enum LedgerType {
    /// Cash received.
    #[sea_orm(string_value = "cash_in")]
    CashIn,
    /// Cash paid out.
    #[sea_orm(string_value = "cash_out")]
    CashOut,
    /// Any other classification.
    #[sea_orm(string_value = "other")]
    Other,
}

impl From<LedgerType> for CoreLedgerType {
    fn from(value: LedgerType) -> Self {
        match value {
            LedgerType::CashIn => Self::CashIn,
            LedgerType::CashOut => Self::CashOut,
            LedgerType::Other => Self::Other,
        }
    }
}

impl From<CoreLedgerType> for LedgerType {
    fn from(value: CoreLedgerType) -> Self {
        match value {
            CoreLedgerType::CashIn => Self::CashIn,
            CoreLedgerType::CashOut => Self::CashOut,
            CoreLedgerType::Other => Self::Other,
        }
    }
}

/// Posting status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "posting_status")]
pub enum PostingStatus {
    /// Created but not yet closed into balances.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Posted; immutable except via un-posting.
    #[sea_orm(string_value = "posted")]
    Posted,
}

impl From<PostingStatus> for CorePostingStatus {
    fn from(value: PostingStatus) -> Self {
        match value {
            PostingStatus::Pending => Self::Pending,
            PostingStatus::Posted => Self::Posted,
        }
    }
}

impl From<CorePostingStatus> for PostingStatus {
    fn from(value: CorePostingStatus) -> Self {
        match value {
            CorePostingStatus::Pending => Self::Pending,
            CorePostingStatus::Posted => Self::Posted,
        }
    }
}
