//! Row-to-domain conversions.
//!
//! Stored balances and batch totals must round-trip through [`Money`]; a row
//! that does not is corrupt, and conversion says so instead of guessing.

use postbook_core::posting::{DetailAccount, GeneralAccount, LedgerEntry, PostingBatch};
use postbook_shared::types::{
    DetailAccountId, GeneralAccountId, LedgerEntryId, Money, PostingBatchId, UserId,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::entities::{detail_accounts, general_accounts, ledger_entries, posting_batches};

/// A stored row that no longer satisfies domain invariants.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A balance or total column is not a valid money value.
    #[error("stored value {0} is not a valid money amount")]
    Amount(Decimal),
    /// A count column is negative.
    #[error("stored count {0} is negative")]
    Count(i64),
}

fn money(value: Decimal) -> Result<Money, ConvertError> {
    Money::new(value).map_err(|_| ConvertError::Amount(value))
}

pub fn general_from_model(model: general_accounts::Model) -> Result<GeneralAccount, ConvertError> {
    let category = model.category.into();
    Ok(GeneralAccount {
        id: GeneralAccountId::from_uuid(model.id),
        account_number: model.account_number,
        account_name: model.account_name,
        category,
        report_type: postbook_core::posting::AccountCategory::report_type(category),
        natural_side: postbook_core::posting::AccountCategory::natural_side(category),
        balance_debit: money(model.balance_debit)?,
        balance_credit: money(model.balance_credit)?,
        deleted_at: model.deleted_at.map(Into::into),
    })
}

pub fn detail_from_model(model: detail_accounts::Model) -> Result<DetailAccount, ConvertError> {
    let category = model.category.into();
    Ok(DetailAccount {
        id: DetailAccountId::from_uuid(model.id),
        account_number: model.account_number,
        account_name: model.account_name,
        general_account_number: model.general_account_number,
        category,
        report_type: postbook_core::posting::AccountCategory::report_type(category),
        natural_side: postbook_core::posting::AccountCategory::natural_side(category),
        balance_debit: money(model.balance_debit)?,
        balance_credit: money(model.balance_credit)?,
        deleted_at: model.deleted_at.map(Into::into),
    })
}

pub fn entry_from_model(model: ledger_entries::Model) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        reference_number: model.reference_number,
        amount: model.amount,
        description: model.description,
        transaction_type: model.transaction_type,
        ledger_type: model.ledger_type.into(),
        ledger_date: model.ledger_date,
        posting_status: model.posting_status.into(),
        detail_account_id: DetailAccountId::from_uuid(model.detail_account_id),
        posted_at: model.posted_at.map(Into::into),
        posted_by: model.posted_by.map(UserId::from_uuid),
        deleted_at: model.deleted_at.map(Into::into),
    }
}

pub fn batch_from_model(model: posting_batches::Model) -> Result<PostingBatch, ConvertError> {
    Ok(PostingBatch {
        id: PostingBatchId::from_uuid(model.id),
        batch_date: model.batch_date,
        closed_at: model.closed_at.into(),
        closed_by: UserId::from_uuid(model.closed_by),
        entry_count: u64::try_from(model.entry_count)
            .map_err(|_| ConvertError::Count(model.entry_count))?,
        total_debit: money(model.total_debit)?,
        total_credit: money(model.total_credit)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sea_orm_active_enums::{AccountCategory, LedgerType, PostingStatus};
    use chrono::Utc;
    use postbook_core::posting::{NaturalSide, ReportType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_general_model_derives_sides_from_category() {
        let model = general_accounts::Model {
            id: Uuid::now_v7(),
            account_number: "4000".to_string(),
            account_name: "Revenue".to_string(),
            category: AccountCategory::Revenue,
            balance_debit: dec!(0),
            balance_credit: dec!(120.50),
            deleted_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let account = general_from_model(model).unwrap();
        assert_eq!(account.report_type, ReportType::IncomeStatement);
        assert_eq!(account.natural_side, NaturalSide::Credit);
        assert_eq!(account.balance_credit.amount(), dec!(120.50));
    }

    #[test]
    fn test_corrupt_balance_is_reported() {
        let model = detail_accounts::Model {
            id: Uuid::now_v7(),
            account_number: "4001".to_string(),
            account_name: "Sales".to_string(),
            general_account_number: "4000".to_string(),
            category: AccountCategory::Revenue,
            balance_debit: dec!(1.0001),
            balance_credit: dec!(0),
            deleted_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        assert!(matches!(
            detail_from_model(model),
            Err(ConvertError::Amount(_))
        ));
    }

    #[test]
    fn test_entry_keeps_raw_fields_raw() {
        let model = ledger_entries::Model {
            id: Uuid::now_v7(),
            reference_number: None,
            amount: dec!(500.00),
            description: "Sale".to_string(),
            transaction_type: "KREDIT".to_string(),
            ledger_type: LedgerType::CashIn,
            ledger_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            posting_status: PostingStatus::Pending,
            detail_account_id: Uuid::now_v7(),
            posted_at: None,
            posted_by: None,
            deleted_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let entry = entry_from_model(model);
        assert_eq!(entry.transaction_type, "KREDIT");
        assert_eq!(entry.amount, dec!(500.00));
    }

    #[test]
    fn test_negative_batch_count_is_reported() {
        let model = posting_batches::Model {
            id: Uuid::now_v7(),
            batch_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            closed_at: Utc::now().into(),
            closed_by: Uuid::now_v7(),
            entry_count: -1,
            total_debit: dec!(0),
            total_credit: dec!(0),
        };

        assert!(matches!(batch_from_model(model), Err(ConvertError::Count(-1))));
    }
}
