//! Balance delta aggregation.
//!
//! A batch of validated entries collapses into one debit/credit delta pair
//! per affected account, so storage is touched O(accounts) times per close
//! instead of O(entries).

use std::collections::BTreeMap;

use postbook_shared::types::{DetailAccountId, GeneralAccountId, Money};

use super::types::{TransactionType, ValidatedEntry};

/// Accumulated debit and credit movement for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Total debit-side movement.
    pub debit: Money,
    /// Total credit-side movement.
    pub credit: Money,
}

impl BalanceDelta {
    /// Adds one entry's amount to the matching side.
    fn accumulate(&mut self, transaction_type: TransactionType, amount: Money) {
        match transaction_type {
            TransactionType::Debit => self.debit += amount,
            TransactionType::Credit => self.credit += amount,
        }
    }
}

/// Per-account movement of a batch, for both chart levels.
///
/// Keyed maps are ordered so storage writes happen in a deterministic
/// account order, which keeps concurrent closes from deadlocking on
/// row locks taken in opposite orders.
#[derive(Debug, Clone, Default)]
pub struct DeltaSet {
    /// Movement per detail account.
    pub details: BTreeMap<DetailAccountId, BalanceDelta>,
    /// Movement per general account.
    pub generals: BTreeMap<GeneralAccountId, BalanceDelta>,
}

impl DeltaSet {
    /// Collapses validated entries into per-account deltas.
    ///
    /// Every entry contributes to exactly one detail account and its parent
    /// general account, on the same side with the same amount.
    #[must_use]
    pub fn from_entries(entries: &[ValidatedEntry]) -> Self {
        let mut set = Self::default();
        for entry in entries {
            set.details
                .entry(entry.detail_account_id)
                .or_default()
                .accumulate(entry.transaction_type, entry.amount);
            set.generals
                .entry(entry.general_account_id)
                .or_default()
                .accumulate(entry.transaction_type, entry.amount);
        }
        set
    }

    /// Total debit-side movement across the batch.
    #[must_use]
    pub fn total_debit(&self) -> Money {
        self.details.values().map(|d| d.debit).sum()
    }

    /// Total credit-side movement across the batch.
    #[must_use]
    pub fn total_credit(&self) -> Money {
        self.details.values().map(|d| d.credit).sum()
    }

    /// Returns true if no account is affected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use postbook_shared::types::LedgerEntryId;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d).unwrap()
    }

    fn entry(
        detail: DetailAccountId,
        general: GeneralAccountId,
        tt: TransactionType,
        amount: Decimal,
    ) -> ValidatedEntry {
        ValidatedEntry {
            id: LedgerEntryId::new(),
            detail_account_id: detail,
            general_account_id: general,
            transaction_type: tt,
            amount: money(amount),
            ledger_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_empty_batch_produces_empty_set() {
        let set = DeltaSet::from_entries(&[]);
        assert!(set.is_empty());
        assert_eq!(set.total_debit(), Money::ZERO);
        assert_eq!(set.total_credit(), Money::ZERO);
    }

    #[test]
    fn test_entries_collapse_per_account() {
        let d1 = DetailAccountId::new();
        let d2 = DetailAccountId::new();
        let g = GeneralAccountId::new();

        let set = DeltaSet::from_entries(&[
            entry(d1, g, TransactionType::Debit, dec!(100.00)),
            entry(d1, g, TransactionType::Debit, dec!(50.00)),
            entry(d1, g, TransactionType::Credit, dec!(25.00)),
            entry(d2, g, TransactionType::Credit, dec!(75.00)),
        ]);

        assert_eq!(set.details.len(), 2);
        assert_eq!(set.details[&d1].debit, money(dec!(150.00)));
        assert_eq!(set.details[&d1].credit, money(dec!(25.00)));
        assert_eq!(set.details[&d2].debit, Money::ZERO);
        assert_eq!(set.details[&d2].credit, money(dec!(75.00)));

        // Both details share one parent; the general gets everything.
        assert_eq!(set.generals.len(), 1);
        assert_eq!(set.generals[&g].debit, money(dec!(150.00)));
        assert_eq!(set.generals[&g].credit, money(dec!(100.00)));
    }

    #[test]
    fn test_totals_match_entry_sums() {
        let d = DetailAccountId::new();
        let g = GeneralAccountId::new();
        let set = DeltaSet::from_entries(&[
            entry(d, g, TransactionType::Debit, dec!(10.00)),
            entry(d, g, TransactionType::Credit, dec!(4.50)),
            entry(d, g, TransactionType::Debit, dec!(0.01)),
        ]);
        assert_eq!(set.total_debit(), money(dec!(10.01)));
        assert_eq!(set.total_credit(), money(dec!(4.50)));
    }

    proptest! {
        /// Detail-level and general-level totals always agree: every entry
        /// lands on both chart levels with the same side and amount.
        #[test]
        fn prop_levels_conserve_totals(amounts in prop::collection::vec((1u64..=1_000_000, prop::bool::ANY), 0..50)) {
            let d1 = DetailAccountId::new();
            let d2 = DetailAccountId::new();
            let g1 = GeneralAccountId::new();
            let g2 = GeneralAccountId::new();

            let entries: Vec<ValidatedEntry> = amounts
                .iter()
                .enumerate()
                .map(|(i, &(cents, is_debit))| {
                    let (d, g) = if i % 2 == 0 { (d1, g1) } else { (d2, g2) };
                    let tt = if is_debit { TransactionType::Debit } else { TransactionType::Credit };
                    entry(d, g, tt, Decimal::new(i64::try_from(cents).unwrap(), 2))
                })
                .collect();

            let set = DeltaSet::from_entries(&entries);

            let general_debit: Money = set.generals.values().map(|d| d.debit).sum();
            let general_credit: Money = set.generals.values().map(|d| d.credit).sum();
            prop_assert_eq!(set.total_debit(), general_debit);
            prop_assert_eq!(set.total_credit(), general_credit);
        }
    }
}
