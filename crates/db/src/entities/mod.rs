//! `SeaORM` entity definitions.

pub mod detail_accounts;
pub mod general_accounts;
pub mod ledger_entries;
pub mod posting_batches;
pub mod sea_orm_active_enums;
