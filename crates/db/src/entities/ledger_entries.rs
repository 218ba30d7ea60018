//! `SeaORM` Entity for the ledger_entries table.
//!
//! `transaction_type` stays a raw string column: legacy rows carry
//! non-canonical spellings that only the core validator normalizes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{LedgerType, PostingStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub reference_number: Option<String>,
    pub amount: Decimal,
    pub description: String,
    pub transaction_type: String,
    pub ledger_type: LedgerType,
    pub ledger_date: Date,
    pub posting_status: PostingStatus,
    pub detail_account_id: Uuid,
    pub posted_at: Option<DateTimeWithTimeZone>,
    pub posted_by: Option<Uuid>,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::detail_accounts::Entity",
        from = "Column::DetailAccountId",
        to = "super::detail_accounts::Column::Id"
    )]
    DetailAccounts,
}

impl Related<super::detail_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DetailAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
