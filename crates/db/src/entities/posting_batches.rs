//! `SeaORM` Entity for the posting_batches table.
//!
//! One row per closed ledger date; the unique index on `batch_date` backs
//! the idempotency guard under concurrent closes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "posting_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub batch_date: Date,
    pub closed_at: DateTimeWithTimeZone,
    pub closed_by: Uuid,
    pub entry_count: i64,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
