//! `SeaORM` Entity for the general_accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::AccountCategory;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "general_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub account_number: String,
    pub account_name: String,
    pub category: AccountCategory,
    pub balance_debit: Decimal,
    pub balance_credit: Decimal,
    pub deleted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::detail_accounts::Entity")]
    DetailAccounts,
}

impl Related<super::detail_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DetailAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
