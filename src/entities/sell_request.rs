//! Sell request entity. Rows are never deleted; terminal status closes them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sell_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    /// Lowercase `0x`-prefixed chain address
    #[sea_orm(column_type = "String(StringLen::N(42))")]
    pub wallet_address: String,
    /// Credits offered, always >= 1
    pub amount: i64,
    /// Proposed unit price, always >= 0
    #[sea_orm(column_type = "Double")]
    pub price: f64,
    #[sea_orm(column_type = "String(StringLen::N(16))")]
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<i64>,
    pub review_date: Option<DateTimeWithTimeZone>,
    pub completed_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "String(StringLen::N(66))", nullable)]
    pub transaction_hash: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub source: String,
    /// JSON array of document references, in attachment order
    #[sea_orm(column_type = "JsonBinary")]
    pub documents: Json,
    pub submitted_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::UserId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
