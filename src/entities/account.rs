//! Marketplace account entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "String(StringLen::N(128))")]
    pub name: String,
    /// Lowercased, unique
    #[sea_orm(column_type = "String(StringLen::N(254))", unique)]
    pub email: String,
    #[sea_orm(column_type = "String(StringLen::N(42))", nullable)]
    pub wallet_address: Option<String>,
    /// `user` or `admin`
    #[sea_orm(column_type = "String(StringLen::N(16))")]
    pub role: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sell_request::Entity")]
    SellRequest,
}

impl Related<super::sell_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SellRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
