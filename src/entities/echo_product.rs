//! Echo product entity - Denormalized copy of products flagged `is_echo`.
//!
//! Rebuilt from the product dictionary after every save so echo-only queries do
//! not need to scan the full dictionary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Echo product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "echo_products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Vendor product identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: String,
    /// Display name copied from the dictionary
    pub product_name: String,
    /// Date copied from the dictionary
    pub date: Date,
}

/// `EchoProduct` mirrors `Product` without a declared relation
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
