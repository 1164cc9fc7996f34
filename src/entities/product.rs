//! Product entity - One entry of the product dictionary.
//!
//! Entries are keyed by the vendor's `product_id`. The display name may carry an
//! edition suffix added during reconciliation, and `is_echo` is curated by hand in
//! the control panel. Serialized field names follow the dictionary JSON document
//! (`productId`, `productName`, `date`, `isEcho`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Vendor product identifier, unique within the dictionary
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: String,
    /// Display name, possibly disambiguated (e.g. `"A320 v2 Europe (2024)"`)
    pub product_name: String,
    /// Earning date of the first observed sale
    pub date: Date,
    /// Whether the product belongs to the restricted echo view
    #[serde(default)]
    pub is_echo: bool,
}

/// Products are referenced by transactions without a foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
