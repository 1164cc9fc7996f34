//! Transaction entity - A sales line item imported from a vendor export.
//!
//! Rows are unique on (`product_id`, `transaction_date`); re-importing the same
//! export updates the stored rows instead of duplicating them.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Surrogate key
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i64,
    /// Vendor product identifier
    pub product_id: String,
    /// Product name exactly as it appeared on the export row
    pub product_name: String,
    /// Sales channel label
    pub lever: String,
    /// Calendar date of the sale
    pub transaction_date: Date,
    /// Sale amount
    pub transaction_amount: f64,
    /// USD-converted amount, when the export carries one
    #[serde(rename = "transactionAmountUSD")]
    pub transaction_amount_usd: Option<f64>,
    /// Earning date, when the export carries one
    pub earning_date: Option<Date>,
}

/// Transactions reference products by identifier only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
