//! Processed file entity - Ledger of exports that were fully processed.
//! Keyed by the SHA-256 of the CSV content so that re-uploading the same
//! export is detected regardless of its file name.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Processed file database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "processed_files")]
pub struct Model {
    /// Hex-encoded SHA-256 of the CSV content
    #[sea_orm(primary_key, auto_increment = false)]
    pub content_hash: String,
    /// File name as uploaded
    pub file_name: String,
    /// Number of transactions stored from this file
    pub transaction_count: i64,
    /// When processing finished
    pub processed_at: DateTime,
}

/// `ProcessedFile` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
