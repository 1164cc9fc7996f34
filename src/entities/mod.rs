//! Entity module - Contains all SeaORM entity definitions for the record store.
//! These entities represent the persisted collections used by the dashboard.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod echo_product;
pub mod processed_file;
pub mod product;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use echo_product::{
    Column as EchoProductColumn, Entity as EchoProduct, Model as EchoProductModel,
};
pub use processed_file::{
    Column as ProcessedFileColumn, Entity as ProcessedFile, Model as ProcessedFileModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
