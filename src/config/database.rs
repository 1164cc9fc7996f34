//! Database configuration module.
//!
//! This module handles the record store connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.
//! Whether the store is usable is decided with a probe query against each collection.

use crate::config::settings::Settings;
use crate::entities::{EchoProduct, ProcessedFile, Product, Transaction, transaction};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, QuerySelect, Schema,
};
use tracing::{debug, info, instrument, warn};

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back
/// to the configured URL.
#[must_use]
pub fn get_database_url(settings: &Settings) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| settings.database_url.clone())
}

/// Establishes a connection to the record store.
///
/// Uses `DATABASE_URL` when present, otherwise the URL from the settings.
#[instrument(skip(settings))]
pub async fn create_connection(settings: &Settings) -> Result<DatabaseConnection> {
    let database_url = get_database_url(settings);
    debug!("Connecting to record store at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables if they are missing, plus the unique index backing
/// transaction upserts on (`product_id`, `transaction_date`).
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut product_table = schema.create_table_from_entity(Product);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut echo_product_table = schema.create_table_from_entity(EchoProduct);
    let mut processed_file_table = schema.create_table_from_entity(ProcessedFile);

    for table in [
        &mut product_table,
        &mut transaction_table,
        &mut echo_product_table,
        &mut processed_file_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let unique_sale = Index::create()
        .name("idx_transactions_product_date")
        .table(Transaction)
        .col(transaction::Column::ProductId)
        .col(transaction::Column::TransactionDate)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&unique_sale)).await?;

    info!("Record store tables ensured.");
    Ok(())
}

/// Outcome of probing the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseStatus {
    /// Every collection answered a probe query
    Ready,
    /// At least one collection is missing or the backend is unreachable
    Misconfigured {
        /// Collections that failed the probe, with the backend message
        failures: Vec<String>,
    },
}

impl DatabaseStatus {
    /// Whether data operations may run
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Probes each collection with a one-row query.
///
/// Never fails: backend errors are folded into [`DatabaseStatus::Misconfigured`].
#[instrument(skip(db))]
pub async fn check_database_setup<C>(db: &C) -> DatabaseStatus
where
    C: ConnectionTrait,
{
    let mut failures = Vec::new();

    if let Err(e) = Product::find().limit(1).all(db).await {
        failures.push(format!("products: {e}"));
    }
    if let Err(e) = Transaction::find().limit(1).all(db).await {
        failures.push(format!("transactions: {e}"));
    }
    if let Err(e) = EchoProduct::find().limit(1).all(db).await {
        failures.push(format!("echo_products: {e}"));
    }
    if let Err(e) = ProcessedFile::find().limit(1).all(db).await {
        failures.push(format!("processed_files: {e}"));
    }

    if failures.is_empty() {
        DatabaseStatus::Ready
    } else {
        warn!("Record store probe failed: {:?}", failures);
        DatabaseStatus::Misconfigured { failures }
    }
}
