//! Shared test utilities for the sales dashboard.
//!
//! This module provides helpers for setting up test databases and building
//! parsed rows, dictionary entries and stored transactions with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    config::settings::Settings,
    core::parser::ParsedTransaction,
    entities::{product, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Default settings without retry delays.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.persistence.retry_delay_ms = 0;
    settings
}

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// Builds a parsed export row.
///
/// # Defaults
/// * `earning_date`: same as the transaction date
/// * `transaction_amount_usd`: None
pub fn parsed(
    product_id: &str,
    product_name: &str,
    lever: &str,
    date: &str,
    amount: f64,
) -> ParsedTransaction {
    ParsedTransaction {
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        lever: lever.to_string(),
        transaction_date: day(date),
        transaction_amount: amount,
        transaction_amount_usd: None,
        earning_date: day(date),
    }
}

/// Builds a dictionary entry.
pub fn product_entry(product_id: &str, name: &str, date: &str, is_echo: bool) -> product::Model {
    product::Model {
        product_id: product_id.to_string(),
        product_name: name.to_string(),
        date: day(date),
        is_echo,
    }
}

/// Builds a stored transaction row on the base lever.
pub fn stored(product_id: &str, name: &str, date: &str, amount: f64) -> transaction::Model {
    transaction::Model {
        id: 0,
        product_id: product_id.to_string(),
        product_name: name.to_string(),
        lever: "Base".to_string(),
        transaction_date: day(date),
        transaction_amount: amount,
        transaction_amount_usd: None,
        earning_date: Some(day(date)),
    }
}
