//! Transaction gateway - Stores and retrieves imported sales line items.
//!
//! Rows are upserted on (`product_id`, `transaction_date`). Re-importing an export
//! therefore replaces the stored rows instead of appending duplicates. When one
//! batch holds several rows for the same key, the last row wins, matching what a
//! sequence of single-row upserts would leave behind.

use crate::{
    core::parser::ParsedTransaction,
    entities::{Transaction, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::OnConflict};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Retrieves every stored transaction, oldest first.
pub async fn get_transactions<C>(db: &C) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .order_by_asc(transaction::Column::TransactionDate)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the stored transactions of one product, oldest first.
pub async fn get_transactions_for_product<C>(
    db: &C,
    product_id: &str,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::ProductId.eq(product_id))
        .order_by_asc(transaction::Column::TransactionDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Collapses rows sharing (`product_id`, `transaction_date`), keeping the last row
/// at the position of the first.
#[must_use]
pub fn collapse_by_key(batch: &[ParsedTransaction]) -> Vec<&ParsedTransaction> {
    let mut rows: Vec<&ParsedTransaction> = Vec::with_capacity(batch.len());
    let mut index: HashMap<(&str, NaiveDate), usize> = HashMap::new();

    for row in batch {
        let key = (row.product_id.as_str(), row.transaction_date);
        if let Some(&position) = index.get(&key) {
            rows[position] = row;
        } else {
            index.insert(key, rows.len());
            rows.push(row);
        }
    }
    rows
}

fn to_active_model(row: &ParsedTransaction) -> transaction::ActiveModel {
    transaction::ActiveModel {
        product_id: Set(row.product_id.clone()),
        product_name: Set(row.product_name.clone()),
        lever: Set(row.lever.clone()),
        transaction_date: Set(row.transaction_date),
        transaction_amount: Set(row.transaction_amount),
        transaction_amount_usd: Set(row.transaction_amount_usd),
        earning_date: Set(Some(row.earning_date)),
        ..Default::default()
    }
}

/// Upserts a batch of parsed transactions inside one database transaction.
/// Returns the number of distinct rows written.
#[instrument(skip(db, batch), fields(rows = batch.len()))]
pub async fn save_transactions(
    db: &DatabaseConnection,
    batch: &[ParsedTransaction],
    batch_size: usize,
) -> Result<usize> {
    let rows = collapse_by_key(batch);
    if rows.is_empty() {
        return Ok(0);
    }
    if rows.len() < batch.len() {
        debug!(
            "Collapsed {} rows sharing a product and date",
            batch.len() - rows.len()
        );
    }

    let txn = db.begin().await?;
    for chunk in rows.chunks(batch_size.max(1)) {
        Transaction::insert_many(chunk.iter().map(|row| to_active_model(row)))
            .on_conflict(
                OnConflict::columns([
                    transaction::Column::ProductId,
                    transaction::Column::TransactionDate,
                ])
                .update_columns([
                    transaction::Column::ProductName,
                    transaction::Column::Lever,
                    transaction::Column::TransactionAmount,
                    transaction::Column::TransactionAmountUsd,
                    transaction::Column::EarningDate,
                ])
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    info!("Saved {} transactions", rows.len());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_collapse_by_key_last_row_wins() {
        let batch = vec![
            parsed("A", "Foo", "Base", "2025-04-16", 10.0),
            parsed("B", "Bar", "Base", "2025-04-16", 3.0),
            parsed("A", "Foo", "Base", "2025-04-16", 12.0),
            parsed("A", "Foo", "Base", "2025-04-17", 1.0),
        ];

        let rows = collapse_by_key(&batch);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].product_id, "A");
        assert_eq!(rows[0].transaction_amount, 12.0);
        assert_eq!(rows[1].product_id, "B");
        assert_eq!(rows[2].transaction_amount, 1.0);
    }

    #[tokio::test]
    async fn test_save_and_fetch_transactions() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = vec![
            parsed("A", "Foo", "Base", "2025-04-17", 10.0),
            parsed("B", "Bar", "Base", "2025-04-16", 5.0),
        ];

        let saved = save_transactions(&db, &batch, 1).await?;
        assert_eq!(saved, 2);

        let stored = get_transactions(&db).await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].product_id, "B");
        assert_eq!(stored[1].transaction_amount, 10.0);
        assert_eq!(stored[1].earning_date, Some(stored[1].transaction_date));
        Ok(())
    }

    #[tokio::test]
    async fn test_reimport_replaces_rows() -> Result<()> {
        let db = setup_test_db().await?;
        save_transactions(&db, &[parsed("A", "Foo", "Base", "2025-04-16", 10.0)], 10).await?;
        save_transactions(&db, &[parsed("A", "Foo", "Base", "2025-04-16", 25.0)], 10).await?;

        let stored = get_transactions_for_product(&db, "A").await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].transaction_amount, 25.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_empty_batch() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(save_transactions(&db, &[], 10).await?, 0);
        assert!(get_transactions(&db).await?.is_empty());
        Ok(())
    }
}
