//! Product dictionary gateway - Reads and writes the `products` collection and
//! keeps the `echo_products` cache in step with it.
//!
//! Writes are upserts keyed on `product_id`, chunked to keep statements small, and
//! run inside a single database transaction so a failure leaves the stored
//! dictionary unchanged. After every save the echo cache is rebuilt from the stored
//! products.

use crate::{
    entities::{EchoProduct, Product, echo_product, product},
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, Set, TransactionTrait, prelude::*, sea_query::OnConflict,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Retrieves the whole dictionary, most recent `date` first.
///
/// Products sharing a date are ordered by identifier so the listing is stable.
pub async fn get_product_dictionary<C>(db: &C) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .order_by_desc(product::Column::Date)
        .order_by_asc(product::Column::ProductId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a single dictionary entry.
pub async fn get_product_by_id<C>(db: &C, product_id: &str) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the echo cache, most recent `date` first.
pub async fn get_echo_products<C>(db: &C) -> Result<Vec<echo_product::Model>>
where
    C: ConnectionTrait,
{
    EchoProduct::find()
        .order_by_desc(echo_product::Column::Date)
        .order_by_asc(echo_product::Column::ProductId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Checks that a product can be stored.
///
/// # Errors
/// Returns [`Error::InvalidProduct`] when the identifier or name is blank.
pub fn validate_product(product: &product::Model) -> Result<()> {
    if product.product_id.trim().is_empty() {
        return Err(Error::InvalidProduct {
            message: "Product id cannot be empty".to_string(),
        });
    }
    if product.product_name.trim().is_empty() {
        return Err(Error::InvalidProduct {
            message: format!("Product '{}' has an empty name", product.product_id),
        });
    }
    Ok(())
}

/// Checks every product and rejects duplicate identifiers.
pub fn validate_dictionary(products: &[product::Model]) -> Result<()> {
    let mut seen = HashSet::new();
    for product in products {
        validate_product(product)?;
        if !seen.insert(product.product_id.as_str()) {
            return Err(Error::InvalidProduct {
                message: format!("Duplicate product id '{}'", product.product_id),
            });
        }
    }
    Ok(())
}

fn to_active_model(product: &product::Model) -> product::ActiveModel {
    product::ActiveModel {
        product_id: Set(product.product_id.clone()),
        product_name: Set(product.product_name.clone()),
        date: Set(product.date),
        is_echo: Set(product.is_echo),
    }
}

/// Inserts or updates products by `product_id`.
pub async fn upsert_products<C>(
    db: &C,
    products: &[product::Model],
    batch_size: usize,
) -> Result<()>
where
    C: ConnectionTrait,
{
    for chunk in products.chunks(batch_size.max(1)) {
        Product::insert_many(chunk.iter().map(to_active_model))
            .on_conflict(
                OnConflict::column(product::Column::ProductId)
                    .update_columns([
                        product::Column::ProductName,
                        product::Column::Date,
                        product::Column::IsEcho,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }
    Ok(())
}

/// Deletes products and their echo rows. Returns how many products were removed.
pub async fn delete_products<C>(db: &C, product_ids: &[String]) -> Result<u64>
where
    C: ConnectionTrait,
{
    if product_ids.is_empty() {
        return Ok(0);
    }

    EchoProduct::delete_many()
        .filter(echo_product::Column::ProductId.is_in(product_ids.iter().cloned()))
        .exec(db)
        .await?;
    let result = Product::delete_many()
        .filter(product::Column::ProductId.is_in(product_ids.iter().cloned()))
        .exec(db)
        .await?;

    debug!("Deleted {} products", result.rows_affected);
    Ok(result.rows_affected)
}

/// Rebuilds the echo cache from the stored dictionary: flagged products are
/// upserted, rows whose product is no longer flagged are pruned.
pub async fn refresh_echo_products<C>(db: &C, batch_size: usize) -> Result<usize>
where
    C: ConnectionTrait,
{
    let flagged = Product::find()
        .filter(product::Column::IsEcho.eq(true))
        .all(db)
        .await?;

    if flagged.is_empty() {
        EchoProduct::delete_many().exec(db).await?;
        return Ok(0);
    }

    for chunk in flagged.chunks(batch_size.max(1)) {
        let rows = chunk.iter().map(|p| echo_product::ActiveModel {
            product_id: Set(p.product_id.clone()),
            product_name: Set(p.product_name.clone()),
            date: Set(p.date),
        });
        EchoProduct::insert_many(rows)
            .on_conflict(
                OnConflict::column(echo_product::Column::ProductId)
                    .update_columns([
                        echo_product::Column::ProductName,
                        echo_product::Column::Date,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    EchoProduct::delete_many()
        .filter(
            echo_product::Column::ProductId
                .is_not_in(flagged.iter().map(|p| p.product_id.clone())),
        )
        .exec(db)
        .await?;

    Ok(flagged.len())
}

/// Applies a set of dictionary changes atomically: deletions first, then upserts,
/// then the echo cache rebuild.
///
/// # Errors
/// Returns an error if validation fails or any statement fails; nothing is
/// committed in that case.
#[instrument(skip(db, products, deletions), fields(products = products.len(), deletions = deletions.len()))]
pub async fn save_dictionary_changes(
    db: &DatabaseConnection,
    products: &[product::Model],
    deletions: &[String],
    batch_size: usize,
) -> Result<()> {
    validate_dictionary(products)?;

    let txn = db.begin().await?;
    delete_products(&txn, deletions).await?;
    upsert_products(&txn, products, batch_size).await?;
    let echo_count = refresh_echo_products(&txn, batch_size).await?;
    txn.commit().await?;

    info!(
        "Saved {} products ({} deleted, {} echo)",
        products.len(),
        deletions.len(),
        echo_count
    );
    Ok(())
}

/// Upserts the given products and rebuilds the echo cache.
pub async fn save_product_dictionary(
    db: &DatabaseConnection,
    products: &[product::Model],
    batch_size: usize,
) -> Result<()> {
    save_dictionary_changes(db, products, &[], batch_size).await
}
