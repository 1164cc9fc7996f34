//! Dictionary editor - Working copy of the product dictionary for the control panel.
//!
//! Edits, additions, removals and JSON imports change only the working set. Nothing
//! reaches the record store until [`DictionaryEditor::save`], which applies pending
//! deletions and upserts in one database transaction and rebuilds the echo cache.

use crate::{
    core::product::{get_product_dictionary, save_dictionary_changes, validate_dictionary},
    entities::product,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument};

/// Name given to products added from the control panel
pub const NEW_PRODUCT_NAME: &str = "New Product";

/// Serializes products as the dictionary JSON document (an array of products).
pub fn export_dictionary_json(products: &[product::Model]) -> Result<String> {
    serde_json::to_string_pretty(products).map_err(Into::into)
}

/// Parses and validates a dictionary JSON document.
///
/// # Errors
/// Returns [`Error::Json`] for malformed documents and [`Error::InvalidProduct`]
/// for blank names, blank identifiers or duplicate identifiers.
pub fn parse_dictionary_json(json: &str) -> Result<Vec<product::Model>> {
    let products: Vec<product::Model> = serde_json::from_str(json)?;
    validate_dictionary(&products)?;
    Ok(products)
}

/// Working copy of the dictionary
#[derive(Debug, Clone, Default)]
pub struct DictionaryEditor {
    products: Vec<product::Model>,
    persisted_ids: HashSet<String>,
    pending_deletions: BTreeSet<String>,
}

impl DictionaryEditor {
    /// Starts editing the stored dictionary.
    pub async fn load(db: &DatabaseConnection) -> Result<Self> {
        let products = get_product_dictionary(db).await?;
        Ok(Self::from_products(products))
    }

    /// Starts editing a dictionary that is already stored as given.
    #[must_use]
    pub fn from_products(products: Vec<product::Model>) -> Self {
        let persisted_ids = products.iter().map(|p| p.product_id.clone()).collect();
        Self {
            products,
            persisted_ids,
            pending_deletions: BTreeSet::new(),
        }
    }

    /// Current working set
    #[must_use]
    pub fn products(&self) -> &[product::Model] {
        &self.products
    }

    /// Identifiers that will be deleted on save
    #[must_use]
    pub fn pending_deletions(&self) -> Vec<String> {
        self.pending_deletions.iter().cloned().collect()
    }

    /// Whether any stored product will be deleted on save
    #[must_use]
    pub fn has_pending_deletions(&self) -> bool {
        !self.pending_deletions.is_empty()
    }

    fn position(&self, product_id: &str) -> Result<usize> {
        self.products
            .iter()
            .position(|p| p.product_id == product_id)
            .ok_or_else(|| Error::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    fn next_product_id(&self) -> String {
        let taken: HashSet<&str> = self.products.iter().map(|p| p.product_id.as_str()).collect();
        (1..)
            .map(|n| format!("P-{n:04}"))
            .find(|id| !taken.contains(id.as_str()) && !self.pending_deletions.contains(id))
            .unwrap_or_default()
    }

    /// Appends a placeholder product dated `date` and returns it.
    pub fn add_product(&mut self, date: NaiveDate) -> &product::Model {
        let product = product::Model {
            product_id: self.next_product_id(),
            product_name: NEW_PRODUCT_NAME.to_string(),
            date,
            is_echo: false,
        };
        self.products.push(product);
        &self.products[self.products.len() - 1]
    }

    /// Changes a product's display name.
    pub fn rename(&mut self, product_id: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidProduct {
                message: "Product name cannot be empty".to_string(),
            });
        }
        let index = self.position(product_id)?;
        self.products[index].product_name = name.trim().to_string();
        Ok(())
    }

    /// Flags or unflags a product as echo.
    pub fn set_echo(&mut self, product_id: &str, is_echo: bool) -> Result<()> {
        let index = self.position(product_id)?;
        self.products[index].is_echo = is_echo;
        Ok(())
    }

    /// Changes a product's date.
    pub fn set_date(&mut self, product_id: &str, date: NaiveDate) -> Result<()> {
        let index = self.position(product_id)?;
        self.products[index].date = date;
        Ok(())
    }

    /// Removes a product from the working set. Stored products are deleted on save.
    pub fn remove(&mut self, product_id: &str) -> Result<product::Model> {
        let index = self.position(product_id)?;
        let removed = self.products.remove(index);
        if self.persisted_ids.contains(&removed.product_id) {
            self.pending_deletions.insert(removed.product_id.clone());
        }
        Ok(removed)
    }

    /// Serializes the working set.
    pub fn export_json(&self) -> Result<String> {
        export_dictionary_json(&self.products)
    }

    /// Replaces the working set with the products of a JSON document. Stored
    /// products missing from the document are deleted on save. Returns the number
    /// of imported products.
    ///
    /// # Errors
    /// Leaves the working set untouched when the document is invalid.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let products = parse_dictionary_json(json)?;
        let imported: HashSet<&str> = products.iter().map(|p| p.product_id.as_str()).collect();

        self.pending_deletions = self
            .persisted_ids
            .iter()
            .filter(|id| !imported.contains(id.as_str()))
            .cloned()
            .collect();
        let count = products.len();
        self.products = products;
        Ok(count)
    }

    /// Writes the working set to the record store.
    #[instrument(skip(self, db))]
    pub async fn save(&mut self, db: &DatabaseConnection, batch_size: usize) -> Result<()> {
        let deletions = self.pending_deletions();
        save_dictionary_changes(db, &self.products, &deletions, batch_size).await?;

        self.persisted_ids = self.products.iter().map(|p| p.product_id.clone()).collect();
        self.pending_deletions.clear();
        info!(
            "Dictionary editor saved {} products, deleted {}",
            self.products.len(),
            deletions.len()
        );
        Ok(())
    }
}
