//! Dictionary reconciliation - Merges parsed transactions into the product dictionary.
//!
//! Existing entries are authoritative and pass through untouched, curated `is_echo`
//! flags included. Every unseen `product_id` yields exactly one new entry, in
//! first-seen order. Products sold through the edition channel under a name that
//! collides with another listing get the edition suffix so the dictionary can tell
//! the two apart.

use crate::{
    config::settings::{DisambiguationRule, ReconciliationSettings},
    core::parser::ParsedTransaction,
    entities::product,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of merging one batch into the dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Existing entries in their original order, followed by the new ones
    pub dictionary: Vec<product::Model>,
    /// Only the entries created by this batch
    pub added: Vec<product::Model>,
}

/// Merges a batch of transactions into the existing dictionary.
///
/// Pure function: running it again with its own output as `existing` and the
/// same batch adds nothing.
#[must_use]
pub fn reconcile(
    existing: &[product::Model],
    batch: &[ParsedTransaction],
    settings: &ReconciliationSettings,
) -> Reconciliation {
    let existing_ids: HashSet<&str> = existing.iter().map(|p| p.product_id.as_str()).collect();
    let index = BatchIndex::new(existing, &existing_ids, batch, settings);
    let mut staged: Vec<product::Model> = Vec::new();
    let mut staged_index: HashMap<&str, usize> = HashMap::new();

    for transaction in batch {
        if !is_listed(transaction) || existing_ids.contains(transaction.product_id.as_str()) {
            continue;
        }

        let name = display_name(transaction, &index, settings);

        if let Some(&position) = staged_index.get(transaction.product_id.as_str()) {
            let entry = &mut staged[position];
            let suffix = settings.edition_suffix.as_str();
            if name.ends_with(suffix) && !entry.product_name.ends_with(suffix) {
                debug!(
                    "Renaming staged product {} to '{}'",
                    entry.product_id, name
                );
                entry.product_name = name;
            }
            continue;
        }

        staged_index.insert(transaction.product_id.as_str(), staged.len());
        staged.push(product::Model {
            product_id: transaction.product_id.clone(),
            product_name: name,
            date: transaction.earning_date,
            is_echo: false,
        });
    }

    debug!(
        "Reconciled {} existing products with {} new",
        existing.len(),
        staged.len()
    );

    let mut dictionary = existing.to_vec();
    dictionary.extend(staged.iter().cloned());
    Reconciliation {
        dictionary,
        added: staged,
    }
}

fn is_listed(transaction: &ParsedTransaction) -> bool {
    !transaction.product_id.is_empty() && !transaction.product_name.is_empty()
}

/// Name lookups over the whole batch, built once so the outcome does not depend
/// on row order.
struct BatchIndex<'a> {
    /// (`product_id`, name) pairs sold outside the edition channel
    other_channel: HashSet<(&'a str, &'a str)>,
    /// New product ids carrying each name
    new_ids_by_name: HashMap<&'a str, HashSet<&'a str>>,
    /// Names already in the dictionary
    existing_names: HashSet<&'a str>,
}

impl<'a> BatchIndex<'a> {
    fn new(
        existing: &'a [product::Model],
        existing_ids: &HashSet<&str>,
        batch: &'a [ParsedTransaction],
        settings: &ReconciliationSettings,
    ) -> Self {
        let mut other_channel = HashSet::new();
        let mut new_ids_by_name: HashMap<&str, HashSet<&str>> = HashMap::new();

        for transaction in batch.iter().filter(|t| is_listed(t)) {
            let id = transaction.product_id.as_str();
            let name = transaction.product_name.as_str();
            if transaction.lever != settings.edition_lever {
                other_channel.insert((id, name));
            }
            if !existing_ids.contains(id) {
                new_ids_by_name.entry(name).or_default().insert(id);
            }
        }

        Self {
            other_channel,
            new_ids_by_name,
            existing_names: existing.iter().map(|p| p.product_name.as_str()).collect(),
        }
    }

    fn sold_on_other_channel(&self, product_id: &str, name: &str) -> bool {
        self.other_channel.contains(&(product_id, name))
    }

    fn shared_with_new_product(&self, product_id: &str, name: &str) -> bool {
        self.new_ids_by_name
            .get(name)
            .is_some_and(|ids| ids.iter().any(|id| *id != product_id))
    }
}

fn display_name(
    transaction: &ParsedTransaction,
    index: &BatchIndex<'_>,
    settings: &ReconciliationSettings,
) -> String {
    let id = transaction.product_id.as_str();
    let name = transaction.product_name.as_str();
    let suffix = settings.edition_suffix.as_str();
    if transaction.lever != settings.edition_lever || name.ends_with(suffix) {
        return name.to_string();
    }

    let collides = index.sold_on_other_channel(id, name)
        || index.shared_with_new_product(id, name)
        || (settings.rule == DisambiguationRule::AnyDuplicate
            && index.existing_names.contains(name));

    if collides {
        format!("{name}{suffix}")
    } else {
        name.to_string()
    }
}
