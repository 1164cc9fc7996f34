//! Report generation business logic.
//!
//! Filters stored transactions by date range and echo flag, sums them per product
//! and returns the totals sorted from highest to lowest. Formatting helpers turn
//! the result into the copyable text summary shown next to the report table.

use crate::{
    core::{product::get_product_dictionary, transaction::get_transactions},
    entities::{product, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Report filters. Both date bounds are inclusive and optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportQuery {
    /// First day included, open when `None`
    pub start_date: Option<NaiveDate>,
    /// Last day included, open when `None`
    pub end_date: Option<NaiveDate>,
    /// Keep only products flagged `is_echo`
    pub echo_only: bool,
}

impl ReportQuery {
    /// Whether a transaction date falls inside the range
    #[must_use]
    pub fn includes(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    /// Product the total belongs to
    pub product_id: String,
    /// Dictionary name, or the transaction's own name when unknown
    pub name: String,
    /// Sum of matching amounts, rounded to cents
    pub total: f64,
}

/// Aggregated report for one query
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Filters that produced this report
    pub query: ReportQuery,
    /// Per-product totals, highest first
    pub items: Vec<ReportItem>,
    /// Sum of all item totals, rounded to cents
    pub total: f64,
}

impl Report {
    /// Builds a report from already aggregated items
    #[must_use]
    pub fn new(query: ReportQuery, items: Vec<ReportItem>) -> Self {
        let total = round_cents(items.iter().map(|item| item.total).sum());
        Self {
            query,
            items,
            total,
        }
    }

    /// An empty report is a valid answer, not an error
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plain-text summary for copying:
    ///
    /// ```text
    /// Sales Report (2025-04-01 to Present)
    ///
    /// A320 v2 Europe: $200.00
    ///
    /// Total: $200.00
    /// ```
    #[must_use]
    pub fn summary_text(&self) -> String {
        let start = self
            .query
            .start_date
            .map_or_else(|| "All time".to_string(), |d| d.to_string());
        let end = self
            .query
            .end_date
            .map_or_else(|| "Present".to_string(), |d| d.to_string());
        let lines: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("{}: {}", item.name, format_currency(item.total)))
            .collect();

        format!(
            "Sales Report ({start} to {end})\n\n{}\n\nTotal: {}",
            lines.join("\n"),
            format_currency(self.total)
        )
    }
}

/// Rounds to two decimal places
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Groups transactions per product and sums them.
///
/// Rows without product id or name are ignored, as are rows outside the date
/// range and, when `echo_only` is set, rows whose product is not flagged in the
/// dictionary. Non-finite amounts count as zero. Ties keep first-grouped order.
#[must_use]
pub fn aggregate(
    dictionary: &[product::Model],
    transactions: &[transaction::Model],
    query: &ReportQuery,
) -> Vec<ReportItem> {
    let by_id: HashMap<&str, &product::Model> = dictionary
        .iter()
        .map(|p| (p.product_id.as_str(), p))
        .collect();
    let echo_ids: HashSet<&str> = dictionary
        .iter()
        .filter(|p| p.is_echo)
        .map(|p| p.product_id.as_str())
        .collect();

    let mut items: Vec<ReportItem> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for tx in transactions {
        if tx.product_id.is_empty() || tx.product_name.is_empty() {
            continue;
        }
        if !query.includes(tx.transaction_date) {
            continue;
        }
        if query.echo_only && !echo_ids.contains(tx.product_id.as_str()) {
            continue;
        }

        let amount = if tx.transaction_amount.is_finite() {
            tx.transaction_amount
        } else {
            0.0
        };

        if let Some(&position) = positions.get(tx.product_id.as_str()) {
            items[position].total += amount;
        } else {
            let name = by_id
                .get(tx.product_id.as_str())
                .map_or_else(|| tx.product_name.clone(), |p| p.product_name.clone());
            positions.insert(tx.product_id.as_str(), items.len());
            items.push(ReportItem {
                product_id: tx.product_id.clone(),
                name,
                total: amount,
            });
        }
    }

    for item in &mut items {
        item.total = round_cents(item.total);
    }
    // Stable: equal totals keep their grouping order
    items.sort_by(|a, b| b.total.total_cmp(&a.total));
    items
}

/// Loads the dictionary and transactions and aggregates them.
///
/// # Errors
/// Returns an error if either collection cannot be read. An empty report is
/// returned as `Ok`.
#[instrument(skip(db))]
pub async fn generate_report<C>(db: &C, query: ReportQuery) -> Result<Report>
where
    C: ConnectionTrait,
{
    let dictionary = get_product_dictionary(db).await?;
    let transactions = get_transactions(db).await?;
    let items = aggregate(&dictionary, &transactions, &query);
    debug!(
        "Report over {} transactions produced {} items",
        transactions.len(),
        items.len()
    );
    Ok(Report::new(query, items))
}

/// Formats an amount as dollars with thousands separators, e.g. `"$1,234.50"`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let rounds_to_zero = formatted.chars().all(|c| c == '0' || c == '.');
    let sign = if amount < 0.0 && !rounds_to_zero {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

/// Human-readable label for the report's date range
#[must_use]
pub fn date_range_label(query: &ReportQuery) -> String {
    match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => format!("{start} - {end}"),
        (Some(start), None) => format!("From {start}"),
        (None, Some(end)) => format!("Until {end}"),
        (None, None) => "All time".to_string(),
    }
}

/// Suggestions shown when a report comes back empty
#[must_use]
pub fn empty_report_hints(query: &ReportQuery) -> Vec<&'static str> {
    let mut hints = Vec::new();
    if query.start_date.is_some() || query.end_date.is_some() {
        hints.push("Try adjusting the date range");
    }
    if query.echo_only {
        hints.push("Echo Products Only is selected; check that products are flagged as Echo");
    }
    hints.push("Make sure a file has been processed successfully");
    hints
}
