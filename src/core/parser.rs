//! Transaction parser - Turns CSV export rows into transaction records.
//!
//! Expects a header row. Columns are located by header name when the header is
//! recognizable, otherwise the positional layout is assumed:
//! ```csv
//! productId,productName,lever,transactionDate,transactionAmount,transactionAmountUSD,earningDate
//! 7403E8B,A320 v2 Europe,Microsoft Flight Simulator,2025-04-16T10:00:00Z,100.00,100.00,
//! ```
//! Bad rows are logged and skipped; one bad row never aborts the batch.

use crate::errors::Result;
use chrono::NaiveDate;
use csv::{StringRecord, Trim};
use std::io::Read;
use tracing::{debug, warn};

/// One parsed sales line item
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransaction {
    /// Vendor product identifier
    pub product_id: String,
    /// Product name as written on the row
    pub product_name: String,
    /// Sales channel label
    pub lever: String,
    /// Sale date without time component
    pub transaction_date: NaiveDate,
    /// Sale amount
    pub transaction_amount: f64,
    /// USD-converted amount, if present
    pub transaction_amount_usd: Option<f64>,
    /// Earning date; the transaction date when the row leaves it blank
    pub earning_date: NaiveDate,
}

/// A row that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// 1-based line number in the export, header included
    pub line: u64,
    /// Why the row was skipped
    pub reason: String,
}

/// Result of parsing one export
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Valid rows, in export order
    pub transactions: Vec<ParsedTransaction>,
    /// Malformed rows
    pub rejected: Vec<RowRejection>,
    /// Rows without product id or name, dropped silently
    pub skipped_blank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    product_id: usize,
    product_name: usize,
    lever: usize,
    transaction_date: usize,
    transaction_amount: usize,
    transaction_amount_usd: Option<usize>,
    earning_date: Option<usize>,
}

impl ColumnMap {
    const POSITIONAL: Self = Self {
        product_id: 0,
        product_name: 1,
        lever: 2,
        transaction_date: 3,
        transaction_amount: 4,
        transaction_amount_usd: Some(5),
        earning_date: Some(6),
    };

    /// Locates columns by header name. Falls back to the positional layout
    /// when a required column cannot be found.
    fn from_headers(headers: &StringRecord) -> Self {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |aliases: &[&str]| {
            names
                .iter()
                .position(|name| aliases.contains(&name.as_str()))
        };

        let required = (
            find(&["productid", "id", "product", "sku"]),
            find(&["productname", "name", "title"]),
            find(&["lever", "channel", "saleschannel"]),
            find(&["transactiondate", "date", "saledate"]),
            find(&["transactionamount", "amount", "revenue"]),
        );

        match required {
            (
                Some(product_id),
                Some(product_name),
                Some(lever),
                Some(transaction_date),
                Some(transaction_amount),
            ) => Self {
                product_id,
                product_name,
                lever,
                transaction_date,
                transaction_amount,
                transaction_amount_usd: find(&["transactionamountusd", "amountusd", "usd"]),
                earning_date: find(&["earningdate", "earneddate"]),
            },
            _ => {
                debug!("Unrecognized header {:?}, using positional columns", headers);
                Self::POSITIONAL
            }
        }
    }

    fn required_len(&self) -> usize {
        [
            self.product_id,
            self.product_name,
            self.lever,
            self.transaction_date,
            self.transaction_amount,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
            + 1
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Parses a CSV export.
///
/// # Errors
/// Returns an error only when the header row itself cannot be read; row-level
/// problems are reported in [`ParseOutcome::rejected`].
pub fn parse_transactions<R: Read>(reader: R) -> Result<ParseOutcome> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(csv_reader.headers()?);
    let mut outcome = ParseOutcome::default();

    for (index, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(index as u64 + 2, csv::Position::line);
                warn!("Skipping unreadable row at line {}: {}", line, e);
                outcome.rejected.push(RowRejection {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map_or(index as u64 + 2, csv::Position::line);

        match parse_row(&record, &columns) {
            RowResult::Valid(transaction) => outcome.transactions.push(transaction),
            RowResult::Blank => outcome.skipped_blank += 1,
            RowResult::Invalid(reason) => {
                warn!("Skipping row at line {}: {}", line, reason);
                outcome.rejected.push(RowRejection { line, reason });
            }
        }
    }

    debug!(
        "Parsed {} transactions ({} rejected, {} blank)",
        outcome.transactions.len(),
        outcome.rejected.len(),
        outcome.skipped_blank
    );
    Ok(outcome)
}

enum RowResult {
    Valid(ParsedTransaction),
    Blank,
    Invalid(String),
}

fn parse_row(record: &StringRecord, columns: &ColumnMap) -> RowResult {
    let field = |index: usize| record.get(index).unwrap_or_default();
    let optional_field = |index: Option<usize>| {
        index
            .and_then(|i| record.get(i))
            .filter(|value| !value.is_empty())
    };

    let product_id = field(columns.product_id);
    let product_name = field(columns.product_name);
    if product_id.is_empty() || product_name.is_empty() {
        return RowResult::Blank;
    }

    if record.len() < columns.required_len() {
        return RowResult::Invalid(format!(
            "expected at least {} columns, found {}",
            columns.required_len(),
            record.len()
        ));
    }

    let Some(transaction_date) = parse_date(field(columns.transaction_date)) else {
        return RowResult::Invalid(format!(
            "invalid transaction date '{}'",
            field(columns.transaction_date)
        ));
    };

    let Some(transaction_amount) = coerce_amount(field(columns.transaction_amount)) else {
        return RowResult::Invalid(format!(
            "invalid transaction amount '{}'",
            field(columns.transaction_amount)
        ));
    };

    let transaction_amount_usd = match optional_field(columns.transaction_amount_usd) {
        None => None,
        Some(raw) => match coerce_amount(raw) {
            Some(amount) => Some(amount),
            None => return RowResult::Invalid(format!("invalid USD amount '{raw}'")),
        },
    };

    let earning_date = match optional_field(columns.earning_date) {
        None => transaction_date,
        Some(raw) => match parse_date(raw) {
            Some(date) => date,
            None => return RowResult::Invalid(format!("invalid earning date '{raw}'")),
        },
    };

    RowResult::Valid(ParsedTransaction {
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        lever: field(columns.lever).to_string(),
        transaction_date,
        transaction_amount,
        transaction_amount_usd,
        earning_date,
    })
}

/// Drops any time component (`2025-04-16T10:00:00Z`, `2025-04-16 10:00`).
#[must_use]
pub fn clean_date(raw: &str) -> &str {
    raw.split(['T', ' ']).next().unwrap_or(raw)
}

/// Parses a calendar date in `YYYY-MM-DD` or `MM/DD/YYYY` form, ignoring any
/// time component.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date = clean_date(raw.trim());
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%m/%d/%Y"))
        .ok()
}

/// Reads a monetary amount, ignoring every character other than digits, sign
/// and decimal point (`"$1,234.50"` is `1234.5`). Returns `None` when nothing
/// numeric remains.
#[must_use]
pub fn coerce_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}
