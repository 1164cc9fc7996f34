//! Export processing workflow.
//!
//! Runs one accepted export through the pipeline: re-processing guard, parse,
//! dictionary fetch, reconciliation, then the dictionary and transaction saves.
//! The two saves are independent, so the outcome distinguishes full success from
//! partial and complete failure instead of reporting everything as processed.

use crate::{
    config::settings::Settings,
    core::{
        parser::{RowRejection, parse_transactions},
        product::{get_product_dictionary, save_product_dictionary},
        reconcile::reconcile,
        retry::with_retry,
        transaction::save_transactions,
        upload::ExportFile,
    },
    entities::{ProcessedFile, processed_file},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tracing::{error, info, instrument, warn};

/// How a processing run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Dictionary and transactions were both saved
    Success,
    /// One of the two saves failed
    Partial,
    /// Nothing was saved
    Failed,
    /// The same content was processed before; nothing was written
    AlreadyProcessed,
}

/// One backend failure during a processing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// Step that failed, e.g. `"save transactions"`
    pub stage: &'static str,
    /// Error message
    pub message: String,
    /// Whether running again may succeed
    pub transient: bool,
}

impl ProcessFailure {
    fn new(stage: &'static str, error: &Error) -> Self {
        Self {
            stage,
            message: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

/// Summary of a processing run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Final status
    pub status: ProcessStatus,
    /// Name of the processed upload
    pub file_name: String,
    /// Valid rows parsed
    pub parsed: usize,
    /// Rows skipped as malformed
    pub rejected: Vec<RowRejection>,
    /// Rows without product id or name
    pub skipped_blank: usize,
    /// Dictionary entries created by this run
    pub products_added: usize,
    /// Distinct transaction rows written
    pub transactions_saved: usize,
    /// Backend errors, in the order they happened
    pub failures: Vec<ProcessFailure>,
}

impl ProcessOutcome {
    fn new(file_name: &str, status: ProcessStatus) -> Self {
        Self {
            status,
            file_name: file_name.to_string(),
            parsed: 0,
            rejected: Vec::new(),
            skipped_blank: 0,
            products_added: 0,
            transactions_saved: 0,
            failures: Vec::new(),
        }
    }

    /// Whether every failure was transient, so processing the file again may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.failures.is_empty() && self.failures.iter().all(|f| f.transient)
    }
}

/// Whether content with this hash was already processed successfully
pub async fn is_file_processed<C>(db: &C, content_hash: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(ProcessedFile::find_by_id(content_hash.to_string())
        .one(db)
        .await?
        .is_some())
}

/// Records a successfully processed export
pub async fn record_processed_file<C>(
    db: &C,
    export: &ExportFile,
    transaction_count: usize,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let row = processed_file::ActiveModel {
        content_hash: Set(export.content_hash.clone()),
        file_name: Set(export.file_name.clone()),
        transaction_count: Set(i64::try_from(transaction_count).unwrap_or(i64::MAX)),
        processed_at: Set(chrono::Utc::now().naive_utc()),
    };
    ProcessedFile::insert(row)
        .on_conflict(
            OnConflict::column(processed_file::Column::ContentHash)
                .update_columns([
                    processed_file::Column::FileName,
                    processed_file::Column::TransactionCount,
                    processed_file::Column::ProcessedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Processes one export end to end.
///
/// # Errors
/// Returns an error only when the export cannot be read as CSV at all. Backend
/// failures are reported through [`ProcessOutcome::status`] and
/// [`ProcessOutcome::failures`].
#[instrument(skip(db, settings, export), fields(file = %export.file_name))]
pub async fn process_export(
    db: &DatabaseConnection,
    settings: &Settings,
    export: &ExportFile,
) -> Result<ProcessOutcome> {
    let policy = &settings.persistence;

    match is_file_processed(db, &export.content_hash).await {
        Ok(true) => {
            info!("Export '{}' was already processed, skipping", export.file_name);
            return Ok(ProcessOutcome::new(
                &export.file_name,
                ProcessStatus::AlreadyProcessed,
            ));
        }
        Ok(false) => {}
        Err(e) => warn!("Could not check processed files: {}", e),
    }

    let parsed = parse_transactions(export.content.as_slice())?;
    let mut outcome = ProcessOutcome::new(&export.file_name, ProcessStatus::Failed);
    outcome.parsed = parsed.transactions.len();
    outcome.skipped_blank = parsed.skipped_blank;
    outcome.rejected = parsed.rejected;

    let existing = match with_retry(policy, "Fetching product dictionary", || {
        get_product_dictionary(db)
    })
    .await
    {
        Ok(existing) => existing,
        Err(e) => {
            error!("Failed to fetch product dictionary: {}", e);
            outcome.failures.push(ProcessFailure::new("fetch dictionary", &e));
            return Ok(outcome);
        }
    };

    let merged = reconcile(&existing, &parsed.transactions, &settings.reconciliation);

    let dictionary_saved = match with_retry(policy, "Saving product dictionary", || {
        save_product_dictionary(db, &merged.dictionary, policy.batch_size)
    })
    .await
    {
        Ok(()) => {
            outcome.products_added = merged.added.len();
            true
        }
        Err(e) => {
            error!("Failed to save product dictionary: {}", e);
            outcome.failures.push(ProcessFailure::new("save dictionary", &e));
            false
        }
    };

    let transactions_saved = match with_retry(policy, "Saving transactions", || {
        save_transactions(db, &parsed.transactions, policy.batch_size)
    })
    .await
    {
        Ok(count) => {
            outcome.transactions_saved = count;
            true
        }
        Err(e) => {
            error!("Failed to save transactions: {}", e);
            outcome.failures.push(ProcessFailure::new("save transactions", &e));
            false
        }
    };

    outcome.status = match (dictionary_saved, transactions_saved) {
        (true, true) => ProcessStatus::Success,
        (false, false) => ProcessStatus::Failed,
        _ => ProcessStatus::Partial,
    };

    if outcome.status == ProcessStatus::Success {
        if let Err(e) = record_processed_file(db, export, outcome.transactions_saved).await {
            warn!("Could not record processed export: {}", e);
        }
    }

    info!(
        "Processed '{}': {:?}, {} rows, {} rejected, {} new products, {} transactions saved",
        outcome.file_name,
        outcome.status,
        outcome.parsed,
        outcome.rejected.len(),
        outcome.products_added,
        outcome.transactions_saved
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{
        product::get_product_dictionary, transaction::get_transactions, upload::load_export,
    };
    use crate::test_utils::*;
    use crate::entities::product;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, RuntimeErr};

    const EXPORT: &str = "\
productId,productName,lever,transactionDate,transactionAmount,transactionAmountUSD,earningDate
X,Foo,Microsoft Flight Simulator,2025-04-16,100,100,2025-04-16
X,Foo,Microsoft Flight Simulator 2024,2025-04-17,50,50,2025-04-17
Y,Bar,Microsoft Flight Simulator,2025-04-17T12:00:00Z,20,,
,Ghost,Microsoft Flight Simulator,2025-04-17,20,,
Z,Broken,Microsoft Flight Simulator,2025-04-17,abc,,
";

    fn export() -> ExportFile {
        load_export("april.csv", EXPORT.as_bytes().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_process_export_success() -> Result<()> {
        let db = setup_test_db().await?;
        let outcome = process_export(&db, &test_settings(), &export()).await?;

        assert_eq!(outcome.status, ProcessStatus::Success);
        assert_eq!(outcome.parsed, 3);
        assert_eq!(outcome.skipped_blank, 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.products_added, 2);
        assert_eq!(outcome.transactions_saved, 3);
        assert!(outcome.failures.is_empty());

        let dictionary = get_product_dictionary(&db).await?;
        let foo = dictionary.iter().find(|p| p.product_id == "X").unwrap();
        assert_eq!(foo.product_name, "Foo (2024)");
        assert_eq!(get_transactions(&db).await?.len(), 3);
        assert!(is_file_processed(&db, &export().content_hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_reprocessing_same_content_is_skipped() -> Result<()> {
        let db = setup_test_db().await?;
        process_export(&db, &test_settings(), &export()).await?;

        let renamed = load_export("april-copy.csv", EXPORT.as_bytes().to_vec())?;
        let outcome = process_export(&db, &test_settings(), &renamed).await?;

        assert_eq!(outcome.status, ProcessStatus::AlreadyProcessed);
        assert_eq!(outcome.transactions_saved, 0);
        assert_eq!(get_product_dictionary(&db).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_curated_echo_flag_survives_processing() -> Result<()> {
        let db = setup_test_db().await?;
        crate::core::product::save_product_dictionary(
            &db,
            &[product_entry("Y", "Bar Curated", "2025-01-01", true)],
            10,
        )
        .await?;

        process_export(&db, &test_settings(), &export()).await?;

        let bar = crate::core::product::get_product_by_id(&db, "Y")
            .await?
            .unwrap();
        assert!(bar.is_echo);
        assert_eq!(bar.product_name, "Bar Curated");
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_failure_reports_failed() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([
                DbErr::Custom("processed_files unavailable".to_string()),
                DbErr::Custom("products unavailable".to_string()),
            ])
            .into_connection();

        let outcome = process_export(&db, &test_settings(), &export()).await?;

        assert_eq!(outcome.status, ProcessStatus::Failed);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, "fetch dictionary");
        assert!(!outcome.failures[0].transient);
        assert!(!outcome.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_is_retryable() -> Result<()> {
        let lost = || DbErr::Conn(RuntimeErr::Internal("connection reset".to_string()));
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<processed_file::Model>::new()])
            .append_query_errors([lost(), lost(), lost()])
            .into_connection();

        let outcome = process_export(&db, &test_settings(), &export()).await?;

        assert_eq!(outcome.status, ProcessStatus::Failed);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].transient);
        assert!(outcome.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_save_failure_is_partial() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            // processed-file lookup, dictionary fetch, flagged products for the echo rebuild
            .append_query_results([Vec::<processed_file::Model>::new()])
            .append_query_results([Vec::<product::Model>::new()])
            .append_query_results([Vec::<product::Model>::new()])
            // product upsert, echo cache clear
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .append_exec_errors([DbErr::Custom("transactions unavailable".to_string())])
            .into_connection();

        let outcome = process_export(&db, &test_settings(), &export()).await?;

        assert_eq!(outcome.status, ProcessStatus::Partial);
        assert_eq!(outcome.products_added, 2);
        assert_eq!(outcome.transactions_saved, 0);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, "save transactions");
        assert!(!outcome.is_retryable());

        // The content hash is only recorded after a full success
        let recorded = db.into_transaction_log().iter().any(|entry| {
            entry
                .statements()
                .iter()
                .any(|stmt| stmt.sql.starts_with("INSERT INTO \"processed_files\""))
        });
        assert!(!recorded);
        Ok(())
    }

    #[tokio::test]
    async fn test_content_without_ledger_entry_is_processed_again() -> Result<()> {
        let db = setup_test_db().await?;
        let mut outcome = process_export(&db, &test_settings(), &export()).await?;
        assert_eq!(outcome.status, ProcessStatus::Success);

        // Without a ledger entry the same content is processed again
        crate::entities::ProcessedFile::delete_many().exec(&db).await?;
        assert!(!is_file_processed(&db, &export().content_hash).await?);
        outcome = process_export(&db, &test_settings(), &export()).await?;
        assert_eq!(outcome.status, ProcessStatus::Success);
        assert_eq!(outcome.products_added, 0);
        Ok(())
    }
}
