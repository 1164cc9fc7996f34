//! App layer - Dashboard context and view state
//!
//! This module ties the core workflow to the dashboard views: it owns the
//! record store connection, the settings and the current [`AppState`], and guards
//! long-running operations against being triggered twice.

/// View state and its transitions
pub mod state;

use crate::{
    config::{database::check_database_setup, settings::Settings},
    core::{
        editor::DictionaryEditor,
        processing::{ProcessOutcome, process_export},
        report::{Report, generate_report},
        upload::{ExportFile, read_export},
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::path::Path;
use tracing::{info, instrument, warn};

pub use state::{AppState, BackendState, FileStatus, Operation, Section};

/// Shared context available to all dashboard views.
pub struct Dashboard {
    /// Database connection for all record store operations
    pub database: DatabaseConnection,
    /// Loaded settings
    pub settings: Settings,
    state: AppState,
    export: Option<ExportFile>,
}

impl Dashboard {
    /// Creates a dashboard over an open connection.
    #[must_use]
    pub fn new(database: DatabaseConnection, settings: Settings) -> Self {
        Self {
            database,
            settings,
            state: AppState::default(),
            export: None,
        }
    }

    /// Current view state
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// The accepted export waiting to be processed, if any
    #[must_use]
    pub const fn export(&self) -> Option<&ExportFile> {
        self.export.as_ref()
    }

    /// Applies a pure state transition, e.g. `|s| s.with_echo_only(true)`.
    pub fn update_state(&mut self, transition: impl FnOnce(AppState) -> AppState) {
        self.state = transition(std::mem::take(&mut self.state));
    }

    /// Switches views; the state is unchanged when navigation is refused.
    pub fn navigate(&mut self, section: Section) -> Result<()> {
        self.state = self.state.clone().with_section(section)?;
        Ok(())
    }

    fn begin(&mut self, operation: Operation) -> Result<()> {
        self.state = self.state.clone().try_begin(operation)?;
        Ok(())
    }

    fn settle(&mut self) {
        self.update_state(AppState::settle);
    }

    /// Probes the record store and records whether it is usable.
    #[instrument(skip(self))]
    pub async fn check_backend(&mut self) -> &BackendState {
        let status = check_database_setup(&self.database).await;
        if !status.is_ready() {
            warn!("Record store is misconfigured: {:?}", status);
        }
        let backend = BackendState::from(status);
        self.update_state(|s| s.with_backend(backend));
        &self.state.backend
    }

    /// Accepts an export from disk. A rejected file leaves the previous upload in place.
    #[instrument(skip(self))]
    pub fn upload(&mut self, path: &Path) -> Result<&ExportFile> {
        self.begin(Operation::Upload)?;
        let result = read_export(path);
        self.settle();

        let export = result?;
        info!(
            "Accepted export '{}' ({} bytes)",
            export.file_name,
            export.content.len()
        );
        self.update_state(|s| s.with_file_status(FileStatus::Uploaded));
        Ok(self.export.insert(export))
    }

    /// Processes the uploaded export.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when nothing was uploaded, [`Error::Busy`] when
    /// another operation is running, or the parse error for unreadable CSV.
    pub async fn process(&mut self) -> Result<ProcessOutcome> {
        let Some(export) = self.export.clone() else {
            return Err(Error::Config {
                message: "Upload a file before processing".to_string(),
            });
        };
        self.begin(Operation::Process)?;
        self.update_state(|s| s.with_file_status(FileStatus::Processing));

        let result = process_export(&self.database, &self.settings, &export).await;
        let file_status = result
            .as_ref()
            .map_or(FileStatus::Failed, |outcome| outcome.status.into());
        self.update_state(|s| s.with_file_status(file_status).settle());
        result
    }

    /// Builds the report for the current filters.
    pub async fn report(&mut self) -> Result<Report> {
        self.begin(Operation::Report)?;
        let result = generate_report(&self.database, self.state.filters).await;
        self.settle();
        result
    }

    /// Opens a working copy of the stored dictionary.
    pub async fn dictionary_editor(&mut self) -> Result<DictionaryEditor> {
        self.begin(Operation::LoadDictionary)?;
        let result = DictionaryEditor::load(&self.database).await;
        self.settle();
        result
    }

    /// Saves the editor's changes.
    pub async fn save_dictionary(&mut self, editor: &mut DictionaryEditor) -> Result<()> {
        self.begin(Operation::SaveDictionary)?;
        let result = editor
            .save(&self.database, self.settings.persistence.batch_size)
            .await;
        self.settle();
        result
    }
}
