//! Application state shared by the dashboard views.
//!
//! `AppState` is a plain value. Every setter is a `with_*` transition returning the
//! next state, so views hold the state explicitly instead of reaching into globals.

use crate::{
    config::database::DatabaseStatus,
    core::{processing::ProcessStatus, report::ReportQuery},
    errors::{Error, Result},
};
use chrono::NaiveDate;

/// Where the uploaded export is in the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileStatus {
    /// Nothing uploaded yet
    #[default]
    None,
    /// Export accepted, not processed
    Uploaded,
    /// Processing in progress
    Processing,
    /// Everything saved, or the content was already processed
    Processed,
    /// Some data saved, some lost
    PartiallyProcessed,
    /// Nothing saved
    Failed,
}

impl From<ProcessStatus> for FileStatus {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Success | ProcessStatus::AlreadyProcessed => Self::Processed,
            ProcessStatus::Partial => Self::PartiallyProcessed,
            ProcessStatus::Failed => Self::Failed,
        }
    }
}

/// Top-level view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    /// Upload and processing
    #[default]
    Dashboard,
    /// Sales report
    Reports,
    /// Dictionary management
    ControlPanel,
}

/// Long-running user actions guarded against double triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading an export
    Upload,
    /// Running the processing workflow
    Process,
    /// Loading the dictionary for editing
    LoadDictionary,
    /// Saving the dictionary
    SaveDictionary,
    /// Building a report
    Report,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::Process => "process",
            Self::LoadDictionary => "load dictionary",
            Self::SaveDictionary => "save dictionary",
            Self::Report => "report",
        };
        f.write_str(name)
    }
}

/// Whether the record store can be used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendState {
    /// Not probed yet
    #[default]
    Unknown,
    /// Probe succeeded
    Ready,
    /// Probe failed; data operations are blocked
    Misconfigured {
        /// Probe failure details
        message: String,
    },
}

impl From<DatabaseStatus> for BackendState {
    fn from(status: DatabaseStatus) -> Self {
        match status {
            DatabaseStatus::Ready => Self::Ready,
            DatabaseStatus::Misconfigured { failures } => Self::Misconfigured {
                message: failures.join("; "),
            },
        }
    }
}

/// Dashboard state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// Pipeline status of the current export
    pub file_status: FileStatus,
    /// Visible view
    pub active_section: Section,
    /// Report filters
    pub filters: ReportQuery,
    /// Record store availability
    pub backend: BackendState,
    /// Operation currently running, if any
    pub in_flight: Option<Operation>,
    /// Whether any processing run saved data this session
    pub has_processed_data: bool,
}

impl AppState {
    /// Sets the pipeline status
    #[must_use]
    pub fn with_file_status(self, file_status: FileStatus) -> Self {
        let saved = matches!(
            file_status,
            FileStatus::Processed | FileStatus::PartiallyProcessed
        );
        Self {
            file_status,
            has_processed_data: self.has_processed_data || saved,
            ..self
        }
    }

    /// Sets the first report day
    #[must_use]
    pub fn with_start_date(self, start_date: Option<NaiveDate>) -> Self {
        Self {
            filters: ReportQuery {
                start_date,
                ..self.filters
            },
            ..self
        }
    }

    /// Sets the last report day
    #[must_use]
    pub fn with_end_date(self, end_date: Option<NaiveDate>) -> Self {
        Self {
            filters: ReportQuery {
                end_date,
                ..self.filters
            },
            ..self
        }
    }

    /// Toggles the echo-only filter
    #[must_use]
    pub fn with_echo_only(self, echo_only: bool) -> Self {
        Self {
            filters: ReportQuery {
                echo_only,
                ..self.filters
            },
            ..self
        }
    }

    /// Records the result of a backend probe
    #[must_use]
    pub fn with_backend(self, backend: BackendState) -> Self {
        Self { backend, ..self }
    }

    /// Switches views. Reports are refused until a processing run saved
    /// something, so the section stays unchanged in that case.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when reports are not reachable yet.
    pub fn with_section(self, section: Section) -> Result<Self> {
        if section == Section::Reports && !self.can_view_reports() {
            return Err(Error::Config {
                message: "Process a file before viewing reports".to_string(),
            });
        }
        Ok(Self {
            active_section: section,
            ..self
        })
    }

    /// Reports are reachable once some run saved data, unless the latest run failed
    #[must_use]
    pub fn can_view_reports(&self) -> bool {
        self.has_processed_data && self.file_status != FileStatus::Failed
    }

    /// Whether an operation is running
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Marks `operation` as running.
    ///
    /// # Errors
    /// Returns [`Error::Busy`] while another operation is in flight, and
    /// [`Error::Config`] when the record store is misconfigured.
    pub fn try_begin(self, operation: Operation) -> Result<Self> {
        if let Some(running) = self.in_flight {
            return Err(Error::Busy {
                operation: running.to_string(),
            });
        }
        if let BackendState::Misconfigured { message } = &self.backend {
            return Err(Error::Config {
                message: format!("Record store unavailable: {message}"),
            });
        }
        Ok(Self {
            in_flight: Some(operation),
            ..self
        })
    }

    /// Clears the in-flight operation after success or failure
    #[must_use]
    pub fn settle(self) -> Self {
        Self {
            in_flight: None,
            ..self
        }
    }
}
