//! Unified error type for the dashboard backend.
//!
//! Every fallible operation in the crate returns [`Result`]. Backend failures are
//! wrapped as [`Error::Database`] and can be classified with [`Error::is_transient`]
//! so callers know whether a retry is worth offering.

use sea_orm::DbErr;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Record store failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Filesystem failure while reading an export
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader failure that is not tied to a single row
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Dictionary JSON document could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip archive could not be opened
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Upload rejected because of its extension
    #[error("Unsupported file '{file_name}': please upload a .csv or .zip file")]
    UnsupportedFile {
        /// Name of the rejected file
        file_name: String,
    },

    /// Zip archive without any CSV entry
    #[error("Archive '{file_name}' does not contain a CSV file")]
    EmptyArchive {
        /// Name of the archive
        file_name: String,
    },

    /// Product lookup failed
    #[error("Product '{product_id}' not found")]
    ProductNotFound {
        /// Identifier that was looked up
        product_id: String,
    },

    /// Product record failed validation
    #[error("Invalid product: {message}")]
    InvalidProduct {
        /// Why the record was rejected
        message: String,
    },

    /// Another operation is still in flight
    #[error("Operation '{operation}' is already in progress")]
    Busy {
        /// Name of the running operation
        operation: String,
    },
}

impl Error {
    /// Returns true for backend failures that may succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    #[test]
    fn test_connection_errors_are_transient() {
        let err = Error::from(DbErr::Conn(RuntimeErr::Internal("refused".to_string())));
        assert!(err.is_transient());
    }

    #[test]
    fn test_query_errors_are_permanent() {
        let err = Error::from(DbErr::Custom("bad column".to_string()));
        assert!(!err.is_transient());

        let err = Error::InvalidProduct {
            message: "empty id".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unsupported_file_message() {
        let err = Error::UnsupportedFile {
            file_name: "sales.xlsx".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported file 'sales.xlsx': please upload a .csv or .zip file"
        );
    }
}
