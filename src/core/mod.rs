//! Core business logic - framework-agnostic ingestion, reconciliation and reporting.

/// Dictionary working copy for the control panel
pub mod editor;
/// Export processing workflow
pub mod processing;
/// CSV export parsing
pub mod parser;
/// Product dictionary and echo cache gateway
pub mod product;
/// Merging parsed transactions into the dictionary
pub mod reconcile;
/// Report aggregation and formatting
pub mod report;
/// Bounded retry for record store writes
pub mod retry;
/// Transaction gateway
pub mod transaction;
/// Upload validation and zip extraction
pub mod upload;
