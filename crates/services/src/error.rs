//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{Domain, PayloadError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the progress services.
///
/// Malformed stored payloads never surface here; they are logged and read as
/// empty.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("{0} progress does not track glossary terms")]
    TermsNotTracked(Domain),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping progress services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
