// ABOUTME: Error types for the differential synchronization core
// ABOUTME: Narrow, explicit variants instead of letting the driver's errors stand in for everything

use thiserror::Error;

/// Errors raised by the differential synchronization strategy and its collaborators.
///
/// The core never swallows an error inside a table loop and never retries on its
/// own; every fallible step either returns `Ok` or propagates one of these variants
/// with the underlying cause attached.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A table has no primary key. Fatal; the table is never touched.
    #[error("table {0} has no primary key")]
    MissingPrimaryKey(String),

    /// A primary-key tuple contained a NULL, which has no defined position in the
    /// total order the merge relies on.
    #[error("primary key of table {table} contains NULL in column {column}")]
    NullPrimaryKey { table: String, column: String },

    /// Two values were compared that the comparator cannot reconcile under a
    /// single total order (mismatched, non-normalizable types).
    #[error("values in column {column} of table {table} are not comparable: {detail}")]
    IncomparableValues {
        table: String,
        column: String,
        detail: String,
    },

    /// The configured version-column pattern matched more than one column.
    #[error("version pattern matched multiple columns in table {0}: {1:?}")]
    AmbiguousVersionColumn(String, Vec<String>),

    /// A driver-level failure: connection, query, transaction, or DDL error.
    #[error("database driver error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// The auxiliary per-table task (the parallel target SELECT) failed or panicked.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Cooperative cancellation was observed while the strategy was running.
    #[error("synchronization was cancelled")]
    Cancelled,

    /// Catch-all for collaborator failures that don't map to a narrower variant
    /// (constraint teardown, sequence reseed, catalog introspection).
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
