//! Error types for the sync engine.
//!
//! All errors that can occur while diffing or transferring rows are
//! represented by [`SyncError`]. Errors are propagated via
//! `Result<T, SyncError>` throughout the codebase.
//!
//! # Error Classification
//!
//! Variants are grouped by retry behavior:
//! - **Transient** — connection dropped, timeout, deadlock. The current
//!   batch fails; the engine does not retry internally. Re-running the whole
//!   job is safe because progress is derived from live row comparison, not
//!   from any persisted cursor.
//! - **SchemaDrift** — a dump failed because the downstream column count no
//!   longer matches upstream. Handled once by the drop+recreate fallback in
//!   the zoom recursion; a second occurrence escalates.
//! - **SchemaMisaligned** — a shared column name could not be reconciled by
//!   the schema differ. Fatal for the table.
//! - **ConfigInvalid** — missing required argument, unreadable socket,
//!   invalid cipher. Fatal before any sync begins.
//! - **Programmer** — granularity/operation mismatch, unknown column type,
//!   or a row missing a column the query itself selected. Fatal, indicates
//!   a bug rather than a data condition.
//! - **Cancelled** — a cancellation signal was observed at a suspension
//!   point. Aborts all remaining tables.
//!
//! `UpstreamBehindDownstream` and an unreconciled table after all passes are
//! *not* represented here — per the design, those are recorded as
//! [`crate::reporter`] summary lines via [`crate::table::TableOutcome`], not
//! propagated as errors.

use std::path::PathBuf;

/// Primary error type for the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A database round-trip failed transiently (dropped connection, lock
    /// wait timeout, deadlock). Not retried internally.
    #[error("transient database error on {host}: {source}")]
    Transient {
        host: String,
        #[source]
        source: mysql::Error,
    },

    /// A dump failed because the downstream column count no longer matches
    /// upstream (`Column count doesn't match value count at row N`).
    #[error("schema drift detected while dumping table {table}: {detail}")]
    SchemaDrift { table: String, detail: String },

    /// A column present under the same name on both sides could not be
    /// reconciled by the schema differ.
    #[error("schema misaligned for table {table}, column {column}")]
    SchemaMisaligned { table: String, column: String },

    /// Invalid configuration discovered before any sync began.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A bug: wrong granularity passed to a fingerprinting operation, an
    /// unrecognized column type, or a row missing a column the query
    /// itself selected.
    #[error("programmer error: {0}")]
    Programmer(String),

    /// A cancellation signal was observed at a suspension point.
    #[error("sync cancelled")]
    Cancelled,

    /// The external dump/load collaborator failed to run or exited non-zero
    /// for a reason other than schema drift.
    #[error("collaborator failure invoking {program} for {path}: {detail}")]
    CollaboratorFailed {
        program: &'static str,
        path: PathBuf,
        detail: String,
    },
}

impl From<mysql::Error> for SyncError {
    fn from(source: mysql::Error) -> Self {
        SyncError::Transient {
            host: String::new(),
            source,
        }
    }
}

impl SyncError {
    /// Attach a host to a bare `mysql::Error` conversion, since `From` alone
    /// can't see which connection the error came from.
    pub fn transient(host: impl Into<String>, source: mysql::Error) -> Self {
        SyncError::Transient {
            host: host.into(),
            source,
        }
    }

    /// True if this error's nature is schema drift, the one case the zoom
    /// recursion retries automatically (once).
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, SyncError::SchemaDrift { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_drift_detection() {
        let err = SyncError::SchemaDrift {
            table: "widgets".into(),
            detail: "Column count doesn't match value count at row 1".into(),
        };
        assert!(err.is_schema_drift());

        let other = SyncError::Programmer("granularity mismatch".into());
        assert!(!other.is_schema_drift());
    }

    #[test]
    fn display_messages_name_the_table() {
        let err = SyncError::SchemaMisaligned {
            table: "accounts".into(),
            column: "balance".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("accounts"));
        assert!(msg.contains("balance"));
    }
}
