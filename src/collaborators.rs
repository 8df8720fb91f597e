//! External collaborators the core diff engine consumes but does not
//! implement: a row cursor, a dump tool, and a load tool.
//!
//! Per the design, subprocess invocation of dump/load binaries and
//! credential handling are out of scope for the core — this module only
//! defines the seams. [`crate::mysql_backend`] provides the real [`Cursor`]
//! over a live MySQL connection; [`crate::subprocess`] provides [`Dumper`]
//! and [`Loader`] implementations that shell out to `mysqldump`/`mysql`.

use std::path::Path;

use crate::error::SyncError;

/// A live database connection the engine can run queries and statements
/// against. Object-safe: the engine takes `&mut dyn Cursor` everywhere so a
/// test fixture can stand in for a real connection.
pub trait Cursor {
    /// Host this cursor is connected to, for diagnostics.
    fn host(&self) -> &str;

    /// Database (schema) this cursor is bound to.
    fn database(&self) -> &str;

    /// Run a query that returns rows.
    fn query(&mut self, sql: &str) -> Result<Vec<mysql::Row>, SyncError>;

    /// Run a statement that doesn't return rows (DDL, DELETE, SET). Returns
    /// the number of affected rows where that's meaningful.
    fn exec(&mut self, sql: &str) -> Result<u64, SyncError>;
}

/// Dumps rows from one table, under an optional `WHERE` clause, to a
/// portable SQL file with no schema, no GTID, and no table locks.
///
/// `append`, when true, appends to `output_path` instead of truncating it —
/// used by the pre-sync ID-extension batching (§4.6), which writes several
/// batches of the same table to one file before a single load.
pub trait Dumper {
    fn dump(
        &mut self,
        conn: &crate::config::ConnectionArgs,
        table: &str,
        where_clause: Option<&str>,
        append: bool,
        output_path: &Path,
    ) -> Result<(), SyncError>;
}

/// Applies a SQL script previously produced by a [`Dumper`] to a database.
pub trait Loader {
    fn load(&mut self, conn: &crate::config::ConnectionArgs, input_path: &Path) -> Result<(), SyncError>;
}
