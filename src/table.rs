//! A table as it exists on one side of a sync, and the paired
//! upstream/downstream view the rest of the engine operates on.

use crate::collaborators::Cursor;
use crate::column::{self, ColumnExpression};
use crate::error::SyncError;
use crate::reporter::{scope, Reporter};
use crate::schema_diff;

/// One side (upstream or downstream) of a table.
#[derive(Debug, Clone)]
pub struct TableSide {
    pub name: String,
    pub id_col: String,
    pub columns: Vec<ColumnExpression>,
    pub max_id: u64,
}

impl TableSide {
    /// Inspect columns and capture `MAX(id_col)` once. `max_id` is not
    /// refreshed afterward — any rows added upstream during the run are
    /// picked up by the next run, not this one.
    pub fn load(cursor: &mut dyn Cursor, table_name: &str, id_col: &str) -> Result<Self, SyncError> {
        let columns = column::describe_columns(cursor, table_name)?;
        let max_id = read_max_id(cursor, table_name, id_col)?;
        Ok(TableSide {
            name: table_name.to_string(),
            id_col: id_col.to_string(),
            columns,
            max_id,
        })
    }

    /// Inspect only the column list, without assuming `id_col` is a usable
    /// row address — used by the composite-key path, where the first key
    /// column is a grouping key, not a unique id to range-scan.
    pub fn load_columns_only(cursor: &mut dyn Cursor, table_name: &str) -> Result<Vec<ColumnExpression>, SyncError> {
        column::describe_columns(cursor, table_name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

fn read_max_id(cursor: &mut dyn Cursor, table_name: &str, id_col: &str) -> Result<u64, SyncError> {
    let sql = format!("SELECT MAX(`{id_col}`) AS max_id FROM `{table_name}`");
    let mut rows = cursor.query(&sql)?;
    let row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer(format!("MAX({id_col}) query on {table_name} returned no row")))?;
    Ok(row.get::<Option<u64>, _>("max_id").flatten().unwrap_or(0))
}

/// `CHECKSUM TABLE table_name` on one side, as the raw checksum value MySQL
/// returns. Two tables are "synced" exactly when both sides' checksums are
/// equal (and the server considers the table checksummable at all).
pub fn checksum_table(cursor: &mut dyn Cursor, table_name: &str) -> Result<i64, SyncError> {
    let sql = format!("CHECKSUM TABLE `{table_name}`");
    let mut rows = cursor.query(&sql)?;
    let row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer(format!("CHECKSUM TABLE {table_name} returned no row")))?;
    row.get::<Option<i64>, _>("Checksum")
        .flatten()
        .ok_or_else(|| SyncError::Programmer(format!("CHECKSUM TABLE {table_name} had no Checksum column")))
}

fn table_exists(cursor: &mut dyn Cursor, table_name: &str) -> Result<bool, SyncError> {
    let database = cursor.database().to_string();
    let sql = format!(
        "SELECT 1 FROM information_schema.tables \
         WHERE table_schema = '{database}' AND table_name = '{table_name}' LIMIT 1"
    );
    Ok(!cursor.query(&sql)?.is_empty())
}

fn show_create_table(cursor: &mut dyn Cursor, table_name: &str) -> Result<String, SyncError> {
    let sql = format!("SHOW CREATE TABLE `{table_name}`");
    let mut rows = cursor.query(&sql)?;
    let mut row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer(format!("SHOW CREATE TABLE {table_name} returned no row")))?;
    let create: String = row
        .take("Create Table")
        .ok_or_else(|| SyncError::Programmer(format!("SHOW CREATE TABLE {table_name} had no Create Table column")))?;
    Ok(create.trim().to_string())
}

/// The paired upstream/downstream view of one table that the rest of the
/// engine operates on.
pub struct TableTwin {
    pub name: String,
    pub id_col: String,
    pub upstream: TableSide,
    pub downstream: TableSide,
    pub needs_work: bool,
    pub schema_synced: bool,
}

/// What a table ended up as after all applicable passes ran. Intentionally
/// not a [`SyncError`] variant — per §7, `HasChanges`/`Unverified` are
/// non-fatal outcomes the caller records in a summary, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// `CHECKSUM TABLE` agrees on both sides.
    Synced { preposition: String },
    /// Every applicable pass ran and the table still disagrees.
    HasChanges { preposition: String },
    /// The equality check was skipped (lite mode) or a scan found nothing
    /// to do despite an earlier checksum mismatch.
    Unverified { preposition: String },
}

impl TableTwin {
    /// Open a twin: create the downstream table from upstream's
    /// `SHOW CREATE TABLE` if it doesn't exist yet, then load both sides'
    /// column lists and max ids.
    pub fn open(
        table_name: &str,
        id_col: &str,
        upstream_cursor: &mut dyn Cursor,
        downstream_cursor: &mut dyn Cursor,
        reporter: &mut dyn Reporter,
    ) -> Result<Self, SyncError> {
        reporter.emit(&format!("[Examining table: {table_name}]"));
        let _s = scope(reporter);

        let upstream = TableSide::load(upstream_cursor, table_name, id_col)?;

        if !table_exists(downstream_cursor, table_name)? {
            _s.reporter().emit("downstream table does not exist, creating it from upstream's schema");
            let create_sql = show_create_table(upstream_cursor, table_name)?;
            downstream_cursor.exec(&create_sql)?;
        }

        let downstream = TableSide::load(downstream_cursor, table_name, id_col)?;

        Ok(TableTwin {
            name: table_name.to_string(),
            id_col: id_col.to_string(),
            upstream,
            downstream,
            needs_work: true,
            schema_synced: false,
        })
    }

    /// `true` iff both sides' `CHECKSUM TABLE` agree. Authoritative when
    /// `true`: every row matches byte-for-byte. When `false`: at least one
    /// row differs, or the server's checksum itself is unreliable for this
    /// table (e.g. it contains a column type MySQL can't checksum stably).
    pub fn is_synced(&self, upstream_cursor: &mut dyn Cursor, downstream_cursor: &mut dyn Cursor) -> Result<bool, SyncError> {
        let up = checksum_table(upstream_cursor, &self.name)?;
        let down = checksum_table(downstream_cursor, &self.name)?;
        Ok(up == down)
    }

    /// Compare and apply schema changes via the Schema Differ. Idempotent:
    /// a prior success is remembered and skipped. When `throw` is false,
    /// failures are logged and swallowed — used before data sync, when a
    /// column mismatch is the *expected* cause of a checksum disagreement.
    pub fn try_sync_schema(
        &mut self,
        upstream_cursor: &mut dyn Cursor,
        downstream_cursor: &mut dyn Cursor,
        throw: bool,
        reporter: &mut dyn Reporter,
    ) -> Result<(), SyncError> {
        if self.schema_synced {
            return Ok(());
        }

        reporter.emit(&format!("[Comparing upstream/downstream schemas for table: {}]", self.name));
        let result = {
            let _s = scope(reporter);
            schema_diff::sync_schema(upstream_cursor, downstream_cursor, &self.name, _s.reporter())
        };

        match result {
            Ok(report) => {
                if report.changed() {
                    reporter.append_summary(&format!("{} : schema changed {:?}", self.name, report));
                }
                self.schema_synced = true;
                // Column lists may have shifted; reload them.
                self.upstream.columns = column::describe_columns(upstream_cursor, &self.name)?;
                self.downstream.columns = column::describe_columns(downstream_cursor, &self.name)?;
                Ok(())
            }
            Err(err) if !throw => {
                reporter.emit("error occurred while syncing schema, but errors were suppressed");
                reporter.emit("will retry schema sync after data sync");
                reporter.emit(&err.to_string());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Drop and recreate a downstream table from upstream's `SHOW CREATE
/// TABLE`, for the schema-drift fallback: when a dump fails with "Column
/// count doesn't match", the cheapest recovery is to throw the downstream
/// table away and let the next pass repopulate it from scratch.
pub fn drop_and_recreate_from_upstream(
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    table_name: &str,
    reporter: &mut dyn Reporter,
) -> Result<(), SyncError> {
    reporter.emit(&format!("Upstream schema differs, pulling it down for table: {table_name}"));
    let _s = scope(reporter);
    let create_sql = show_create_table(upstream_cursor, table_name)?;
    downstream_cursor.exec(&format!("DROP TABLE `{table_name}`"))?;
    downstream_cursor.exec(&create_sql)?;
    _s.reporter().emit("New schema loaded, downstream table is empty");
    Ok(())
}

pub fn identical(preposition: impl Into<String>, table_name: &str, reporter: &mut dyn Reporter) -> TableOutcome {
    let preposition = preposition.into();
    let message = format!("{table_name} : IDENTICAL ({preposition})");
    reporter.append_summary(&message);
    reporter.emit(&message);
    TableOutcome::Synced { preposition }
}

pub fn has_changes(preposition: impl Into<String>, table_name: &str, reporter: &mut dyn Reporter) -> TableOutcome {
    let preposition = preposition.into();
    let message = format!("{table_name} : still HAS CHANGES ({preposition})");
    reporter.append_summary(&message);
    reporter.emit(&message);
    TableOutcome::HasChanges { preposition }
}

pub fn unverified(preposition: impl Into<String>, table_name: &str, reporter: &mut dyn Reporter) -> TableOutcome {
    let preposition = preposition.into();
    let message = format!("{table_name} : UNVERIFIED ({preposition})");
    reporter.append_summary(&message);
    reporter.emit(&message);
    TableOutcome::Unverified { preposition }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullReporter;
    impl Reporter for NullReporter {
        fn emit(&mut self, _msg: &str) {}
        fn indent(&mut self) {}
        fn dedent(&mut self) {}
        fn append_summary(&mut self, _msg: &str) {}
        fn flush_summary(&mut self) {}
        fn visualize_diff(&mut self, _changed: bool) {}
    }

    #[test]
    fn identical_marks_synced_outcome() {
        let mut r = NullReporter;
        let outcome = identical("after presync", "widgets", &mut r);
        assert_eq!(
            outcome,
            TableOutcome::Synced { preposition: "after presync".into() }
        );
    }

    #[test]
    fn has_changes_marks_has_changes_outcome() {
        let mut r = NullReporter;
        let outcome = has_changes("after zoom scan", "widgets", &mut r);
        assert!(matches!(outcome, TableOutcome::HasChanges { .. }));
    }
}
