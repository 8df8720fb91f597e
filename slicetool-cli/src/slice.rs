//! Slice configuration: the TOML file naming which tables to sync and how,
//! replacing the original tool's one-Python-module-per-slice convention
//! (`billing_meta.py`, `billing_billing.py`, ...) with a single declarative
//! file per slice.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use slicetool_sync::collaborators::{Cursor, Dumper, Loader};
use slicetool_sync::config::ConnectionArgs;
use slicetool_sync::error::SyncError;
use slicetool_sync::reporter::Reporter;
use slicetool_sync::table::TableOutcome;
use slicetool_sync::{composite, zoom};

/// One table named by a slice, and how to sync it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSpec {
    /// Synced through the zoom scanner, keyed on a single monotonic id.
    Simple {
        name: String,
        #[serde(default = "default_id_col")]
        id_col: String,
        zoom_levels: Vec<u64>,
    },
    /// Synced through group-cardinality/group-fingerprint reconciliation,
    /// keyed on an ordered list of columns with no single monotonic id.
    Composite { name: String, keys: Vec<String> },
    /// Named in the slice but deliberately not synced — recorded in the
    /// summary as skipped, not silently omitted.
    Skipped { name: String },
}

fn default_id_col() -> String {
    "id".to_string()
}

impl TableSpec {
    pub fn name(&self) -> &str {
        match self {
            TableSpec::Simple { name, .. } => name,
            TableSpec::Composite { name, .. } => name,
            TableSpec::Skipped { name } => name,
        }
    }
}

/// A named set of tables to sync from one upstream/downstream pair.
#[derive(Debug, Clone, Deserialize)]
pub struct SliceConfig {
    pub name: String,
    pub tables: Vec<TableSpec>,
}

impl SliceConfig {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigInvalid(format!("could not read slice file {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| SyncError::ConfigInvalid(format!("invalid slice file {}: {e}", path.display())))
    }
}

/// Run every table in a slice in order, continuing past a per-table
/// `HasChanges`/`Unverified` outcome (those are recorded, not fatal) but
/// stopping at the first hard [`SyncError`].
#[allow(clippy::too_many_arguments)]
pub fn run_slice(
    slice: &SliceConfig,
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    upstream_conn: &ConnectionArgs,
    downstream_conn: &ConnectionArgs,
    dumper: &mut dyn Dumper,
    loader: &mut dyn Loader,
    batch_rows: u64,
    scratch_path: &PathBuf,
    lite: bool,
    reporter: &mut dyn Reporter,
) -> Result<Vec<(String, TableOutcome)>, SyncError> {
    reporter.emit(&format!("Syncing slice '{}'", slice.name));
    let mut outcomes = Vec::with_capacity(slice.tables.len());

    for spec in &slice.tables {
        reporter.emit(&format!("[Table: {}]", spec.name()));

        let outcome = match spec {
            TableSpec::Skipped { .. } => {
                reporter.emit("skipped explicitly by slice definition");
                continue;
            }
            TableSpec::Simple { name, id_col, zoom_levels } => zoom::sync_table(
                name,
                zoom_levels,
                id_col,
                upstream_cursor,
                downstream_cursor,
                upstream_conn,
                downstream_conn,
                dumper,
                loader,
                batch_rows,
                None,
                scratch_path,
                lite,
                reporter,
            )?,
            TableSpec::Composite { name, keys } => composite::composite_key_sync(
                name,
                keys,
                upstream_cursor,
                downstream_cursor,
                upstream_conn,
                downstream_conn,
                dumper,
                loader,
                None,
                scratch_path,
                reporter,
            )?,
        };

        outcomes.push((spec.name().to_string(), outcome));
    }

    reporter.flush_summary();
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_mixed_slice() {
        let toml = r#"
            name = "billing"

            [[tables]]
            kind = "simple"
            name = "invoices"
            zoom_levels = [1000, 50, 1]

            [[tables]]
            kind = "composite"
            name = "line_items"
            keys = ["invoice_id", "line_number"]

            [[tables]]
            kind = "skipped"
            name = "archived_invoices"
        "#;

        let slice: SliceConfig = toml::from_str(toml).unwrap();
        assert_eq!(slice.name, "billing");
        assert_eq!(slice.tables.len(), 3);
        assert_eq!(slice.tables[0].name(), "invoices");
        match &slice.tables[0] {
            TableSpec::Simple { id_col, .. } => assert_eq!(id_col, "id"),
            _ => panic!("expected a simple table spec"),
        }
    }

    #[test]
    fn load_reads_a_slice_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.toml");
        std::fs::write(
            &path,
            r#"
                name = "billing"

                [[tables]]
                kind = "simple"
                name = "invoices"
                zoom_levels = [1000, 50, 1]
            "#,
        )
        .unwrap();

        let slice = SliceConfig::load(&path).unwrap();
        assert_eq!(slice.name, "billing");
        assert_eq!(slice.tables.len(), 1);
        assert_eq!(slice.tables[0].name(), "invoices");
    }

    #[test]
    fn load_reports_config_invalid_for_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does_not_exist.toml");
        assert!(SliceConfig::load(&path).is_err());
    }
}
