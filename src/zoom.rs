//! The recursive Zoom Scanner: once pre-sync leaves a table `HasChanges`,
//! narrow in on exactly which rows disagree by fingerprinting at
//! successively finer granularities, then transfer only those rows.
//!
//! Implemented as an iterative loop (see [`sync_table_recurse`]) rather than
//! literal self-recursion, since the shape of the recursion's second
//! argument changes from "a list of magnifications" to "a populated
//! granularity → diff-address map" after the first call — modeling both
//! shapes behind one recursive signature would need an enum anyway, so the
//! split is made explicit instead as two operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::collaborators::{Cursor, Dumper, Loader};
use crate::config::{ConnectionArgs, BATCH_FINGERPRINTS, GROUP_CONCAT_TRY_BYTES};
use crate::diff_finder::find_diffs;
use crate::error::SyncError;
use crate::fingerprint::{self, Address};
use crate::interval::{partition, Interval};
use crate::presync::run_presync;
use crate::reporter::{scope, Reporter};
use crate::table::{self, TableOutcome, TableTwin};

/// A granularity → diff-address map, ascending by granularity, with the
/// coarsest level always present and fully populated (it's seeded with the
/// whole table as one range). `None` marks a level not yet scanned.
struct ZoomMap {
    levels: BTreeMap<u64, Option<Vec<Address>>>,
}

impl ZoomMap {
    fn seed(zoom_levels: &[u64], max_id: u64) -> Self {
        let mut levels: BTreeMap<u64, Option<Vec<Address>>> = zoom_levels.iter().map(|g| (*g, None)).collect();
        levels.insert(max_id.max(1), Some(vec![Address::Range(Interval::new(0, max_id))]));
        ZoomMap { levels }
    }

    /// Find the finest granularity adjacent to (directly below) a populated
    /// coarser level, walking from the coarsest gap down to the finest —
    /// mirrors the original's `reversed(zip(items, items[1:]))` walk.
    fn frontier(&self) -> Option<(u64, Vec<Address>)> {
        let entries: Vec<(u64, Option<Vec<Address>>)> = self.levels.iter().map(|(g, s)| (*g, s.clone())).collect();
        for window in entries.windows(2).rev() {
            let (smaller_gran, smaller_scope) = &window[0];
            let (_larger_gran, larger_scope) = &window[1];
            if smaller_scope.is_none() {
                return larger_scope.clone().map(|scopes| (*smaller_gran, scopes));
            }
        }
        None
    }

    fn populate(&mut self, granularity: u64, addresses: Vec<Address>) {
        self.levels.insert(granularity, Some(addresses));
    }

    fn finest(&self) -> (u64, Vec<Address>) {
        let (gran, scopes) = self.levels.iter().next().expect("zoom map always has at least one level");
        (*gran, scopes.clone().expect("finest level must be populated once the frontier search is exhausted"))
    }
}

fn as_intervals(addresses: &[Address]) -> Result<Vec<Interval>, SyncError> {
    addresses
        .iter()
        .map(|a| match a {
            Address::Range(r) => Ok(*r),
            Address::Row(id) => Ok(Interval::single(*id)),
        })
        .collect()
}

/// Build the transfer conditions for the finest-level diff addresses: a row
/// `IN (...)` list when the finest granularity is 1, an `OR`ed `BETWEEN`
/// list otherwise — batched so no single dump/delete statement names more
/// than [`crate::config::BATCH_FINGERPRINTS`] addresses.
fn transfer_conditions(id_col: &str, granularity: u64, addresses: &[Address]) -> Result<Vec<String>, SyncError> {
    if granularity <= 1 {
        let ids: Vec<u64> = addresses
            .iter()
            .map(|a| match a {
                Address::Row(id) => Ok(*id),
                Address::Range(_) => Err(SyncError::Programmer(
                    "finest zoom level held a range address instead of a row address".into(),
                )),
            })
            .collect::<Result<_, _>>()?;
        Ok(partition(BATCH_FINGERPRINTS, &ids)
            .into_iter()
            .map(|batch| {
                let list = batch.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
                format!("{id_col} IN ({list})")
            })
            .collect())
    } else {
        let ranges: Vec<Interval> = addresses
            .iter()
            .map(|a| match a {
                Address::Range(r) => Ok(*r),
                Address::Row(_) => Err(SyncError::Programmer(
                    "a granularity > 1 zoom level held a row address instead of a range".into(),
                )),
            })
            .collect::<Result<_, _>>()?;
        Ok(partition(BATCH_FINGERPRINTS, &ranges)
            .into_iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|r| r.sql_between(id_col))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            })
            .collect())
    }
}

/// Entry point: run pre-sync, retrying once through a schema-drift
/// drop+recreate if the dump reports a column-count mismatch, then escalate
/// to the zoom recursion only if pre-sync left the table with changes.
#[allow(clippy::too_many_arguments)]
pub fn sync_table(
    table_name: &str,
    zoom_levels: &[u64],
    id_col: &str,
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    upstream_conn: &ConnectionArgs,
    downstream_conn: &ConnectionArgs,
    dumper: &mut dyn Dumper,
    loader: &mut dyn Loader,
    batch_rows: u64,
    condition: Option<&str>,
    scratch_path: &PathBuf,
    lite: bool,
    reporter: &mut dyn Reporter,
) -> Result<TableOutcome, SyncError> {
    reporter.emit(&format!("[Examining table: {table_name}]"));
    let _s = scope(reporter);

    let first_attempt = run_presync(
        table_name,
        id_col,
        upstream_cursor,
        downstream_cursor,
        upstream_conn,
        downstream_conn,
        dumper,
        loader,
        batch_rows,
        condition,
        scratch_path,
        lite,
        _s.reporter(),
    );

    let (twin, outcome) = match first_attempt {
        Ok(pair) => pair,
        Err(err) if err.is_schema_drift() => {
            table::drop_and_recreate_from_upstream(upstream_cursor, downstream_cursor, table_name, _s.reporter())?;
            run_presync(
                table_name,
                id_col,
                upstream_cursor,
                downstream_cursor,
                upstream_conn,
                downstream_conn,
                dumper,
                loader,
                batch_rows,
                condition,
                scratch_path,
                lite,
                _s.reporter(),
            )?
        }
        Err(err) => return Err(err),
    };

    if !matches!(outcome, TableOutcome::HasChanges { .. }) {
        _s.reporter().emit("Sync: 'general' finished early: presync was sufficient");
        return Ok(outcome);
    }

    sync_table_recurse(
        twin,
        zoom_levels,
        upstream_cursor,
        downstream_cursor,
        upstream_conn,
        downstream_conn,
        dumper,
        loader,
        condition,
        scratch_path,
        _s.reporter(),
    )
}

/// The iterative zoom loop: repeatedly fingerprint the finest un-scanned
/// granularity using the diff addresses found at the next coarser level,
/// until the finest level is fully populated, then transfer exactly those
/// rows/ranges.
#[allow(clippy::too_many_arguments)]
fn sync_table_recurse(
    mut twin: TableTwin,
    zoom_levels: &[u64],
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    upstream_conn: &ConnectionArgs,
    downstream_conn: &ConnectionArgs,
    dumper: &mut dyn Dumper,
    loader: &mut dyn Loader,
    condition: Option<&str>,
    scratch_path: &PathBuf,
    reporter: &mut dyn Reporter,
) -> Result<TableOutcome, SyncError> {
    let mut map = ZoomMap::seed(zoom_levels, twin.upstream.max_id);

    let upstream_budget = fingerprint::negotiate_group_concat_budget(upstream_cursor, GROUP_CONCAT_TRY_BYTES, reporter)?;
    let downstream_budget = fingerprint::negotiate_group_concat_budget(downstream_cursor, GROUP_CONCAT_TRY_BYTES, reporter)?;
    let agreed_bytes = upstream_budget.bytes.min(downstream_budget.bytes);

    loop {
        match map.frontier() {
            Some((granularity, coarser_scopes)) => {
                let scopes = as_intervals(&coarser_scopes)?;
                reporter.emit(&format!(
                    "[Given {} larger-granules, making smaller granules of size {granularity} and fingerprinting them]",
                    scopes.len()
                ));
                let _s = scope(reporter);

                fingerprint::set_group_concat_budget(upstream_cursor, agreed_bytes)?;
                fingerprint::set_group_concat_budget(downstream_cursor, agreed_bytes)?;

                let next = find_diffs(upstream_cursor, downstream_cursor, &twin, &scopes, granularity, condition, _s.reporter())?;

                if next.is_empty() {
                    _s.reporter().emit(
                        "Found no ranges with diffs. Nothing to do. \
                         If the tables were truly identical, CHECKSUM TABLE would have \
                         prevented sync from getting this far. Perhaps some columns were \
                         ignored during the scan (e.g. timestamps)?",
                    );
                    reporter.append_summary(&format!(
                        "{} : IDENTICAL? (TABLE CHECKSUM failed but a custom MD5 scan found no diffs)",
                        twin.name
                    ));
                    return Ok(TableOutcome::Unverified { preposition: "custom MD5 scan found no diffs".to_string() });
                }

                map.populate(granularity, next);
            }
            None => {
                let (final_granularity, final_addresses) = map.finest();
                reporter.emit("Zoom-level map fully populated, no more zoom recursions will follow");
                let _s = scope(reporter);

                let conditions = transfer_conditions(&twin.id_col, final_granularity, &final_addresses)?;
                _s.reporter().emit(&format!("[Transfer proceeding in {} batches]", conditions.len()));

                {
                    let _s2 = scope(_s.reporter());
                    for (i, cond) in conditions.iter().enumerate() {
                        let append = i > 0;
                        dumper.dump(upstream_conn, &twin.name, Some(cond), append, scratch_path)?;
                        let delete_sql = format!("DELETE FROM `{}` WHERE {cond}", twin.name);
                        downstream_cursor.exec(&delete_sql)?;
                    }
                    if !conditions.is_empty() {
                        loader.load(downstream_conn, scratch_path)?;
                    }
                }

                let synced = twin.is_synced(upstream_cursor, downstream_cursor)?;
                let outcome = if synced {
                    table::identical("after zoom sync", &twin.name, _s.reporter())
                } else {
                    reporter.append_summary(&format!(
                        "{} : DIFFERS (after zoom sync) (attempts exhausted, were changes made during sync?)",
                        twin.name
                    ));
                    table::has_changes("after zoom sync", &twin.name, _s.reporter())
                };

                twin.try_sync_schema(upstream_cursor, downstream_cursor, true, _s.reporter())?;
                return Ok(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_fills_coarsest_unpopulated_level_first() {
        let map = ZoomMap::seed(&[1, 10, 100], 1000);
        let (granularity, scopes) = map.frontier().expect("frontier must exist when only the seed level is populated");
        assert_eq!(granularity, 100);
        assert_eq!(scopes, vec![Address::Range(Interval::new(0, 1000))]);
    }

    #[test]
    fn frontier_advances_to_finer_levels_as_coarser_ones_fill_in() {
        let mut map = ZoomMap::seed(&[1, 10, 100], 1000);
        map.populate(100, vec![Address::Range(Interval::new(0, 99))]);
        let (granularity, _) = map.frontier().expect("frontier must exist with level 1 and 10 still unpopulated");
        assert_eq!(granularity, 10);
    }

    #[test]
    fn frontier_is_none_once_finest_level_is_populated() {
        let mut map = ZoomMap::seed(&[1, 10, 100], 1000);
        map.populate(100, vec![Address::Range(Interval::new(0, 99))]);
        map.populate(10, vec![Address::Range(Interval::new(0, 9))]);
        map.populate(1, vec![Address::Row(3)]);
        assert!(map.frontier().is_none());
    }

    #[test]
    fn transfer_conditions_at_granularity_one_are_id_lists() {
        let addrs = vec![Address::Row(1), Address::Row(2), Address::Row(3)];
        let conditions = transfer_conditions("id", 1, &addrs).unwrap();
        assert_eq!(conditions, vec!["id IN (1,2,3)".to_string()]);
    }

    #[test]
    fn transfer_conditions_above_one_are_between_lists() {
        let addrs = vec![Address::Range(Interval::new(0, 9)), Address::Range(Interval::new(20, 29))];
        let conditions = transfer_conditions("id", 10, &addrs).unwrap();
        assert_eq!(conditions, vec!["id BETWEEN 0 AND 9 OR id BETWEEN 20 AND 29".to_string()]);
    }
}
