//! The Diff Finder: walks a set of scopes at one granularity and reports
//! which addresses disagree between upstream and downstream.

use std::collections::BTreeMap;

use crate::collaborators::Cursor;
use crate::config::BATCH_FINGERPRINTS;
use crate::error::SyncError;
use crate::fingerprint::{self, Address};
use crate::interval::{partition, Interval};
use crate::reporter::{scope, Reporter};
use crate::table::TableTwin;

/// Scan every address inside `scopes` at `granularity` and return the ones
/// whose upstream and downstream fingerprints disagree — including
/// addresses present on only one side, which count as a diff by
/// definition. `granularity == 1` fingerprints individual rows;
/// `granularity > 1` fingerprints row-ranges.
///
/// Batches `scopes` into groups of [`BATCH_FINGERPRINTS`] so one scan never
/// builds a single `WHERE` clause unboundedly large; each batch issues one
/// query per side.
pub fn find_diffs(
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    twin: &TableTwin,
    scopes: &[Interval],
    granularity: u64,
    condition: Option<&str>,
    reporter: &mut dyn Reporter,
) -> Result<Vec<Address>, SyncError> {
    let thing = if granularity <= 1 { "row" } else { "range" };

    let predicates: Vec<String> = scopes.iter().map(|s| s.sql_between(&twin.id_col)).collect();
    let batches = partition(BATCH_FINGERPRINTS, &predicates);
    let num_batches = batches.len();

    reporter.emit(&format!("[Generating {thing} fingerprint of size {granularity} across {} scopes]", scopes.len()));
    let mut found = Vec::new();

    for (i, batch) in batches.iter().enumerate() {
        let _s = scope(reporter);
        _s.reporter().emit(&format!("[ Batch {} of {num_batches} ]", i + 1));

        let scan_condition = {
            let joined = batch.join(" OR ");
            match condition {
                Some(extra) => format!("{extra} AND ({joined})"),
                None => joined,
            }
        };

        let (downstream_fp, upstream_fp): (BTreeMap<Address, String>, BTreeMap<Address, String>) = {
            let _s2 = scope(_s.reporter());
            if granularity <= 1 {
                let down = fingerprint::md5_rows(downstream_cursor, &twin.downstream, &scan_condition, _s2.reporter())?
                    .into_iter()
                    .map(|(id, fp)| (Address::Row(id), fp))
                    .collect();
                let up = fingerprint::md5_rows(upstream_cursor, &twin.upstream, &scan_condition, _s2.reporter())?
                    .into_iter()
                    .map(|(id, fp)| (Address::Row(id), fp))
                    .collect();
                (down, up)
            } else {
                let down =
                    fingerprint::md5_row_ranges(downstream_cursor, &twin.downstream, &scan_condition, granularity, _s2.reporter())?
                        .into_iter()
                        .map(|(range, fp)| (Address::Range(range), fp))
                        .collect();
                let up = fingerprint::md5_row_ranges(upstream_cursor, &twin.upstream, &scan_condition, granularity, _s2.reporter())?
                    .into_iter()
                    .map(|(range, fp)| (Address::Range(range), fp))
                    .collect();
                (down, up)
            }
        };

        let mut scanned: Vec<Address> = downstream_fp.keys().chain(upstream_fp.keys()).copied().collect();
        scanned.sort();
        scanned.dedup();

        _s.reporter().emit(&format!("[Examining {} {thing} fingerprints]", scanned.len()));
        let _s3 = scope(_s.reporter());

        for address in scanned {
            let changed = match (downstream_fp.get(&address), upstream_fp.get(&address)) {
                (Some(d), Some(u)) => d != u,
                _ => true,
            };
            _s3.reporter().visualize_diff(changed);
            if changed {
                found.push(address);
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_address_diff_when_only_on_one_side() {
        let mut downstream: BTreeMap<Address, &str> = BTreeMap::new();
        downstream.insert(Address::Row(1), "abc");
        let mut upstream: BTreeMap<Address, &str> = BTreeMap::new();
        upstream.insert(Address::Row(1), "abc");
        upstream.insert(Address::Row(2), "def");

        let mut scanned: Vec<Address> = downstream.keys().chain(upstream.keys()).copied().collect();
        scanned.sort();
        scanned.dedup();

        let diffs: Vec<Address> = scanned
            .into_iter()
            .filter(|a| downstream.get(a) != upstream.get(a))
            .collect();

        assert_eq!(diffs, vec![Address::Row(2)]);
    }
}
