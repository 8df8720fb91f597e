//! Row- and range-level MD5 fingerprinting, and the `group_concat_max_len`
//! budget negotiation that bounds how many rows one `GROUP_CONCAT` can fold
//! into a single range fingerprint without silent truncation.

use std::collections::BTreeMap;

use crate::collaborators::Cursor;
use crate::column;
use crate::error::SyncError;
use crate::interval::Interval;
use crate::reporter::{scope, Reporter};
use crate::table::TableSide;

/// A location a fingerprint was taken at: either one row (granularity 1) or
/// a contiguous id range (granularity > 1). Unifies the two shapes
/// `zoom_levels` cycles through so the Diff Finder and Zoom Scanner don't
/// need separate code paths for "found individual rows" vs. "found ranges".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    Row(u64),
    Range(Interval),
}

impl Address {
    pub fn sql_predicate(&self, id_col: &str) -> String {
        match self {
            Address::Row(id) => format!("{id_col} = {id}"),
            Address::Range(range) => range.sql_between(id_col),
        }
    }

    pub fn start(&self) -> u64 {
        match self {
            Address::Row(id) => *id,
            Address::Range(range) => range.start,
        }
    }
}

/// How many rows a server is willing to fold into one `GROUP_CONCAT`
/// without truncating, and the `group_concat_max_len` byte value that
/// produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConcatBudget {
    pub rows: u64,
    pub bytes: u64,
}

fn md5_byte_width(cursor: &mut dyn Cursor) -> Result<u64, SyncError> {
    let mut rows = cursor.query("SELECT length(concat(md5('foo'),',')) AS md5_bytes")?;
    let mut row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer("md5 byte-width probe returned no row".into()))?;
    let width: i64 = row
        .take("md5_bytes")
        .ok_or_else(|| SyncError::Programmer("md5 byte-width probe had no md5_bytes column".into()))?;
    Ok(width as u64)
}

/// Ask the server for `try_bytes` of `group_concat_max_len`, then read back
/// what it actually granted — servers cap this session variable, and a
/// silent truncation here would corrupt every range fingerprint above the
/// cap rather than error out.
pub fn negotiate_group_concat_budget(
    cursor: &mut dyn Cursor,
    try_bytes: u64,
    reporter: &mut dyn Reporter,
) -> Result<GroupConcatBudget, SyncError> {
    reporter.emit(&format!("How many rows is {} willing to hash at a time?", cursor.host()));
    let _s = scope(reporter);

    cursor.exec(&format!("SET SESSION group_concat_max_len = {try_bytes}"))?;

    let mut rows = cursor.query("SHOW VARIABLES WHERE Variable_name = 'group_concat_max_len'")?;
    let mut row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer("group_concat_max_len has no SHOW VARIABLES row".into()))?;
    let granted: String = row
        .take("Value")
        .ok_or_else(|| SyncError::Programmer("group_concat_max_len row had no Value column".into()))?;
    let granted_bytes: u64 = granted
        .parse()
        .map_err(|_| SyncError::Programmer(format!("group_concat_max_len value '{granted}' is not an integer")))?;

    let md5_bytes = md5_byte_width(cursor)?;
    let rows = granted_bytes / md5_bytes;

    _s.reporter().emit(&format!("{} is willing to hash {rows} rows at a time.", cursor.host()));
    Ok(GroupConcatBudget { rows, bytes: granted_bytes })
}

/// Re-assert a previously negotiated `group_concat_max_len` on a fresh
/// session — new connections reset it to the server default, which is too
/// low for a multi-row range fingerprint.
pub fn set_group_concat_budget(cursor: &mut dyn Cursor, bytes: u64) -> Result<(), SyncError> {
    cursor.exec(&format!("SET SESSION group_concat_max_len = {bytes}"))?;
    Ok(())
}

/// Fingerprint each row matching `condition` individually. Granularity-1
/// counterpart of [`md5_row_ranges`] — callers choose between the two based
/// on the zoom level they're scanning at, never both.
pub fn md5_rows(
    cursor: &mut dyn Cursor,
    table: &TableSide,
    condition: &str,
    reporter: &mut dyn Reporter,
) -> Result<BTreeMap<u64, String>, SyncError> {
    let columns_str = column::join_expressions(&table.columns);
    reporter.emit(&format!(
        "[ Fingerprinting each row in {}.{}\n  where {} ]",
        cursor.database(),
        table.name,
        condition
    ));
    let _s = scope(reporter);

    let sql = format!(
        "SELECT {id_col} AS id, MD5(CONCAT_WS('|', {columns_str})) AS fingerprint \
         FROM `{table_name}` WHERE {condition} ORDER BY {id_col}",
        id_col = table.id_col,
        table_name = table.name,
    );

    let mut out = BTreeMap::new();
    for mut row in cursor.query(&sql)? {
        let id: u64 = row
            .take("id")
            .ok_or_else(|| SyncError::Programmer(format!("row fingerprint query on {} missing id", table.name)))?;
        let fingerprint: String = row.take("fingerprint").ok_or_else(|| {
            SyncError::Programmer(format!("row fingerprint query on {} missing fingerprint", table.name))
        })?;
        out.insert(id, fingerprint);
    }
    Ok(out)
}

/// Fingerprint `granularity`-sized contiguous id ranges matching
/// `condition`, by folding each range's rows into one `GROUP_CONCAT` before
/// hashing. `granularity` must be greater than 1 — use [`md5_rows`] for
/// individual-row fingerprints.
pub fn md5_row_ranges(
    cursor: &mut dyn Cursor,
    table: &TableSide,
    condition: &str,
    granularity: u64,
    reporter: &mut dyn Reporter,
) -> Result<BTreeMap<Interval, String>, SyncError> {
    if granularity <= 1 {
        return Err(SyncError::Programmer(
            "md5_row_ranges called with a trivial granularity; use md5_rows instead".into(),
        ));
    }

    let columns_str = column::join_expressions(&table.columns);
    reporter.emit(&format!(
        "[ Fingerprinting {}.{} in row-ranges of size {granularity}\n  where {} ]",
        cursor.database(),
        table.name,
        condition
    ));
    let _s = scope(reporter);

    let sql = format!(
        "SELECT MD5(GROUP_CONCAT(row_fingerprint ORDER BY id)) AS range_fingerprint, \
                row_group * {granularity} AS range_begin, \
                (row_group + 1) * {granularity} - 1 AS range_end \
         FROM ( \
             SELECT MD5(CONCAT_WS('|', {columns_str})) AS row_fingerprint, \
                    FLOOR({id_col} / {granularity}) AS row_group, \
                    {id_col} AS id \
             FROM `{table_name}` \
             WHERE {condition} \
             ORDER BY {id_col} \
         ) AS r \
         GROUP BY row_group",
        id_col = table.id_col,
        table_name = table.name,
    );

    let mut out = BTreeMap::new();
    for mut row in cursor.query(&sql)? {
        let begin: i64 = row
            .take("range_begin")
            .ok_or_else(|| SyncError::Programmer(format!("range fingerprint query on {} missing range_begin", table.name)))?;
        let end: i64 = row
            .take("range_end")
            .ok_or_else(|| SyncError::Programmer(format!("range fingerprint query on {} missing range_end", table.name)))?;
        let fingerprint: String = row.take("range_fingerprint").ok_or_else(|| {
            SyncError::Programmer(format!("range fingerprint query on {} missing range_fingerprint", table.name))
        })?;
        out.insert(Interval::new(begin as u64, end as u64), fingerprint);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_row_predicate_is_equality() {
        assert_eq!(Address::Row(42).sql_predicate("id"), "id = 42");
    }

    #[test]
    fn address_range_predicate_is_between() {
        let addr = Address::Range(Interval::new(10, 19));
        assert_eq!(addr.sql_predicate("id"), "id BETWEEN 10 AND 19");
    }

    #[test]
    fn address_start_matches_row_or_range_start() {
        assert_eq!(Address::Row(5).start(), 5);
        assert_eq!(Address::Range(Interval::new(5, 9)).start(), 5);
    }

    #[test]
    fn addresses_order_by_start() {
        let mut addrs = vec![Address::Range(Interval::new(10, 19)), Address::Row(3)];
        addrs.sort_by_key(Address::start);
        assert_eq!(addrs, vec![Address::Row(3), Address::Range(Interval::new(10, 19))]);
    }
}
