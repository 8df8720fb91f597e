//! The Schema Differ: reconciles a downstream table's columns to match
//! upstream's, by add/drop/modify, in upstream's declared order.
//!
//! Column definitions (type, default, nullability, position) are lifted
//! verbatim out of upstream's `SHOW CREATE TABLE`, rather than reconstructed
//! from `DESCRIBE` metadata, so the generated `ALTER TABLE` carries exactly
//! what upstream declared (collation, `AUTO_INCREMENT`, comments, and so
//! on) instead of an approximation assembled field-by-field.

use crate::collaborators::Cursor;
use crate::error::SyncError;
use crate::reporter::{scope, Reporter};

/// One column's `DESCRIBE` shape, plus the column immediately before it —
/// `after` is `None` for the first column, which pins it to the front of
/// the table instead.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnDescribe {
    after: Option<String>,
    field: String,
    default: Option<String>,
    null: String,
    type_: String,
}

fn describe(cursor: &mut dyn Cursor, table_name: &str) -> Result<Vec<ColumnDescribe>, SyncError> {
    let rows = cursor.query(&format!("DESCRIBE `{table_name}`"))?;
    let mut out = Vec::with_capacity(rows.len());
    let mut prev: Option<String> = None;

    for mut row in rows {
        let field: String = row
            .take("Field")
            .ok_or_else(|| SyncError::Programmer(format!("DESCRIBE {table_name} missing Field")))?;
        let default: Option<String> = row.take("Default").unwrap_or(None);
        let null: String = row
            .take("Null")
            .ok_or_else(|| SyncError::Programmer(format!("DESCRIBE {table_name} missing Null")))?;
        let type_: String = row
            .take("Type")
            .ok_or_else(|| SyncError::Programmer(format!("DESCRIBE {table_name} missing Type")))?;

        out.push(ColumnDescribe { after: prev.clone(), field: field.clone(), default, null, type_ });
        prev = Some(field);
    }

    Ok(out)
}

fn show_create(cursor: &mut dyn Cursor, table_name: &str) -> Result<String, SyncError> {
    let mut rows = cursor.query(&format!("SHOW CREATE TABLE `{table_name}`"))?;
    let mut row = rows
        .pop()
        .ok_or_else(|| SyncError::Programmer(format!("SHOW CREATE TABLE {table_name} returned no row")))?;
    row.take("Create Table")
        .ok_or_else(|| SyncError::Programmer(format!("SHOW CREATE TABLE {table_name} had no Create Table column")))
}

/// Pull the one line of a `CREATE TABLE` body that declares `column_name`,
/// trimmed of its trailing comma and surrounding whitespace — this is the
/// column definition fragment an `ADD COLUMN`/`MODIFY COLUMN` clause needs.
fn column_definition_line<'a>(create_table: &'a str, column_name: &str) -> Result<&'a str, SyncError> {
    create_table
        .lines()
        .find(|line| line.contains(&format!("`{column_name}`")))
        .map(|line| line.trim().trim_end_matches(','))
        .ok_or_else(|| {
            SyncError::Programmer(format!(
                "column `{column_name}` not found in its own table's SHOW CREATE TABLE output"
            ))
        })
}

fn position_clause(after: &Option<String>) -> String {
    match after {
        Some(col) => format!("AFTER `{col}`"),
        None => "FIRST".to_string(),
    }
}

/// One `ADD COLUMN`/`MODIFY COLUMN`'s before/after shape, kept for the
/// summary report.
#[derive(Debug, Clone)]
pub struct ColumnModification {
    pub column: String,
    pub from: String,
    pub to: String,
}

/// Everything the Schema Differ changed about a table, for the summary.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiffReport {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<ColumnModification>,
}

impl SchemaDiffReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.deleted.is_empty() || !self.modified.is_empty()
    }
}

/// Reconcile `table_name`'s downstream columns to upstream's: add columns
/// present only upstream, drop columns present only downstream, then
/// re-`MODIFY` any column whose type/default/nullability/position differs.
/// Column identity is name-based — a rename is seen as one drop plus one
/// add, never as a modify.
pub fn sync_schema(
    upstream_cursor: &mut dyn Cursor,
    downstream_cursor: &mut dyn Cursor,
    table_name: &str,
    reporter: &mut dyn Reporter,
) -> Result<SchemaDiffReport, SyncError> {
    let mut report = SchemaDiffReport::default();

    let (up, mut down) = {
        let _s = scope(reporter);
        let up = describe(upstream_cursor, table_name)?;
        let down = describe(downstream_cursor, table_name)?;
        (up, down)
    };

    let upstream_create = show_create(upstream_cursor, table_name)?;

    let added: Vec<&ColumnDescribe> = up.iter().filter(|u| !down.iter().any(|d| d.field == u.field)).collect();
    let deleted: Vec<&ColumnDescribe> = down.iter().filter(|d| !up.iter().any(|u| u.field == d.field)).collect();

    if !added.is_empty() {
        let _s = scope(reporter);
        _s.reporter().emit(&format!("Adding {} columns downstream", added.len()));
        for col in &added {
            let def = column_definition_line(&upstream_create, &col.field)?;
            let sql = format!(
                "ALTER TABLE `{table_name}` ADD COLUMN {def} {};",
                position_clause(&col.after)
            );
            downstream_cursor.exec(&sql)?;
            report.added.push(col.field.clone());
        }
    }

    if !deleted.is_empty() {
        let _s = scope(reporter);
        _s.reporter().emit(&format!("Deleting {} columns downstream", deleted.len()));
        for col in &deleted {
            let sql = format!("ALTER TABLE `{table_name}` DROP COLUMN `{}`;", col.field);
            downstream_cursor.exec(&sql)?;
            report.deleted.push(col.field.clone());
        }
    }

    if !added.is_empty() || !deleted.is_empty() {
        down = describe(downstream_cursor, table_name)?;
    }

    for up_col in &up {
        let down_col = down
            .iter()
            .find(|d| d.field == up_col.field)
            .ok_or_else(|| SyncError::SchemaMisaligned { table: table_name.to_string(), column: up_col.field.clone() })?;

        let _s = scope(reporter);
        if up_col.after != down_col.after || up_col.default != down_col.default || up_col.null != down_col.null || up_col.type_ != down_col.type_
        {
            _s.reporter().emit(&format!("Modifying column: {}", up_col.field));
            let def = column_definition_line(&upstream_create, &up_col.field)?;
            let sql = format!(
                "ALTER TABLE `{table_name}` MODIFY COLUMN {def} {};",
                position_clause(&up_col.after)
            );
            downstream_cursor.exec(&sql)?;
            report.modified.push(ColumnModification {
                column: up_col.field.clone(),
                from: format!("{down_col:?}"),
                to: format!("{up_col:?}"),
            });
        } else {
            _s.reporter().emit(&format!("Column: {} has no schema changes", up_col.field));
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_definition_line_strips_trailing_comma() {
        let create = "CREATE TABLE `t` (\n  `id` int(11) NOT NULL,\n  `name` varchar(255) DEFAULT NULL\n) ENGINE=InnoDB";
        assert_eq!(column_definition_line(create, "name").unwrap(), "`name` varchar(255) DEFAULT NULL");
    }

    #[test]
    fn position_clause_for_first_column_is_first() {
        assert_eq!(position_clause(&None), "FIRST");
    }

    #[test]
    fn position_clause_for_later_column_is_after() {
        assert_eq!(position_clause(&Some("id".to_string())), "AFTER `id`");
    }

    #[test]
    fn report_changed_is_false_when_nothing_moved() {
        let report = SchemaDiffReport::default();
        assert!(!report.changed());
    }

    #[test]
    fn report_changed_is_true_after_an_add() {
        let mut report = SchemaDiffReport::default();
        report.added.push("nickname".to_string());
        assert!(report.changed());
    }
}
