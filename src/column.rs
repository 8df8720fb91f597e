//! Column inspection and the concatenation-safe expressions used to build
//! row fingerprints.
//!
//! `information_schema.columns` is queried once per table side; each column
//! is rewritten into an expression that can sit inside `GROUP_CONCAT` or
//! `CONCAT_WS('|', …)` without producing `NULL` (which would make the whole
//! concatenation `NULL`) or mis-comparing binary/collated data.

use crate::collaborators::Cursor;
use crate::error::SyncError;

/// One column, paired with the SQL expression that stands in for it inside
/// a row fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExpression {
    pub name: String,
    pub sql_expr: String,
}

/// Apply the four concatenation-safety rules, in order, to one column's
/// metadata:
///
/// 1. Base: backquoted name.
/// 2. Nullable → `IFNULL(x, 'NULL')`.
/// 3. Collation set and not `utf8_general_ci` → prefix `BINARY`.
/// 4. Type contains `binary(` → wrap in `hex(...)`.
fn build_expression(name: &str, nullable: bool, collation: Option<&str>, column_type: &str) -> String {
    let mut expr = format!("`{name}`");

    if nullable {
        expr = format!("IFNULL({expr},'NULL')");
    }

    if let Some(collation) = collation {
        if collation != "utf8_general_ci" {
            expr = format!("BINARY {expr}");
        }
    }

    if column_type.contains("binary(") {
        expr = format!("hex({expr})");
    }

    expr
}

/// Inspect a table's columns in declaration order and build the
/// concatenation-safe expression list.
///
/// `cursor`'s bound database names the schema to query —
/// `information_schema.columns` is queried exactly once.
pub fn describe_columns(cursor: &mut dyn Cursor, table_name: &str) -> Result<Vec<ColumnExpression>, SyncError> {
    let database = cursor.database().to_string();
    let sql = format!(
        "SELECT COLUMN_NAME, IS_NULLABLE, COLUMN_TYPE, COLLATION_NAME \
         FROM information_schema.columns \
         WHERE table_schema = '{database}' AND table_name = '{table_name}' \
         ORDER BY ORDINAL_POSITION"
    );

    let rows = cursor.query(&sql)?;
    let mut columns = Vec::with_capacity(rows.len());

    for mut row in rows {
        let name: String = row.take("COLUMN_NAME").ok_or_else(|| {
            SyncError::Programmer(format!("query for {table_name} columns did not return COLUMN_NAME"))
        })?;
        let is_nullable: String = row.take("IS_NULLABLE").ok_or_else(|| {
            SyncError::Programmer(format!("query for {table_name} columns did not return IS_NULLABLE"))
        })?;
        let column_type: String = row.take("COLUMN_TYPE").ok_or_else(|| {
            SyncError::Programmer(format!("query for {table_name} columns did not return COLUMN_TYPE"))
        })?;
        let collation: Option<String> = row.take("COLLATION_NAME").unwrap_or(None);

        let sql_expr = build_expression(&name, is_nullable == "YES", collation.as_deref(), &column_type);
        columns.push(ColumnExpression { name, sql_expr });
    }

    if columns.is_empty() {
        return Err(SyncError::Programmer(format!(
            "table {table_name} has no columns in {database}.information_schema — does it exist?"
        )));
    }

    Ok(columns)
}

/// Join a column-expression list by `,` for embedding inside `GROUP_CONCAT`
/// or `CONCAT_WS('|', …)`, per the Column Descriptor contract.
pub fn join_expressions(columns: &[ColumnExpression]) -> String {
    columns
        .iter()
        .map(|c| c.sql_expr.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_column_is_just_backquoted() {
        assert_eq!(build_expression("name", false, None, "varchar(255)"), "`name`");
    }

    #[test]
    fn nullable_column_gets_ifnull() {
        assert_eq!(
            build_expression("nickname", true, None, "varchar(255)"),
            "IFNULL(`nickname`,'NULL')"
        );
    }

    #[test]
    fn non_default_collation_gets_binary_prefix() {
        assert_eq!(
            build_expression("name", false, Some("utf8mb4_bin"), "varchar(255)"),
            "BINARY `name`"
        );
    }

    #[test]
    fn default_collation_is_left_alone() {
        assert_eq!(
            build_expression("name", false, Some("utf8_general_ci"), "varchar(255)"),
            "`name`"
        );
    }

    #[test]
    fn binary_type_gets_hex_wrapped() {
        assert_eq!(build_expression("token", false, None, "binary(16)"), "hex(`token`)");
    }

    #[test]
    fn nullable_binary_column_composes_all_applicable_rules() {
        // binary(16) NULL: IFNULL first, then hex() wraps the whole thing,
        // so a NULL value still produces a concatenable string instead of
        // raising a collation error.
        assert_eq!(
            build_expression("uuid", true, None, "binary(16)"),
            "hex(IFNULL(`uuid`,'NULL'))"
        );
    }

    #[test]
    fn join_expressions_is_comma_separated() {
        let cols = vec![
            ColumnExpression { name: "id".into(), sql_expr: "`id`".into() },
            ColumnExpression { name: "name".into(), sql_expr: "IFNULL(`name`,'NULL')".into() },
        ];
        assert_eq!(join_expressions(&cols), "`id`,IFNULL(`name`,'NULL')");
    }
}
