//! [`Dumper`] and [`Loader`] implementations that shell out to the
//! `mysqldump`/`mysql` client binaries, matching the original tool's
//! "portable INSERT-statement dump, no schema, no GTID, no table locks"
//! contract.
//!
//! Passwords go through the `MYSQL_PWD` environment variable rather than a
//! `--password=...` flag, which would otherwise show up in `ps` output on
//! the same host.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::collaborators::{Dumper, Loader};
use crate::config::ConnectionArgs;
use crate::error::SyncError;

fn base_client_args(conn: &ConnectionArgs, cmd: &mut Command) {
    cmd.arg(format!("--user={}", conn.user));
    if conn.is_local() {
        if let Ok(socket) = conn.resolve_socket() {
            cmd.arg(format!("--socket={}", socket.display()));
        }
    } else {
        cmd.arg(format!("--host={}", conn.host));
        if let Some(cipher) = &conn.cipher {
            cmd.arg(format!("--ssl-cipher={cipher}"));
        }
    }
    cmd.env("MYSQL_PWD", &conn.password);
}

/// `true` if a `mysqldump` stderr blob reports the column-count mismatch
/// that signals upstream's schema outran downstream's.
fn looks_like_schema_drift(stderr: &str) -> bool {
    stderr.contains("Column count doesn't match")
}

/// Dumps rows from one table to a portable SQL file via `mysqldump`, with
/// no schema (`--no-create-info`), no GTID metadata, and no table locks —
/// a one-way row sync never needs to reproduce DDL or take a read lock that
/// would stall writers on a production upstream.
pub struct MysqldumpDumper;

impl Dumper for MysqldumpDumper {
    fn dump(
        &mut self,
        conn: &ConnectionArgs,
        table: &str,
        where_clause: Option<&str>,
        append: bool,
        output_path: &Path,
    ) -> Result<(), SyncError> {
        let mut cmd = Command::new("mysqldump");
        base_client_args(conn, &mut cmd);
        cmd.arg("--no-create-info")
            .arg("--skip-set-charset")
            .arg("--set-gtid-purged=OFF")
            .arg("--skip-lock-tables")
            .arg("--single-transaction")
            .arg("--compact")
            .arg(&conn.database)
            .arg(table);
        if let Some(clause) = where_clause {
            cmd.arg(format!("--where={clause}"));
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = cmd
            .output()
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysqldump", path: output_path.to_path_buf(), detail: e.to_string() })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if looks_like_schema_drift(&stderr) {
                return Err(SyncError::SchemaDrift { table: table.to_string(), detail: stderr });
            }
            return Err(SyncError::CollaboratorFailed { program: "mysqldump", path: output_path.to_path_buf(), detail: stderr });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(output_path)
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysqldump", path: output_path.to_path_buf(), detail: e.to_string() })?;
        file.write_all(&output.stdout)
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysqldump", path: output_path.to_path_buf(), detail: e.to_string() })?;

        Ok(())
    }
}

/// Applies a SQL file to a database by piping it into the `mysql` client.
pub struct MysqlLoader;

impl Loader for MysqlLoader {
    fn load(&mut self, conn: &ConnectionArgs, input_path: &Path) -> Result<(), SyncError> {
        let mut cmd = Command::new("mysql");
        base_client_args(conn, &mut cmd);
        cmd.arg(&conn.database);

        let input = std::fs::read(input_path)
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysql", path: input_path.to_path_buf(), detail: e.to_string() })?;

        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysql", path: input_path.to_path_buf(), detail: e.to_string() })?;

        child
            .stdin
            .take()
            .expect("stdin was requested as piped")
            .write_all(&input)
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysql", path: input_path.to_path_buf(), detail: e.to_string() })?;

        let output = child
            .wait_with_output()
            .map_err(|e| SyncError::CollaboratorFailed { program: "mysql", path: input_path.to_path_buf(), detail: e.to_string() })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if looks_like_schema_drift(&stderr) {
                return Err(SyncError::SchemaDrift { table: conn.database.clone(), detail: stderr });
            }
            return Err(SyncError::CollaboratorFailed { program: "mysql", path: input_path.to_path_buf(), detail: stderr });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_schema_drift_message() {
        assert!(looks_like_schema_drift("ERROR 1136: Column count doesn't match value count at row 1"));
        assert!(!looks_like_schema_drift("ERROR 2002: Can't connect to local MySQL server"));
    }
}
