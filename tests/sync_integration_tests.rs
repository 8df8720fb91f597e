//! End-to-end sync scenarios against real MySQL containers.
//!
//! `#[tokio::test]` only manages container lifecycle here — the engine
//! itself is synchronous throughout, per its single-threaded, cooperative
//! concurrency model. Every call into `slicetool_sync` happens as a plain
//! blocking call inside the async test body.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use slicetool_sync::collaborators::{Cursor, Dumper, Loader};
use slicetool_sync::config::ConnectionArgs;
use slicetool_sync::error::SyncError;
use slicetool_sync::mysql_backend::MysqlCursor;
use slicetool_sync::reporter::TracingReporter;
use slicetool_sync::table::TableOutcome;
use slicetool_sync::zoom;
use testcontainers_modules::mysql::Mysql;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;

async fn start_mysql() -> (ContainerAsync<Mysql>, u16) {
    let container = Mysql::default().start().await.expect("mysql container starts");
    let port = container.get_host_port_ipv4(3306).await.expect("mysql port is mapped");
    (container, port)
}

fn conn_args(port: u16) -> ConnectionArgs {
    ConnectionArgs {
        user: "root".into(),
        password: String::new(),
        host: "127.0.0.1".into(),
        database: "test".into(),
        socket: None,
        cipher: None,
        port: Some(port),
    }
}

/// An in-memory stand-in for `mysqldump`/`mysql`: copies rows directly
/// between connections instead of shelling out, so these tests don't
/// depend on the client binaries being installed on the runner.
///
/// `sync_table` takes its dumper and loader as two distinct `&mut dyn`
/// arguments, so one `InProcessTransfer` can't serve as both — a second
/// `&mut` borrow of the same local would be rejected by the borrow checker.
/// The traits are implemented for `&InProcessTransfer` instead (a shared
/// reference is `Copy`, so two independent `&mut` bindings to it can coexist)
/// with the staged rows behind a `RefCell` for interior mutability.
struct InProcessTransfer {
    staged: RefCell<BTreeMap<PathBuf, Vec<(String, String)>>>,
}

impl InProcessTransfer {
    fn new() -> Self {
        InProcessTransfer { staged: RefCell::new(BTreeMap::new()) }
    }
}

/// Render one `mysql::Value` as a SQL literal suitable for a plain
/// `INSERT ... VALUES (...)` statement.
fn sql_literal(value: &mysql::Value) -> String {
    match value {
        mysql::Value::NULL => "NULL".to_string(),
        mysql::Value::Int(i) => i.to_string(),
        mysql::Value::UInt(u) => u.to_string(),
        mysql::Value::Float(f) => f.to_string(),
        mysql::Value::Double(d) => d.to_string(),
        mysql::Value::Bytes(_) => {
            let s = mysql::from_value::<String>(value.clone());
            format!("'{}'", s.replace('\'', "''"))
        }
        other => format!("'{}'", mysql::from_value::<String>(other.clone()).replace('\'', "''")),
    }
}

impl Dumper for &InProcessTransfer {
    fn dump(&mut self, conn: &ConnectionArgs, table: &str, where_clause: Option<&str>, append: bool, output_path: &Path) -> Result<(), SyncError> {
        let mut cursor = MysqlCursor::connect(conn)?;
        let sql = match where_clause {
            Some(clause) => format!("SELECT * FROM `{table}` WHERE {clause}"),
            None => format!("SELECT * FROM `{table}`"),
        };
        let rows = cursor.query(&sql)?;

        let mut inserts = Vec::with_capacity(rows.len());
        for row in rows {
            let columns = row.columns();
            let values: Vec<String> = (0..columns.len())
                .map(|i| sql_literal(row.as_ref(i).expect("column index in range")))
                .collect();
            inserts.push((table.to_string(), format!("INSERT INTO `{table}` VALUES ({})", values.join(","))));
        }

        let mut staged = self.staged.borrow_mut();
        let entry = staged.entry(output_path.to_path_buf()).or_default();
        if !append {
            entry.clear();
        }
        entry.extend(inserts);
        Ok(())
    }
}

impl Loader for &InProcessTransfer {
    fn load(&mut self, conn: &ConnectionArgs, input_path: &Path) -> Result<(), SyncError> {
        let mut cursor = MysqlCursor::connect(conn)?;
        if let Some(statements) = self.staged.borrow().get(input_path) {
            for (_table, sql) in statements {
                cursor.exec(sql)?;
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn zoom_sync_converges_on_a_fresh_downstream_table() {
    let (_upstream_container, upstream_port) = start_mysql().await;
    let (_downstream_container, downstream_port) = start_mysql().await;

    let upstream_conn = conn_args(upstream_port);
    let downstream_conn = conn_args(downstream_port);

    let mut upstream_cursor = MysqlCursor::connect(&upstream_conn).expect("connect to upstream");
    let mut downstream_cursor = MysqlCursor::connect(&downstream_conn).expect("connect to downstream");

    upstream_cursor
        .exec("CREATE TABLE widgets (id INT PRIMARY KEY, name VARCHAR(64) NOT NULL)")
        .expect("create upstream table");
    for i in 1..=50 {
        upstream_cursor
            .exec(&format!("INSERT INTO widgets VALUES ({i}, 'widget-{i}')"))
            .expect("seed upstream rows");
    }

    let transfer = InProcessTransfer::new();
    let mut dumper = &transfer;
    let mut loader = &transfer;
    let mut reporter = TracingReporter::new();
    let scratch = PathBuf::from("scratch.sql");

    let outcome = zoom::sync_table(
        "widgets",
        &[10, 1],
        "id",
        &mut upstream_cursor,
        &mut downstream_cursor,
        &upstream_conn,
        &downstream_conn,
        &mut dumper,
        &mut loader,
        100_000,
        None,
        &scratch,
        false,
        &mut reporter,
    )
    .expect("sync completes");

    assert!(matches!(outcome, TableOutcome::Synced { .. }), "expected a synced outcome, got {outcome:?}");

    let count: i64 = downstream_cursor
        .query("SELECT count(*) AS ct FROM widgets")
        .expect("count downstream rows")
        .pop()
        .and_then(|mut r| r.take("ct"))
        .expect("count row present");
    assert_eq!(count, 50);
}

#[tokio::test]
async fn presync_alone_handles_pure_append() {
    let (_upstream_container, upstream_port) = start_mysql().await;
    let (_downstream_container, downstream_port) = start_mysql().await;

    let upstream_conn = conn_args(upstream_port);
    let downstream_conn = conn_args(downstream_port);

    let mut upstream_cursor = MysqlCursor::connect(&upstream_conn).expect("connect to upstream");
    let mut downstream_cursor = MysqlCursor::connect(&downstream_conn).expect("connect to downstream");

    let create = "CREATE TABLE events (id INT PRIMARY KEY, payload VARCHAR(64) NOT NULL)";
    upstream_cursor.exec(create).expect("create upstream table");
    downstream_cursor.exec(create).expect("create downstream table");

    for i in 1..=5 {
        upstream_cursor.exec(&format!("INSERT INTO events VALUES ({i}, 'e{i}')")).expect("seed upstream");
        downstream_cursor.exec(&format!("INSERT INTO events VALUES ({i}, 'e{i}')")).expect("seed downstream");
    }
    for i in 6..=10 {
        upstream_cursor.exec(&format!("INSERT INTO events VALUES ({i}, 'e{i}')")).expect("append upstream only");
    }

    let transfer = InProcessTransfer::new();
    let mut dumper = &transfer;
    let mut loader = &transfer;
    let mut reporter = TracingReporter::new();
    let scratch = PathBuf::from("scratch_presync.sql");

    let outcome = zoom::sync_table(
        "events",
        &[10, 1],
        "id",
        &mut upstream_cursor,
        &mut downstream_cursor,
        &upstream_conn,
        &downstream_conn,
        &mut dumper,
        &mut loader,
        100_000,
        None,
        &scratch,
        false,
        &mut reporter,
    )
    .expect("sync completes");

    assert!(matches!(outcome, TableOutcome::Synced { .. }), "presync alone should have closed the gap, got {outcome:?}");
}
