//! `slicetool` — command-line driver for the sync engine.

mod slice;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use slicetool_sync::config::{ConnectionArgs, BATCH_ROWS};
use slicetool_sync::mysql_backend::MysqlCursor;
use slicetool_sync::subprocess::{MysqldumpDumper, MysqlLoader};
use slicetool_sync::{Cursor, Reporter, SyncError, TracingReporter};

use slice::SliceConfig;

#[derive(Parser)]
#[command(name = "slicetool", about = "One-way incremental sync between MySQL-compatible databases")]
struct Cli {
    #[command(flatten)]
    upstream: UpstreamArgs,

    #[command(flatten)]
    downstream: DownstreamArgs,

    /// Skip the interim/final `CHECKSUM TABLE` equality check, trading a
    /// definite "identical" answer for one round trip fewer per table.
    #[arg(long, env = "SLICETOOL_LITE")]
    lite: bool,

    /// Row batch size for pre-sync id-extension dumps.
    #[arg(long, env = "SLICETOOL_BATCH_ROWS", default_value_t = BATCH_ROWS)]
    batch_rows: u64,

    /// Scratch file used to stage dumped rows between `mysqldump` and
    /// `mysql`.
    #[arg(long, default_value = "slicetool_scratch.sql")]
    scratch_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct UpstreamArgs {
    #[arg(long = "upstream-host", env = "SLICETOOL_UPSTREAM_HOST")]
    host: String,
    #[arg(long = "upstream-user", env = "SLICETOOL_UPSTREAM_USER")]
    user: String,
    #[arg(long = "upstream-password", env = "SLICETOOL_UPSTREAM_PASSWORD", default_value = "")]
    password: String,
    #[arg(long = "upstream-database", env = "SLICETOOL_UPSTREAM_DATABASE")]
    database: String,
    #[arg(long = "upstream-socket", env = "SLICETOOL_UPSTREAM_SOCKET")]
    socket: Option<PathBuf>,
    #[arg(long = "upstream-cipher", env = "SLICETOOL_UPSTREAM_CIPHER")]
    cipher: Option<String>,
    #[arg(long = "upstream-port", env = "SLICETOOL_UPSTREAM_PORT")]
    port: Option<u16>,
}

#[derive(Args)]
struct DownstreamArgs {
    #[arg(long = "downstream-host", env = "SLICETOOL_DOWNSTREAM_HOST")]
    host: String,
    #[arg(long = "downstream-user", env = "SLICETOOL_DOWNSTREAM_USER")]
    user: String,
    #[arg(long = "downstream-password", env = "SLICETOOL_DOWNSTREAM_PASSWORD", default_value = "")]
    password: String,
    #[arg(long = "downstream-database", env = "SLICETOOL_DOWNSTREAM_DATABASE")]
    database: String,
    #[arg(long = "downstream-socket", env = "SLICETOOL_DOWNSTREAM_SOCKET")]
    socket: Option<PathBuf>,
    #[arg(long = "downstream-cipher", env = "SLICETOOL_DOWNSTREAM_CIPHER")]
    cipher: Option<String>,
    #[arg(long = "downstream-port", env = "SLICETOOL_DOWNSTREAM_PORT")]
    port: Option<u16>,
}

impl From<UpstreamArgs> for ConnectionArgs {
    fn from(a: UpstreamArgs) -> Self {
        ConnectionArgs { user: a.user, password: a.password, host: a.host, database: a.database, socket: a.socket, cipher: a.cipher, port: a.port }
    }
}

impl From<DownstreamArgs> for ConnectionArgs {
    fn from(a: DownstreamArgs) -> Self {
        ConnectionArgs { user: a.user, password: a.password, host: a.host, database: a.database, socket: a.socket, cipher: a.cipher, port: a.port }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Sync every table named in a slice file.
    Pull {
        /// Path to a slice's TOML configuration.
        slice: PathBuf,
    },
    /// Bootstrap an empty downstream database with upstream's schema
    /// (tables only, no foreign keys), then exit — refuses to touch a
    /// nonempty downstream.
    BootstrapSchema,
}

fn main() -> Result<(), SyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let upstream_conn: ConnectionArgs = cli.upstream.into();
    let downstream_conn: ConnectionArgs = cli.downstream.into();
    upstream_conn.validate()?;
    downstream_conn.validate()?;

    let mut reporter = TracingReporter::new();

    match cli.command {
        Command::Pull { slice } => {
            let slice = SliceConfig::load(&slice)?;
            let mut upstream_cursor = MysqlCursor::connect(&upstream_conn)?;
            let mut downstream_cursor = MysqlCursor::connect(&downstream_conn)?;
            let mut dumper = MysqldumpDumper;
            let mut loader = MysqlLoader;

            slice::run_slice(
                &slice,
                &mut upstream_cursor,
                &mut downstream_cursor,
                &upstream_conn,
                &downstream_conn,
                &mut dumper,
                &mut loader,
                cli.batch_rows,
                &cli.scratch_path,
                cli.lite,
                &mut reporter,
            )?;
        }
        Command::BootstrapSchema => {
            bootstrap_schema(&upstream_conn, &downstream_conn, &mut reporter)?;
        }
    }

    reporter.emit("Done");
    Ok(())
}

/// Dump upstream's full schema (no foreign keys) and load it into an empty
/// downstream. Refuses outright if downstream already has tables — per the
/// original tool, an operator who wants that database replaced is expected
/// to drop and recreate it themselves rather than trust this command to do
/// it silently.
fn bootstrap_schema(upstream_conn: &ConnectionArgs, downstream_conn: &ConnectionArgs, reporter: &mut dyn Reporter) -> Result<(), SyncError> {
    let mut downstream_cursor = MysqlCursor::connect(downstream_conn)?;
    let existing = downstream_cursor.query("SHOW TABLES")?;

    if !existing.is_empty() {
        reporter.emit(&format!(
            "{} is a nonempty downstream database. If you want me to create a new \
             database in its place, you'll have to drop and create it yourself.",
            downstream_conn.database
        ));
        return Ok(());
    }

    let mut upstream_cursor = MysqlCursor::connect(upstream_conn)?;
    let tables = upstream_cursor.query("SHOW TABLES")?;

    for mut row in tables {
        let table_name: String = row
            .take(0)
            .ok_or_else(|| SyncError::Programmer("SHOW TABLES row had no first column".into()))?;
        let create_sql = upstream_cursor
            .query(&format!("SHOW CREATE TABLE `{table_name}`"))?
            .pop()
            .and_then(|mut r| r.take::<String, _>("Create Table"))
            .ok_or_else(|| SyncError::Programmer(format!("SHOW CREATE TABLE {table_name} returned nothing")))?;
        downstream_cursor.exec(&create_sql)?;
        reporter.emit(&format!("created table: {table_name}"));
    }

    Ok(())
}
