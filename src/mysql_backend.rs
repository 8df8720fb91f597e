//! The concrete [`Cursor`] over a live MySQL connection, and the connection
//! builder for [`ConnectionArgs`] — local (Unix socket) or remote
//! (TCP, optionally TLS).

use mysql::prelude::Queryable;
use mysql::{Opts, OptsBuilder, PooledConn, SslOpts};

use crate::collaborators::Cursor;
use crate::config::ConnectionArgs;
use crate::error::SyncError;

pub struct MysqlCursor {
    conn: PooledConn,
    host: String,
    database: String,
}

impl MysqlCursor {
    /// Connect using `args`: a Unix domain socket for `localhost` (explicit
    /// or auto-discovered), TCP with optional TLS cipher otherwise. The
    /// database is selected with an explicit `USE` once connected, mirroring
    /// the original client's workaround for servers that reject a database
    /// name baked into the initial handshake.
    pub fn connect(args: &ConnectionArgs) -> Result<Self, SyncError> {
        args.validate()?;

        let opts = if args.is_local() {
            let socket = args.resolve_socket()?;
            OptsBuilder::new()
                .user(Some(&args.user))
                .pass(Some(&args.password))
                .socket(Some(socket.to_string_lossy().into_owned()))
        } else {
            let ssl_opts = args.cipher.as_ref().map(|cipher| SslOpts::default().with_cipher(Some(cipher.clone())));
            OptsBuilder::new()
                .ip_or_hostname(Some(&args.host))
                .tcp_port(args.port.unwrap_or(3306))
                .user(Some(&args.user))
                .pass(Some(&args.password))
                .ssl_opts(ssl_opts)
        };

        let pool = mysql::Pool::new(Opts::from(opts)).map_err(|e| SyncError::transient(args.host.clone(), e))?;
        let mut conn = pool.get_conn().map_err(|e| SyncError::transient(args.host.clone(), e))?;
        conn.query_drop(format!("USE `{}`", args.database))
            .map_err(|e| SyncError::transient(args.host.clone(), e))?;

        Ok(MysqlCursor {
            conn,
            host: args.host.clone(),
            database: args.database.clone(),
        })
    }
}

impl Cursor for MysqlCursor {
    fn host(&self) -> &str {
        &self.host
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn query(&mut self, sql: &str) -> Result<Vec<mysql::Row>, SyncError> {
        self.conn.query(sql).map_err(|e| SyncError::transient(self.host.clone(), e))
    }

    fn exec(&mut self, sql: &str) -> Result<u64, SyncError> {
        self.conn.query_drop(sql).map_err(|e| SyncError::transient(self.host.clone(), e))?;
        Ok(self.conn.affected_rows())
    }
}
