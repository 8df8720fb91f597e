//! Connection arguments and the tuning constants that bound batch sizes.
//!
//! `ConnectionArgs` is the Rust shape of the original tool's
//! `LocalArgs`/`RemoteArgs`: a single struct, with `host == "localhost"`
//! meaning "use a Unix domain socket" the way MySQL clients conventionally
//! treat that hostname. Socket auto-discovery is a best-effort scan of the
//! usual well-known paths rather than the original's `netstat | awk`
//! pipeline — shelling out to parse `netstat` text is not something to
//! reproduce faithfully; this keeps the same contract (don't make the
//! operator type a socket path for the common case) with a portable
//! implementation.

use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// `batch_rows` — dump batch size for pre-sync ID-extension (§4.6).
pub const BATCH_ROWS: u64 = 100_000;

/// `batch_conditions` — max ID-IN-list size per dump call (§4.6, §4.7).
pub const BATCH_CONDITIONS: usize = 1000;

/// `batch_fingerprints` — max predicates per fingerprint batch (§4.5, §4.7).
pub const BATCH_FINGERPRINTS: usize = 1000;

/// Initial `group_concat_max_len` request: 32 bytes per MD5 digest plus one
/// for the separating comma, times ten million rows.
pub const GROUP_CONCAT_TRY_BYTES: u64 = 10_000_000 * 33;

/// Well-known Unix socket locations checked, in order, when a caller asks
/// for `localhost` without specifying a socket explicitly.
const WELL_KNOWN_SOCKETS: &[&str] = &[
    "/var/run/mysqld/mysqld.sock",
    "/tmp/mysql.sock",
    "/var/lib/mysql/mysql.sock",
    "/var/run/mysql/mysql.sock",
];

/// Connection parameters for one side (upstream or downstream) of a sync.
#[derive(Debug, Clone)]
pub struct ConnectionArgs {
    pub user: String,
    pub password: String,
    pub host: String,
    pub database: String,
    /// Explicit socket path. If `None` and `host == "localhost"`, one is
    /// auto-discovered from [`WELL_KNOWN_SOCKETS`].
    pub socket: Option<PathBuf>,
    /// TLS cipher suite name. Ignored for local (socket) connections.
    /// Remote connections enable TLS unless this is explicitly `None` via
    /// `--no-upstream-cipher`/`--no-downstream-cipher`.
    pub cipher: Option<String>,
    /// TCP port for remote connections. `None` means the server default
    /// (3306) — this only ever needs overriding in test fixtures, where a
    /// container maps MySQL to a random host port.
    pub port: Option<u16>,
}

impl ConnectionArgs {
    pub fn is_local(&self) -> bool {
        self.host == "localhost"
    }

    /// Resolve the Unix socket path to connect through, when this is a
    /// local connection. Returns `ConfigInvalid` if none can be found.
    pub fn resolve_socket(&self) -> Result<PathBuf, SyncError> {
        if let Some(explicit) = &self.socket {
            return Ok(explicit.clone());
        }
        WELL_KNOWN_SOCKETS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                SyncError::ConfigInvalid(format!(
                    "host is 'localhost' but no socket was given and none of {WELL_KNOWN_SOCKETS:?} exist"
                ))
            })
    }

    /// Validate the minimal shape required before any connection attempt:
    /// non-empty user/database, and a cipher only ever set for remote
    /// connections (a local socket connection has no TLS layer to cipher).
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.user.is_empty() {
            return Err(SyncError::ConfigInvalid("user must not be empty".into()));
        }
        if self.database.is_empty() {
            return Err(SyncError::ConfigInvalid("database must not be empty".into()));
        }
        if self.is_local() && self.cipher.is_some() {
            return Err(SyncError::ConfigInvalid(
                "cipher was set for a localhost (socket) connection, which has no TLS layer".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(host: &str) -> ConnectionArgs {
        ConnectionArgs {
            user: "sync".into(),
            password: String::new(),
            host: host.into(),
            database: "widgets".into(),
            socket: None,
            cipher: None,
            port: None,
        }
    }

    #[test]
    fn local_means_localhost_literally() {
        assert!(base("localhost").is_local());
        assert!(!base("db.internal.example.com").is_local());
    }

    #[test]
    fn cipher_on_local_connection_is_invalid() {
        let mut args = base("localhost");
        args.cipher = Some("ECDHE-RSA-AES256-GCM-SHA384".into());
        assert!(args.validate().is_err());
    }

    #[test]
    fn empty_user_is_invalid() {
        let mut args = base("localhost");
        args.user = String::new();
        assert!(args.validate().is_err());
    }

    #[test]
    fn explicit_socket_bypasses_discovery() {
        let mut args = base("localhost");
        args.socket = Some(PathBuf::from("/nonexistent/path.sock"));
        assert_eq!(args.resolve_socket().unwrap(), PathBuf::from("/nonexistent/path.sock"));
    }
}
