//! slicetool-sync — one-way incremental synchronization of row-addressable
//! relational tables between a MySQL-compatible upstream and downstream.
//!
//! A table is synced through up to three layers, cheapest first:
//!
//! 1. **Pre-sync** ([`presync`]) — id-extension and `modified_time` deltas,
//!    no fingerprinting involved.
//! 2. **Zoom scan** ([`zoom`]) — recursive server-side MD5 fingerprinting at
//!    successively finer granularities, for tables with a monotonic id.
//! 3. **Composite-key sync** ([`composite`]) — group-cardinality then
//!    group-fingerprint reconciliation, for tables with no such id.
//!
//! The engine never opens its own connections or shells out directly: it
//! consumes a [`collaborators::Cursor`], [`collaborators::Dumper`], and
//! [`collaborators::Loader`] supplied by the caller (see
//! [`mysql_backend`]/[`subprocess`] for the real implementations), plus a
//! [`reporter::Reporter`] for hierarchical progress logging.

#![allow(dead_code)]

pub mod collaborators;
pub mod column;
pub mod composite;
pub mod config;
pub mod diff_finder;
pub mod error;
pub mod fingerprint;
pub mod interval;
pub mod mysql_backend;
pub mod presync;
pub mod reporter;
pub mod schema_diff;
pub mod subprocess;
pub mod table;
pub mod zoom;

pub use collaborators::{Cursor, Dumper, Loader};
pub use config::ConnectionArgs;
pub use error::SyncError;
pub use reporter::{Reporter, TracingReporter};
pub use table::TableOutcome;
