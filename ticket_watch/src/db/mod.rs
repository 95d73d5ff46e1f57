//! Database utilities for connections and schema migrations.
//!
//! - [`connection::connect_sqlite`] opens a tuned SQLite connection (WAL, NORMAL sync, 5000ms busy_timeout).
//! - [`migrate::run_pending`] applies the embedded Diesel migrations to an open connection.
//!
//! Example:
//! ```no_run
//! use ticket_watch::db::{connection, migrate};
//!
//! let db_path = std::env::temp_dir().join("ticket_watch_example.db");
//! let mut conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! migrate::run_pending(&mut conn).expect("migrations");
//! ```

pub mod connection;
pub mod migrate;
