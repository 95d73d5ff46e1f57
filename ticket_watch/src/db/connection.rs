//! SQLite connection helpers.

use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::{Connection, SqliteConnection};

/// Strip an optional `sqlite:` / `sqlite://` scheme so config files may use
/// either a bare path or a URL-ish form.
pub fn sqlite_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

/// Open a SQLite connection and apply connection-wide PRAGMAs.
///
/// WAL lets a `snapshot show` read while a cycle is writing; the busy timeout
/// makes a second process wait on the write lock instead of failing at once.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let path = sqlite_path(database_url);
    let mut conn = SqliteConnection::establish(path)
        .with_context(|| format!("open sqlite database {path}"))?;

    conn.batch_execute(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(conn)
}
