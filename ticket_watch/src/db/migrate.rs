//! Embedded schema migrations.

use anyhow::anyhow;
use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use super::connection::connect_sqlite;

/// Embedded Diesel migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply all pending migrations on an already open connection.
///
/// Needed for `:memory:` databases, where a second connection would see an
/// empty schema.
pub fn run_pending(conn: &mut SqliteConnection) -> anyhow::Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;
    Ok(())
}

/// Open the database at `url` and bring its schema up to date.
pub fn run_sqlite(url: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(url)?;
    run_pending(&mut conn)
}
