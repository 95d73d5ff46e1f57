//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`]:
//! - [`crate::schema::ticket_snapshot`]: one row per ticket in the last saved snapshot
//! - [`crate::schema::cycle_lease`]: the single-writer lease for polling cycles
//! - [`crate::schema::engine_kv`]: bookkeeping values
//!
//! Timestamps are stored as RFC3339 UTC text and parsed on the way out; a row
//! that does not parse is an error, never silently dropped.

use anyhow::Context;
use diesel::prelude::*;

use crate::schema::*;
use crate::snapshot::TicketSnapshot;
use crate::tz;

/// A row in [`crate::schema::ticket_snapshot`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ticket_snapshot, check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRow {
    /// Ticket id (primary key).
    pub ticket_id: i64,
    /// Owner at snapshot time.
    pub owner_id: i64,
    /// `updated_at` at snapshot time, RFC3339 UTC.
    pub updated_at: String,
}

impl TryFrom<SnapshotRow> for TicketSnapshot {
    type Error = anyhow::Error;

    fn try_from(row: SnapshotRow) -> anyhow::Result<Self> {
        let updated_at = tz::parse_ts_to_utc(&row.updated_at)
            .with_context(|| format!("ticket_snapshot row {}", row.ticket_id))?;
        Ok(TicketSnapshot {
            id: row.ticket_id,
            owner_id: row.owner_id,
            updated_at,
        })
    }
}

/// Insertable form of [`SnapshotRow`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_snapshot)]
pub struct NewSnapshotRow<'a> {
    pub ticket_id: i64,
    pub owner_id: i64,
    pub updated_at: &'a str,
}

/// A row in [`crate::schema::cycle_lease`].
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cycle_lease, check_for_backend(diesel::sqlite::Sqlite))]
pub struct LeaseRow {
    pub name: String,
    pub owner: String,
    pub expires_at: String,
}

/// Insertable/updatable form of [`LeaseRow`].
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = cycle_lease)]
pub struct NewLease<'a> {
    pub name: &'a str,
    pub owner: &'a str,
    pub expires_at: &'a str,
}
