//! SQLite-backed [`SnapshotStore`].
//!
//! `save` deletes and re-inserts the whole snapshot inside one
//! `BEGIN IMMEDIATE` transaction, so readers see either the old or the new
//! snapshot and never a mix. The cycle lease is a single row in
//! `cycle_lease`, read and written under the same kind of transaction.

use anyhow::Context;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;

use super::{CYCLE_LEASE, SnapshotStore, StoreResult};
use crate::db::{connection::connect_sqlite, migrate};
use crate::models::{LeaseRow, NewLease, NewSnapshotRow, SnapshotRow};
use crate::schema::{cycle_lease, engine_kv, ticket_snapshot};
use crate::snapshot::{SnapshotSet, TicketSnapshot};
use crate::tz;

/// `engine_kv` key holding the time of the last successful save.
const SAVED_AT_KEY: &str = "snapshot_saved_at";

/// Three bound parameters per row; stays under SQLite's historical 999 limit.
const INSERT_CHUNK: usize = 300;

pub struct SqliteSnapshotStore {
    conn: SqliteConnection,
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore").finish_non_exhaustive()
    }
}

impl SqliteSnapshotStore {
    /// Open (or create) the database at `database_url` and apply migrations.
    pub fn open(database_url: &str) -> StoreResult<Self> {
        let mut conn = connect_sqlite(database_url)?;
        migrate::run_pending(&mut conn)
            .with_context(|| format!("migrate snapshot store at {database_url}"))?;
        Ok(Self { conn })
    }

    /// Current lease row, if any. Expired leases are returned as-is.
    pub fn lease(&mut self) -> StoreResult<Option<LeaseRow>> {
        let row = cycle_lease::table
            .find(CYCLE_LEASE)
            .select(LeaseRow::as_select())
            .first(&mut self.conn)
            .optional()?;
        Ok(row)
    }

    /// Direct access for tests and maintenance.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load(&mut self) -> StoreResult<SnapshotSet> {
        let rows: Vec<SnapshotRow> = ticket_snapshot::table
            .select(SnapshotRow::as_select())
            .order(ticket_snapshot::ticket_id.asc())
            .load(&mut self.conn)?;

        rows.into_iter().map(TicketSnapshot::try_from).collect()
    }

    fn save(&mut self, snapshots: &SnapshotSet) -> StoreResult<()> {
        let stamps: Vec<String> = snapshots
            .iter()
            .map(|s| tz::to_rfc3339_exact(s.updated_at))
            .collect();
        let rows: Vec<NewSnapshotRow<'_>> = snapshots
            .iter()
            .zip(&stamps)
            .map(|(s, ts)| NewSnapshotRow {
                ticket_id: s.id,
                owner_id: s.owner_id,
                updated_at: ts,
            })
            .collect();
        let saved_at = tz::to_rfc3339_millis(Utc::now());

        self.conn
            .immediate_transaction::<_, anyhow::Error, _>(|conn| {
                diesel::delete(ticket_snapshot::table).execute(conn)?;
                for chunk in rows.chunks(INSERT_CHUNK) {
                    diesel::insert_into(ticket_snapshot::table)
                        .values(chunk)
                        .execute(conn)?;
                }
                diesel::insert_into(engine_kv::table)
                    .values((engine_kv::k.eq(SAVED_AT_KEY), engine_kv::v.eq(&saved_at)))
                    .on_conflict(engine_kv::k)
                    .do_update()
                    .set(engine_kv::v.eq(&saved_at))
                    .execute(conn)?;
                Ok(())
            })
            .context("save ticket snapshot")?;

        debug!(tickets = rows.len(), "snapshot saved");
        Ok(())
    }

    fn try_lock(&mut self, owner: &str, ttl: chrono::Duration) -> StoreResult<bool> {
        let now = Utc::now();
        let expires_at = tz::to_rfc3339_millis(now + ttl);

        self.conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
            let held: Option<LeaseRow> = cycle_lease::table
                .find(CYCLE_LEASE)
                .select(LeaseRow::as_select())
                .first(conn)
                .optional()?;

            if let Some(lease) = held
                && lease.owner != owner
                && tz::parse_ts_to_utc(&lease.expires_at)? > now
            {
                debug!(holder = %lease.owner, expires_at = %lease.expires_at, "cycle lease busy");
                return Ok(false);
            }

            let row = NewLease {
                name: CYCLE_LEASE,
                owner,
                expires_at: &expires_at,
            };
            diesel::insert_into(cycle_lease::table)
                .values(&row)
                .on_conflict(cycle_lease::name)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(true)
        })
    }

    fn unlock(&mut self, owner: &str) -> StoreResult<()> {
        diesel::delete(
            cycle_lease::table
                .filter(cycle_lease::name.eq(CYCLE_LEASE))
                .filter(cycle_lease::owner.eq(owner)),
        )
        .execute(&mut self.conn)?;
        Ok(())
    }

    fn last_saved_at(&mut self) -> StoreResult<Option<DateTime<Utc>>> {
        let raw: Option<String> = engine_kv::table
            .find(SAVED_AT_KEY)
            .select(engine_kv::v)
            .first(&mut self.conn)
            .optional()?;
        raw.as_deref().map(tz::parse_ts_to_utc).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn mem_store() -> SqliteSnapshotStore {
        SqliteSnapshotStore::open(":memory:").expect("open in-memory store")
    }

    #[test]
    fn empty_store_loads_empty_snapshot() {
        let mut store = mem_store();
        assert!(store.load().unwrap().is_empty());
        assert!(store.last_saved_at().unwrap().is_none());
    }

    #[test]
    fn save_keeps_sub_millisecond_precision() {
        let mut store = mem_store();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::microseconds(250_123);
        let set: SnapshotSet = [TicketSnapshot {
            id: 10,
            owner_id: 3,
            updated_at: ts,
        }]
        .into_iter()
        .collect();

        store.save(&set).unwrap();
        assert_eq!(store.load().unwrap(), set);
    }

    #[test]
    fn lease_row_tracks_holder() {
        let mut store = mem_store();
        assert!(store.try_lock("worker-a", Duration::seconds(60)).unwrap());
        assert_eq!(store.lease().unwrap().map(|l| l.owner), Some("worker-a".into()));
        store.unlock("worker-a").unwrap();
        assert!(store.lease().unwrap().is_none());
    }
}
