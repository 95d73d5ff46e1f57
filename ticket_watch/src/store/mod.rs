//! Snapshot persistence.
//!
//! A [`SnapshotStore`] keeps exactly one [`SnapshotSet`]: the ticket state seen
//! at the end of the last successful cycle. `save` replaces it wholesale; there
//! is no merging. The store also carries a short-lived lease so that two
//! overlapping cycles never read-diff-write the same snapshot.
//!
//! The SQLite implementation lives in [`sqlite`]; [`MemoryStore`] is used by
//! tests and dry runs.

use chrono::{DateTime, Utc};

use crate::snapshot::SnapshotSet;

pub mod sqlite;

pub use sqlite::SqliteSnapshotStore;

/// Result type used by snapshot stores.
pub type StoreResult<T> = anyhow::Result<T>;

/// Name of the lease row guarding the polling cycle.
pub const CYCLE_LEASE: &str = "polling_cycle";

/// Durable home of the previous-cycle snapshot.
pub trait SnapshotStore: Send {
    /// Load the last saved snapshot. Empty on first run.
    fn load(&mut self) -> StoreResult<SnapshotSet>;

    /// Atomically replace the stored snapshot with `snapshots`.
    fn save(&mut self, snapshots: &SnapshotSet) -> StoreResult<()>;

    /// Try to take the cycle lease for `owner`, valid for `ttl`.
    ///
    /// Returns `false` when a different owner holds an unexpired lease.
    /// Re-acquiring a lease already held by `owner` extends it.
    fn try_lock(&mut self, owner: &str, ttl: chrono::Duration) -> StoreResult<bool>;

    /// Release the lease if `owner` still holds it. Releasing a lease held
    /// by someone else (or no lease at all) is a no-op.
    fn unlock(&mut self, owner: &str) -> StoreResult<()>;

    /// When the snapshot was last saved, if ever.
    fn last_saved_at(&mut self) -> StoreResult<Option<DateTime<Utc>>>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    snapshots: SnapshotSet,
    lease: Option<(String, DateTime<Utc>)>,
    saved_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if it had been saved earlier.
    pub fn with_snapshots(snapshots: SnapshotSet) -> Self {
        Self {
            snapshots,
            saved_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Current snapshot, without going through the trait.
    pub fn snapshots(&self) -> &SnapshotSet {
        &self.snapshots
    }

    /// Current lease holder, if any (expired leases included).
    pub fn lease_owner(&self) -> Option<&str> {
        self.lease.as_ref().map(|(owner, _)| owner.as_str())
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&mut self) -> StoreResult<SnapshotSet> {
        Ok(self.snapshots.clone())
    }

    fn save(&mut self, snapshots: &SnapshotSet) -> StoreResult<()> {
        self.snapshots = snapshots.clone();
        self.saved_at = Some(Utc::now());
        Ok(())
    }

    fn try_lock(&mut self, owner: &str, ttl: chrono::Duration) -> StoreResult<bool> {
        let now = Utc::now();
        if let Some((held_by, expires_at)) = &self.lease
            && held_by != owner
            && *expires_at > now
        {
            return Ok(false);
        }
        self.lease = Some((owner.to_string(), now + ttl));
        Ok(true)
    }

    fn unlock(&mut self, owner: &str) -> StoreResult<()> {
        if self.lease_owner() == Some(owner) {
            self.lease = None;
        }
        Ok(())
    }

    fn last_saved_at(&mut self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.saved_at)
    }
}
