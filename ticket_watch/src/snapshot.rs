//! Ticket snapshots: the minimal state persisted between polling cycles.
//!
//! A [`SnapshotSet`] holds at most one [`TicketSnapshot`] per ticket id. It is
//! rebuilt wholesale from the live ticket list at the end of every successful
//! cycle and never merged incrementally.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zammad_client::Ticket;

/// Last known state of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Ticket id (unique key).
    pub id: i64,
    /// Owner at the time of the snapshot.
    pub owner_id: i64,
    /// Last modification time at the time of the snapshot.
    pub updated_at: DateTime<Utc>,
}

/// A freshly fetched ticket: the snapshot fields plus display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTicket {
    pub id: i64,
    pub owner_id: i64,
    pub updated_at: DateTime<Utc>,
    /// Human-facing ticket number, used in notification text.
    pub number: String,
    /// Subject line, used in notification text.
    pub title: String,
}

impl LiveTicket {
    /// Project down to the persisted fields.
    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            id: self.id,
            owner_id: self.owner_id,
            updated_at: self.updated_at,
        }
    }
}

impl From<&Ticket> for LiveTicket {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id,
            owner_id: t.owner_id,
            updated_at: t.updated_at,
            number: t.number.clone(),
            title: t.title.clone(),
        }
    }
}

impl From<Ticket> for LiveTicket {
    fn from(t: Ticket) -> Self {
        Self {
            id: t.id,
            owner_id: t.owner_id,
            updated_at: t.updated_at,
            number: t.number,
            title: t.title,
        }
    }
}

/// Snapshot set keyed by ticket id, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSet {
    by_id: IndexMap<i64, TicketSnapshot>,
}

impl SnapshotSet {
    /// Empty set (the first-run state).
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects a live ticket list down to snapshots.
    ///
    /// A repeated id keeps the last occurrence; callers that must reject
    /// duplicates check with [`ensure_unique_ids`] first.
    pub fn from_live(live: &[LiveTicket]) -> Self {
        live.iter().map(LiveTicket::snapshot).collect()
    }

    /// Inserts or replaces the snapshot for `snap.id`, returning the old one.
    pub fn insert(&mut self, snap: TicketSnapshot) -> Option<TicketSnapshot> {
        self.by_id.insert(snap.id, snap)
    }

    pub fn get(&self, id: i64) -> Option<&TicketSnapshot> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TicketSnapshot> {
        self.by_id.values()
    }

    /// Snapshots sorted by id, for stable output.
    pub fn sorted(&self) -> Vec<TicketSnapshot> {
        let mut v: Vec<TicketSnapshot> = self.by_id.values().copied().collect();
        v.sort_by_key(|s| s.id);
        v
    }
}

impl FromIterator<TicketSnapshot> for SnapshotSet {
    fn from_iter<I: IntoIterator<Item = TicketSnapshot>>(iter: I) -> Self {
        let mut set = SnapshotSet::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

/// A fetched ticket list contained the same id twice.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("ticket id {0} appears more than once in the fetched list")]
pub struct DuplicateTicketId(pub i64);

/// Rejects a live list that would violate the one-snapshot-per-id invariant.
pub fn ensure_unique_ids(live: &[LiveTicket]) -> Result<(), DuplicateTicketId> {
    let mut seen = HashSet::with_capacity(live.len());
    for t in live {
        if !seen.insert(t.id) {
            return Err(DuplicateTicketId(t.id));
        }
    }
    Ok(())
}
