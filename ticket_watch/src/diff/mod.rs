//! Snapshot diffing: from (previous snapshot, live tickets) to notification events.
//!
//! ## What this does
//! - Runs the three detectors in [`detect`] against the previous [`SnapshotSet`].
//! - Gates each detector on its own preference toggle.
//! - Projects the live list into the next snapshot set, regardless of toggles,
//!   so a disabled category never leaves stale state behind.
//!
//! ## Realtime mode
//! When `realtime_mode_enabled` is set the cycle is skipped outright: no events
//! and **no** next snapshot. The stored set stays exactly as the last polling
//! cycle left it.
//!
//! ## Purity
//! Nothing here performs I/O or can fail. Validation of the live list (duplicate
//! ids, unparseable fields) happens before [`run_cycle`] is called.

pub mod detect;
pub mod event;

use std::fmt;

pub use detect::{detect_customer_replies, detect_new_assignments, detect_new_tickets};
pub use event::{EventKind, NotificationEvent};

use crate::config::{Messages, NotificationPreferences};
use crate::snapshot::{LiveTicket, SnapshotSet};

/// Result of one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// New tickets first, then assignments, then replies.
    pub events: Vec<NotificationEvent>,
    /// Next snapshot set to persist; `None` when the cycle was skipped and the
    /// stored set must not change.
    pub snapshots: Option<SnapshotSet>,
}

impl CycleOutcome {
    /// Realtime mode suppressed this cycle.
    pub fn is_skipped(&self) -> bool {
        self.snapshots.is_none()
    }

    /// Count of events of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

/// Diff `live` against `previous` for `current_user_id`.
pub fn run_cycle(
    previous: &SnapshotSet,
    live: &[LiveTicket],
    current_user_id: i64,
    prefs: &NotificationPreferences,
    messages: &Messages,
) -> CycleOutcome {
    if prefs.realtime_mode_enabled {
        return CycleOutcome {
            events: Vec::new(),
            snapshots: None,
        };
    }

    let mut events = Vec::new();
    if prefs.new_tickets() {
        events.extend(detect_new_tickets(previous, live, messages));
    }
    if prefs.assignments() {
        events.extend(detect_new_assignments(
            previous,
            live,
            current_user_id,
            messages,
        ));
    }
    if prefs.replies() {
        events.extend(detect_customer_replies(
            previous,
            live,
            current_user_id,
            messages,
        ));
    }

    CycleOutcome {
        events,
        snapshots: Some(SnapshotSet::from_live(live)),
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(snapshots) = &self.snapshots else {
            return write!(f, "Skipped (realtime mode)");
        };

        // helper: section header with underline
        let mut wrote_any = false;
        let mut section = |title: &str, kind: EventKind| -> fmt::Result {
            let mut rows = self.events.iter().filter(|e| e.kind == kind).peekable();
            if rows.peek().is_none() {
                return Ok(());
            }
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            writeln!(f, "{}", "-".repeat(title.len()))?;
            for e in rows {
                writeln!(f, "+ #{}  {} (id {})", e.ticket_number, e.ticket_title, e.ticket_id)?;
            }
            wrote_any = true;
            Ok(())
        };

        section("New tickets", EventKind::NewTicket)?;
        section("New assignments", EventKind::NewAssignment)?;
        section("New replies", EventKind::NewReply)?;

        if !wrote_any {
            write!(f, "No changes")?;
        } else {
            write!(f, "\n{} events", self.events.len())?;
        }
        write!(f, " (snapshot: {} tickets)", snapshots.len())
    }
}
