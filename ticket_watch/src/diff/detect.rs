//! The three change detectors.
//!
//! Each one is a single pass over the live list with map lookups into the
//! previous snapshot set, so a cycle stays O(n) in the number of tickets.
//! Output follows live-list order.

use crate::config::Messages;
use crate::diff::event::{EventKind, NotificationEvent};
use crate::snapshot::{LiveTicket, SnapshotSet};

/// Tickets whose id is not in `previous`.
///
/// On the first run `previous` is empty and every live ticket is new.
pub fn detect_new_tickets(
    previous: &SnapshotSet,
    live: &[LiveTicket],
    messages: &Messages,
) -> Vec<NotificationEvent> {
    live.iter()
        .filter(|t| !previous.contains(t.id))
        .map(|t| NotificationEvent::render(EventKind::NewTicket, t, messages))
        .collect()
}

/// Tickets owned by `current_user_id` now that were not owned by them before.
///
/// A ticket without a previous snapshot counts when it is already owned by
/// the current user.
pub fn detect_new_assignments(
    previous: &SnapshotSet,
    live: &[LiveTicket],
    current_user_id: i64,
    messages: &Messages,
) -> Vec<NotificationEvent> {
    live.iter()
        .filter(|t| t.owner_id == current_user_id)
        .filter(|t| {
            previous
                .get(t.id)
                .is_none_or(|prev| prev.owner_id != current_user_id)
        })
        .map(|t| NotificationEvent::render(EventKind::NewAssignment, t, messages))
        .collect()
}

/// Owned tickets, known before, whose `updated_at` moved strictly forward.
///
/// This treats any activity on an owned ticket as a reply; it cannot tell a
/// customer article from an agent one.
pub fn detect_customer_replies(
    previous: &SnapshotSet,
    live: &[LiveTicket],
    current_user_id: i64,
    messages: &Messages,
) -> Vec<NotificationEvent> {
    live.iter()
        .filter(|t| t.owner_id == current_user_id)
        .filter(|t| {
            previous
                .get(t.id)
                .is_some_and(|prev| t.updated_at > prev.updated_at)
        })
        .map(|t| NotificationEvent::render(EventKind::NewReply, t, messages))
        .collect()
}
