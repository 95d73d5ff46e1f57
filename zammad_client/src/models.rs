//! Ticketing REST models.
//!
//! Only the fields the watcher needs are decoded; everything else in the
//! (much larger) API payload is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A helpdesk ticket as returned by `tickets/search?expand=true`.
///
/// Timestamps are decoded as RFC 3339. A ticket whose `updated_at` cannot be
/// parsed fails the decode of the whole response rather than being skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable ticket identifier.
    pub id: i64,
    /// Human-facing ticket number (e.g. "31001"). Not the same as `id`.
    pub number: String,
    /// Ticket subject line.
    pub title: String,
    /// Current state (new, open, pending, closed, ...).
    pub state_id: i64,
    /// Current priority.
    pub priority_id: i64,
    /// Agent currently assigned as owner.
    pub owner_id: i64,
    /// Customer the ticket belongs to.
    pub customer_id: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; advances on every article and attribute change.
    pub updated_at: DateTime<Utc>,
}

/// An agent or customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: i64,
    /// Given name.
    #[serde(default)]
    pub firstname: String,
    /// Family name.
    #[serde(default)]
    pub lastname: String,
    /// Login / contact address.
    #[serde(default)]
    pub email: String,
    /// Role ids, only present for some endpoints.
    #[serde(default)]
    pub role_ids: Option<Vec<i64>>,
}

impl User {
    /// "First Last", trimmed when one of the parts is missing.
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }
}
