//! Background ticket-change detection for a Zammad helpdesk.
//!
//! Each polling cycle fetches the open tickets and the current agent, diffs
//! them against the snapshot saved by the previous cycle, persists the new
//! snapshot and hands at most one notification to a [`deliver::NotificationSink`].
//!
//! - [`diff`]: pure change detection (new tickets, assignments, replies)
//! - [`store`]: snapshot persistence and the single-writer lease
//! - [`cycle`]: one fetch-diff-save-notify pass
//! - [`scheduler`]: runs cycles on an interval until cancelled

pub mod config;
pub mod cycle;
pub mod db;
pub mod deliver;
pub mod diff;
pub mod models;
pub mod scheduler;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod tz;
