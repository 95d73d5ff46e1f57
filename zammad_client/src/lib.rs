//! Client side of the helpdesk: ticket and user models plus the
//! [`TicketSource`](crate::source::TicketSource) abstraction the watcher polls.
//!
//! [`rest::ZammadRestSource`] is the production implementation that talks to a
//! Zammad-compatible `/api/v1` REST endpoint. Tests and dry runs can supply any
//! other implementation of the trait.

pub mod models;
pub mod rest;
pub mod source;

pub use models::{Ticket, User};
pub use source::{SourceError, SourceInitError, TicketSource};
