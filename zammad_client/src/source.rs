//! Ticket source abstraction.
//!
//! This module defines the [`TicketSource`] trait, the single seam between the
//! watcher and the ticketing backend. The watcher only needs two things from
//! it: who the current agent is, and which tickets are currently open.
//!
//! The trait is async and object safe, so the polling cycle can hold a
//! `Box<dyn TicketSource>` and tests can hand in an in-memory fake.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use zammad_client::{SourceError, Ticket, TicketSource, User};
//!
//! struct Empty;
//!
//! #[async_trait]
//! impl TicketSource for Empty {
//!     async fn current_user(&self) -> Result<User, SourceError> {
//!         Ok(User { id: 1, firstname: "A".into(), lastname: "B".into(),
//!                   email: "a@b".into(), role_ids: None })
//!     }
//!     async fn open_tickets(&self, _query: &str) -> Result<Vec<Ticket>, SourceError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::Snafu;

use crate::models::{Ticket, User};

/// Read access to the helpdesk for one authenticated agent.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// The agent the credentials belong to.
    async fn current_user(&self) -> Result<User, SourceError>;

    /// Tickets matching `query`, newest first.
    async fn open_tickets(&self, query: &str) -> Result<Vec<Ticket>, SourceError>;

    /// Fetches the current user and the open tickets concurrently.
    ///
    /// Fails if either request fails; there is no partial result.
    async fn fetch_open_tickets_and_user(
        &self,
        query: &str,
    ) -> Result<(i64, Vec<Ticket>), SourceError> {
        let (user, tickets) = tokio::try_join!(self.current_user(), self.open_tickets(query))?;
        Ok((user.id, tickets))
    }
}

/// Errors that can occur while constructing a source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar { source: MissingEnvVarError },

    /// The configured server URL cannot be turned into an API base URL.
    #[snafu(display("Invalid server URL {url:?}: {source}"))]
    InvalidUrl { url: String, source: url::ParseError },

    /// The API token is blank.
    #[snafu(display("API token not set"))]
    EmptyToken,

    /// API token contains characters not allowed in a header.
    #[snafu(display("Invalid API token format: {source}"))]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild { source: reqwest::Error },
}

/// Errors that can occur while fetching from a [`TicketSource`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Network failure, timeout, or connection refused.
    #[snafu(display("Request to {endpoint} failed: {source}"))]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The server rejected the token (HTTP 401).
    #[snafu(display("Authentication failed for {endpoint}; check the API token"))]
    Authentication { endpoint: String },

    /// Any other non-success status.
    #[snafu(display("Server returned HTTP {status} for {endpoint}: {body}"))]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The body was not the JSON shape we expect.
    #[snafu(display("Could not decode response from {endpoint}: {source}"))]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    /// The endpoint path could not be joined onto the base URL.
    #[snafu(display("Invalid endpoint {endpoint}: {source}"))]
    Endpoint {
        endpoint: String,
        source: url::ParseError,
    },
}
