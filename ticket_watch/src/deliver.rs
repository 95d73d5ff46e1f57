//! Turning a cycle's events into at most one user-visible notification.
//!
//! One event is shown as-is. Several events collapse into a single summary so a
//! busy polling window does not flood the user; the badge always carries the
//! total event count.
//!
//! Sinks are fire-and-forget from the cycle's point of view: a failed delivery
//! is logged by the caller and never retried or allowed to roll back the
//! snapshot.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use serde::Serialize;

use crate::config::{Messages, fill};
use crate::diff::NotificationEvent;

/// What a sink is asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub title: String,
    pub body: String,
    /// Deep-link target; only set when the notification is about one ticket.
    pub ticket_id: Option<i64>,
    pub badge: usize,
}

/// Collapse `events` into the notification to show, if any.
pub fn aggregate_for_delivery(
    events: &[NotificationEvent],
    messages: &Messages,
) -> Option<Delivery> {
    match events {
        [] => None,
        [only] => Some(Delivery {
            title: only.title.clone(),
            body: only.body.clone(),
            ticket_id: Some(only.ticket_id),
            badge: 1,
        }),
        many => {
            let count = many.len();
            let body = many
                .iter()
                .map(|e| fill(&messages.summary_line, &e.ticket_number, &e.ticket_title, count))
                .collect::<Vec<_>>()
                .join("\n");
            Some(Delivery {
                title: fill(&messages.summary_title, "", "", count),
                body,
                ticket_id: None,
                badge: count,
            })
        }
    }
}

/// Displays a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, delivery: &Delivery) -> anyhow::Result<()>;
}

/// Emits each delivery as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, d: &Delivery) -> anyhow::Result<()> {
        tracing::info!(
            title = %d.title,
            body = %d.body,
            ticket_id = ?d.ticket_id,
            badge = d.badge,
            "notification"
        );
        Ok(())
    }
}

/// Writes one JSON object per delivery to `W` (stdout for the CLI).
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> NotificationSink for JsonLinesSink<W> {
    fn deliver(&self, d: &Delivery) -> anyhow::Result<()> {
        let mut out = self.out.lock().map_err(|_| anyhow!("output lock poisoned"))?;
        serde_json::to_writer(&mut *out, d).context("encode delivery")?;
        writeln!(out).context("write delivery")?;
        out.flush().context("flush delivery")?;
        Ok(())
    }
}

/// Keeps deliveries in memory. Used by dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Delivery>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails (after recording the attempt).
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::default(),
            fail: true,
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, d: &Delivery) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .map_err(|_| anyhow!("recording lock poisoned"))?
            .push(d.clone());
        if self.fail {
            return Err(anyhow!("notification center unavailable"));
        }
        Ok(())
    }
}
