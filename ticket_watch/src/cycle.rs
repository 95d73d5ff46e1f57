//! One polling cycle: fetch, diff, persist, notify.
//!
//! Order of operations:
//! 1. Realtime mode on: return [`CycleStatus::SkippedRealtime`] without touching
//!    the source or the store.
//! 2. Take the cycle lease. Held elsewhere: [`CycleStatus::SkippedBusy`].
//! 3. Fetch the open tickets and the current user concurrently, bounded by the
//!    deadline and the cancellation token.
//! 4. Reject live lists with duplicate ticket ids.
//! 5. Load the previous snapshot, diff, and (unless cancelled or out of time)
//!    replace the stored snapshot.
//! 6. Collapse the events into one [`Delivery`] and hand it to the sink. A sink
//!    failure is logged; the snapshot stays saved.
//! 7. Release the lease, whatever happened in between.
//!
//! Any failure before the save leaves the stored snapshot untouched, so the
//! next cycle re-detects the same changes. Saving before delivering means a
//! crash between the two loses that notification rather than repeating it.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zammad_client::{SourceError, TicketSource};

use crate::config::{MAX_DEADLINE_SECS, Messages, NotificationPreferences, WatchConfig};
use crate::deliver::{Delivery, NotificationSink, aggregate_for_delivery};
use crate::diff::{self, NotificationEvent};
use crate::snapshot::{DuplicateTicketId, LiveTicket, ensure_unique_ids};
use crate::store::SnapshotStore;

/// Why a cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetching tickets failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("ticket list rejected: {0}")]
    Malformed(#[from] DuplicateTicketId),
    #[error("snapshot store failed: {0:#}")]
    Store(anyhow::Error),
    #[error("cycle exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
    #[error("cycle cancelled")]
    Cancelled,
}

/// How a cycle that did not error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    SkippedRealtime,
    SkippedBusy,
}

/// Outcome of a cycle that did not error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub events: Vec<NotificationEvent>,
    /// What was handed to the sink, if anything.
    pub delivery: Option<Delivery>,
    /// `false` when there was nothing to send or the sink failed.
    pub delivered: bool,
}

impl CycleReport {
    fn skipped(status: CycleStatus) -> Self {
        Self {
            status,
            events: Vec::new(),
            delivery: None,
            delivered: false,
        }
    }
}

/// Everything a cycle needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub preferences: NotificationPreferences,
    pub messages: Messages,
    pub query: String,
    pub deadline: Duration,
    /// Identifies this process in the cycle lease.
    pub lease_owner: String,
}

impl CycleSettings {
    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            preferences: cfg.preferences,
            messages: cfg.messages.clone(),
            query: cfg.source.query.clone(),
            deadline: cfg.schedule.deadline(),
            lease_owner: default_lease_owner(),
        }
    }

    /// The lease outlives the deadline so a cycle that is still unwinding
    /// after its deadline is not overlapped by the next one.
    pub fn lease_ttl(&self) -> TimeDelta {
        let ttl = self.bounded_deadline().saturating_mul(2);
        TimeDelta::from_std(ttl).unwrap_or(TimeDelta::hours(1))
    }

    /// Settings built by hand skip config validation, so clamp here.
    fn bounded_deadline(&self) -> Duration {
        self.deadline.min(Duration::from_secs(MAX_DEADLINE_SECS))
    }
}

/// `ticket-watch-<pid>-<start millis>`; unique per process start.
pub fn default_lease_owner() -> String {
    format!(
        "ticket-watch-{}-{}",
        std::process::id(),
        Utc::now().timestamp_millis()
    )
}

/// One cycle's collaborators, borrowed for the duration of [`PollingCycle::run`].
pub struct PollingCycle<'a> {
    pub source: &'a dyn TicketSource,
    pub store: &'a mut dyn SnapshotStore,
    pub sink: &'a dyn NotificationSink,
    pub settings: &'a CycleSettings,
}

impl PollingCycle<'_> {
    /// Run the cycle once.
    pub async fn run(self, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let PollingCycle {
            source,
            store,
            sink,
            settings,
        } = self;

        if settings.preferences.realtime_mode_enabled {
            debug!("realtime notifications enabled; polling cycle skipped");
            return Ok(CycleReport::skipped(CycleStatus::SkippedRealtime));
        }

        let acquired = store
            .try_lock(&settings.lease_owner, settings.lease_ttl())
            .map_err(CycleError::Store)?;
        if !acquired {
            warn!("another cycle holds the snapshot lease; skipping");
            return Ok(CycleReport::skipped(CycleStatus::SkippedBusy));
        }

        let result = locked_cycle(source, &mut *store, sink, settings, cancel).await;

        if let Err(e) = store.unlock(&settings.lease_owner) {
            warn!(error = %e, "failed to release cycle lease; it will expire");
        }
        result
    }
}

async fn locked_cycle(
    source: &dyn TicketSource,
    store: &mut dyn SnapshotStore,
    sink: &dyn NotificationSink,
    settings: &CycleSettings,
    cancel: &CancellationToken,
) -> Result<CycleReport, CycleError> {
    let now = Instant::now();
    let deadline_at = now
        .checked_add(settings.deadline)
        .unwrap_or(now + settings.bounded_deadline());

    let (user_id, tickets) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CycleError::Cancelled),
        fetched = tokio::time::timeout_at(
            deadline_at,
            source.fetch_open_tickets_and_user(&settings.query),
        ) => match fetched {
            Ok(res) => res?,
            Err(_) => return Err(CycleError::DeadlineExceeded(settings.deadline)),
        },
    };
    debug!(user_id, tickets = tickets.len(), "fetched open tickets");

    let live: Vec<LiveTicket> = tickets.into_iter().map(LiveTicket::from).collect();
    ensure_unique_ids(&live)?;

    let previous = store.load().map_err(CycleError::Store)?;
    let outcome = diff::run_cycle(
        &previous,
        &live,
        user_id,
        &settings.preferences,
        &settings.messages,
    );

    if cancel.is_cancelled() {
        return Err(CycleError::Cancelled);
    }
    if Instant::now() >= deadline_at {
        return Err(CycleError::DeadlineExceeded(settings.deadline));
    }
    if let Some(next) = &outcome.snapshots {
        store.save(next).map_err(CycleError::Store)?;
    }

    let delivery = aggregate_for_delivery(&outcome.events, &settings.messages);
    let delivered = match &delivery {
        Some(d) => match sink.deliver(d) {
            Ok(()) => true,
            Err(e) => {
                let reason = format!("{e:#}");
                error!(error = %reason, badge = d.badge, "notification delivery failed");
                false
            }
        },
        None => false,
    };

    info!(
        events = outcome.events.len(),
        tickets = live.len(),
        delivered,
        "polling cycle completed"
    );
    Ok(CycleReport {
        status: CycleStatus::Completed,
        events: outcome.events,
        delivery,
        delivered,
    })
}
