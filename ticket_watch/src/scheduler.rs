//! Periodic execution of polling cycles.
//!
//! [`Watcher`] owns one set of collaborators and runs cycles on demand.
//! [`Scheduler`] drives a watcher on a fixed interval until cancelled. Cycles
//! never overlap within a process: the next tick is only awaited after the
//! previous cycle returned, and ticks missed meanwhile are skipped rather than
//! replayed in a burst. Across processes the store lease does the same job.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use zammad_client::TicketSource;

use crate::cycle::{CycleError, CycleReport, CycleSettings, CycleStatus, PollingCycle};
use crate::deliver::NotificationSink;
use crate::store::SnapshotStore;

/// A ticket source, snapshot store and sink wired together.
pub struct Watcher {
    source: Box<dyn TicketSource>,
    store: Box<dyn SnapshotStore>,
    sink: Box<dyn NotificationSink>,
    settings: CycleSettings,
}

impl Watcher {
    pub fn new(
        source: Box<dyn TicketSource>,
        store: Box<dyn SnapshotStore>,
        sink: Box<dyn NotificationSink>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run a single cycle now.
    pub async fn run_once(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CycleError> {
        PollingCycle {
            source: self.source.as_ref(),
            store: self.store.as_mut(),
            sink: self.sink.as_ref(),
            settings: &self.settings,
        }
        .run(cancel)
        .await
    }
}

/// Tally of what a [`Scheduler`] did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Runs a [`Watcher`] every `interval` until cancelled.
pub struct Scheduler {
    watcher: Watcher,
    interval: Duration,
}

impl Scheduler {
    pub fn new(watcher: Watcher, interval: Duration) -> Self {
        Self { watcher, interval }
    }

    /// Run the polling loop.
    ///
    /// The first cycle starts immediately. Each cycle gets a child of `cancel`,
    /// so cancelling stops an in-flight cycle before it saves and then ends the
    /// loop. Cycle errors are logged and the loop keeps going.
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            deadline_secs = self.watcher.settings().deadline.as_secs(),
            "ticket watcher started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("ticket watcher stopping");
                    break;
                }
                _ = interval.tick() => {
                    let cycle_cancel = cancel.child_token();
                    match self.watcher.run_once(&cycle_cancel).await {
                        Ok(report) => match report.status {
                            CycleStatus::Completed => stats.completed += 1,
                            CycleStatus::SkippedRealtime | CycleStatus::SkippedBusy => {
                                tracing::debug!(status = ?report.status, "polling cycle skipped");
                                stats.skipped += 1;
                            }
                        },
                        Err(CycleError::Cancelled) => {
                            tracing::info!("polling cycle cancelled before saving");
                            stats.cancelled += 1;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "polling cycle failed");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }
        stats
    }
}
