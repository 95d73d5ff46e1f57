use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ticket_watch::config::{Messages, NotificationPreferences};
use ticket_watch::cycle::{CycleError, CycleSettings, CycleStatus, PollingCycle};
use ticket_watch::deliver::RecordingSink;
use ticket_watch::diff::EventKind;
use ticket_watch::snapshot::{SnapshotSet, TicketSnapshot};
use ticket_watch::store::{MemoryStore, SnapshotStore};
use zammad_client::TicketSource;

mod common;

use common::{FakeSource, FlakyStore, ME, OTHER, TestDb, ticket, ts};

fn settings() -> CycleSettings {
    CycleSettings {
        preferences: NotificationPreferences::default(),
        messages: Messages::default(),
        query: "state.name:open".into(),
        deadline: Duration::from_secs(5),
        lease_owner: "test-runner".into(),
    }
}

fn snapshot(id: i64, owner_id: i64, secs: i64) -> TicketSnapshot {
    TicketSnapshot {
        id,
        owner_id,
        updated_at: ts(secs),
    }
}

async fn run(
    source: &dyn TicketSource,
    store: &mut dyn SnapshotStore,
    sink: &RecordingSink,
    settings: &CycleSettings,
) -> Result<ticket_watch::cycle::CycleReport, CycleError> {
    PollingCycle {
        source,
        store,
        sink,
        settings,
    }
    .run(&CancellationToken::new())
    .await
}

#[tokio::test]
async fn reference_scenario_end_to_end() {
    // previous: ticket 1 owned by someone else, ticket 2 mine
    let previous: SnapshotSet = [snapshot(1, OTHER, 0), snapshot(2, ME, 0)]
        .into_iter()
        .collect();
    let mut store = MemoryStore::with_snapshots(previous);
    let source = FakeSource::new(
        ME,
        vec![
            ticket(1, ME, 10, "Printer on fire"), // reassigned to me and touched
            ticket(2, ME, 30, "VPN down"), // reply on mine
            ticket(3, OTHER, 5, "Invoice question"), // brand new
        ],
    );
    let sink = RecordingSink::new();

    let report = run(&source, &mut store, &sink, &settings()).await.unwrap();

    assert_eq!(report.status, CycleStatus::Completed);
    let kinds: Vec<(EventKind, i64)> = report.events.iter().map(|e| (e.kind, e.ticket_id)).collect();
    assert_eq!(
        kinds,
        vec![
            (EventKind::NewTicket, 3),
            (EventKind::NewAssignment, 1),
            (EventKind::NewReply, 1),
            (EventKind::NewReply, 2),
        ]
    );

    let delivered = sink.deliveries();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].badge, 4);
    assert_eq!(delivered[0].ticket_id, None);
    assert!(report.delivered);

    let saved = store.snapshots();
    assert_eq!(saved.len(), 3);
    assert_eq!(saved.get(1).unwrap().owner_id, ME);
    assert_eq!(saved.get(2).unwrap().updated_at, ts(30));
    assert_eq!(store.lease_owner(), None, "lease released");
}

#[tokio::test]
async fn second_identical_cycle_is_quiet() {
    let db = TestDb::new();
    let mut store = db.open();
    let source = FakeSource::new(ME, vec![ticket(1, ME, 10, "a"), ticket(2, OTHER, 20, "b")]);
    let sink = RecordingSink::new();

    let first = run(&source, &mut store, &sink, &settings()).await.unwrap();
    assert!(!first.events.is_empty());

    let second = run(&source, &mut store, &sink, &settings()).await.unwrap();
    assert_eq!(second.status, CycleStatus::Completed);
    assert!(second.events.is_empty());
    assert!(second.delivery.is_none());
    assert!(!second.delivered);
    assert_eq!(sink.deliveries().len(), 1);
}

#[tokio::test]
async fn sub_millisecond_updates_do_not_repeat_replies() {
    let db = TestDb::new();
    let mut store = db.open();
    let mut t = ticket(1, ME, 10, "Printer on fire");
    t.updated_at += chrono::Duration::microseconds(123_456);
    let source = FakeSource::new(ME, vec![t]);
    let sink = RecordingSink::new();

    let first = run(&source, &mut store, &sink, &settings()).await.unwrap();
    let kinds: Vec<EventKind> = first.events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::NewTicket, EventKind::NewAssignment]);

    for _ in 0..2 {
        let again = run(&source, &mut store, &sink, &settings()).await.unwrap();
        assert!(again.events.is_empty(), "{:?}", again.events);
    }
    assert_eq!(sink.deliveries().len(), 1);
}

#[tokio::test]
async fn single_event_keeps_deep_link() {
    let mut store = MemoryStore::with_snapshots([snapshot(2, ME, 0)].into_iter().collect());
    let source = FakeSource::new(ME, vec![ticket(2, ME, 30, "VPN down")]);
    let sink = RecordingSink::new();

    run(&source, &mut store, &sink, &settings()).await.unwrap();

    let d = &sink.deliveries()[0];
    assert_eq!(d.ticket_id, Some(2));
    assert_eq!(d.badge, 1);
    assert_eq!(d.title, "New reply");
    assert_eq!(d.body, "Ticket #31002 has a new reply: VPN down");
}

#[tokio::test]
async fn fetch_failure_leaves_store_untouched() {
    let previous: SnapshotSet = [snapshot(1, ME, 0)].into_iter().collect();
    let mut store = MemoryStore::with_snapshots(previous.clone());
    let source = FakeSource::new(ME, vec![ticket(9, ME, 1, "new")]);
    source.set_failing(true);
    let sink = RecordingSink::new();

    let err = run(&source, &mut store, &sink, &settings()).await.unwrap_err();
    assert!(matches!(err, CycleError::Fetch(_)), "{err}");
    assert_eq!(store.snapshots(), &previous);
    assert!(sink.deliveries().is_empty());
    assert_eq!(store.lease_owner(), None, "lease released after failure");

    // next successful cycle re-detects the change
    source.set_failing(false);
    let report = run(&source, &mut store, &sink, &settings()).await.unwrap();
    assert_eq!(report.events.len(), 2, "new ticket + assignment");
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let mut store = MemoryStore::new();
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a"), ticket(1, OTHER, 2, "a again")]);
    let sink = RecordingSink::new();

    let err = run(&source, &mut store, &sink, &settings()).await.unwrap_err();
    assert!(matches!(err, CycleError::Malformed(_)), "{err}");
    assert!(store.snapshots().is_empty());
    assert!(store.last_saved_at().unwrap().is_none());
}

#[tokio::test]
async fn store_failures_abort_without_delivery() {
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]);
    let sink = RecordingSink::new();

    let mut load_fails = FlakyStore {
        fail_load: true,
        ..FlakyStore::default()
    };
    let err = run(&source, &mut load_fails, &sink, &settings()).await.unwrap_err();
    assert!(matches!(err, CycleError::Store(_)));

    let mut save_fails = FlakyStore {
        fail_save: true,
        ..FlakyStore::default()
    };
    let err = run(&source, &mut save_fails, &sink, &settings()).await.unwrap_err();
    assert!(matches!(err, CycleError::Store(_)));
    assert!(err.to_string().contains("disk full"));

    assert!(sink.deliveries().is_empty());
    assert_eq!(save_fails.inner.lease_owner(), None);
}

#[tokio::test]
async fn delivery_failure_still_advances_snapshot() {
    let mut store = MemoryStore::new();
    let source = FakeSource::new(ME, vec![ticket(1, OTHER, 1, "a")]);
    let sink = RecordingSink::failing();

    let report = run(&source, &mut store, &sink, &settings()).await.unwrap();
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.events.len(), 1);
    assert!(report.delivery.is_some());
    assert!(!report.delivered);
    assert_eq!(sink.deliveries().len(), 1, "attempted exactly once");
    assert!(store.snapshots().contains(1));
}

#[tokio::test]
async fn realtime_mode_skips_without_touching_anything() {
    let previous: SnapshotSet = [snapshot(1, ME, 0)].into_iter().collect();
    let mut store = MemoryStore::with_snapshots(previous.clone());
    let source = FakeSource::new(ME, vec![ticket(1, ME, 50, "a"), ticket(2, ME, 50, "b")]);
    let sink = RecordingSink::new();
    let mut cfg = settings();
    cfg.preferences.realtime_mode_enabled = true;

    let report = run(&source, &mut store, &sink, &cfg).await.unwrap();
    assert_eq!(report.status, CycleStatus::SkippedRealtime);
    assert!(report.events.is_empty());
    assert_eq!(source.fetches(), 0);
    assert_eq!(store.snapshots(), &previous);
    assert_eq!(store.lease_owner(), None);
}

#[tokio::test]
async fn held_lease_skips_cycle() {
    let mut store = MemoryStore::new();
    assert!(store.try_lock("other-process", chrono::Duration::seconds(60)).unwrap());
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]);
    let sink = RecordingSink::new();

    let report = run(&source, &mut store, &sink, &settings()).await.unwrap();
    assert_eq!(report.status, CycleStatus::SkippedBusy);
    assert_eq!(source.fetches(), 0);
    assert_eq!(store.lease_owner(), Some("other-process"));
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_hits_deadline() {
    let mut store = MemoryStore::new();
    let source =
        FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]).with_delay(Duration::from_secs(60));
    let sink = RecordingSink::new();

    let err = run(&source, &mut store, &sink, &settings()).await.unwrap_err();
    assert!(matches!(err, CycleError::DeadlineExceeded(d) if d == Duration::from_secs(5)));
    assert!(store.last_saved_at().unwrap().is_none());
    assert_eq!(store.lease_owner(), None);
}

#[tokio::test]
async fn unbounded_deadline_still_completes() {
    let mut store = MemoryStore::new();
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]);
    let sink = RecordingSink::new();
    let cfg = CycleSettings {
        deadline: Duration::MAX,
        ..settings()
    };

    let report = run(&source, &mut store, &sink, &cfg).await.unwrap();
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.events.len(), 2);
    assert_eq!(store.lease_owner(), None);
}

#[tokio::test]
async fn cancellation_before_save_keeps_old_snapshot() {
    let mut store = MemoryStore::new();
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    source.cancel_on_fetch(1, cancel.clone());

    let cfg = settings();
    let err = PollingCycle {
        source: &source,
        store: &mut store,
        sink: &sink,
        settings: &cfg,
    }
    .run(&cancel)
    .await
    .unwrap_err();

    assert!(matches!(err, CycleError::Cancelled));
    assert!(store.snapshots().is_empty());
    assert!(sink.deliveries().is_empty());
}

#[tokio::test]
async fn already_cancelled_cycle_does_not_fetch() {
    let mut store = MemoryStore::new();
    let source = FakeSource::new(ME, vec![ticket(1, ME, 1, "a")]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let cfg = settings();
    let err = PollingCycle {
        source: &source,
        store: &mut store,
        sink: &sink,
        settings: &cfg,
    }
    .run(&cancel)
    .await
    .unwrap_err();

    assert!(matches!(err, CycleError::Cancelled));
    assert_eq!(source.fetches(), 0);
    assert!(store.last_saved_at().unwrap().is_none());
}
