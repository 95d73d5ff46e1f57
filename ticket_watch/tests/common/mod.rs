#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use ticket_watch::snapshot::SnapshotSet;
use ticket_watch::store::{MemoryStore, SnapshotStore, SqliteSnapshotStore, StoreResult};
use zammad_client::source::AuthenticationSnafu;
use zammad_client::{SourceError, Ticket, TicketSource, User};

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct Synchronous {
    #[diesel(sql_type = Integer)]
    synchronous: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/watch.db
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let mut p = PathBuf::from(dir.path());
        p.push("watch.db");
        let path = p.to_string_lossy().to_string();
        Self { _dir: dir, path }
    }

    /// Open a store on this file; migrations run on open.
    pub fn open(&self) -> SqliteSnapshotStore {
        SqliteSnapshotStore::open(&self.path).expect("open store")
    }
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    // NORMAL == 1
    let sync: Synchronous = sql_query("PRAGMA synchronous;").get_result(conn).unwrap();
    assert_eq!(sync.synchronous, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub const ME: i64 = 5;
pub const OTHER: i64 = 9;

/// 2024-05-01T12:00:00Z plus `secs`.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub fn ticket(id: i64, owner_id: i64, updated_secs: i64, title: &str) -> Ticket {
    Ticket {
        id,
        number: format!("{}", 31000 + id),
        title: title.into(),
        state_id: 1,
        priority_id: 2,
        owner_id,
        customer_id: 77,
        created_at: ts(0),
        updated_at: ts(updated_secs),
    }
}

/// Scriptable [`TicketSource`] for cycle tests.
pub struct FakeSource {
    user_id: i64,
    tickets: Vec<Ticket>,
    fail: AtomicBool,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    cancel_on_fetch: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeSource {
    pub fn new(user_id: i64, tickets: Vec<Ticket>) -> Self {
        Self {
            user_id,
            tickets,
            fail: AtomicBool::new(false),
            delay: None,
            fetches: AtomicUsize::new(0),
            cancel_on_fetch: Mutex::new(None),
        }
    }

    /// Ticket requests sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every subsequent user request fail with an authentication error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Cancel `token` while serving the `nth` (1-based) ticket request.
    pub fn cancel_on_fetch(&self, nth: usize, token: CancellationToken) {
        *self.cancel_on_fetch.lock().unwrap() = Some((nth, token));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketSource for FakeSource {
    async fn current_user(&self) -> Result<User, SourceError> {
        if self.fail.load(Ordering::SeqCst) {
            return AuthenticationSnafu {
                endpoint: "users/me",
            }
            .fail();
        }
        Ok(User {
            id: self.user_id,
            firstname: "Agent".into(),
            lastname: "Smith".into(),
            email: "agent@example.com".into(),
            role_ids: None,
        })
    }

    async fn open_tickets(&self, _query: &str) -> Result<Vec<Ticket>, SourceError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((nth, token)) = self.cancel_on_fetch.lock().unwrap().as_ref()
            && *nth == n
        {
            token.cancel();
        }
        Ok(self.tickets.clone())
    }
}

/// [`MemoryStore`] that can be told to fail loads or saves.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_load: bool,
    pub fail_save: bool,
}

impl SnapshotStore for FlakyStore {
    fn load(&mut self) -> StoreResult<SnapshotSet> {
        if self.fail_load {
            anyhow::bail!("disk on fire");
        }
        self.inner.load()
    }

    fn save(&mut self, snapshots: &SnapshotSet) -> StoreResult<()> {
        if self.fail_save {
            anyhow::bail!("disk full");
        }
        self.inner.save(snapshots)
    }

    fn try_lock(&mut self, owner: &str, ttl: chrono::Duration) -> StoreResult<bool> {
        self.inner.try_lock(owner, ttl)
    }

    fn unlock(&mut self, owner: &str) -> StoreResult<()> {
        self.inner.unlock(owner)
    }

    fn last_saved_at(&mut self) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.last_saved_at()
    }
}
