//! Lease locks
//!
//! A lock is a document in a dedicated container, partitioned by its own
//! ID and carrying a TTL. Whoever creates the document holds the lock until
//! they delete it or the store expires it. Renewal and release are guarded
//! by the ETag of the holder's last write, so a holder that lost its lease
//! can never disturb the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::arm::{PartitionKey, StorageKey, STORAGE_KEY_DELIMITER};
use crate::clock::{system_clock, SharedClock};
use crate::concurrency::{DeleteCondition, ETag, WriteCondition};
use crate::errors::{DbError, DbResult};
use crate::store::{SharedStore, StoreError, StoredItem, TIMESTAMP_FIELD};

/// A held lease
#[derive(Debug, Clone, PartialEq)]
pub struct Lock {
    id: String,
    key: StorageKey,
    partition: PartitionKey,
    body: Value,
    etag: ETag,
}

impl Lock {
    fn from_item(id: &str, partition: PartitionKey, item: StoredItem) -> DbResult<Self> {
        Ok(Self {
            id: id.to_string(),
            key: item.key()?,
            partition,
            body: item.body,
            etag: item.etag,
        })
    }

    /// The ID the lock was requested under
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> Option<&str> {
        self.body.get("owner").and_then(Value::as_str)
    }

    pub fn etag(&self) -> &ETag {
        &self.etag
    }

    /// When the store last wrote the lease
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        self.body
            .get(TIMESTAMP_FIELD)
            .and_then(Value::as_i64)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// One second before the lease lapses; renew by then to keep it.
    pub fn renew_at(&self) -> Option<DateTime<Utc>> {
        let ttl = self.body.get("ttl").and_then(Value::as_i64).unwrap_or(0);
        self.written_at()
            .map(|ts| ts + chrono::Duration::seconds((ttl - 1).max(0)))
    }
}

/// Acquires, renews and releases lease locks
#[derive(Clone)]
pub struct LockClient {
    store: SharedStore,
    owner: String,
    default_ttl: i64,
    poll_interval: Duration,
    clock: SharedClock,
}

impl LockClient {
    /// `default_ttl` is the lease length in seconds and must be positive.
    pub fn new(store: SharedStore, owner: impl Into<String>, default_ttl: i64) -> DbResult<Self> {
        if default_ttl <= 0 {
            return Err(DbError::InvalidArgument(format!(
                "lock TTL must be positive, got {}",
                default_ttl
            )));
        }
        Ok(Self {
            store,
            owner: owner.into(),
            default_ttl,
            poll_interval: Duration::from_secs(1),
            clock: system_clock(),
        })
    }

    /// Clock compared against lease timestamps when holding a lock.
    /// Must agree with the clock of the lock store.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// How long [`acquire`](LockClient::acquire) sleeps between attempts,
    /// and the longest a [`LockHold`] sleeps between lease checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl.unsigned_abs())
    }

    /// Value for a `Retry-After` header telling clients when a contended
    /// lock may be free.
    pub fn retry_after_seconds(&self) -> u64 {
        self.default_ttl.unsigned_abs()
    }

    /// Take the lock if nobody holds it. `None` when it is held.
    pub fn try_acquire(&self, id: &str) -> DbResult<Option<Lock>> {
        let (key, partition) = lock_keys(id)?;
        let body = json!({
            "id": key.as_str(),
            "partitionKey": partition.as_str(),
            "owner": self.owner,
            "ttl": self.default_ttl,
        });
        match self.store.write(&partition, body, WriteCondition::Create) {
            Ok(item) => {
                debug!(lock = id, owner = %self.owner, "acquired lock");
                Ok(Some(Lock::from_item(id, partition, item)?))
            }
            Err(StoreError::Conflict(_)) => {
                debug!(lock = id, "lock is held elsewhere");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the lock is taken or `timeout` passes.
    pub fn acquire(&self, id: &str, timeout: Duration) -> DbResult<Lock> {
        // Too far out to represent means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(lock) = self.try_acquire(id)? {
                return Ok(lock);
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            lock = id,
                            timeout_ms = timeout.as_millis() as u64,
                            "timed out acquiring lock"
                        );
                        return Err(DbError::LockTimeout(id.to_string()));
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            thread::sleep(wait);
        }
    }

    /// Keep `lock` alive from a background thread, renewing it at
    /// [`Lock::renew_at`] until [`LockHold::stop`] is called or the lease
    /// is lost.
    pub fn hold(&self, lock: Lock) -> LockHold {
        let shared = Arc::new(HoldState {
            current: Mutex::new(Some(lock)),
            lost: AtomicBool::new(false),
        });
        let (stop_tx, stop_rx) = mpsc::channel();
        let client = self.clone();
        let state = shared.clone();
        let handle = thread::spawn(move || client.renew_until_stopped(&state, &stop_rx));
        LockHold {
            shared,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    fn renew_until_stopped(&self, state: &HoldState, stop: &mpsc::Receiver<()>) {
        loop {
            let Some(lock) = state.current.lock().clone() else {
                return;
            };
            let now = self.clock.now();
            let renew_at = lock.renew_at().unwrap_or(now);

            let lock = if now >= renew_at {
                match self.renew(&lock) {
                    Ok(Some(renewed)) => {
                        debug!(lock = %renewed.id, "renewed held lock");
                        *state.current.lock() = Some(renewed.clone());
                        renewed
                    }
                    Ok(None) => return state.mark_lost(),
                    Err(e) => {
                        warn!(lock = %lock.id, error = %e, "failed to renew held lock");
                        return state.mark_lost();
                    }
                }
            } else {
                lock
            };

            let until = lock
                .renew_at()
                .and_then(|at| (at - self.clock.now()).to_std().ok())
                .unwrap_or(Duration::ZERO);
            let wait = if until.is_zero() {
                self.poll_interval
            } else {
                until.min(self.poll_interval)
            };
            match stop.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Extend the lease. `None` when it was lost to expiry or another
    /// holder.
    pub fn renew(&self, lock: &Lock) -> DbResult<Option<Lock>> {
        match self.store.write(
            &lock.partition,
            lock.body.clone(),
            WriteCondition::IfMatch(lock.etag.clone()),
        ) {
            Ok(item) => Ok(Some(Lock::from_item(&lock.id, lock.partition.clone(), item)?)),
            Err(StoreError::PreconditionFailed(_)) | Err(StoreError::NotFound(_)) => {
                warn!(lock = %lock.id, "lock was lost before renewal");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Give the lock up. Releasing a lease someone else now holds is a
    /// no-op.
    pub fn release(&self, lock: Lock) -> DbResult<()> {
        match self.store.delete(
            &lock.partition,
            &lock.key,
            DeleteCondition::IfMatch(lock.etag.clone()),
        ) {
            Ok(()) => {
                debug!(lock = %lock.id, "released lock");
                Ok(())
            }
            Err(StoreError::PreconditionFailed(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct HoldState {
    current: Mutex<Option<Lock>>,
    lost: AtomicBool,
}

impl HoldState {
    fn mark_lost(&self) {
        *self.current.lock() = None;
        self.lost.store(true, Ordering::SeqCst);
    }
}

/// A lock kept alive by a background renewal thread.
///
/// Dropping the hold stops renewal without releasing the lease.
pub struct LockHold {
    shared: Arc<HoldState>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LockHold {
    /// True once a renewal failed; the lease may now belong to someone
    /// else and the work it guarded should stop.
    pub fn is_lost(&self) -> bool {
        self.shared.lost.load(Ordering::SeqCst)
    }

    /// The lease as of the latest renewal
    pub fn current(&self) -> Option<Lock> {
        self.shared.current.lock().clone()
    }

    /// Stop renewing and return the current lease, or `None` if it was
    /// lost.
    pub fn stop(mut self) -> Option<Lock> {
        self.shutdown();
        if self.is_lost() {
            return None;
        }
        self.shared.current.lock().take()
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("lock renewal thread panicked");
                self.shared.mark_lost();
            }
        }
    }
}

impl Drop for LockHold {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Lock IDs may be resource IDs; the document key keeps no `/` and no case.
fn lock_keys(id: &str) -> DbResult<(StorageKey, PartitionKey)> {
    if id.is_empty() {
        return Err(DbError::InvalidArgument("lock ID is empty".into()));
    }
    let key = StorageKey::parse(
        &id.to_ascii_lowercase()
            .replace('/', &STORAGE_KEY_DELIMITER.to_string()),
    )?;
    let partition = PartitionKey::new(key.as_str())?;
    Ok((key, partition))
}
