//! Lease-based advisory lock rooted in the object store.
//!
//! Parallel processes on distinct hosts share only the store, so the lock
//! is a lease record at `<key>.lock` containing a holder nonce and an
//! expiry. Acquisition rides on the atomic insert-if-absent primitive; a
//! crashed holder self-heals via lease expiry.

use crate::encoding::{create_uuid, get_datetime_now};
use crate::errors::{FedsvcError, Result};
use crate::store::traits::{Bucket, ObjectStore};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long an acquire blocks before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a lease outlives its acquisition if the holder never releases.
const LEASE_SECONDS: i64 = 10;

const POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Serialize, Deserialize)]
struct LeaseRecord {
    holder: String,
    #[serde(with = "crate::encoding::serde_datetime")]
    expires_at: DateTime<Utc>,
}

/// An advisory lock on a single object-store key.
///
/// Re-entrant on the same instance only; two `StoreMutex` values for the
/// same key are distinct holders even within one process. Dropping a held
/// mutex releases it on a best-effort basis.
pub struct StoreMutex {
    store: Arc<dyn ObjectStore>,
    bucket: Bucket,
    key: String,
    lock_key: String,
    holder: String,
    held: u32,
}

impl StoreMutex {
    /// Create the mutex for `(bucket, key)` and acquire it, blocking up to
    /// the default timeout.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: Bucket, key: &str) -> Result<StoreMutex> {
        Self::with_timeout(store, bucket, key, DEFAULT_TIMEOUT)
    }

    /// Create the mutex and acquire it, blocking up to `timeout`.
    pub fn with_timeout(
        store: Arc<dyn ObjectStore>,
        bucket: Bucket,
        key: &str,
        timeout: Duration,
    ) -> Result<StoreMutex> {
        let mut mutex = StoreMutex {
            store,
            bucket,
            key: key.to_string(),
            lock_key: format!("{}.lock", key),
            holder: create_uuid(),
            held: 0,
        };
        mutex.lock(timeout)?;
        Ok(mutex)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_held(&self) -> bool {
        self.held > 0
    }

    fn lease_json(&self) -> Result<String> {
        let record = LeaseRecord {
            holder: self.holder.clone(),
            expires_at: get_datetime_now() + ChronoDuration::seconds(LEASE_SECONDS),
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Acquire the lock, blocking up to `timeout`.
    pub fn lock(&mut self, timeout: Duration) -> Result<()> {
        if self.held > 0 {
            // re-entry by the same in-process holder
            self.held += 1;
            return Ok(());
        }

        let deadline = Instant::now() + timeout;

        loop {
            let stored =
                self.store
                    .set_ins_string_object(&self.bucket, &self.lock_key, &self.lease_json()?)?;

            match serde_json::from_str::<LeaseRecord>(&stored) {
                Ok(record) if record.holder == self.holder => {
                    debug!(key = %self.key, "acquired store mutex");
                    self.held = 1;
                    return Ok(());
                }
                Ok(record) if record.expires_at <= get_datetime_now() => {
                    // the previous holder died; clear the lease and race to
                    // re-insert. Losing that race is fine, we just loop.
                    warn!(key = %self.key, holder = %record.holder, "stealing expired lease");
                    self.store.delete_object(&self.bucket, &self.lock_key)?;
                    continue;
                }
                Ok(_) => {}
                Err(_) => {
                    // an unreadable lease can never expire on its own
                    warn!(key = %self.key, "clearing corrupt lease record");
                    self.store.delete_object(&self.bucket, &self.lock_key)?;
                    continue;
                }
            }

            if Instant::now() >= deadline {
                return Err(FedsvcError::MutexTimeout(format!(
                    "unable to acquire the lock on '{}' within {:?}",
                    self.key, timeout
                )));
            }

            let jitter = rand::thread_rng().gen_range(0..POLL_INTERVAL_MS);
            std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS + jitter));
        }
    }

    /// Release the lock. Releasing an unheld mutex is a no-op, and only a
    /// lease this instance owns is ever deleted.
    pub fn unlock(&mut self) -> Result<()> {
        if self.held == 0 {
            return Ok(());
        }

        self.held -= 1;
        if self.held > 0 {
            return Ok(());
        }

        if let Ok(stored) = self.store.get_string_object(&self.bucket, &self.lock_key) {
            if let Ok(record) = serde_json::from_str::<LeaseRecord>(&stored) {
                if record.holder == self.holder {
                    self.store.delete_object(&self.bucket, &self.lock_key)?;
                    debug!(key = %self.key, "released store mutex");
                }
            }
        }

        Ok(())
    }
}

impl Drop for StoreMutex {
    fn drop(&mut self) {
        if self.held > 0 {
            self.held = 1;
            let _ = self.unlock();
        }
    }
}
