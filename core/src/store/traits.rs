//! ObjectStore driver trait
//!
//! Defines the capability set the core consumes from a backing store.
//! Implementations include:
//! - MemoryStore (in-process, the reference for driver semantics)
//! - FilesystemStore (one directory per bucket)
//! - Cloud drivers (OCI, S3, GCS) live outside this crate and implement the
//!   same trait

use crate::encoding::{
    create_uuid, datetime_to_string, get_datetime_future, get_datetime_now, string_to_datetime,
};
use crate::errors::{FedsvcError, Result};
use crate::store::par::{AccessType, Par};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default PAR lifetime in seconds.
pub const DEFAULT_PAR_DURATION: i64 = 3600;

/// Prefix under which [`ObjectStore::log`] writes its entries.
const LOG_PREFIX: &str = "log";

/// Handle to a named container of key/bytes objects.
///
/// A bucket handle carries no connection state; drivers resolve it against
/// their own backend on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    name: String,
    compartment: Option<String>,
    region: String,
}

impl Bucket {
    pub fn new(name: &str, compartment: Option<&str>, region: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
            compartment: compartment.map(|c| c.to_string()),
            region: region.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compartment(&self) -> Option<&str> {
        self.compartment.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Always returns a valid bucket name: whitespace runs collapse to `_`, and
/// an empty name becomes a fresh UUID.
pub fn sanitise_bucket_name(bucket_name: &str) -> String {
    let joined = bucket_name.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        create_uuid()
    } else {
        joined
    }
}

/// Abstract object store.
///
/// All backends implement this interface. The required methods are the
/// driver primitives; everything else is layered on top of them and shared
/// by every driver.
///
/// # Driver contract
///
/// - Within a single key, reads observe the most recently acknowledged
///   write. No ordering is guaranteed across keys.
/// - [`ObjectStore::set_ins_string_object`] MUST be atomic: exactly one of
///   any set of concurrent first writers wins, and every caller learns the
///   winning value. Backends without a native primitive must synthesise it
///   with [`crate::store::StoreMutex`].
/// - Overwrites ([`ObjectStore::set_object`]) need no atomicity beyond
///   single-key read-after-write.
pub trait ObjectStore: Send + Sync {
    /// Short driver name recorded into minted PARs, e.g. `"memory"`.
    fn driver_name(&self) -> &'static str;

    /// Create a new bucket called `bucket_name`. Fails with an object-store
    /// error if the bucket already exists.
    fn create_bucket(&self, bucket_name: &str, compartment: Option<&str>) -> Result<Bucket>;

    /// Find the bucket called `bucket_name`, creating it first when
    /// `create_if_needed` is set. Fails with an object-store error if the
    /// bucket is missing and not being created.
    fn get_bucket(
        &self,
        bucket_name: &str,
        compartment: Option<&str>,
        create_if_needed: bool,
    ) -> Result<Bucket>;

    /// Fetch the bytes stored at exactly `key`, with no chunk fallback.
    /// Absence is an object-store error. Callers want [`ObjectStore::get_object`].
    fn get_object_direct(&self, bucket: &Bucket, key: &str) -> Result<Vec<u8>>;

    /// Set the value of `key` to `data`, overwriting any previous value.
    fn set_object(&self, bucket: &Bucket, key: &str, data: &[u8]) -> Result<()>;

    /// Atomic insert-if-absent of a string value.
    ///
    /// # Returns
    ///
    /// The value stored at `key` after the operation: the provided `value`
    /// if this caller won the race, or the previously stored value if not.
    /// First-creator-wins drive binding is built on this primitive.
    fn set_ins_string_object(&self, bucket: &Bucket, key: &str, value: &str) -> Result<String>;

    /// Names of all objects in the bucket, optionally restricted to those
    /// under `prefix`. Returned names have the prefix (and its trailing
    /// separator) stripped.
    fn get_all_object_names(&self, bucket: &Bucket, prefix: Option<&str>) -> Result<Vec<String>>;

    /// Remove the object at `key`. Removing an absent key is not an error.
    fn delete_object(&self, bucket: &Bucket, key: &str) -> Result<()>;

    /// Mint a PAR for an access class that has already passed
    /// [`AccessType::select`]. Callers want [`ObjectStore::create_par`].
    fn create_par_unchecked(
        &self,
        bucket: &Bucket,
        key: Option<&str>,
        access: AccessType,
        expires_at: DateTime<Utc>,
    ) -> Result<Par>;

    // ---- provided: reads ----

    /// Return the binary data stored at `key`.
    ///
    /// # Protocol Semantics
    ///
    /// Large objects may have been written as a chunk sequence. If the
    /// primary key is absent the driver probes `"<key>/1"`, `"<key>/2"`, …
    /// and concatenates the chunks until the first gap. New writes should
    /// prefer single-blob uploads where the backend supports them.
    fn get_object(&self, bucket: &Bucket, key: &str) -> Result<Vec<u8>> {
        if let Ok(data) = self.get_object_direct(bucket, key) {
            return Ok(data);
        }

        let mut data = match self.get_object_direct(bucket, &format!("{}/1", key)) {
            Ok(chunk) => chunk,
            Err(_) => {
                return Err(FedsvcError::ObjectStore(format!(
                    "no data at key '{}'",
                    key
                )))
            }
        };

        let mut next_chunk = 2;
        while let Ok(chunk) = self.get_object_direct(bucket, &format!("{}/{}", key, next_chunk)) {
            data.extend_from_slice(&chunk);
            next_chunk += 1;
        }

        Ok(data)
    }

    /// Return the string stored at `key`.
    fn get_string_object(&self, bucket: &Bucket, key: &str) -> Result<String> {
        let data = self.get_object(bucket, key)?;
        String::from_utf8(data).map_err(|_| {
            FedsvcError::ObjectStore(format!("the data at key '{}' is not utf-8", key))
        })
    }

    /// Return the JSON value stored at `key`, or `None` on any failure.
    /// Absence and corruption are deliberately indistinguishable here so
    /// callers can treat both as "not there yet".
    fn get_object_from_json(&self, bucket: &Bucket, key: &str) -> Option<serde_json::Value> {
        let data = self.get_string_object(bucket, key).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Fetch the object at `key` and write it to the file at `filename`.
    fn get_object_as_file(&self, bucket: &Bucket, key: &str, filename: &Path) -> Result<()> {
        let data = self.get_object(bucket, key)?;
        if let Some(parent) = filename.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(filename, data)?;
        Ok(())
    }

    /// All objects under `prefix`, keyed by their prefix-stripped names.
    fn get_all_objects(
        &self,
        bucket: &Bucket,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let names = self.get_all_object_names(bucket, prefix)?;
        let mut objects = BTreeMap::new();

        for name in names {
            let key = match prefix {
                Some(p) if name.is_empty() => p.to_string(),
                Some(p) => format!("{}/{}", p, name),
                None => name.clone(),
            };
            objects.insert(name, self.get_object(bucket, &key)?);
        }

        Ok(objects)
    }

    /// All string objects under `prefix`. Values that are not valid utf-8
    /// are dropped from the result.
    fn get_all_strings(
        &self,
        bucket: &Bucket,
        prefix: Option<&str>,
    ) -> Result<BTreeMap<String, String>> {
        let objects = self.get_all_objects(bucket, prefix)?;
        Ok(objects
            .into_iter()
            .filter_map(|(name, data)| String::from_utf8(data).ok().map(|s| (name, s)))
            .collect())
    }

    // ---- provided: writes ----

    /// Set the value of `key` to the string `value`.
    fn set_string_object(&self, bucket: &Bucket, key: &str, value: &str) -> Result<()> {
        self.set_object(bucket, key, value.as_bytes())
    }

    /// Set the value of `key` to `data` encoded as JSON.
    fn set_object_from_json(
        &self,
        bucket: &Bucket,
        key: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        self.set_string_object(bucket, key, &serde_json::to_string(data)?)
    }

    /// Set the value of `key` to the contents of the file at `filename`.
    fn set_object_from_file(&self, bucket: &Bucket, key: &str, filename: &Path) -> Result<()> {
        let data = std::fs::read(filename)?;
        self.set_object(bucket, key, &data)
    }

    /// Delete every object in the bucket, or only those under `prefix`.
    fn delete_all_objects(&self, bucket: &Bucket, prefix: Option<&str>) -> Result<()> {
        for name in self.get_all_object_names(bucket, prefix)? {
            let key = match prefix {
                Some(p) if name.is_empty() => p.to_string(),
                Some(p) => format!("{}/{}", p, name),
                None => name,
            };
            self.delete_object(bucket, &key)?;
        }
        Ok(())
    }

    /// Remove every object whose key does not start with any of `keys`.
    fn clear_all_except(&self, bucket: &Bucket, keys: &[&str]) -> Result<()> {
        for name in self.get_all_object_names(bucket, None)? {
            if !keys.iter().any(|k| name.starts_with(k)) {
                self.delete_object(bucket, &name)?;
            }
        }
        Ok(())
    }

    // ---- provided: PARs ----

    /// Create a pre-authenticated request for the passed bucket and key. A
    /// missing `key` makes the request bucket-scoped. The scope matrix is
    /// checked before the driver mints anything, and the duration floor (5
    /// seconds) is enforced by the shared clock invariant.
    fn create_par(
        &self,
        bucket: &Bucket,
        key: Option<&str>,
        readable: bool,
        writeable: bool,
        duration_seconds: i64,
    ) -> Result<Par> {
        let access = AccessType::select(key.is_none(), readable, writeable)?;
        let expires_at = get_datetime_future(Duration::seconds(duration_seconds))
            .map_err(|e| FedsvcError::Par(format!("invalid PAR duration: {}", e)))?;

        self.create_par_unchecked(bucket, key, access, expires_at)
    }

    // ---- provided: store log ----

    /// Append `message` to the store log under a timestamped key.
    fn log(&self, bucket: &Bucket, message: &str) -> Result<()> {
        let key = format!(
            "{}/{}",
            LOG_PREFIX,
            datetime_to_string(get_datetime_now())
        );
        self.set_string_object(bucket, &key, message)
    }

    /// Render the complete store log, oldest entry first.
    fn get_log(&self, bucket: &Bucket) -> Result<String> {
        let entries = self.get_all_strings(bucket, Some(LOG_PREFIX))?;

        let mut lines = vec!["<log>".to_string()];
        for (timestamp, message) in &entries {
            // entries are keyed by their encoded write instant; anything
            // else under the prefix is not ours
            if string_to_datetime(timestamp).is_err() {
                continue;
            }
            lines.push(format!(
                "<logitem><timestamp>{}</timestamp><message>{}</message></logitem>",
                timestamp, message
            ));
        }
        lines.push("</log>".to_string());

        Ok(lines.join(""))
    }

    /// Clear out the store log.
    fn clear_log(&self, bucket: &Bucket) -> Result<()> {
        self.delete_all_objects(bucket, Some(LOG_PREFIX))
    }
}
