//! In-process object store.
//!
//! The reference driver: a map of buckets behind a process mutex. Every
//! trait semantics question ("what does a driver do here?") is answered by
//! this implementation, and the test suites run against it.

use crate::encoding::{create_uuid, get_datetime_now};
use crate::errors::{FedsvcError, Result};
use crate::store::par::{object_url_for_region, AccessType, Par};
use crate::store::traits::{sanitise_bucket_name, Bucket, ObjectStore};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

const REGION: &str = "local";

type BucketMap = HashMap<String, BTreeMap<String, Vec<u8>>>;

/// An object store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BucketMap>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, BucketMap> {
        // a poisoned lock only means another thread panicked mid-write;
        // the map itself is still structurally sound
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require_bucket<'a>(
        buckets: &'a BucketMap,
        bucket: &Bucket,
    ) -> Result<&'a BTreeMap<String, Vec<u8>>> {
        buckets.get(bucket.name()).ok_or_else(|| {
            FedsvcError::ObjectStore(format!("there is no bucket called '{}'", bucket.name()))
        })
    }
}

impl ObjectStore for MemoryStore {
    fn driver_name(&self) -> &'static str {
        "memory"
    }

    fn create_bucket(&self, bucket_name: &str, compartment: Option<&str>) -> Result<Bucket> {
        let name = sanitise_bucket_name(bucket_name);
        let mut buckets = self.locked();

        if buckets.contains_key(&name) {
            return Err(FedsvcError::ObjectStore(format!(
                "unable to create the bucket '{}', likely because it already exists",
                name
            )));
        }

        buckets.insert(name.clone(), BTreeMap::new());
        Ok(Bucket::new(&name, compartment, REGION))
    }

    fn get_bucket(
        &self,
        bucket_name: &str,
        compartment: Option<&str>,
        create_if_needed: bool,
    ) -> Result<Bucket> {
        let name = sanitise_bucket_name(bucket_name);
        let mut buckets = self.locked();

        if !buckets.contains_key(&name) {
            if !create_if_needed {
                return Err(FedsvcError::ObjectStore(format!(
                    "there is no bucket called '{}'",
                    name
                )));
            }
            buckets.insert(name.clone(), BTreeMap::new());
        }

        Ok(Bucket::new(&name, compartment, REGION))
    }

    fn get_object_direct(&self, bucket: &Bucket, key: &str) -> Result<Vec<u8>> {
        let buckets = self.locked();
        let objects = Self::require_bucket(&buckets, bucket)?;

        objects
            .get(key)
            .cloned()
            .ok_or_else(|| FedsvcError::ObjectStore(format!("no data at key '{}'", key)))
    }

    fn set_object(&self, bucket: &Bucket, key: &str, data: &[u8]) -> Result<()> {
        let mut buckets = self.locked();
        let objects = buckets.get_mut(bucket.name()).ok_or_else(|| {
            FedsvcError::ObjectStore(format!("there is no bucket called '{}'", bucket.name()))
        })?;

        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn set_ins_string_object(&self, bucket: &Bucket, key: &str, value: &str) -> Result<String> {
        let mut buckets = self.locked();
        let objects = buckets.get_mut(bucket.name()).ok_or_else(|| {
            FedsvcError::ObjectStore(format!("there is no bucket called '{}'", bucket.name()))
        })?;

        // the map is locked for the whole probe-and-insert, so exactly one
        // of any set of racing first writers can win
        let stored = objects
            .entry(key.to_string())
            .or_insert_with(|| value.as_bytes().to_vec());

        String::from_utf8(stored.clone()).map_err(|_| {
            FedsvcError::ObjectStore(format!("the data at key '{}' is not utf-8", key))
        })
    }

    fn get_all_object_names(&self, bucket: &Bucket, prefix: Option<&str>) -> Result<Vec<String>> {
        let buckets = self.locked();
        let objects = Self::require_bucket(&buckets, bucket)?;

        let names = match prefix {
            None => objects.keys().cloned().collect(),
            Some(prefix) => {
                let dir = format!("{}/", prefix);
                objects
                    .keys()
                    .filter_map(|key| {
                        if key == prefix {
                            Some(String::new())
                        } else {
                            key.strip_prefix(&dir).map(|rest| rest.to_string())
                        }
                    })
                    .collect()
            }
        };

        Ok(names)
    }

    fn delete_object(&self, bucket: &Bucket, key: &str) -> Result<()> {
        let mut buckets = self.locked();
        let objects = buckets.get_mut(bucket.name()).ok_or_else(|| {
            FedsvcError::ObjectStore(format!("there is no bucket called '{}'", bucket.name()))
        })?;

        objects.remove(key);
        Ok(())
    }

    fn create_par_unchecked(
        &self,
        bucket: &Bucket,
        key: Option<&str>,
        access: AccessType,
        expires_at: DateTime<Utc>,
    ) -> Result<Par> {
        let par_id = create_uuid();
        let par_name = create_uuid();

        let access_uri = match key {
            Some(key) => format!("p/{}/n/fedsvc/b/{}/o/{}", par_id, bucket.name(), key),
            None => format!("p/{}/n/fedsvc/b/{}/o/", par_id, bucket.name()),
        };
        let url = object_url_for_region(bucket.region(), &access_uri);

        Ok(Par::new(
            url,
            key.map(|k| k.to_string()),
            get_datetime_now(),
            expires_at,
            access,
            par_id,
            par_name,
            self.driver_name(),
        ))
    }
}
