//! Filesystem-backed object store.
//!
//! One directory per bucket (nested under the compartment directory when
//! one is given); keys map to relative paths and values to files. Useful
//! for development and for single-host deployments; the cloud drivers
//! implement the same trait out of tree.
//!
//! Limitations: a key cannot be both an object and a chunk parent on this
//! backend (a path is either a file or a directory), and overwrites are not
//! atomic. Insert-if-absent IS atomic, via hard-link publication.

use crate::encoding::{create_uuid, get_datetime_now};
use crate::errors::{FedsvcError, Result};
use crate::store::par::{object_url_for_region, AccessType, Par};
use crate::store::traits::{sanitise_bucket_name, Bucket, ObjectStore};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const REGION: &str = "local";

/// An object store rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: PathBuf) -> FilesystemStore {
        FilesystemStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &Bucket) -> PathBuf {
        match bucket.compartment() {
            Some(compartment) => self.root.join(compartment).join(bucket.name()),
            None => self.root.join(bucket.name()),
        }
    }

    fn key_path(&self, bucket: &Bucket, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(FedsvcError::ObjectStore(format!(
                "'{}' is not a valid object key",
                key
            )));
        }

        Ok(self.bucket_dir(bucket).join(key))
    }

    fn collect_names(dir: &Path, base: &Path, names: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            // dot-files are driver internals (in-flight inserts), not objects
            if file_name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            if path.is_dir() {
                Self::collect_names(&path, base, names)?;
            } else if let Ok(rel) = path.strip_prefix(base) {
                names.push(rel.to_string_lossy().into_owned());
            }
        }

        Ok(())
    }
}

impl ObjectStore for FilesystemStore {
    fn driver_name(&self) -> &'static str {
        "filesystem"
    }

    fn create_bucket(&self, bucket_name: &str, compartment: Option<&str>) -> Result<Bucket> {
        let name = sanitise_bucket_name(bucket_name);
        let bucket = Bucket::new(&name, compartment, REGION);
        let dir = self.bucket_dir(&bucket);

        if dir.exists() {
            return Err(FedsvcError::ObjectStore(format!(
                "unable to create the bucket '{}', likely because it already exists",
                name
            )));
        }

        fs::create_dir_all(&dir)?;
        Ok(bucket)
    }

    fn get_bucket(
        &self,
        bucket_name: &str,
        compartment: Option<&str>,
        create_if_needed: bool,
    ) -> Result<Bucket> {
        let name = sanitise_bucket_name(bucket_name);
        let bucket = Bucket::new(&name, compartment, REGION);
        let dir = self.bucket_dir(&bucket);

        if !dir.is_dir() {
            if !create_if_needed {
                return Err(FedsvcError::ObjectStore(format!(
                    "there is no bucket called '{}'",
                    name
                )));
            }
            fs::create_dir_all(&dir)?;
        }

        Ok(bucket)
    }

    fn get_object_direct(&self, bucket: &Bucket, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(bucket, key)?;

        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FedsvcError::ObjectStore(format!("no data at key '{}'", key)),
            _ => FedsvcError::Io(e),
        })
    }

    fn set_object(&self, bucket: &Bucket, key: &str, data: &[u8]) -> Result<()> {
        let path = self.key_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, data)?;
        Ok(())
    }

    fn set_ins_string_object(&self, bucket: &Bucket, key: &str, value: &str) -> Result<String> {
        let path = self.key_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // write the candidate to a hidden temp file, then publish it with a
        // hard link: link(2) fails with EEXIST if the key is already bound,
        // which makes the insert atomic even across processes
        let tmp = self.bucket_dir(bucket).join(format!(".ins-{}", create_uuid()));
        fs::write(&tmp, value.as_bytes())?;

        let linked = fs::hard_link(&tmp, &path);
        let _ = fs::remove_file(&tmp);

        match linked {
            Ok(()) => Ok(value.to_string()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read(&path)?;
                String::from_utf8(existing).map_err(|_| {
                    FedsvcError::ObjectStore(format!("the data at key '{}' is not utf-8", key))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_all_object_names(&self, bucket: &Bucket, prefix: Option<&str>) -> Result<Vec<String>> {
        let dir = self.bucket_dir(bucket);
        if !dir.is_dir() {
            return Err(FedsvcError::ObjectStore(format!(
                "there is no bucket called '{}'",
                bucket.name()
            )));
        }

        let mut all = Vec::new();
        Self::collect_names(&dir, &dir, &mut all)?;
        all.sort();

        let names = match prefix {
            None => all,
            Some(prefix) => {
                let sub = format!("{}/", prefix);
                all.into_iter()
                    .filter_map(|name| {
                        if name == prefix {
                            Some(String::new())
                        } else {
                            name.strip_prefix(&sub).map(|rest| rest.to_string())
                        }
                    })
                    .collect()
            }
        };

        Ok(names)
    }

    fn delete_object(&self, bucket: &Bucket, key: &str) -> Result<()> {
        let path = self.key_path(bucket, key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
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
