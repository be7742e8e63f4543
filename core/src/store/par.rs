//! Pre-Authenticated Requests
//!
//! A PAR is a time-bounded capability URL scoped to a bucket or a single
//! object, with read and/or write rights. Scope selection happens here,
//! before any driver is involved, so forbidden combinations never reach the
//! backing store.

use crate::encoding::{datetime_to_string, get_datetime_now};
use crate::errors::{FedsvcError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The access class a PAR grants, mirroring the platform scope matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    ObjectRead,
    ObjectWrite,
    ObjectReadWrite,
    AnyObjectWrite,
}

impl AccessType {
    /// Pick the access class for the requested scope and permission bits.
    ///
    /// Bucket-scope PARs cannot carry read permission (platform
    /// limitation), and a PAR granting nothing at all is meaningless; both
    /// fail with a PAR error before any driver call.
    pub fn select(is_bucket: bool, readable: bool, writeable: bool) -> Result<AccessType> {
        if is_bucket {
            if readable {
                return Err(FedsvcError::Par(
                    "a bucket PAR cannot have read permissions due to a limitation \
                     in the underlying platform"
                        .to_string(),
                ));
            }
            if writeable {
                return Ok(AccessType::AnyObjectWrite);
            }
            return Err(FedsvcError::Par(
                "unsupported permissions model for PAR".to_string(),
            ));
        }

        match (readable, writeable) {
            (true, true) => Ok(AccessType::ObjectReadWrite),
            (true, false) => Ok(AccessType::ObjectRead),
            (false, true) => Ok(AccessType::ObjectWrite),
            (false, false) => Err(FedsvcError::Par(
                "unsupported permissions model for PAR".to_string(),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::ObjectRead => "ObjectRead",
            AccessType::ObjectWrite => "ObjectWrite",
            AccessType::ObjectReadWrite => "ObjectReadWrite",
            AccessType::AnyObjectWrite => "AnyObjectWrite",
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, AccessType::ObjectRead | AccessType::ObjectReadWrite)
    }

    pub fn is_writeable(&self) -> bool {
        !matches!(self, AccessType::ObjectRead)
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the fully qualified URL for a PAR access URI in the given region.
/// Leading slashes in the URI are stripped.
pub fn object_url_for_region(region: &str, uri: &str) -> String {
    format!(
        "https://objectstore.{}.fedsvc.internal/{}",
        region,
        uri.trim_start_matches('/')
    )
}

/// A minted pre-authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Par {
    url: String,
    /// The object key this PAR covers; absent for a bucket-scope PAR.
    key: Option<String>,
    #[serde(with = "crate::encoding::serde_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "crate::encoding::serde_datetime")]
    expires_at: DateTime<Utc>,
    is_readable: bool,
    is_writeable: bool,
    par_id: String,
    par_name: String,
    driver: String,
}

impl Par {
    /// Assemble a PAR from driver-minted parts. Drivers call this after
    /// [`AccessType::select`] has approved the scope.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: String,
        key: Option<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        access: AccessType,
        par_id: String,
        par_name: String,
        driver: &str,
    ) -> Par {
        Par {
            url,
            key,
            created_at,
            expires_at,
            is_readable: access.is_readable(),
            is_writeable: access.is_writeable(),
            par_id,
            par_name,
            driver: driver.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The object key, or `None` for a bucket-scope PAR.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_bucket_scope(&self) -> bool {
        self.key.is_none()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn is_writeable(&self) -> bool {
        self.is_writeable
    }

    pub fn par_id(&self) -> &str {
        &self.par_id
    }

    pub fn par_name(&self) -> &str {
        &self.par_name
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn is_expired(&self) -> bool {
        get_datetime_now() >= self.expires_at
    }

    /// Whole seconds until expiry; zero once expired.
    pub fn seconds_remaining(&self) -> i64 {
        (self.expires_at - get_datetime_now()).num_seconds().max(0)
    }

    /// Fail unless this PAR grants read access.
    pub fn require_readable(&self) -> Result<()> {
        if !self.is_readable {
            return Err(FedsvcError::ParPermissions(format!(
                "the PAR '{}' does not grant read access",
                self.par_name
            )));
        }
        Ok(())
    }

    /// Fail unless this PAR grants write access.
    pub fn require_writeable(&self) -> Result<()> {
        if !self.is_writeable {
            return Err(FedsvcError::ParPermissions(format!(
                "the PAR '{}' does not grant write access",
                self.par_name
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Par {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PAR({}, expires {})",
            self.url,
            datetime_to_string(self.expires_at)
        )
    }
}
