//! Admin roster: the user UIDs allowed to perform privileged operations.
//!
//! The roster is append-only in normal operation. The very first admin
//! enrols without authorisation (bootstrap); every later admin needs an
//! authorisation signed by an existing one. To reset the admins, delete the
//! roster record from the service bucket.

use crate::crypto::Authorisation;
use crate::encoding::get_datetime_now_to_string;
use crate::errors::{FedsvcError, Result};
use crate::service::context::ServiceContext;
use crate::store::StoreMutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Key of the roster record in the service bucket.
pub const ADMIN_USERS_KEY: &str = "_service_key/admin_users";

/// The authoriser recorded for the bootstrap admin.
pub const FIRST_ADMIN: &str = "first admin";

/// How and when a user became an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminEntry {
    pub enrolled_at: String,
    pub authorised_by: String,
}

/// The full roster: admin user UID to enrolment record.
pub type AdminRoster = BTreeMap<String, AdminEntry>;

impl ServiceContext {
    /// Enrol `account_uid` as a service administrator.
    ///
    /// An empty roster accepts the first admin without authorisation. A
    /// non-empty roster requires an authorisation signed over `account_uid`
    /// by a user who is already on the roster.
    pub fn add_admin_user(
        &self,
        account_uid: &str,
        authorisation: Option<&Authorisation>,
    ) -> Result<()> {
        // exclusive access to the roster for the read-check-append
        let mut mutex = StoreMutex::new(self.store(), self.bucket().clone(), ADMIN_USERS_KEY)?;

        let mut roster: AdminRoster = self
            .store()
            .get_object_from_json(self.bucket(), ADMIN_USERS_KEY)
            .and_then(|data| serde_json::from_value(data).ok())
            .unwrap_or_default();

        let authorised_by = if roster.is_empty() {
            // bootstrap: the first admin is automatically accepted
            FIRST_ADMIN.to_string()
        } else {
            let authorisation = authorisation.ok_or_else(|| {
                FedsvcError::ServiceAccount(
                    "you must supply a valid authorisation from an existing admin user \
                     if you want to add a new admin user"
                        .to_string(),
                )
            })?;

            if !roster.contains_key(authorisation.user_guid()) {
                mutex.unlock()?;
                return Err(FedsvcError::ServiceAccount(
                    "the authorisation for the new admin account is not valid because \
                     the user who signed it is not an admin on this service"
                        .to_string(),
                ));
            }

            authorisation.verify(account_uid).map_err(|e| {
                FedsvcError::ServiceAccount(format!(
                    "the authorisation for the new admin account does not verify: {}",
                    e
                ))
            })?;

            authorisation.user_guid().to_string()
        };

        roster.insert(
            account_uid.to_string(),
            AdminEntry {
                enrolled_at: get_datetime_now_to_string(),
                authorised_by: authorised_by.clone(),
            },
        );

        self.store().set_object_from_json(
            self.bucket(),
            ADMIN_USERS_KEY,
            &serde_json::to_value(&roster)?,
        )?;

        mutex.unlock()?;
        self.caches().admin_users.pop(ADMIN_USERS_KEY);

        info!(admin = %account_uid, authorised_by = %authorised_by, "enrolled admin user");
        Ok(())
    }

    /// The roster of all admin users. Fails with a missing-service-account
    /// error until the first admin has been enrolled.
    pub fn get_admin_users(&self) -> Result<AdminRoster> {
        if let Some(roster) = self.caches().admin_users.get(ADMIN_USERS_KEY) {
            return Ok(roster.clone());
        }

        let roster: AdminRoster = self
            .store()
            .get_object_from_json(self.bucket(), ADMIN_USERS_KEY)
            .and_then(|data| serde_json::from_value(data).ok())
            .filter(|roster: &AdminRoster| !roster.is_empty())
            .ok_or_else(|| {
                FedsvcError::MissingServiceAccount(
                    "you haven't yet created any admin users for this service; \
                     please create an admin user first"
                        .to_string(),
                )
            })?;

        self.caches()
            .admin_users
            .put(ADMIN_USERS_KEY.to_string(), roster.clone());

        Ok(roster)
    }
}
