//! User-drive resolver
//!
//! Maps a user's slash-separated drive names to stable drive UIDs, with
//! authorised auto-creation and nested subdrive resolution. Bindings are
//! plain string objects in the service bucket:
//! - `storage/drives/<user_guid>/<encoded name>` for root drives
//! - `storage/subdrives/<user_guid>/<parent_uid>/<encoded name>` for nested
//!   drives
//! Concurrent first-creates of the same name converge through the store's
//! atomic insert-if-absent, not through a mutex.

use crate::crypto::Authorisation;
use crate::encoding::{create_uuid, encoded_to_string, string_to_encoded, string_to_filepath_parts};
use crate::errors::{FedsvcError, Result};
use crate::service::ServiceContext;
use tracing::debug;

/// Root of the top-level drive bindings.
pub const DRIVES_ROOT: &str = "storage/drives";

/// Root of the nested drive bindings.
pub const SUBDRIVES_ROOT: &str = "storage/subdrives";

/// The resource string a drive authorisation must cover.
pub const DRIVES_RESOURCE: &str = "UserDrives";

/// A resolved drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveInfo {
    drive_uid: String,
    user_guid: String,
    is_authorised: bool,
}

impl DriveInfo {
    pub fn uid(&self) -> &str {
        &self.drive_uid
    }

    pub fn user_guid(&self) -> &str {
        &self.user_guid
    }

    /// Whether this view of the drive came through a verified
    /// authorisation. Unauthorised views resolve existing drives but can
    /// never create them.
    pub fn is_authorised(&self) -> bool {
        self.is_authorised
    }
}

/// The drive namespace of a single user.
pub struct UserDrives<'a> {
    ctx: &'a ServiceContext,
    user_guid: String,
    is_authorised: bool,
}

impl<'a> UserDrives<'a> {
    /// Construct from a verified authorisation over the
    /// [`DRIVES_RESOURCE`] resource. A caller-supplied `user_guid` that
    /// disagrees with the authorisation is rejected.
    pub fn from_authorisation(
        ctx: &'a ServiceContext,
        authorisation: &Authorisation,
        user_guid: Option<&str>,
    ) -> Result<UserDrives<'a>> {
        authorisation.verify(DRIVES_RESOURCE)?;

        if let Some(user_guid) = user_guid {
            if user_guid != authorisation.user_guid() {
                return Err(FedsvcError::Permission(format!(
                    "disagreement of user_guid: {} versus {}",
                    authorisation.user_guid(),
                    user_guid
                )));
            }
        }

        Ok(UserDrives {
            ctx,
            user_guid: authorisation.user_guid().to_string(),
            is_authorised: true,
        })
    }

    /// Construct an unauthorised view for `user_guid`: existing drives
    /// resolve, autocreate is refused.
    pub fn for_user(ctx: &'a ServiceContext, user_guid: &str) -> UserDrives<'a> {
        UserDrives {
            ctx,
            user_guid: user_guid.to_string(),
            is_authorised: false,
        }
    }

    pub fn user_guid(&self) -> &str {
        &self.user_guid
    }

    pub fn is_authorised(&self) -> bool {
        self.is_authorised
    }

    /// The user-assigned names of all top-level drives of this user.
    pub fn list_drives(&self) -> Result<Vec<String>> {
        let prefix = format!("{}/{}", DRIVES_ROOT, self.user_guid);
        let names = self
            .ctx
            .store()
            .get_all_object_names(self.ctx.bucket(), Some(&prefix))?;

        names
            .iter()
            .map(|name| encoded_to_string(name.rsplit('/').next().unwrap_or(name)))
            .collect()
    }

    /// Resolve one binding key, creating it first-writer-wins when this
    /// view is authorised and `autocreate` is set.
    fn resolve_binding(&self, drive_key: &str, autocreate: bool) -> Result<Option<String>> {
        let store = self.ctx.store();

        if let Ok(drive_uid) = store.get_string_object(self.ctx.bucket(), drive_key) {
            return Ok(Some(drive_uid));
        }

        if !(self.is_authorised && autocreate) {
            return Ok(None);
        }

        let candidate = create_uuid();
        let drive_uid = store.set_ins_string_object(self.ctx.bucket(), drive_key, &candidate)?;

        if drive_uid == candidate {
            debug!(user = %self.user_guid, key = %drive_key, uid = %drive_uid, "created drive binding");
        }

        Ok(Some(drive_uid))
    }

    /// Resolve `name` as a child of the drive with UID `parent_uid`.
    fn get_subdrive(
        &self,
        parent_uid: &str,
        name: &str,
        autocreate: bool,
    ) -> Result<Option<String>> {
        // a single drive-name component must not smuggle in separators
        let parts = string_to_filepath_parts(name)?;
        if parts.len() != 1 {
            return Err(FedsvcError::Encoding(format!(
                "the drive name '{}' is not valid",
                name
            )));
        }

        let drive_key = format!(
            "{}/{}/{}/{}",
            SUBDRIVES_ROOT,
            self.user_guid,
            parent_uid,
            string_to_encoded(name)
        );

        self.resolve_binding(&drive_key, autocreate)
    }

    /// Return the drive the user calls `name`. A `/` in the name is a
    /// drive separator: `"alpha/beta"` is the subdrive `beta` of `alpha`.
    ///
    /// With `autocreate`, missing drives along the path are created; this
    /// requires the view to be authorised. Without it, a missing drive is
    /// a missing-drive error.
    pub fn get_drive(&self, name: &str, autocreate: bool) -> Result<DriveInfo> {
        let parts = string_to_filepath_parts(name)?;

        let root_key = format!(
            "{}/{}/{}",
            DRIVES_ROOT,
            self.user_guid,
            string_to_encoded(&parts[0])
        );

        let mut drive_uid = self
            .resolve_binding(&root_key, autocreate)?
            .ok_or_else(|| {
                FedsvcError::MissingDrive(format!("there is no drive called '{}' available", name))
            })?;

        for part in &parts[1..] {
            drive_uid = self
                .get_subdrive(&drive_uid, part, autocreate)?
                .ok_or_else(|| {
                    FedsvcError::MissingDrive(format!(
                        "there is no drive called '{}' available",
                        name
                    ))
                })?;
        }

        Ok(DriveInfo {
            drive_uid,
            user_guid: self.user_guid.clone(),
            is_authorised: self.is_authorised,
        })
    }
}
