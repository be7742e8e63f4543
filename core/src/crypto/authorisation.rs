//! Signed authorisations for privileged operations.
//!
//! An [`Authorisation`] is a user's signed statement that they approve an
//! operation on a named resource, e.g. enrolling a new admin (resource is
//! the new admin's UID) or opening the drive namespace (resource
//! `"UserDrives"`). The core verifies the signature and the resource
//! agreement; binding the public key to the user GUID is the identity
//! service's job.

use crate::crypto::keys::{PublicKey, SigningPair};
use crate::encoding::{
    bytes_to_string, datetime_to_string, get_datetime_now, string_to_bytes,
};
use crate::errors::{FedsvcError, Result};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A user's signed approval of an operation on a single resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorisation {
    user_guid: String,
    resource: String,
    #[serde(with = "crate::encoding::serde_datetime")]
    signed_at: DateTime<Utc>,
    public_key: PublicKey,
    #[serde(
        serialize_with = "serialize_signature",
        deserialize_with = "deserialize_signature"
    )]
    signature: Vec<u8>,
}

fn serialize_signature<S: Serializer>(
    signature: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&bytes_to_string(signature))
}

fn deserialize_signature<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    string_to_bytes(&encoded).map_err(D::Error::custom)
}

fn signed_message(user_guid: &str, resource: &str, signed_at: DateTime<Utc>) -> String {
    format!(
        "{}:{}:{}",
        user_guid,
        resource,
        datetime_to_string(signed_at)
    )
}

impl Authorisation {
    /// Sign an approval of `resource` on behalf of `user_guid`.
    pub fn sign(user_guid: &str, resource: &str, pair: &SigningPair) -> Result<Self> {
        let signed_at = get_datetime_now();
        let message = signed_message(user_guid, resource, signed_at);
        let signature = pair.sign(message.as_bytes())?;

        Ok(Authorisation {
            user_guid: user_guid.to_string(),
            resource: resource.to_string(),
            signed_at,
            public_key: pair.public().clone(),
            signature,
        })
    }

    /// Verify this authorisation against the resource the caller expects it
    /// to cover. Fails if the resource disagrees or the signature does not
    /// verify.
    pub fn verify(&self, resource: &str) -> Result<()> {
        if self.resource != resource {
            return Err(FedsvcError::Permission(format!(
                "the authorisation covers '{}', not '{}'",
                self.resource, resource
            )));
        }

        let message = signed_message(&self.user_guid, &self.resource, self.signed_at);
        self.public_key
            .verify(message.as_bytes(), &self.signature)
            .map_err(|_| {
                FedsvcError::Permission(format!(
                    "the authorisation for '{}' by user {} does not verify",
                    self.resource, self.user_guid
                ))
            })
    }

    pub fn user_guid(&self) -> &str {
        &self.user_guid
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}
