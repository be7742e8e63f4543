//! The persisted service principal.
//!
//! A `Service` is what one microservice knows about itself: canonical URL,
//! type, UID, and the rotating signing key / certificate pairs peers use to
//! verify it. The record persists at the distinguished `_service_key` with
//! its private halves sealed under the service password.

use crate::crypto::{open, seal, PublicKey, SealedBlob, SigningPair};
use crate::encoding::{
    bytes_to_string, datetime_to_string, get_datetime_now, string_to_bytes, string_to_datetime,
};
use crate::errors::{FedsvcError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default key rotation period: one week.
const DEFAULT_ROTATION_SECONDS: i64 = 7 * 24 * 3600;

/// The role a service plays in the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Identity,
    Accounting,
    Storage,
    Compute,
    Access,
    Registry,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Identity => "identity",
            ServiceType::Accounting => "accounting",
            ServiceType::Storage => "storage",
            ServiceType::Compute => "compute",
            ServiceType::Access => "access",
            ServiceType::Registry => "registry",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = FedsvcError;

    fn from_str(s: &str) -> Result<ServiceType> {
        match s {
            "identity" => Ok(ServiceType::Identity),
            "accounting" => Ok(ServiceType::Accounting),
            "storage" => Ok(ServiceType::Storage),
            "compute" => Ok(ServiceType::Compute),
            "access" => Ok(ServiceType::Access),
            "registry" => Ok(ServiceType::Registry),
            other => Err(FedsvcError::ServiceAccount(format!(
                "'{}' is not a recognised service type",
                other
            ))),
        }
    }
}

/// Persisted wire form of a service record. The public half is plaintext;
/// the private half is sealed under the service password.
#[derive(Debug, Serialize, Deserialize)]
struct ServiceData {
    uid: String,
    service_url: String,
    service_type: ServiceType,
    last_key_update: String,
    #[serde(default = "default_rotation_seconds")]
    key_rotation_period: i64,
    public_key: PublicKey,
    public_certificate: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_public_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_public_certificate: Option<PublicKey>,
    sealed_keys: SealedBlob,
}

fn default_rotation_seconds() -> i64 {
    DEFAULT_ROTATION_SECONDS
}

/// The private halves of a record, as sealed into `sealed_keys`.
#[derive(Debug, Serialize, Deserialize)]
struct PrivateKeyBundle {
    key_pkcs8: String,
    cert_pkcs8: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_key_pkcs8: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_cert_pkcs8: Option<String>,
}

/// The pre-rotation key material archived at
/// `_service_key/oldkeys/<datetime>` after a successful rotation. The
/// archive is advisory: peers resolve recent fingerprints through the
/// `previous_*` fields of the live record, not through here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OldKeys {
    pub datetime: String,
    pub public_key: PublicKey,
    pub public_certificate: PublicKey,
    pub sealed_keys: SealedBlob,
}

/// A service principal with its rotating key material.
#[derive(Debug, Clone)]
pub struct Service {
    uid: String,
    service_url: String,
    service_type: ServiceType,
    key_pair: SigningPair,
    cert_pair: SigningPair,
    previous_key_pair: Option<SigningPair>,
    previous_cert_pair: Option<SigningPair>,
    last_key_update: DateTime<Utc>,
    key_rotation_period: Duration,
}

impl Service {
    /// Construct a fresh service with a new UID and new key material.
    pub fn new(service_url: &str, service_type: ServiceType) -> Result<Service> {
        Ok(Service {
            uid: crate::encoding::create_uuid(),
            service_url: service_url.to_string(),
            service_type,
            key_pair: SigningPair::generate()?,
            cert_pair: SigningPair::generate()?,
            previous_key_pair: None,
            previous_cert_pair: None,
            last_key_update: get_datetime_now(),
            key_rotation_period: Duration::seconds(DEFAULT_ROTATION_SECONDS),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn canonical_url(&self) -> &str {
        &self.service_url
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn last_key_update(&self) -> DateTime<Utc> {
        self.last_key_update
    }

    pub fn key_rotation_period(&self) -> Duration {
        self.key_rotation_period
    }

    /// Tune how often the key material rotates. Mostly useful for
    /// deployments with stricter compliance windows.
    pub fn set_key_rotation_period(&mut self, period: Duration) {
        self.key_rotation_period = period;
    }

    /// Whether the key material is due for rotation.
    pub fn should_refresh_keys(&self) -> bool {
        get_datetime_now() - self.last_key_update > self.key_rotation_period
    }

    /// The current signing key, private half included. Fails on a record
    /// loaded without the service password.
    pub fn private_key(&self) -> Result<&SigningPair> {
        if !self.key_pair.has_secret() {
            return Err(FedsvcError::ServiceAccount(format!(
                "the service record for '{}' was loaded without private access",
                self.service_url
            )));
        }
        Ok(&self.key_pair)
    }

    /// The current signing certificate, private half included.
    pub fn private_certificate(&self) -> Result<&SigningPair> {
        if !self.cert_pair.has_secret() {
            return Err(FedsvcError::ServiceAccount(format!(
                "the service record for '{}' was loaded without private access",
                self.service_url
            )));
        }
        Ok(&self.cert_pair)
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public()
    }

    pub fn public_certificate(&self) -> &PublicKey {
        self.cert_pair.public()
    }

    /// The pre-rotation key pair, kept so peers holding a recently rotated
    /// identity can still be answered.
    pub fn last_key(&self) -> Option<&SigningPair> {
        self.previous_key_pair.as_ref()
    }

    pub fn last_certificate(&self) -> Option<&SigningPair> {
        self.previous_cert_pair.as_ref()
    }

    /// Generate new key material in memory. The current pairs become the
    /// previous pairs; nothing is persisted here.
    pub fn refresh_keys(&mut self) -> Result<()> {
        self.previous_key_pair = Some(std::mem::replace(
            &mut self.key_pair,
            SigningPair::generate()?,
        ));
        self.previous_cert_pair = Some(std::mem::replace(
            &mut self.cert_pair,
            SigningPair::generate()?,
        ));
        self.last_key_update = get_datetime_now();
        Ok(())
    }

    /// Capture the current pairs for the oldkeys archive, sealed under the
    /// service password.
    pub fn dump_keys(&self, password: &str) -> Result<OldKeys> {
        let bundle = PrivateKeyBundle {
            key_pkcs8: encode_secret(&self.key_pair)?,
            cert_pkcs8: encode_secret(&self.cert_pair)?,
            previous_key_pkcs8: None,
            previous_cert_pkcs8: None,
        };

        Ok(OldKeys {
            datetime: datetime_to_string(get_datetime_now()),
            public_key: self.key_pair.public().clone(),
            public_certificate: self.cert_pair.public().clone(),
            sealed_keys: seal(password, serde_json::to_string(&bundle)?.as_bytes())?,
        })
    }

    /// Serialise to the persisted JSON form, sealing the private halves
    /// under `password`.
    pub fn to_data(&self, password: &str) -> Result<serde_json::Value> {
        let bundle = PrivateKeyBundle {
            key_pkcs8: encode_secret(&self.key_pair)?,
            cert_pkcs8: encode_secret(&self.cert_pair)?,
            previous_key_pkcs8: self
                .previous_key_pair
                .as_ref()
                .map(encode_secret)
                .transpose()?,
            previous_cert_pkcs8: self
                .previous_cert_pair
                .as_ref()
                .map(encode_secret)
                .transpose()?,
        };

        let data = ServiceData {
            uid: self.uid.clone(),
            service_url: self.service_url.clone(),
            service_type: self.service_type,
            last_key_update: datetime_to_string(self.last_key_update),
            key_rotation_period: self.key_rotation_period.num_seconds(),
            public_key: self.key_pair.public().clone(),
            public_certificate: self.cert_pair.public().clone(),
            previous_public_key: self.previous_key_pair.as_ref().map(|p| p.public().clone()),
            previous_public_certificate: self
                .previous_cert_pair
                .as_ref()
                .map(|p| p.public().clone()),
            sealed_keys: seal(password, serde_json::to_string(&bundle)?.as_bytes())?,
        };

        Ok(serde_json::to_value(&data)?)
    }

    /// Deserialise a persisted record. With a password the private halves
    /// are opened and verified against the published public material;
    /// without one the record is public-only.
    pub fn from_data(data: &serde_json::Value, password: Option<&str>) -> Result<Service> {
        let data: ServiceData = serde_json::from_value(data.clone())?;

        let (key_pair, cert_pair, previous_key_pair, previous_cert_pair) = match password {
            None => (
                SigningPair::from_public(data.public_key.clone()),
                SigningPair::from_public(data.public_certificate.clone()),
                data.previous_public_key.clone().map(SigningPair::from_public),
                data.previous_public_certificate
                    .clone()
                    .map(SigningPair::from_public),
            ),
            Some(password) => {
                let plaintext = open(password, &data.sealed_keys).map_err(|_| {
                    FedsvcError::ServiceAccount(format!(
                        "unable to unlock the service record for '{}'; wrong service password?",
                        data.service_url
                    ))
                })?;
                let bundle: PrivateKeyBundle = serde_json::from_slice(&plaintext)?;

                let key_pair = decode_secret(&bundle.key_pkcs8)?;
                let cert_pair = decode_secret(&bundle.cert_pkcs8)?;

                if key_pair.public() != &data.public_key
                    || cert_pair.public() != &data.public_certificate
                {
                    return Err(FedsvcError::ServiceAccount(format!(
                        "the sealed keys for '{}' do not match the published public material",
                        data.service_url
                    )));
                }

                (
                    key_pair,
                    cert_pair,
                    bundle
                        .previous_key_pkcs8
                        .as_deref()
                        .map(decode_secret)
                        .transpose()?,
                    bundle
                        .previous_cert_pkcs8
                        .as_deref()
                        .map(decode_secret)
                        .transpose()?,
                )
            }
        };

        Ok(Service {
            uid: data.uid,
            service_url: data.service_url,
            service_type: data.service_type,
            key_pair,
            cert_pair,
            previous_key_pair,
            previous_cert_pair,
            last_key_update: string_to_datetime(&data.last_key_update)?,
            key_rotation_period: Duration::seconds(data.key_rotation_period),
        })
    }
}

fn encode_secret(pair: &SigningPair) -> Result<String> {
    let pkcs8 = pair.secret_pkcs8().ok_or_else(|| {
        FedsvcError::ServiceAccount("cannot persist a pair with no private material".to_string())
    })?;
    Ok(bytes_to_string(pkcs8))
}

fn decode_secret(encoded: &str) -> Result<SigningPair> {
    SigningPair::from_pkcs8(string_to_bytes(encoded)?)
}
