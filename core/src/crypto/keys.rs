//! Ed25519 signing pairs and fingerprints.

use crate::encoding::{bytes_to_string, string_to_bytes};
use crate::errors::{FedsvcError, Result};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair as _, UnparsedPublicKey, ED25519};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An Ed25519 public key. Serialises as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PublicKey { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 digest of the raw public key bytes. This is the stable
    /// identifier peers use to pick the right key after a rotation.
    pub fn fingerprint(&self) -> String {
        let digest = ring::digest::digest(&ring::digest::SHA256, &self.bytes);
        hex::encode(digest.as_ref())
    }

    /// Verify `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        UnparsedPublicKey::new(&ED25519, &self.bytes)
            .verify(message, signature)
            .map_err(|_| {
                FedsvcError::Crypto(format!(
                    "signature does not verify against the key {}",
                    self.fingerprint()
                ))
            })
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&bytes_to_string(&self.bytes))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = string_to_bytes(&encoded).map_err(D::Error::custom)?;
        Ok(PublicKey { bytes })
    }
}

/// An Ed25519 signing pair.
///
/// The secret half (a PKCS#8 document) is optional: a pair loaded from the
/// public portion of a persisted service record can verify but not sign.
#[derive(Debug, Clone)]
pub struct SigningPair {
    public: PublicKey,
    pkcs8: Option<Vec<u8>>,
}

impl SigningPair {
    /// Generate a fresh signing pair.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| FedsvcError::Crypto("failed to generate an Ed25519 pair".to_string()))?;
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| FedsvcError::Crypto("generated pkcs8 did not parse".to_string()))?;

        Ok(SigningPair {
            public: PublicKey::from_bytes(pair.public_key().as_ref().to_vec()),
            pkcs8: Some(pkcs8.as_ref().to_vec()),
        })
    }

    /// Rebuild a full pair from an archived PKCS#8 document.
    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Self> {
        let pair = Ed25519KeyPair::from_pkcs8(&pkcs8)
            .map_err(|_| FedsvcError::Crypto("invalid pkcs8 document".to_string()))?;

        Ok(SigningPair {
            public: PublicKey::from_bytes(pair.public_key().as_ref().to_vec()),
            pkcs8: Some(pkcs8),
        })
    }

    /// A verify-only pair built from public material.
    pub fn from_public(public: PublicKey) -> Self {
        SigningPair {
            public,
            pkcs8: None,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn fingerprint(&self) -> String {
        self.public.fingerprint()
    }

    /// Whether the secret half is present.
    pub fn has_secret(&self) -> bool {
        self.pkcs8.is_some()
    }

    /// The PKCS#8 secret document, if held.
    pub fn secret_pkcs8(&self) -> Option<&[u8]> {
        self.pkcs8.as_deref()
    }

    /// Sign `message`. Fails on a verify-only pair.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let pkcs8 = self.pkcs8.as_ref().ok_or_else(|| {
            FedsvcError::Crypto(format!(
                "the pair {} holds no private material",
                self.fingerprint()
            ))
        })?;

        let pair = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|_| FedsvcError::Crypto("invalid pkcs8 document".to_string()))?;

        Ok(pair.sign(message).as_ref().to_vec())
    }
}
