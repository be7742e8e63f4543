//! Password sealing of private service material.
//!
//! The persisted service record keeps its private keys sealed under the
//! process-wide service password: PBKDF2-HMAC-SHA256 derives an AES-256-GCM
//! key from the password and a per-blob salt.

use crate::encoding::{bytes_to_string, string_to_bytes};
use crate::errors::{FedsvcError, Result};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

const KDF_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;

/// Ciphertext plus the parameters needed to open it again. All fields are
/// base64 strings so the blob embeds directly in a JSON record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBlob {
    pub kdf_salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

fn derive_key(password: &str, salt: &[u8]) -> Result<LessSafeKey> {
    let iterations = NonZeroU32::new(KDF_ITERATIONS)
        .ok_or_else(|| FedsvcError::Crypto("zero KDF iteration count".to_string()))?;

    let mut key_bytes = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key_bytes,
    );

    let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes)
        .map_err(|_| FedsvcError::Crypto("failed to build the sealing key".to_string()))?;

    Ok(LessSafeKey::new(unbound))
}

/// Seal `plaintext` under `password`.
pub fn seal(password: &str, plaintext: &[u8]) -> Result<SealedBlob> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| FedsvcError::Crypto("failed to draw a KDF salt".to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| FedsvcError::Crypto("failed to draw a nonce".to_string()))?;

    let key = derive_key(password, &salt)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| FedsvcError::Crypto("sealing failed".to_string()))?;

    Ok(SealedBlob {
        kdf_salt: bytes_to_string(&salt),
        nonce: bytes_to_string(&nonce_bytes),
        ciphertext: bytes_to_string(&in_out),
    })
}

/// Open a blob sealed with [`seal`]. A wrong password or a tampered blob
/// fails with a `Crypto` error.
pub fn open(password: &str, blob: &SealedBlob) -> Result<Vec<u8>> {
    let salt = string_to_bytes(&blob.kdf_salt)?;
    let nonce_bytes = string_to_bytes(&blob.nonce)?;
    let mut ciphertext = string_to_bytes(&blob.ciphertext)?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(FedsvcError::Crypto(format!(
            "sealed blob carries a nonce of {} bytes, expected {}",
            nonce_bytes.len(),
            NONCE_LEN
        )));
    }

    let mut nonce_array = [0u8; NONCE_LEN];
    nonce_array.copy_from_slice(&nonce_bytes);

    let key = derive_key(password, &salt)?;
    let nonce = Nonce::assume_unique_for_key(nonce_array);

    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut ciphertext)
        .map_err(|_| {
            FedsvcError::Crypto("unable to open the sealed blob; wrong password?".to_string())
        })?;

    Ok(plaintext.to_vec())
}
