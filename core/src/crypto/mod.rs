//! Cryptographic primitives for service identity
//!
//! Provides the key material the service layer persists and rotates:
//! - Ed25519 signing pairs with SHA-256 fingerprints (SigningPair, PublicKey)
//! - password sealing of private material (seal/open, SealedBlob)
//! - signed per-resource authorisations (Authorisation)

mod authorisation;
mod keys;
mod seal;

pub use authorisation::Authorisation;
pub use keys::{PublicKey, SigningPair};
pub use seal::{open, seal, SealedBlob};
