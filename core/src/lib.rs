//! # FedSvc Core - Service Trust and Object-Addressed State
//!
//! FedSvc runs multiple cooperating microservices (identity, accounting,
//! storage, compute, access) where each service is a self-describing
//! principal with cryptographic identity. This crate is the core every
//! service builds on: its own authoritative state in an opaque object
//! store, rotating key material behind a store mutex, scoped time-limited
//! access grants, and the user-drive namespace.
//!
//! ## Core Principle
//!
//! **The Object Store IS the Source of Truth**: services on distinct hosts
//! share nothing but the store. Cross-key writes coordinate through
//! lease-based mutexes; single-key first-writes converge through the
//! store's atomic insert-if-absent.
//!
//! ## Key Features
//!
//! - Canonical encoding layer: identity of persisted state is bit-for-bit
//! - Abstract ObjectStore trait with memory and filesystem drivers in-repo
//! - Idempotent service bootstrap and race-safe key/cert rotation
//! - Append-only admin roster with delegated enrolment
//! - Pre-Authenticated Request issuance with the platform scope matrix
//! - Hierarchical user-drive resolver with authorised auto-creation
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │      object store (single source)     │
//! │  _service_key…   storage/drives…      │
//! └───────────────────────────────────────┘
//!        ▲                ▲
//!        │                │
//!  ┌─────┴──────┐   ┌─────┴──────┐
//!  │ service A  │   │ service B  │
//!  │ (storage)  │   │ (compute)  │
//!  └────────────┘   └────────────┘
//! ```

pub mod acl;
pub mod crypto;
pub mod drives;
pub mod encoding;
pub mod errors;
pub mod service;
pub mod store;

pub use acl::AclRule;
pub use crypto::{Authorisation, PublicKey, SealedBlob, SigningPair};
pub use drives::{DriveInfo, UserDrives, DRIVES_RESOURCE, DRIVES_ROOT, SUBDRIVES_ROOT};
pub use errors::{FedsvcError, Result};
pub use service::{
    AdminEntry, AdminRoster, OldKeys, Service, ServiceConfig, ServiceContext, ServiceType,
    ADMIN_USERS_KEY, FIRST_ADMIN, SERVICE_KEY,
};
pub use store::{
    AccessType, Bucket, FilesystemStore, MemoryStore, ObjectStore, Par, StoreMutex,
    DEFAULT_PAR_DURATION,
};

/// Version of the FedSvc core protocol.
pub const VERSION: &str = "0.9.3";
