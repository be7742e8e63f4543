//! Service identity and trust
//!
//! Everything a service persists about itself:
//! - the Service record (URL, type, UID, rotating key/cert pairs)
//! - idempotent bootstrap and the key-rotation protocol
//! - the admin roster with delegated enrolment
//! all coordinated through a ServiceContext carrying the store handle, the
//! service password and the read caches.

mod account;
mod admin;
mod context;
mod service;

pub use admin::{AdminEntry, AdminRoster, ADMIN_USERS_KEY, FIRST_ADMIN};
pub use context::{ServiceConfig, ServiceContext};
pub use service::{OldKeys, Service, ServiceType};

/// The distinguished key of the encrypted service record in the service's
/// own bucket.
pub const SERVICE_KEY: &str = "_service_key";
