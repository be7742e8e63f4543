//! Object-addressed state substrate
//!
//! Provides the abstract ObjectStore interface and its in-repo drivers:
//! - MemoryStore: in-process reference driver
//! - FilesystemStore: one directory per bucket
//! plus the primitives built directly on the store:
//! - StoreMutex: lease-based advisory locking
//! - Par / AccessType: pre-authenticated request issuance

mod filesystem;
mod memory;
mod mutex;
mod par;
mod traits;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use mutex::{StoreMutex, DEFAULT_TIMEOUT};
pub use par::{object_url_for_region, AccessType, Par};
pub use traits::{sanitise_bucket_name, Bucket, ObjectStore, DEFAULT_PAR_DURATION};
