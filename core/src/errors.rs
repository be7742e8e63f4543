//! Error types for the FedSvc core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FedsvcError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("PAR error: {0}")]
    Par(String),

    #[error("PAR permissions error: {0}")]
    ParPermissions(String),

    #[error("mutex timeout: {0}")]
    MutexTimeout(String),

    #[error("service account error: {0}")]
    ServiceAccount(String),

    #[error("missing service account: {0}")]
    MissingServiceAccount(String),

    #[error("missing drive: {0}")]
    MissingDrive(String),

    #[error("permission error: {0}")]
    Permission(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FedsvcError>;
