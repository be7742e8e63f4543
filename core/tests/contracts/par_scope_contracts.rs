// PAR Scope Contracts - Capability Issuance Invariants
//
// The scope matrix is a platform contract shared with every driver:
// - object PARs map (r,w) onto ObjectRead/ObjectWrite/ObjectReadWrite
// - bucket PARs are write-only (AnyObjectWrite); readable bucket PARs are
//   rejected BEFORE any driver call
// - the 5-second duration floor holds
// - expires_at > created_at on every minted PAR

use fedsvc_core::{AccessType, FedsvcError, MemoryStore, ObjectStore};

/// CONTRACT: the object-scope permission matrix.
#[test]
fn contract_object_scope_matrix() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    for (readable, writeable, expected) in [
        (true, true, "ObjectReadWrite"),
        (true, false, "ObjectRead"),
        (false, true, "ObjectWrite"),
    ] {
        let par = store
            .create_par(&bucket, Some("k"), readable, writeable, 3600)
            .unwrap();
        assert_eq!(par.is_readable(), readable);
        assert_eq!(par.is_writeable(), writeable);
        assert_eq!(
            AccessType::select(false, readable, writeable).unwrap().as_str(),
            expected
        );
    }
}

/// CONTRACT: an object PAR granting nothing is rejected.
#[test]
fn contract_object_scope_needs_permission() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    match store.create_par(&bucket, Some("k"), false, false, 3600) {
        Err(FedsvcError::Par(_)) => {}
        other => panic!("expected Par error, got {:?}", other.map(|_| ())),
    }
}

/// CONTRACT: a readable bucket PAR fails before the driver is consulted.
#[test]
fn contract_bucket_scope_rejects_read() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    for writeable in [true, false] {
        match store.create_par(&bucket, None, true, writeable, 3600) {
            Err(FedsvcError::Par(_)) => {}
            other => panic!(
                "expected Par error for readable bucket PAR, got {:?}",
                other.map(|_| ())
            ),
        }
    }

    // AccessType::select alone enforces it, driver never involved
    assert!(AccessType::select(true, true, false).is_err());
}

/// CONTRACT: a write-only bucket PAR maps to AnyObjectWrite.
#[test]
fn contract_bucket_scope_write_only() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    let par = store.create_par(&bucket, None, false, true, 3600).unwrap();
    assert!(par.is_bucket_scope());
    assert!(!par.is_readable());
    assert!(par.is_writeable());
    assert_eq!(
        AccessType::select(true, false, true).unwrap().as_str(),
        "AnyObjectWrite"
    );
}

/// CONTRACT: the 5-second duration floor.
#[test]
fn contract_duration_floor() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    match store.create_par(&bucket, Some("k"), true, false, 2) {
        Err(FedsvcError::Par(_)) => {}
        other => panic!("expected Par error, got {:?}", other.map(|_| ())),
    }

    assert!(store.create_par(&bucket, Some("k"), true, false, 5).is_ok());
}

/// CONTRACT: every minted PAR expires after it was created, and the URL is
/// fully qualified.
#[test]
fn contract_minted_par_shape() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    let par = store
        .create_par(&bucket, Some("objects/data.bin"), true, true, 1800)
        .unwrap();

    assert!(par.expires_at() > par.created_at());
    assert!(!par.is_expired());
    assert!(par.seconds_remaining() > 1790);
    assert!(par.url().starts_with("https://"));
    assert!(!par.par_id().is_empty());
    assert!(!par.par_name().is_empty());
    assert_eq!(par.key(), Some("objects/data.bin"));
}

/// CONTRACT: scope misuse surfaces as a PAR permissions error, distinct
/// from issuance failures.
#[test]
fn contract_scope_misuse_is_permissions_error() {
    let store = MemoryStore::new();
    let bucket = store.get_bucket("pars", None, true).unwrap();

    let read_only = store
        .create_par(&bucket, Some("k"), true, false, 3600)
        .unwrap();

    match read_only.require_writeable() {
        Err(FedsvcError::ParPermissions(_)) => {}
        other => panic!("expected ParPermissions error, got {:?}", other),
    }
    read_only.require_readable().unwrap();
}
