//! Service Lifecycle Integration Tests
//!
//! Tests the full service-account lifecycle against a live store:
//! bootstrap, idempotent re-setup, forced key rotation with the oldkeys
//! archive, and admin-roster delegation.
//!
//! Runs against MemoryStore - the same trait the cloud drivers implement.

use fedsvc_core::{
    Authorisation, FedsvcError, ObjectStore, ServiceConfig, ServiceContext, ServiceType,
    SigningPair, MemoryStore, SERVICE_KEY,
};
use std::sync::Arc;

const PASSWORD: &str = "integration-test-password";

/// Helper to create a context over a fresh in-memory store
fn create_test_context() -> ServiceContext {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let bucket = store.get_bucket("svc-storage", None, true).unwrap();
    ServiceContext::new(store, bucket, ServiceConfig::with_password(PASSWORD))
}

/// Backdate the persisted last_key_update so the next private access
/// rotates.
fn force_rotation_due(ctx: &ServiceContext) {
    let mut data = ctx
        .store()
        .get_object_from_json(ctx.bucket(), SERVICE_KEY)
        .unwrap();
    data["last_key_update"] = serde_json::json!("2000-01-01T00:00:00.000000");
    ctx.store()
        .set_object_from_json(ctx.bucket(), SERVICE_KEY, &data)
        .unwrap();
    ctx.clear_serviceinfo_cache();
}

#[test]
fn test_bootstrap_then_rotate() {
    let ctx = create_test_context();

    // bootstrap
    let service = ctx
        .setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();
    let uid = service.uid().to_string();

    // idempotent: same identity, same uid, still exactly one record
    let again = ctx
        .setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();
    assert_eq!(again.uid(), uid);

    let records = ctx
        .store()
        .get_all_object_names(ctx.bucket(), None)
        .unwrap();
    assert_eq!(records, vec![SERVICE_KEY.to_string()]);

    let pre_rotation_fp = ctx.get_service_private_key(None).unwrap().fingerprint();

    // force rotation and request a private key
    force_rotation_due(&ctx);
    let rotated = ctx.get_service_private_key(None).unwrap();

    assert_ne!(rotated.fingerprint(), pre_rotation_fp);

    // uid is unchanged by rotation
    assert_eq!(ctx.get_service_info(false).unwrap().uid(), uid);

    // the pre-rotation bundle was archived
    let archived = ctx
        .store()
        .get_all_object_names(ctx.bucket(), Some("_service_key/oldkeys"))
        .unwrap();
    assert_eq!(archived.len(), 1);

    // peers holding the rotated-away identity still resolve it
    let old_public = ctx.get_service_public_key(Some(&pre_rotation_fp)).unwrap();
    assert_eq!(old_public.fingerprint(), pre_rotation_fp);
}

#[test]
fn test_setup_conflicting_identity_fails() {
    let ctx = create_test_context();
    ctx.setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();

    assert!(ctx
        .setup_service_info("https://svc.example", ServiceType::Access)
        .is_err());
    assert!(ctx
        .setup_service_info("https://elsewhere.example", ServiceType::Storage)
        .is_err());

    // the failed setups changed nothing
    let service = ctx.get_service_info(false).unwrap();
    assert_eq!(service.canonical_url(), "https://svc.example");
    assert_eq!(service.service_type(), ServiceType::Storage);
}

#[test]
fn test_private_access_requires_password() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let bucket = store.get_bucket("svc-storage", None, true).unwrap();

    // bootstrap with a password, then reopen the context without one
    let ctx = ServiceContext::new(
        Arc::clone(&store),
        bucket.clone(),
        ServiceConfig::with_password(PASSWORD),
    );
    ctx.setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();

    let bare = ServiceContext::new(store, bucket, ServiceConfig::default());

    // public reads still work
    assert!(bare.get_service_info(false).is_ok());
    assert!(bare.get_service_public_key(None).is_ok());

    // anything needing private material fails immediately
    match bare.get_service_private_key(None) {
        Err(FedsvcError::ServiceAccount(_)) => {}
        other => panic!("expected ServiceAccount error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_admin_delegation_chain() {
    let ctx = create_test_context();

    // scenario: empty roster accepts the first admin without authorisation
    ctx.add_admin_user("user-A", None).unwrap();
    let roster = ctx.get_admin_users().unwrap();
    assert_eq!(roster["user-A"].authorised_by, "first admin");

    // a second admin without authorisation is rejected
    assert!(ctx.add_admin_user("user-B", None).is_err());

    // an authorisation signed by user-A over "user-B" is accepted
    let key_a = SigningPair::generate().unwrap();
    let auth = Authorisation::sign("user-A", "user-B", &key_a).unwrap();
    ctx.add_admin_user("user-B", Some(&auth)).unwrap();

    let roster = ctx.get_admin_users().unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster["user-B"].authorised_by, "user-A");

    // user-B can now delegate in turn
    let key_b = SigningPair::generate().unwrap();
    let auth = Authorisation::sign("user-B", "user-C", &key_b).unwrap();
    ctx.add_admin_user("user-C", Some(&auth)).unwrap();
    assert_eq!(ctx.get_admin_users().unwrap().len(), 3);
}

#[test]
fn test_roster_survives_cache_invalidation() {
    let ctx = create_test_context();
    ctx.add_admin_user("user-A", None).unwrap();

    let before = ctx.get_admin_users().unwrap();
    ctx.clear_serviceinfo_cache();
    let after = ctx.get_admin_users().unwrap();

    assert_eq!(before, after);
}

#[test]
fn test_payout_account_registration() {
    let ctx = create_test_context();
    ctx.setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();

    // no account registered yet
    assert!(ctx.get_service_account_uid("accounting-1").is_err());

    // registration is first-writer-wins and readable afterwards
    ctx.register_service_account_uid("accounting-1", "payout-account-9")
        .unwrap();
    assert_eq!(
        ctx.get_service_account_uid("accounting-1").unwrap(),
        "payout-account-9"
    );

    // the ref lives at the documented key
    let raw = ctx
        .store()
        .get_string_object(ctx.bucket(), "_service_key/account/accounting-1")
        .unwrap();
    assert_eq!(raw, "payout-account-9");
}

#[test]
fn test_two_contexts_share_one_identity() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let bucket = store.get_bucket("svc-storage", None, true).unwrap();

    let ctx1 = ServiceContext::new(
        Arc::clone(&store),
        bucket.clone(),
        ServiceConfig::with_password(PASSWORD),
    );
    let ctx2 = ServiceContext::new(store, bucket, ServiceConfig::with_password(PASSWORD));

    let first = ctx1
        .setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();
    let second = ctx2
        .setup_service_info("https://svc.example", ServiceType::Storage)
        .unwrap();

    assert_eq!(first.uid(), second.uid());
    assert_eq!(
        first.public_key().fingerprint(),
        second.public_key().fingerprint()
    );
}
