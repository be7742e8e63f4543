//! Drive Resolution Integration Tests
//!
//! Tests the user-drive namespace end to end: nested autocreate, the exact
//! binding key layout, unauthorised access, and concurrent name collisions
//! converging on a single UID.

use fedsvc_core::{
    encoding, Authorisation, FedsvcError, MemoryStore, ObjectStore, ServiceConfig, ServiceContext,
    SigningPair, UserDrives, DRIVES_RESOURCE, DRIVES_ROOT, SUBDRIVES_ROOT,
};
use std::sync::Arc;

fn create_test_context() -> Arc<ServiceContext> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let bucket = store.get_bucket("svc-storage", None, true).unwrap();
    Arc::new(ServiceContext::new(
        store,
        bucket,
        ServiceConfig::with_password("pw"),
    ))
}

fn authorised<'a>(ctx: &'a ServiceContext, user: &str) -> UserDrives<'a> {
    let pair = SigningPair::generate().unwrap();
    let auth = Authorisation::sign(user, DRIVES_RESOURCE, &pair).unwrap();
    UserDrives::from_authorisation(ctx, &auth, None).unwrap()
}

#[test]
fn test_nested_path_creates_three_bindings() {
    let ctx = create_test_context();
    let drives = authorised(&ctx, "U");

    let gamma = drives.get_drive("alpha/beta/gamma", true).unwrap();
    let alpha = drives.get_drive("alpha", false).unwrap();
    let beta = drives.get_drive("alpha/beta", false).unwrap();

    let store = ctx.store();

    // root binding: storage/drives/U/<enc alpha>
    let alpha_key = format!(
        "{}/U/{}",
        DRIVES_ROOT,
        encoding::string_to_encoded("alpha")
    );
    assert_eq!(
        store.get_string_object(ctx.bucket(), &alpha_key).unwrap(),
        alpha.uid()
    );

    // nested bindings: storage/subdrives/U/<parent uid>/<enc name>
    let beta_key = format!(
        "{}/U/{}/{}",
        SUBDRIVES_ROOT,
        alpha.uid(),
        encoding::string_to_encoded("beta")
    );
    assert_eq!(
        store.get_string_object(ctx.bucket(), &beta_key).unwrap(),
        beta.uid()
    );

    let gamma_key = format!(
        "{}/U/{}/{}",
        SUBDRIVES_ROOT,
        beta.uid(),
        encoding::string_to_encoded("gamma")
    );
    assert_eq!(
        store.get_string_object(ctx.bucket(), &gamma_key).unwrap(),
        gamma.uid()
    );

    // a later resolution without autocreate returns the same three uids
    let drives2 = authorised(&ctx, "U");
    assert_eq!(drives2.get_drive("alpha", false).unwrap().uid(), alpha.uid());
    assert_eq!(
        drives2.get_drive("alpha/beta", false).unwrap().uid(),
        beta.uid()
    );
    assert_eq!(
        drives2.get_drive("alpha/beta/gamma", false).unwrap().uid(),
        gamma.uid()
    );
}

#[test]
fn test_unauthorised_autocreate_writes_nothing() {
    let ctx = create_test_context();

    let readonly = UserDrives::for_user(&ctx, "U");
    match readonly.get_drive("new", true) {
        Err(FedsvcError::MissingDrive(_)) => {}
        other => panic!("expected MissingDrive error, got {:?}", other.map(|_| ())),
    }

    let names = ctx
        .store()
        .get_all_object_names(ctx.bucket(), Some(DRIVES_ROOT))
        .unwrap();
    assert!(names.is_empty(), "no binding may be written: {:?}", names);
}

#[test]
fn test_concurrent_name_collision_converges() {
    use std::thread;

    let ctx = create_test_context();

    // two (and more) authorised views of the same user race to create the
    // same name; set_ins_string_object makes the first writer win
    let mut handles = vec![];
    for _ in 0..12 {
        let ctx = Arc::clone(&ctx);
        handles.push(thread::spawn(move || {
            let drives = authorised(&ctx, "U");
            drives.get_drive("shared", true).unwrap().uid().to_string()
        }));
    }

    let uids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winner = &uids[0];
    assert!(uids.iter().all(|uid| uid == winner));

    // exactly one binding exists in the store
    let names = ctx
        .store()
        .get_all_object_names(ctx.bucket(), Some(&format!("{}/U", DRIVES_ROOT)))
        .unwrap();
    assert_eq!(names.len(), 1);
}

#[test]
fn test_namespaces_are_per_user() {
    let ctx = create_test_context();

    let alice = authorised(&ctx, "alice").get_drive("work", true).unwrap();
    let bob = authorised(&ctx, "bob").get_drive("work", true).unwrap();

    // same name, different user, different drive
    assert_ne!(alice.uid(), bob.uid());

    let alice_view = authorised(&ctx, "alice");
    assert_eq!(alice_view.list_drives().unwrap(), vec!["work"]);
    assert_eq!(
        alice_view.get_drive("work", false).unwrap().uid(),
        alice.uid()
    );
}

#[test]
fn test_subdrives_hidden_from_top_level_listing() {
    let ctx = create_test_context();
    let drives = authorised(&ctx, "U");

    drives.get_drive("projects/fedsvc/core", true).unwrap();
    drives.get_drive("archive", true).unwrap();

    let mut names = drives.list_drives().unwrap();
    names.sort();
    assert_eq!(names, vec!["archive", "projects"]);
}

#[test]
fn test_drive_names_round_trip_through_encoding() {
    let ctx = create_test_context();
    let drives = authorised(&ctx, "U");

    // names that would be unusable as raw store keys
    for name in ["reports 2026", "süß", "a+b=c"] {
        drives.get_drive(name, true).unwrap();
    }

    let mut names = drives.list_drives().unwrap();
    names.sort();
    assert_eq!(names, vec!["a+b=c", "reports 2026", "süß"]);
}
