// Object Store Contracts - Driver Semantics Invariants
//
// Every driver (in-repo or cloud) must satisfy these semantics. The suite
// runs each contract against both in-repo drivers through the trait
// object, exactly the way the service layer consumes them:
// - atomic insert-if-absent (first writer wins, losers learn the value)
// - chunked-read fallback until the first gap
// - prefix-stripped listings
// - JSON reads coercing absence and corruption to None

use fedsvc_core::{Bucket, FilesystemStore, MemoryStore, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

/// Every in-repo driver, freshly rooted. The TempDir rides along to keep
/// the filesystem root alive for the test's duration.
fn drivers() -> Vec<(Arc<dyn ObjectStore>, Option<TempDir>)> {
    let temp = TempDir::new().unwrap();
    vec![
        (Arc::new(MemoryStore::new()) as Arc<dyn ObjectStore>, None),
        (
            Arc::new(FilesystemStore::new(temp.path().to_path_buf())) as Arc<dyn ObjectStore>,
            Some(temp),
        ),
    ]
}

fn bucket_for(store: &Arc<dyn ObjectStore>) -> Bucket {
    store.get_bucket("contract", None, true).unwrap()
}

/// CONTRACT: set_ins_string_object returns the stored value, for winner
/// and losers alike.
#[test]
fn contract_insert_if_absent_sequential() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        assert_eq!(
            store.set_ins_string_object(&bucket, "b", "first").unwrap(),
            "first",
            "{}: the first writer stores its value",
            store.driver_name()
        );
        assert_eq!(
            store.set_ins_string_object(&bucket, "b", "second").unwrap(),
            "first",
            "{}: later writers learn the winning value",
            store.driver_name()
        );
        assert_eq!(store.get_string_object(&bucket, "b").unwrap(), "first");
    }
}

/// CONTRACT: concurrent first writers converge on exactly one value.
#[test]
fn contract_insert_if_absent_concurrent() {
    use std::thread;

    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        let mut handles = vec![];
        for i in 0..8 {
            let store = Arc::clone(&store);
            let bucket = bucket.clone();
            handles.push(thread::spawn(move || {
                store
                    .set_ins_string_object(&bucket, "race", &format!("value-{}", i))
                    .unwrap()
            }));
        }

        let outcomes: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = &outcomes[0];
        assert!(
            outcomes.iter().all(|o| o == winner),
            "{}: all writers must converge, got {:?}",
            store.driver_name(),
            outcomes
        );
        assert_eq!(&store.get_string_object(&bucket, "race").unwrap(), winner);
    }
}

/// CONTRACT: a missing primary key falls back to the chunk sequence
/// `<key>/1`, `<key>/2`, ... concatenated until the first gap.
#[test]
fn contract_chunked_read_fallback() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        store.set_object(&bucket, "chunked/1", b"part-one;").unwrap();
        store.set_object(&bucket, "chunked/2", b"part-two;").unwrap();
        store.set_object(&bucket, "chunked/4", b"unreachable").unwrap();

        assert_eq!(
            store.get_object(&bucket, "chunked").unwrap(),
            b"part-one;part-two;",
            "{}: chunks concatenate until the first gap",
            store.driver_name()
        );
    }
}

/// CONTRACT: a key with neither a primary object nor chunks is an error.
#[test]
fn contract_missing_key_is_error() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);
        assert!(
            store.get_object(&bucket, "absent").is_err(),
            "{}: absent keys must error",
            store.driver_name()
        );
    }
}

/// CONTRACT: listings strip the prefix and its separator.
#[test]
fn contract_prefix_stripped_listing() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        store.set_string_object(&bucket, "tree/a", "1").unwrap();
        store.set_string_object(&bucket, "tree/sub/b", "2").unwrap();
        store.set_string_object(&bucket, "treeish", "3").unwrap();

        let mut names = store.get_all_object_names(&bucket, Some("tree")).unwrap();
        names.sort();
        assert_eq!(
            names,
            vec!["a", "sub/b"],
            "{}: prefix and separator are stripped, non-children excluded",
            store.driver_name()
        );
    }
}

/// CONTRACT: get_object_from_json returns None for absence AND corruption.
#[test]
fn contract_json_read_coerces_failures() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        assert!(store.get_object_from_json(&bucket, "absent").is_none());

        store.set_string_object(&bucket, "corrupt", "{oops").unwrap();
        assert!(
            store.get_object_from_json(&bucket, "corrupt").is_none(),
            "{}: corruption coerces to None",
            store.driver_name()
        );

        store
            .set_object_from_json(&bucket, "ok", &serde_json::json!({"n": 1}))
            .unwrap();
        assert_eq!(store.get_object_from_json(&bucket, "ok").unwrap()["n"], 1);
    }
}

/// CONTRACT: clear_all_except preserves exactly the named prefixes.
#[test]
fn contract_clear_all_except() {
    for (store, _guard) in drivers() {
        let bucket = bucket_for(&store);

        store.set_string_object(&bucket, "_service_key", "a").unwrap();
        store
            .set_string_object(&bucket, "_service_key/admin_users", "b")
            .unwrap();
        store.set_string_object(&bucket, "storage/drives/u/x", "c").unwrap();
        store.set_string_object(&bucket, "scratch", "d").unwrap();

        store
            .clear_all_except(&bucket, &["_service_key", "storage/"])
            .unwrap();

        let mut names = store.get_all_object_names(&bucket, None).unwrap();
        names.sort();
        assert_eq!(
            names,
            vec!["_service_key", "_service_key/admin_users", "storage/drives/u/x"],
            "{}",
            store.driver_name()
        );
    }
}

/// CONTRACT: bucket creation fails on an existing bucket; get_bucket only
/// creates when asked to.
#[test]
fn contract_bucket_lifecycle() {
    for (store, _guard) in drivers() {
        assert!(store.get_bucket("fresh", None, false).is_err());
        store.create_bucket("fresh", None).unwrap();
        assert!(store.create_bucket("fresh", None).is_err());
        assert!(store.get_bucket("fresh", None, false).is_ok());
    }
}
