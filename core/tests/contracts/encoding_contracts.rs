// Encoding Contracts - Canonical Form Invariants
//
// The identity of persisted state depends on the encoding layer
// bit-for-bit. These contracts MUST NEVER BREAK:
// - decode(encode(x)) == x for every conversion on valid input
// - datetimes always normalise to UTC, written without a zone suffix
// - the future-instant floor of 5 seconds holds

use chrono::Duration;
use fedsvc_core::encoding::{
    bytes_to_string, datetime_to_string, encoded_to_string, encoded_to_url, get_datetime_future,
    get_datetime_now, string_to_bytes, string_to_datetime, string_to_encoded, url_to_encoded,
};

/// CONTRACT: every byte sequence round-trips through base64 exactly.
#[test]
fn contract_bytes_round_trip() {
    let cases: Vec<Vec<u8>> = vec![
        vec![],
        vec![0],
        vec![0xff; 64],
        (0u8..=255).collect(),
        b"ordinary payload".to_vec(),
    ];

    for bytes in cases {
        let encoded = bytes_to_string(&bytes);
        assert_eq!(string_to_bytes(&encoded).unwrap(), bytes);
    }
}

/// CONTRACT: every unicode string round-trips through the key-safe
/// encoding, and the encoded form contains no whitespace.
#[test]
fn contract_string_round_trip() {
    for s in [
        "",
        "alpha",
        "with spaces and\ttabs",
        "slashes/and/more",
        "日本語テキスト",
        "emoji 🎉 works",
    ] {
        let encoded = string_to_encoded(s);
        assert!(!encoded.contains(char::is_whitespace));
        assert_eq!(encoded_to_string(&encoded).unwrap(), s);
    }

    let url = "https://svc.example:8443/path?query=1&other=2";
    assert_eq!(encoded_to_url(&url_to_encoded(url)).unwrap(), url);
}

/// CONTRACT: datetime strings carry no zone suffix and parse back to the
/// same UTC instant.
#[test]
fn contract_datetime_round_trip() {
    let now = get_datetime_now();
    let s = datetime_to_string(now);

    assert!(!s.ends_with('Z'), "zone suffix must be stripped: {}", s);
    assert!(!s.contains('+'), "zone suffix must be stripped: {}", s);
    assert_eq!(string_to_datetime(&s).unwrap(), now);
}

/// CONTRACT: zoned input normalises to UTC, unzoned input is already UTC.
#[test]
fn contract_datetime_utc_normalisation() {
    let zoned = string_to_datetime("2026-06-01T14:00:00+03:00").unwrap();
    let unzoned = string_to_datetime("2026-06-01T11:00:00").unwrap();
    assert_eq!(zoned, unzoned);
}

/// CONTRACT: get_datetime_future rejects every delta under 5 seconds and
/// accepts 5 seconds and above.
#[test]
fn contract_future_floor() {
    for seconds in [-3600, -1, 0, 1, 2, 3, 4] {
        assert!(
            get_datetime_future(Duration::seconds(seconds)).is_err(),
            "a delta of {}s must be rejected",
            seconds
        );
    }

    for seconds in [5, 6, 3600, 86_400] {
        assert!(
            get_datetime_future(Duration::seconds(seconds)).is_ok(),
            "a delta of {}s must be accepted",
            seconds
        );
    }
}

/// CONTRACT: now() is microsecond-precise so stored instants compare
/// exactly after a string round-trip.
#[test]
fn contract_now_survives_round_trip() {
    for _ in 0..10 {
        let now = get_datetime_now();
        assert_eq!(string_to_datetime(&datetime_to_string(now)).unwrap(), now);
    }
}
