//! StoreFile tests: load/save round-trips, corrupt documents, atomic replace.

use bulletin_common::{BulletinRecord, Event, EventType, SourceCursor};
use bulletin_store::{parse_store, CorruptStoreError, Store, StoreError, StoreFile};
use chrono::{DateTime, NaiveDate};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn event(id: u64, event_type: EventType, datetime: &str) -> Event {
    Event {
        id,
        source: "hspht".into(),
        location: "hsp".into(),
        datetime: DateTime::parse_from_rfc3339(datetime).unwrap(),
        time_desc: "after the 5pm mass".into(),
        details: "Lenten confessions".into(),
        bulletin_url: "https://example.org/hspht/2025-03-02.pdf".into(),
        bulletin_page: 3,
        event_type,
        cancelled: false,
    }
}

fn sample_store() -> Store {
    let mut store = Store {
        next_id: 7,
        events: vec![
            event(3, EventType::Mass, "2025-03-08T17:00:00-06:00"),
            event(5, EventType::Confession, "2025-03-08T15:30:00-06:00"),
        ],
        ..Store::default()
    };
    store.sources.insert(
        "hspht".into(),
        SourceCursor {
            last_collected: Some(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()),
        },
    );
    store.bulletins.push(BulletinRecord {
        source: "hspht".into(),
        date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        url: "https://example.org/hspht/2025-03-02.pdf".into(),
        local_path: "bulletins/hspht/2025-03-02.pdf".into(),
        processed: false,
    });
    store
}

fn corrupt(json: serde_json::Value) -> CorruptStoreError {
    parse_store(&json.to_string()).expect_err("document should be rejected")
}

// =========================================================================
// Round-trips
// =========================================================================

#[test]
fn save_then_load_returns_the_same_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = StoreFile::new(dir.path().join("store.json"));
    let store = sample_store();

    file.save(&store).unwrap();
    let loaded = file.load().unwrap();

    assert_eq!(loaded, store);
}

#[test]
fn load_then_save_preserves_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let file = StoreFile::new(&path);
    file.save(&sample_store()).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();

    let loaded = file.load().unwrap();
    file.save(&loaded).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn offsets_survive_the_round_trip() {
    let doc = json!({
        "sources": {},
        "next_id": 2,
        "events": [{
            "id": 1,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "details": "",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "mass",
            "cancelled": false
        }]
    });
    let store = parse_store(&doc.to_string()).unwrap();
    let back = serde_json::to_value(&store).unwrap();

    assert_eq!(back["events"][0]["datetime"], "2025-03-01T09:00:00-06:00");
    assert_eq!(back["bulletins"], json!([]));
}

#[test]
fn missing_file_initialises_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = StoreFile::new(dir.path().join("store.json"));

    let store = file.load_or_init().unwrap();
    assert_eq!(store, Store::default());
    assert_eq!(store.next_id, 1);

    assert!(matches!(file.load(), Err(StoreError::Io { .. })));
}

// =========================================================================
// Corrupt documents
// =========================================================================

#[test]
fn unparseable_json_is_corrupt() {
    let err = parse_store("{ not json").unwrap_err();
    assert!(matches!(err, CorruptStoreError::Parse(_)));
}

#[test]
fn null_id_is_corrupt() {
    let err = corrupt(json!({
        "next_id": 3,
        "events": [{
            "id": null,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "mass"
        }]
    }));
    assert!(matches!(err, CorruptStoreError::NullId { index: 0 }));
}

#[test]
fn unknown_event_type_is_corrupt() {
    let err = corrupt(json!({
        "next_id": 3,
        "events": [{
            "id": 1,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "vespers"
        }]
    }));
    assert!(matches!(err, CorruptStoreError::Parse(_)));
}

#[test]
fn page_zero_is_corrupt() {
    let err = corrupt(json!({
        "next_id": 3,
        "events": [{
            "id": 1,
            "source": "epi",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 0,
            "type": "mass"
        }]
    }));
    assert!(matches!(
        err,
        CorruptStoreError::InvalidField { id: 1, field: "bulletin_page", .. }
    ));
}

#[test]
fn empty_source_is_corrupt() {
    let err = corrupt(json!({
        "next_id": 3,
        "events": [{
            "id": 2,
            "source": "",
            "location": "epi",
            "datetime": "2025-03-01T09:00:00-06:00",
            "time_desc": "9am",
            "bulletin_url": "https://example.org/b.pdf",
            "bulletin_page": 2,
            "type": "mass"
        }]
    }));
    assert!(matches!(
        err,
        CorruptStoreError::InvalidField { id: 2, field: "source", .. }
    ));
}

#[test]
fn stale_next_id_is_corrupt_and_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let mut store = sample_store();
    store.next_id = 5;
    std::fs::write(&path, serde_json::to_string(&store).unwrap()).unwrap();

    let err = StoreFile::new(&path).load().unwrap_err();
    match err {
        StoreError::Corrupt { path: reported, source } => {
            assert_eq!(reported, path);
            assert!(matches!(
                source,
                CorruptStoreError::NextIdNotAbove { next_id: 5, max_id: 5 }
            ));
        }
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

// =========================================================================
// Saving
// =========================================================================

#[test]
fn invalid_store_is_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let file = StoreFile::new(&path);
    file.save(&sample_store()).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut broken = sample_store();
    broken.events.push(event(3, EventType::Misc, "2025-03-09T10:00:00-06:00"));
    assert!(matches!(file.save(&broken), Err(StoreError::Invalid(_))));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn save_leaves_no_temporary_files_behind() {
    let dir = tempfile::tempdir().unwrap();
    let file = StoreFile::new(dir.path().join("store.json"));

    file.save(&sample_store()).unwrap();
    file.save(&sample_store()).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["store.json".to_string()]);
}

#[test]
fn save_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let file = StoreFile::new(dir.path().join("data").join("store.json"));

    file.save(&Store::default()).unwrap();
    assert!(file.exists());
}
