//! End-to-end command tests on temp store and diff files.

use bulletin_cli::commands::{self, SchemaKind};
use bulletin_diff::{ValidationFailure, ValidationPolicy};
use bulletin_store::StoreFile;
use chrono::NaiveDate;
use serde_json::json;
use std::path::Path;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, 27).unwrap()
}

fn write_store(path: &Path) {
    let store = json!({
        "sources": { "epi": { "last_collected": "2025-02-23" } },
        "next_id": 7,
        "events": [
            {
                "id": 3,
                "source": "epi",
                "location": "epi",
                "datetime": "2025-03-01T09:00:00-06:00",
                "time_desc": "9am",
                "details": "",
                "bulletin_url": "https://example.org/epi/2025-02-23.pdf",
                "bulletin_page": 2,
                "type": "mass",
                "cancelled": false
            },
            {
                "id": 5,
                "source": "epi",
                "location": "epi",
                "datetime": "2025-02-26T18:00:00-06:00",
                "time_desc": "6pm",
                "details": "",
                "bulletin_url": "https://example.org/epi/2025-02-23.pdf",
                "bulletin_page": 3,
                "type": "adoration",
                "cancelled": false
            }
        ],
        "bulletins": []
    });
    std::fs::write(path, serde_json::to_string_pretty(&store).unwrap()).unwrap();
}

fn write_diff(path: &Path, diff: serde_json::Value) {
    std::fs::write(path, diff.to_string()).unwrap();
}

#[test]
fn enact_writes_the_new_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let diff_path = dir.path().join("diff.json");
    write_store(&store_path);
    write_diff(
        &diff_path,
        json!({
            "cancel": [{ "type": "mass", "location": "epi", "datetime": "2025-03-01T09:00:00-06:00" }],
            "add": [{
                "source": "epi",
                "location": "epi",
                "datetime": "2025-03-07T19:00:00-06:00",
                "time_desc": "7pm",
                "bulletin_url": "https://example.org/epi/2025-02-23.pdf",
                "bulletin_page": 4,
                "type": "misc"
            }]
        }),
    );
    let store_file = StoreFile::new(&store_path);

    let summary =
        commands::enact(&store_file, &diff_path, ValidationPolicy::default(), today(), false).unwrap();

    assert_eq!(summary.expired, 1);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.new_ids, vec![7]);

    let store = store_file.load().unwrap();
    assert_eq!(store.next_id, 8);
    assert!(store.event(3).unwrap().cancelled);
    assert!(store.event(5).is_none());
}

#[test]
fn dry_run_leaves_the_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let diff_path = dir.path().join("diff.json");
    write_store(&store_path);
    write_diff(&diff_path, json!({}));
    let before = std::fs::read_to_string(&store_path).unwrap();

    let summary = commands::enact(
        &StoreFile::new(&store_path),
        &diff_path,
        ValidationPolicy::default(),
        today(),
        true,
    )
    .unwrap();

    assert_eq!(summary.expired, 1);
    assert_eq!(std::fs::read_to_string(&store_path).unwrap(), before);
}

#[test]
fn rejected_diff_reports_every_problem_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let diff_path = dir.path().join("diff.json");
    write_store(&store_path);
    write_diff(
        &diff_path,
        json!({
            "remove": [{ "type": "mass", "location": "epi", "datetime": "2025-03-08T09:00:00-06:00" }],
            "update": [{
                "match": { "type": "mass", "location": "epi", "datetime": "2025-03-01T09:00:00-06:00" },
                "patch": { "bulletin_url": "https://example.org/other.pdf" }
            }]
        }),
    );
    let before = std::fs::read_to_string(&store_path).unwrap();

    let err = commands::enact(
        &StoreFile::new(&store_path),
        &diff_path,
        ValidationPolicy::default(),
        today(),
        false,
    )
    .unwrap_err();

    let failure = err.downcast_ref::<ValidationFailure>().unwrap();
    assert_eq!(failure.count("UnknownMatchError"), 1);
    assert_eq!(failure.count("ImmutableFieldError"), 1);
    assert_eq!(std::fs::read_to_string(&store_path).unwrap(), before);
}

#[test]
fn check_summarises_a_valid_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    write_store(&store_path);

    let report = commands::check(&StoreFile::new(&store_path)).unwrap();

    assert_eq!(report.events, 2);
    assert_eq!(report.next_id, 7);
    assert_eq!(report.sources, 1);
    assert!(report.to_string().starts_with("Store OK"));
}

#[test]
fn check_fails_on_a_corrupt_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    std::fs::write(&store_path, r#"{"next_id": 2, "events": [{"id": null}]}"#).unwrap();

    assert!(commands::check(&StoreFile::new(&store_path)).is_err());
}

#[test]
fn schemas_are_json() {
    for kind in [SchemaKind::Candidate, SchemaKind::Diff] {
        let text = commands::schema(kind).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.is_object());
    }
}

#[test]
fn sources_are_selected_by_id() {
    assert_eq!(commands::select_sources(&[]).unwrap().len(), 4);

    let picked = commands::select_sources(&["smb".to_string()]).unwrap();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].id, "smb");

    let err = commands::select_sources(&["nope".to_string()]).unwrap_err();
    assert!(err.to_string().contains("Unknown source"));
}
