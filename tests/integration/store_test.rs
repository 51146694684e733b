//! Checkpoint/archive durability tests against real files, including a
//! simulated reload (a second store over the same directory).

use serde_json::json;

use diligence_core::models::assessment::ArchivedAssessment;
use diligence_core::models::checkpoint::{CheckpointStatus, InputSummary};
use diligence_core::models::phase::PhaseKey;
use diligence_core::services::identity::derive_key;
use diligence_core::storage::keyvalue::FileStorage;
use diligence_core::storage::store::AssessmentStore;

fn file_store(dir: &std::path::Path) -> AssessmentStore {
    AssessmentStore::new(Box::new(FileStorage::new(dir.join("store")).unwrap()))
}

fn alice_input() -> InputSummary {
    InputSummary {
        url: Some("https://acme.example".to_string()),
        file_name: None,
        operator: "Alice".to_string(),
        company_label: None,
    }
}

#[test]
fn test_checkpoint_survives_reload() {
    let temp_dir = tempfile::tempdir().unwrap();

    let store = file_store(temp_dir.path());
    store.begin(alice_input());
    store.record_phase(PhaseKey::Company, json!({"summary": "acme"}));
    store.record_phase(PhaseKey::Team, json!({"size": 12}));
    store.record_phase(PhaseKey::Funding, json!({"rounds": 2}));
    drop(store);

    // A fresh store over the same directory sees the same run
    let reloaded = file_store(temp_dir.path());
    assert!(reloaded.has_incomplete_run());
    let checkpoint = reloaded.load().unwrap();
    assert_eq!(checkpoint.status, CheckpointStatus::InProgress);
    assert_eq!(checkpoint.recorded_phase_count(), 3);
    assert_eq!(checkpoint.phase_results["team"]["size"], 12);
    assert!(!checkpoint.phase_results.contains_key("market"));
}

#[test]
fn test_completed_run_not_offered_after_reload() {
    let temp_dir = tempfile::tempdir().unwrap();

    let store = file_store(temp_dir.path());
    store.begin(alice_input());
    for key in PhaseKey::ALL {
        store.record_phase(key, json!({}));
    }
    store.mark_complete();
    drop(store);

    let reloaded = file_store(temp_dir.path());
    assert!(!reloaded.has_incomplete_run());
    assert_eq!(
        reloaded.load().unwrap().status,
        CheckpointStatus::Complete
    );
}

#[test]
fn test_archive_retention_across_52_entries() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path());

    for i in 0..52 {
        let mut assessment = ArchivedAssessment::new(
            &format!("company-{:02}.example_alice", i),
            alice_input(),
        );
        assessment.timestamp = format!("2025-01-01T00:00:{:02}Z", i);
        store.archive(assessment);
    }

    let summaries = store.list_archived();
    assert_eq!(summaries.len(), 50);
    // The two oldest entries were evicted, newest listed first
    let keys: Vec<&str> = summaries.iter().map(|s| s.key.as_str()).collect();
    assert!(!keys.contains(&"company-00.example_alice"));
    assert!(!keys.contains(&"company-01.example_alice"));
    assert_eq!(keys[0], "company-51.example_alice");
    assert_eq!(keys[49], "company-02.example_alice");
}

#[test]
fn test_same_company_same_operator_overwrites() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path());

    // The derived key is stable across URL spellings, so a re-analysis
    // lands on the same archive entry
    let first_key = derive_key(Some("https://Example.com/"), "Alice", None);
    let second_key = derive_key(Some("example.com"), "Alice", None);
    assert_eq!(first_key, second_key);

    let mut first = ArchivedAssessment::new(&first_key, alice_input());
    first.timestamp = "2025-01-01T00:00:00Z".to_string();
    store.archive(first);

    let mut second = ArchivedAssessment::new(&second_key, alice_input())
        .with_phase_results([("company".to_string(), json!({"summary": "v2"}))].into());
    second.timestamp = "2025-02-01T00:00:00Z".to_string();
    store.archive(second);

    let summaries = store.list_archived();
    assert_eq!(summaries.len(), 1);
    let stored = store.load_archived(&first_key).unwrap();
    assert_eq!(stored.timestamp, "2025-02-01T00:00:00Z");
    assert_eq!(stored.phase_results["company"]["summary"], "v2");
}

#[test]
fn test_corrupt_archive_file_does_not_block_checkpoints() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store_dir = temp_dir.path().join("store");
    std::fs::create_dir_all(&store_dir).unwrap();
    std::fs::write(store_dir.join("archivedAssessments.json"), "not json at all").unwrap();

    let store = file_store(temp_dir.path());
    store.begin(alice_input());
    store.record_phase(PhaseKey::Company, json!({}));
    assert!(store.has_incomplete_run());

    assert!(store.list_archived().is_empty());
    let mut fresh = ArchivedAssessment::new("acme.example_alice", alice_input());
    fresh.timestamp = "2025-01-01T00:00:00Z".to_string();
    store.archive(fresh);
    assert_eq!(store.list_archived().len(), 1);
}
