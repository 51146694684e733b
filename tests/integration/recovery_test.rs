//! End-to-end recovery: the host forwards orchestrator events into the
//! store, the session is interrupted, and the next load reconstructs the
//! partial run.

use serde_json::json;

use diligence_core::models::checkpoint::InputSummary;
use diligence_core::models::phase::{PhaseKey, PhaseRegistry};
use diligence_core::models::run::AnalysisInput;
use diligence_core::services::client::ClientError;
use diligence_core::services::orchestrator::{AnalysisEvent, Orchestrator};
use diligence_core::services::recovery;
use diligence_core::storage::keyvalue::FileStorage;
use diligence_core::storage::store::AssessmentStore;

use crate::support::{all_ok_clients, MockClient};

fn file_store(dir: &std::path::Path) -> AssessmentStore {
    AssessmentStore::new(Box::new(FileStorage::new(dir.join("store")).unwrap()))
}

/// Drive a run to its terminal event, forwarding phase completions into
/// the store the way the host shell does
async fn run_and_forward(
    rx: &mut tokio::sync::mpsc::Receiver<AnalysisEvent>,
    store: &AssessmentStore,
) -> AnalysisEvent {
    loop {
        let event = rx.recv().await.expect("event stream ended early");
        match &event {
            AnalysisEvent::PhaseCompleted { phase, result } => {
                store.record_phase(*phase, result.clone());
            }
            AnalysisEvent::OverviewReady { brief, .. } => {
                store.record_brief(brief);
            }
            AnalysisEvent::Completed { .. } => {
                store.mark_complete();
                return event;
            }
            AnalysisEvent::PartialCompleted { .. }
            | AnalysisEvent::Failed { .. }
            | AnalysisEvent::Cancelled { .. } => return event,
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_interrupted_run_is_offered_for_resume() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path());
    store.begin(InputSummary {
        url: Some("https://acme.example".to_string()),
        file_name: None,
        operator: "Alice".to_string(),
        company_label: None,
    });

    // Market and iprisk never finish before the interruption
    let mut clients = all_ok_clients();
    for key in [PhaseKey::Market, PhaseKey::IpRisk] {
        clients.insert(key, MockClient::slow(key.as_str(), json!({}), 10_000));
    }

    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    let handle = orchestrator
        .start(AnalysisInput::from_url("https://acme.example", "Alice"))
        .await
        .unwrap();

    let mut fast_completions = 0;
    loop {
        let event = rx.recv().await.unwrap();
        match &event {
            AnalysisEvent::PhaseCompleted { phase, result } => {
                store.record_phase(*phase, result.clone());
                fast_completions += 1;
                // Gating plus the three fast cohort phases
                if fast_completions == 4 {
                    break;
                }
            }
            AnalysisEvent::OverviewReady { brief, .. } => store.record_brief(brief),
            _ => {}
        }
    }
    handle.cancel();
    while let Some(event) = rx.recv().await {
        if matches!(event, AnalysisEvent::Cancelled { .. }) {
            break;
        }
    }
    drop(store);

    // Simulated reload: a fresh store over the same directory
    let reloaded = file_store(temp_dir.path());
    let incomplete = recovery::detect(&reloaded).expect("resume offer expected");
    assert_eq!(incomplete.display_name, "https://acme.example");
    assert_eq!(incomplete.recorded_count(), 4);
    assert_eq!(incomplete.brief.as_deref(), Some("Acme builds anvils"));
    assert!(incomplete.phase_results.contains_key(&PhaseKey::Company));
    assert_eq!(
        incomplete.remaining_phases,
        vec![PhaseKey::Market, PhaseKey::IpRisk]
    );
}

#[tokio::test]
async fn test_completed_run_leaves_no_resume_offer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path());
    store.begin(InputSummary {
        url: Some("https://acme.example".to_string()),
        file_name: None,
        operator: "Alice".to_string(),
        company_label: None,
    });

    let (orchestrator, mut rx) = Orchestrator::new(all_ok_clients(), PhaseRegistry::default());
    orchestrator
        .start(AnalysisInput::from_url("https://acme.example", "Alice"))
        .await
        .unwrap();
    let terminal = run_and_forward(&mut rx, &store).await;
    assert!(matches!(terminal, AnalysisEvent::Completed { .. }));

    drop(store);
    let reloaded = file_store(temp_dir.path());
    assert!(recovery::detect(&reloaded).is_none());
}

#[tokio::test]
async fn test_gating_failure_leaves_no_resume_offer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = file_store(temp_dir.path());
    store.begin(InputSummary {
        url: Some("https://acme.example".to_string()),
        file_name: None,
        operator: "Alice".to_string(),
        company_label: None,
    });

    let mut clients = all_ok_clients();
    clients.insert(
        PhaseKey::Company,
        MockClient::failing("company", ClientError::Timeout { seconds: 720 }),
    );
    let (orchestrator, mut rx) = Orchestrator::new(clients, PhaseRegistry::default());
    orchestrator
        .start(AnalysisInput::from_url("https://acme.example", "Alice"))
        .await
        .unwrap();
    let terminal = run_and_forward(&mut rx, &store).await;
    assert!(matches!(terminal, AnalysisEvent::Failed { .. }));

    // Nothing was recorded, so a fresh start beats a resume
    drop(store);
    let reloaded = file_store(temp_dir.path());
    assert!(recovery::detect(&reloaded).is_none());
}
