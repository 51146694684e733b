//! Interrupted-Run Recovery
//!
//! Inspects the checkpoint slot on load and, when an in-progress run with
//! partial results exists, reconstructs enough state for the host to
//! offer a resume: which phases already have results, which are still
//! owed, and the banked brief the cohort calls consume.

use std::collections::BTreeMap;

use crate::models::checkpoint::InputSummary;
use crate::models::phase::PhaseKey;
use crate::storage::store::AssessmentStore;

/// Reconstructed view of an interrupted run worth resuming
#[derive(Debug, Clone)]
pub struct IncompleteRun {
    /// Label shown in the resume offer
    pub display_name: String,
    /// Input the interrupted run was analyzing
    pub input: InputSummary,
    /// When the checkpoint was last updated (ISO 8601)
    pub updated_at: String,
    /// Banked short-form company description, if the gating phase got
    /// that far
    pub brief: Option<String>,
    /// Results already recorded, keyed by phase
    pub phase_results: BTreeMap<PhaseKey, serde_json::Value>,
    /// Operator scores entered before the interruption
    pub operator_scores: BTreeMap<String, f64>,
    /// Phases with no recorded result, in registry order
    pub remaining_phases: Vec<PhaseKey>,
}

impl IncompleteRun {
    /// Number of phases with a recorded result
    pub fn recorded_count(&self) -> usize {
        self.phase_results.len()
    }
}

/// Check the store for an interrupted run worth resuming.
///
/// Returns `None` when no checkpoint exists, when the recorded run
/// already finished, or when nothing was recorded yet (a fresh start is
/// cheaper than a resume with zero results).
pub fn detect(store: &AssessmentStore) -> Option<IncompleteRun> {
    if !store.has_incomplete_run() {
        return None;
    }
    let checkpoint = store.load()?;

    // Keys outside the known phase set are stale leftovers and dropped
    let phase_results: BTreeMap<PhaseKey, serde_json::Value> = checkpoint
        .phase_results
        .into_iter()
        .filter_map(|(key, value)| PhaseKey::from_str(&key).map(|key| (key, value)))
        .collect();
    let remaining_phases = PhaseKey::ALL
        .iter()
        .copied()
        .filter(|key| !phase_results.contains_key(key))
        .collect();

    Some(IncompleteRun {
        display_name: checkpoint.input.display_name(),
        input: checkpoint.input,
        updated_at: checkpoint.updated_at,
        brief: checkpoint.brief,
        phase_results,
        operator_scores: checkpoint.operator_scores,
        remaining_phases,
    })
}
