//! Run Models
//!
//! One `Run` is a single execution of the full phase set for one input.
//! All mutation goes through typed transition methods; the orchestrator
//! never pokes phase state directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::phase::{PhaseKey, PhaseRecord, PhaseRegistry, PhaseState};
use crate::utils::error::{EngineError, EngineResult};

/// Reference to an operator-attached document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Original file name, used for identity derivation
    pub file_name: String,
    /// Extracted text content
    pub text: String,
}

/// Input for one assessment: a normalized URL and/or an attached document,
/// plus the operator running the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    /// Normalized company URL, if supplied (shape already validated by the
    /// URL validator collaborator)
    pub url: Option<String>,
    /// Attached document, if supplied
    pub document: Option<DocumentRef>,
    /// Operator name
    pub operator: String,
}

impl AnalysisInput {
    /// Build an input from a URL only
    pub fn from_url(url: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            document: None,
            operator: operator.into(),
        }
    }

    /// Build an input from an attached document only
    pub fn from_document(document: DocumentRef, operator: impl Into<String>) -> Self {
        Self {
            url: None,
            document: Some(document),
            operator: operator.into(),
        }
    }

    /// Whether at least one of URL / document is present
    pub fn has_subject(&self) -> bool {
        self.url.is_some() || self.document.is_some()
    }

    /// Text handed to the gating analysis call: the URL when present,
    /// otherwise the document text
    pub fn subject_text(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        self.document
            .as_ref()
            .map(|d| d.text.clone())
            .unwrap_or_default()
    }

    /// Label shown to the operator: host/file name before results exist
    pub fn display_label(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        self.document
            .as_ref()
            .map(|d| d.file_name.clone())
            .unwrap_or_else(|| "untitled".to_string())
    }
}

/// Terminal classification of a settled run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Gating and every cohort phase completed
    Complete,
    /// Gating completed, some cohort phases failed
    PartialComplete { failed_phases: Vec<PhaseKey> },
    /// The gating phase failed; the cohort never started
    GatingFailed { error: String },
    /// The run was cancelled by the operator
    Cancelled,
}

/// One execution of the full phase set for one input
#[derive(Debug)]
pub struct Run {
    /// Unique run identifier
    pub id: String,
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Whether the run was cancelled
    pub cancelled: bool,
    /// Input this run is analyzing
    pub input: AnalysisInput,
    /// Short-form company description derived from the gating result;
    /// consumed by every cohort call and by retries
    pub brief: Option<String>,
    phases: Vec<PhaseRecord>,
}

impl Run {
    /// Create a fresh run with every phase reset to pending
    pub fn new(registry: &PhaseRegistry, input: AnalysisInput) -> Self {
        let phases = registry
            .specs()
            .iter()
            .map(|spec| PhaseRecord::new(spec.clone()))
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            cancelled: false,
            input,
            brief: None,
            phases,
        }
    }

    fn record_mut(&mut self, key: PhaseKey) -> &mut PhaseRecord {
        self.phases
            .iter_mut()
            .find(|p| p.key() == key)
            .expect("run contains every phase key")
    }

    /// Immutable view of one phase
    pub fn phase(&self, key: PhaseKey) -> &PhaseRecord {
        self.phases
            .iter()
            .find(|p| p.key() == key)
            .expect("run contains every phase key")
    }

    /// All phases in registry order
    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    /// Transition a phase to active. Returns false if it is already active
    /// or completed (idempotent re-entry; no duplicate call may be issued).
    pub fn begin_phase(&mut self, key: PhaseKey) -> bool {
        self.record_mut(key).begin()
    }

    /// Record a phase's successful result
    pub fn complete_phase(&mut self, key: PhaseKey, result: serde_json::Value) {
        self.record_mut(key).complete(result);
    }

    /// Record a phase failure
    pub fn fail_phase(&mut self, key: PhaseKey, error: impl Into<String>) {
        self.record_mut(key).fail(error);
    }

    /// Bank the derived short-form description from the gating result
    pub fn set_brief(&mut self, brief: impl Into<String>) {
        self.brief = Some(brief.into());
    }

    /// Mark the run cancelled. Phases already completed keep their results;
    /// anything still active is recorded as failed-by-cancellation.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
        for record in &mut self.phases {
            if record.state == PhaseState::Active {
                record.fail("cancelled");
            }
        }
    }

    /// Whether the run has reached a terminal outcome.
    ///
    /// True when every phase is terminal, or when the gating phase is in
    /// the error state (the cohort never starts, so its pending phases do
    /// not keep the run alive).
    pub fn is_settled(&self) -> bool {
        if self.phase(PhaseKey::Company).state == PhaseState::Error {
            return true;
        }
        self.phases.iter().all(|p| p.state.is_terminal())
    }

    /// Whether the run is still in flight (started and not yet settled or
    /// cancelled)
    pub fn in_flight(&self) -> bool {
        !self.cancelled && !self.is_settled()
    }

    /// Keys of phases currently in the error state
    pub fn failed_phases(&self) -> Vec<PhaseKey> {
        self.phases
            .iter()
            .filter(|p| p.state == PhaseState::Error)
            .map(|p| p.key())
            .collect()
    }

    /// Whether any phase is currently active
    pub fn has_active_phase(&self) -> bool {
        self.phases.iter().any(|p| p.state == PhaseState::Active)
    }

    /// Number of phases in the completed state
    pub fn completed_count(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.state == PhaseState::Completed)
            .count()
    }

    /// Classify a settled run.
    ///
    /// Returns an error while any phase is non-terminal; classification is
    /// only meaningful once the run has settled.
    pub fn outcome(&self) -> EngineResult<RunOutcome> {
        if self.cancelled {
            return Ok(RunOutcome::Cancelled);
        }
        let gating = self.phase(PhaseKey::Company);
        if gating.state == PhaseState::Error {
            return Ok(RunOutcome::GatingFailed {
                error: gating
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        if !self.is_settled() {
            return Err(EngineError::validation(
                "run has not settled; outcome is undefined",
            ));
        }
        let failed = self.failed_phases();
        if failed.is_empty() {
            Ok(RunOutcome::Complete)
        } else {
            Ok(RunOutcome::PartialComplete {
                failed_phases: failed,
            })
        }
    }

    /// Immutable snapshot for progress display and host inspection
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.id.clone(),
            started_at: self.started_at,
            cancelled: self.cancelled,
            phases: self
                .phases
                .iter()
                .map(|p| PhaseSnapshot {
                    key: p.key(),
                    display_name: p.spec.display_name.clone(),
                    state: p.state,
                    started_at: p.started_at,
                    ended_at: p.ended_at,
                    estimated_duration_secs: p.spec.estimated_duration_secs,
                    failure: p.failure.clone(),
                })
                .collect(),
        }
    }
}

/// Point-in-time view of one phase, detached from the run lock
#[derive(Debug, Clone)]
pub struct PhaseSnapshot {
    pub key: PhaseKey,
    pub display_name: String,
    pub state: PhaseState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub estimated_duration_secs: u64,
    pub failure: Option<String>,
}

/// Point-in-time view of a run
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub cancelled: bool,
    pub phases: Vec<PhaseSnapshot>,
}

impl RunSnapshot {
    /// Look up one phase's snapshot
    pub fn phase(&self, key: PhaseKey) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|p| p.key == key)
    }
}
