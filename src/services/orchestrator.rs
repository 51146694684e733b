//! Analysis Orchestrator
//!
//! Drives one assessment run end to end: the gating company-overview call
//! first, then the five remaining analyses as a concurrent cohort. Emits
//! lifecycle events over a channel, honors a shared cancellation token at
//! every await point, and supports retrying a single failed phase without
//! disturbing the rest of the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::phase::{PhaseKey, PhaseRegistry, PhaseState};
use crate::models::run::{AnalysisInput, Run, RunOutcome, RunSnapshot};
use crate::services::client::{AnalysisClient, AnalysisRequest, ClientError};
use crate::utils::error::{EngineError, EngineResult};

/// Buffer for lifecycle events; the host is expected to drain promptly
const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Longest brief banked from the gating payload, in characters
const MAX_BRIEF_CHARS: usize = 600;

/// Lifecycle events emitted while a run executes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// A run was accepted and the gating phase is about to start
    Started { run_id: String },
    /// A phase left pending and its remote call was issued
    PhaseStarted { phase: PhaseKey },
    /// A phase's remote call returned a usable payload
    PhaseCompleted {
        phase: PhaseKey,
        result: serde_json::Value,
    },
    /// A phase's remote call failed; the rest of the run is unaffected
    PhaseFailed { phase: PhaseKey, error: String },
    /// The gating result was banked and the cohort is about to start
    OverviewReady {
        brief: String,
        result: serde_json::Value,
    },
    /// Every phase settled and at least one cohort phase failed
    PartialCompleted {
        run_id: String,
        failed_phases: Vec<PhaseKey>,
        duration_ms: i64,
    },
    /// Every phase completed
    Completed { run_id: String, duration_ms: i64 },
    /// The gating phase failed; the cohort never started
    Failed { run_id: String, error: String },
    /// The run was cancelled by the operator
    Cancelled { run_id: String, duration_ms: i64 },
}

/// Handle returned to the caller of `start`
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Identifier of the accepted run
    pub run_id: String,
    token: CancellationToken,
}

impl RunHandle {
    /// Request cooperative cancellation of the run
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Sequences the six analysis phases for one run at a time
#[derive(Clone)]
pub struct Orchestrator {
    clients: Arc<HashMap<PhaseKey, Arc<dyn AnalysisClient>>>,
    registry: PhaseRegistry,
    run: Arc<RwLock<Option<Run>>>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
    events: mpsc::Sender<AnalysisEvent>,
}

impl Orchestrator {
    /// Create an orchestrator and the receiving end of its event stream.
    ///
    /// The channel lives as long as the orchestrator; retries and later
    /// runs reuse it.
    pub fn new(
        clients: HashMap<PhaseKey, Arc<dyn AnalysisClient>>,
        registry: PhaseRegistry,
    ) -> (Self, mpsc::Receiver<AnalysisEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                clients: Arc::new(clients),
                registry,
                run: Arc::new(RwLock::new(None)),
                cancel: Arc::new(Mutex::new(None)),
                events: tx,
            },
            rx,
        )
    }

    /// Accept a new run and drive it in the background.
    ///
    /// Rejects input with no subject and refuses to start while a run is
    /// in flight. The previous run's record is replaced once a new run is
    /// accepted.
    pub async fn start(&self, input: AnalysisInput) -> EngineResult<RunHandle> {
        if !input.has_subject() {
            return Err(EngineError::invalid_input(
                "either a company URL or a document is required",
            ));
        }
        for key in PhaseKey::ALL {
            if !self.clients.contains_key(&key) {
                return Err(EngineError::config(format!(
                    "no analysis client registered for phase '{}'",
                    key
                )));
            }
        }

        let token = CancellationToken::new();
        let run_id = {
            let mut guard = self.run.write().await;
            if let Some(run) = guard.as_ref() {
                if run.in_flight() {
                    return Err(EngineError::already_running(run.id.clone()));
                }
            }
            let run = Run::new(&self.registry, input);
            let run_id = run.id.clone();
            *guard = Some(run);
            run_id
        };
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());

        info!(run_id = %run_id, "analysis run accepted");
        self.emit(AnalysisEvent::Started {
            run_id: run_id.clone(),
        })
        .await;

        let orchestrator = self.clone();
        let drive_token = token.clone();
        tokio::spawn(async move {
            orchestrator.drive(drive_token).await;
        });

        Ok(RunHandle { run_id, token })
    }

    /// Retry a single phase currently in the error state.
    ///
    /// A failed cohort phase is re-issued alone, reusing the banked brief.
    /// A failed gating phase is re-run from the top; on success the cohort
    /// starts as it would have on a fresh run. Phases in any other state
    /// are rejected.
    pub async fn retry_phase(&self, key: PhaseKey) -> EngineResult<()> {
        let token = {
            let guard = self.run.read().await;
            let run = guard
                .as_ref()
                .ok_or_else(|| EngineError::validation("no run to retry"))?;
            if run.cancelled {
                return Err(EngineError::validation("cancelled runs cannot be retried"));
            }
            if run.phase(key).state != PhaseState::Error {
                return Err(EngineError::validation(format!(
                    "phase '{}' is not in the error state",
                    key
                )));
            }
            if key.is_gating() {
                // A gating retry restarts the cohort, so nothing else may
                // still be running
                if run.has_active_phase() {
                    return Err(EngineError::validation(
                        "cannot retry the gating phase while other phases are active",
                    ));
                }
            }
            drop(guard);

            let token = CancellationToken::new();
            *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
            token
        };

        info!(phase = %key, "retrying phase");
        let orchestrator = self.clone();
        tokio::spawn(async move {
            if key.is_gating() {
                orchestrator.drive(token).await;
            } else {
                orchestrator.run_cohort_phase(key, &token).await;
                orchestrator.settle(&token).await;
            }
        });
        Ok(())
    }

    /// Request cooperative cancellation of the current run. No-op when
    /// nothing is in flight.
    pub fn cancel(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            token.cancel();
        }
    }

    /// Clear the finished run so a new one may be started fresh. Refused
    /// while a run is in flight.
    pub async fn reset(&self) -> EngineResult<()> {
        let mut guard = self.run.write().await;
        if let Some(run) = guard.as_ref() {
            if run.in_flight() {
                return Err(EngineError::already_running(run.id.clone()));
            }
        }
        *guard = None;
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    /// Point-in-time view of the current run, if any
    pub async fn run_snapshot(&self) -> Option<RunSnapshot> {
        self.run.read().await.as_ref().map(|run| run.snapshot())
    }

    async fn emit(&self, event: AnalysisEvent) {
        // A dropped receiver means the host went away; the run itself
        // still finishes
        let _ = self.events.send(event).await;
    }

    /// Execute the gating phase and, on success, the cohort. Entered both
    /// on a fresh start and on a gating retry.
    async fn drive(&self, token: CancellationToken) {
        match self.run_gating(&token).await {
            GatingResult::Completed => {}
            GatingResult::Failed => return,
            GatingResult::Cancelled => {
                self.settle(&token).await;
                return;
            }
        }

        let cohort = PhaseKey::COHORT
            .iter()
            .map(|key| self.run_cohort_phase(*key, &token));
        join_all(cohort).await;

        self.settle(&token).await;
    }

    async fn run_gating(&self, token: &CancellationToken) -> GatingResult {
        let key = PhaseKey::Company;
        let request = {
            let mut guard = self.run.write().await;
            let Some(run) = guard.as_mut() else {
                return GatingResult::Failed;
            };
            if !run.begin_phase(key) {
                // Already active or completed; never issue a duplicate call
                return GatingResult::Failed;
            }
            AnalysisRequest {
                input: run.input.subject_text(),
                brief: None,
                document: run.input.document.clone(),
            }
        };
        self.emit(AnalysisEvent::PhaseStarted { phase: key }).await;

        let client = self.clients[&key].clone();
        match client.analyze(request, token).await {
            Ok(payload) => {
                let brief = {
                    let mut guard = self.run.write().await;
                    let Some(run) = guard.as_mut() else {
                        return GatingResult::Failed;
                    };
                    let brief = company_brief(&payload, &run.input);
                    run.complete_phase(key, payload.clone());
                    run.set_brief(brief.clone());
                    brief
                };
                self.emit(AnalysisEvent::PhaseCompleted {
                    phase: key,
                    result: payload.clone(),
                })
                .await;
                self.emit(AnalysisEvent::OverviewReady {
                    brief,
                    result: payload,
                })
                .await;
                GatingResult::Completed
            }
            Err(ClientError::Cancelled) => GatingResult::Cancelled,
            Err(err) => {
                warn!(phase = %key, error = %err, "gating phase failed");
                let run_id = {
                    let mut guard = self.run.write().await;
                    let Some(run) = guard.as_mut() else {
                        return GatingResult::Failed;
                    };
                    run.fail_phase(key, err.to_string());
                    run.id.clone()
                };
                self.emit(AnalysisEvent::PhaseFailed {
                    phase: key,
                    error: err.to_string(),
                })
                .await;
                self.emit(AnalysisEvent::Failed {
                    run_id,
                    error: err.to_string(),
                })
                .await;
                GatingResult::Failed
            }
        }
    }

    /// Execute one cohort phase. A phase that is already active or
    /// completed is skipped without a remote call.
    async fn run_cohort_phase(&self, key: PhaseKey, token: &CancellationToken) {
        let request = {
            let mut guard = self.run.write().await;
            let Some(run) = guard.as_mut() else {
                return;
            };
            if !run.begin_phase(key) {
                return;
            }
            AnalysisRequest {
                input: run.input.subject_text(),
                brief: run.brief.clone(),
                document: None,
            }
        };
        self.emit(AnalysisEvent::PhaseStarted { phase: key }).await;

        let client = self.clients[&key].clone();
        match client.analyze(request, token).await {
            Ok(payload) => {
                {
                    let mut guard = self.run.write().await;
                    if let Some(run) = guard.as_mut() {
                        run.complete_phase(key, payload.clone());
                    }
                }
                self.emit(AnalysisEvent::PhaseCompleted {
                    phase: key,
                    result: payload,
                })
                .await;
            }
            Err(ClientError::Cancelled) => {
                // Left active; the cancellation sweep in `settle` records it
            }
            Err(err) => {
                warn!(phase = %key, error = %err, "phase failed");
                {
                    let mut guard = self.run.write().await;
                    if let Some(run) = guard.as_mut() {
                        run.fail_phase(key, err.to_string());
                    }
                }
                self.emit(AnalysisEvent::PhaseFailed {
                    phase: key,
                    error: err.to_string(),
                })
                .await;
            }
        }
    }

    /// Classify the run and emit its terminal event. Skipped while any
    /// phase is still active, so a single-phase retry finishing ahead of
    /// its siblings stays silent.
    async fn settle(&self, token: &CancellationToken) {
        let terminal = {
            let mut guard = self.run.write().await;
            let Some(run) = guard.as_mut() else {
                return;
            };
            if token.is_cancelled() && !run.is_settled() {
                run.mark_cancelled();
            }
            if run.has_active_phase() {
                return;
            }
            let duration_ms = (Utc::now() - run.started_at).num_milliseconds();
            match run.outcome() {
                Ok(RunOutcome::Complete) => Some(AnalysisEvent::Completed {
                    run_id: run.id.clone(),
                    duration_ms,
                }),
                Ok(RunOutcome::PartialComplete { failed_phases }) => {
                    Some(AnalysisEvent::PartialCompleted {
                        run_id: run.id.clone(),
                        failed_phases,
                        duration_ms,
                    })
                }
                Ok(RunOutcome::GatingFailed { error }) => Some(AnalysisEvent::Failed {
                    run_id: run.id.clone(),
                    error,
                }),
                Ok(RunOutcome::Cancelled) => Some(AnalysisEvent::Cancelled {
                    run_id: run.id.clone(),
                    duration_ms,
                }),
                Err(_) => None,
            }
        };
        if let Some(event) = terminal {
            info!(event = ?event, "run settled");
            self.emit(event).await;
        }
    }
}

enum GatingResult {
    Completed,
    Failed,
    Cancelled,
}

/// Derive the short-form company description banked for cohort calls.
///
/// Prefers a conventional summary field from the gating payload, falls
/// back to the input's display label, and caps the length.
fn company_brief(payload: &serde_json::Value, input: &AnalysisInput) -> String {
    let text = ["summary", "description", "overview"]
        .iter()
        .find_map(|field| payload.get(field).and_then(|v| v.as_str()))
        .or_else(|| payload.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| input.display_label());
    truncate_chars(&text, MAX_BRIEF_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
