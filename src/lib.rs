//! Diligence Core
//!
//! The analysis orchestration and recovery engine behind a company
//! due-diligence tool. Sequences six long-running remote analysis calls
//! (a gating company overview, then five concurrent dimension analyses),
//! emits lifecycle events the host forwards into the checkpoint/archive
//! store, and recovers interrupted runs on the next load.
//!
//! The engine has no process boundary of its own; a UI shell consumes it
//! as a library, subscribing to [`services::AnalysisEvent`]s and calling
//! back into the [`storage::AssessmentStore`] as they arrive.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::config::EngineConfig;
pub use services::orchestrator::{AnalysisEvent, Orchestrator, RunHandle};
pub use storage::store::AssessmentStore;
pub use utils::error::{EngineError, EngineResult};
