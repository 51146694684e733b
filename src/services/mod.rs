//! Engine Services
//!
//! The orchestrator and its collaborators: remote analysis clients,
//! progress estimation, identity derivation, input validation, and
//! interrupted-run recovery.

pub mod client;
pub mod identity;
pub mod orchestrator;
pub mod progress;
pub mod recovery;
pub mod validator;

pub use client::{AnalysisClient, AnalysisRequest, ClientError, ClientResult, HttpAnalysisClient};
pub use identity::derive_key;
pub use orchestrator::{AnalysisEvent, Orchestrator, RunHandle};
pub use progress::{estimate, ProgressEstimate};
pub use recovery::{detect, IncompleteRun};
pub use validator::{validate_url, UrlValidation};
