//! Checkpoint Models
//!
//! The singular, continuously-updated durable record of the current
//! in-flight run. Versioned for forward migration: additive fields carry
//! `#[serde(default)]` so an older minor version loads cleanly, while an
//! unrecognized major series is treated as corrupt and discarded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current checkpoint schema version ("major.minor")
pub const CHECKPOINT_VERSION: &str = "2.1";

/// Status of the current checkpoint slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    InProgress,
    Complete,
}

/// Condensed description of the input under assessment, enough to rebuild
/// a resume offer and the archive identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSummary {
    /// Normalized company URL, if the assessment started from one
    #[serde(default)]
    pub url: Option<String>,
    /// Attached document file name, if any
    #[serde(default)]
    pub file_name: Option<String>,
    /// Operator name
    #[serde(default)]
    pub operator: String,
    /// Human label for lists (company name once known, else host/file name)
    #[serde(default)]
    pub company_label: Option<String>,
}

impl InputSummary {
    /// Label shown to the operator in resume offers and archive lists
    pub fn display_name(&self) -> String {
        if let Some(label) = &self.company_label {
            return label.clone();
        }
        if let Some(url) = &self.url {
            return url.clone();
        }
        self.file_name
            .clone()
            .unwrap_or_else(|| "untitled".to_string())
    }
}

/// Durable snapshot of an in-flight or finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Schema version, "major.minor"
    pub version: String,
    /// Whether the recorded run is still in progress
    pub status: CheckpointStatus,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
    /// Input under assessment
    pub input: InputSummary,
    /// Per-phase results keyed by phase key; each phase writes a disjoint
    /// key, so last-write-wins merging cannot conflict
    #[serde(default)]
    pub phase_results: BTreeMap<String, serde_json::Value>,
    /// Operator-entered scores gathered so far
    #[serde(default)]
    pub operator_scores: BTreeMap<String, f64>,
    /// Derived short-form company description (added in 2.1)
    #[serde(default)]
    pub brief: Option<String>,
}

impl RunCheckpoint {
    /// Create a fresh in-progress checkpoint for a new submission
    pub fn new(input: InputSummary) -> Self {
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            status: CheckpointStatus::InProgress,
            updated_at: chrono::Utc::now().to_rfc3339(),
            input,
            phase_results: BTreeMap::new(),
            operator_scores: BTreeMap::new(),
            brief: None,
        }
    }

    /// Stamp the checkpoint with the current time
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Number of phases with a recorded result
    pub fn recorded_phase_count(&self) -> usize {
        self.phase_results.len()
    }
}

/// Split a "major.minor" version string into numeric parts
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Compatibility verdict for a stored checkpoint version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    /// Same major and minor: trust as-is
    Current,
    /// Same major, older minor: upgrade in place with defaults
    UpgradeableMinor,
    /// Different major series or unparseable: treat as corrupt
    Incompatible,
}

/// Check a stored version against the current schema
pub fn check_version(stored: &str) -> VersionCheck {
    let current = parse_version(CHECKPOINT_VERSION).expect("current version is well-formed");
    match parse_version(stored) {
        Some((major, minor)) if major == current.0 && minor == current.1 => VersionCheck::Current,
        // A newer minor within the same series is still additive-only, so
        // reading it with defaults is safe.
        Some((major, _)) if major == current.0 => VersionCheck::UpgradeableMinor,
        _ => VersionCheck::Incompatible,
    }
}
