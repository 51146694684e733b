//! Archived Assessment Models
//!
//! Durable, keyed records of past (complete or partial) assessments,
//! distinct from the singular run checkpoint. Keyed by the derived
//! assessment identity so re-analyzing the same company by the same
//! operator overwrites instead of duplicating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::checkpoint::InputSummary;

/// One archived assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedAssessment {
    /// Derived assessment identity key
    pub key: String,
    /// Write timestamp (ISO 8601); retention evicts oldest-by-timestamp
    pub timestamp: String,
    /// Input the assessment analyzed
    pub input: InputSummary,
    /// Per-phase results; may be empty for scores-only records
    #[serde(default)]
    pub phase_results: BTreeMap<String, serde_json::Value>,
    /// Operator-entered scores
    #[serde(default)]
    pub operator_scores: BTreeMap<String, f64>,
    /// Row identifier assigned by the external spreadsheet, if exported
    #[serde(default)]
    pub external_row_id: Option<String>,
}

impl ArchivedAssessment {
    /// Create an assessment record stamped with the current time
    pub fn new(key: impl Into<String>, input: InputSummary) -> Self {
        Self {
            key: key.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            input,
            phase_results: BTreeMap::new(),
            operator_scores: BTreeMap::new(),
            external_row_id: None,
        }
    }

    /// Set the per-phase results
    pub fn with_phase_results(mut self, results: BTreeMap<String, serde_json::Value>) -> Self {
        self.phase_results = results;
        self
    }

    /// Set the operator scores
    pub fn with_scores(mut self, scores: BTreeMap<String, f64>) -> Self {
        self.operator_scores = scores;
        self
    }

    /// Set the external spreadsheet row id
    pub fn with_external_row(mut self, row_id: impl Into<String>) -> Self {
        self.external_row_id = Some(row_id.into());
        self
    }

    /// Whether the record carries full evidence rather than scores only
    pub fn has_evidence(&self) -> bool {
        !self.phase_results.is_empty()
    }

    /// Lightweight summary for list presentation
    pub fn summary(&self) -> ArchiveSummary {
        ArchiveSummary {
            key: self.key.clone(),
            display_name: self.input.display_name(),
            operator: self.input.operator.clone(),
            timestamp: self.timestamp.clone(),
            has_evidence: self.has_evidence(),
        }
    }
}

/// Lightweight archive entry summary for presentation to the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub key: String,
    pub display_name: String,
    pub operator: String,
    pub timestamp: String,
    /// Full evidence vs. scores-only
    pub has_evidence: bool,
}
