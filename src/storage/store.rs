//! Checkpoint/Archive Store
//!
//! A versioned, keyed persistent store with two independent namespaces:
//! the single current-checkpoint slot (crash/reload recovery) and the
//! multi-entry archive of past assessments keyed by assessment identity.
//!
//! Persistence is best-effort relative to the analysis itself: every
//! storage fault is handled here (logged, namespace wiped or write
//! dropped) and never propagates into an in-flight run.

use std::collections::BTreeMap;

use crate::models::assessment::{ArchiveSummary, ArchivedAssessment};
use crate::models::checkpoint::{
    check_version, CheckpointStatus, InputSummary, RunCheckpoint, VersionCheck,
    CHECKPOINT_VERSION,
};
use crate::models::phase::PhaseKey;
use crate::storage::keyvalue::{KeyValueStorage, StorageError};

/// Fixed key for the current-checkpoint slot
const CHECKPOINT_KEY: &str = "currentCheckpoint";
/// Fixed key for the archive namespace
const ARCHIVE_KEY: &str = "archivedAssessments";

/// Outcome of an archive write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveWrite {
    /// The entry was persisted
    Stored,
    /// The entry could not be persisted even after pruning; the in-memory
    /// session continues unaffected
    Dropped,
}

/// The checkpoint/archive store
///
/// Sole owner of the `currentCheckpoint` and `archivedAssessments` keys on
/// the underlying medium.
pub struct AssessmentStore {
    storage: Box<dyn KeyValueStorage>,
    total_phases: usize,
    retention_cap: usize,
    prune_to: usize,
}

impl AssessmentStore {
    /// Create a store with default retention (50 entries, prune to 20)
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            total_phases: PhaseKey::ALL.len(),
            retention_cap: 50,
            prune_to: 20,
        }
    }

    /// Override the archive retention cap and quota prune target
    pub fn with_retention(mut self, retention_cap: usize, prune_to: usize) -> Self {
        self.retention_cap = retention_cap.max(1);
        self.prune_to = prune_to.min(self.retention_cap);
        self
    }

    // ===== Checkpoint slot =====

    /// Create a fresh in-progress checkpoint for a new submission,
    /// replacing any previous one
    pub fn begin(&self, input: InputSummary) {
        self.write_checkpoint(&RunCheckpoint::new(input));
    }

    /// Merge one phase's result into the current checkpoint.
    ///
    /// Idempotent per phase key (last write wins). Creates the checkpoint
    /// if the host never called `begin` for this run.
    pub fn record_phase(&self, phase: PhaseKey, data: serde_json::Value) {
        let mut checkpoint = self.load().unwrap_or_else(|| {
            tracing::warn!("phase result recorded with no checkpoint; creating one");
            RunCheckpoint::new(InputSummary::default())
        });
        checkpoint
            .phase_results
            .insert(phase.as_str().to_string(), data);
        checkpoint.status = CheckpointStatus::InProgress;
        checkpoint.touch();
        self.write_checkpoint(&checkpoint);
    }

    /// Record the derived short-form company description
    pub fn record_brief(&self, brief: &str) {
        if let Some(mut checkpoint) = self.load() {
            checkpoint.brief = Some(brief.to_string());
            checkpoint.touch();
            self.write_checkpoint(&checkpoint);
        }
    }

    /// Merge operator-entered scores into the current checkpoint
    pub fn record_scores(&self, scores: BTreeMap<String, f64>) {
        if let Some(mut checkpoint) = self.load() {
            checkpoint.operator_scores.extend(scores);
            checkpoint.touch();
            self.write_checkpoint(&checkpoint);
        }
    }

    /// Flip the current checkpoint's status to complete
    pub fn mark_complete(&self) {
        if let Some(mut checkpoint) = self.load() {
            checkpoint.status = CheckpointStatus::Complete;
            checkpoint.touch();
            self.write_checkpoint(&checkpoint);
        }
    }

    /// Discard the current checkpoint
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(CHECKPOINT_KEY) {
            tracing::warn!("failed to clear checkpoint: {}", e);
        }
    }

    /// Whether an interrupted run worth resuming exists: an in-progress
    /// checkpoint with strictly between 1 and (total phases - 1) recorded
    /// results
    pub fn has_incomplete_run(&self) -> bool {
        match self.load() {
            Some(checkpoint) => {
                let recorded = checkpoint.recorded_phase_count();
                checkpoint.status == CheckpointStatus::InProgress
                    && recorded >= 1
                    && recorded < self.total_phases
            }
            None => false,
        }
    }

    /// Load the current checkpoint, applying the version gate.
    ///
    /// An unrecognized major series is discarded as corrupt; a different
    /// minor within the current series is upgraded in place (additive
    /// fields filled with defaults by serde).
    pub fn load(&self) -> Option<RunCheckpoint> {
        let raw = match self.storage.get(CHECKPOINT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("checkpoint read failed: {}", e);
                return None;
            }
        };
        let mut checkpoint: RunCheckpoint = match serde_json::from_str(&raw) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!("discarding unparseable checkpoint: {}", e);
                self.clear();
                return None;
            }
        };
        match check_version(&checkpoint.version) {
            VersionCheck::Current => Some(checkpoint),
            VersionCheck::UpgradeableMinor => {
                tracing::info!(
                    "upgrading checkpoint from version {} to {}",
                    checkpoint.version,
                    CHECKPOINT_VERSION
                );
                checkpoint.version = CHECKPOINT_VERSION.to_string();
                self.write_checkpoint(&checkpoint);
                Some(checkpoint)
            }
            VersionCheck::Incompatible => {
                tracing::warn!(
                    "discarding checkpoint with incompatible version {}",
                    checkpoint.version
                );
                self.clear();
                None
            }
        }
    }

    fn write_checkpoint(&self, checkpoint: &RunCheckpoint) {
        let serialized = match serde_json::to_string(checkpoint) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!("failed to serialize checkpoint: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(CHECKPOINT_KEY, &serialized) {
            tracing::warn!("checkpoint write failed: {}", e);
        }
    }

    // ===== Archive namespace =====

    /// Upsert an archived assessment under its identity key.
    ///
    /// Evicts oldest-by-timestamp entries past the retention cap. On a
    /// quota rejection, prunes to the most recent `prune_to` entries and
    /// retries exactly once; a second rejection drops the write and
    /// reports it as a soft failure.
    pub fn archive(&self, assessment: ArchivedAssessment) -> ArchiveWrite {
        let mut entries = self.load_archive_map();
        entries.insert(assessment.key.clone(), assessment);
        Self::evict_oldest(&mut entries, self.retention_cap);

        match self.write_archive_map(&entries) {
            Ok(()) => ArchiveWrite::Stored,
            Err(StorageError::QuotaExceeded(first)) => {
                tracing::warn!(
                    "archive write hit storage quota ({}); pruning to {} entries",
                    first,
                    self.prune_to
                );
                Self::evict_oldest(&mut entries, self.prune_to);
                match self.write_archive_map(&entries) {
                    Ok(()) => ArchiveWrite::Stored,
                    Err(e) => {
                        tracing::warn!("archive write still failing after prune: {}", e);
                        ArchiveWrite::Dropped
                    }
                }
            }
            Err(e) => {
                tracing::warn!("archive write failed: {}", e);
                ArchiveWrite::Dropped
            }
        }
    }

    /// Lightweight summaries of every archived assessment, most recent
    /// first
    pub fn list_archived(&self) -> Vec<ArchiveSummary> {
        let entries = self.load_archive_map();
        let mut summaries: Vec<ArchiveSummary> =
            entries.values().map(ArchivedAssessment::summary).collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        summaries
    }

    /// Load one archived assessment by identity key
    pub fn load_archived(&self, key: &str) -> Option<ArchivedAssessment> {
        self.load_archive_map().remove(key)
    }

    /// Delete one archived assessment by identity key
    pub fn delete_archived(&self, key: &str) {
        let mut entries = self.load_archive_map();
        if entries.remove(key).is_some() {
            if let Err(e) = self.write_archive_map(&entries) {
                tracing::warn!("archive delete failed to persist: {}", e);
            }
        }
    }

    /// Read the archive namespace. Unparseable content wipes only this
    /// namespace so corrupted archive data can never block new checkpoints
    /// or new archive writes.
    fn load_archive_map(&self) -> BTreeMap<String, ArchivedAssessment> {
        let raw = match self.storage.get(ARCHIVE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!("archive read failed: {}", e);
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("archive namespace corrupted, wiping it: {}", e);
                if let Err(e) = self.storage.remove(ARCHIVE_KEY) {
                    tracing::warn!("failed to wipe corrupted archive: {}", e);
                }
                BTreeMap::new()
            }
        }
    }

    fn write_archive_map(
        &self,
        entries: &BTreeMap<String, ArchivedAssessment>,
    ) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(entries)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.storage.set(ARCHIVE_KEY, &serialized)
    }

    /// Evict strictly oldest-by-timestamp entries until at most `cap`
    /// remain
    fn evict_oldest(entries: &mut BTreeMap<String, ArchivedAssessment>, cap: usize) {
        while entries.len() > cap {
            let oldest = entries
                .values()
                .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.key.cmp(&b.key)))
                .map(|a| a.key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!("evicting archived assessment '{}'", key);
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl std::fmt::Debug for AssessmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentStore")
            .field("total_phases", &self.total_phases)
            .field("retention_cap", &self.retention_cap)
            .field("prune_to", &self.prune_to)
            .finish()
    }
}
