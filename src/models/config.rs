//! Engine Configuration
//!
//! Tuning for phase durations/timeouts and archive retention, loadable
//! from a JSON file. Every field carries a serde default so older config
//! files keep loading as new knobs are added.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::phase::{PhaseKey, PhaseRegistry, PhaseSpec};
use crate::utils::error::{EngineError, EngineResult};

/// Tuning for a single phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTuning {
    /// Human label override
    #[serde(default)]
    pub display_name: Option<String>,
    /// Heuristic duration for progress display, in seconds
    #[serde(default = "default_estimated_duration")]
    pub estimated_duration_secs: u64,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_estimated_duration() -> u64 {
    150
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

impl Default for PhaseTuning {
    fn default() -> Self {
        Self {
            display_name: None,
            estimated_duration_secs: default_estimated_duration(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Config format version
    #[serde(default = "default_version")]
    pub version: String,
    /// Per-phase tuning overrides, keyed by phase key string
    #[serde(default)]
    pub phases: HashMap<String, PhaseTuning>,
    /// Maximum number of archived assessments kept
    #[serde(default = "default_archive_retention")]
    pub archive_retention: usize,
    /// Entries kept when a quota rejection forces a prune
    #[serde(default = "default_archive_prune_to")]
    pub archive_prune_to: usize,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_archive_retention() -> usize {
    50
}

fn default_archive_prune_to() -> usize {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            phases: HashMap::new(),
            archive_retention: default_archive_retention(),
            archive_prune_to: default_archive_prune_to(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file with pretty formatting
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the given path, or fall back to defaults when the file is
    /// absent or unreadable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Validate tuning values
    pub fn validate(&self) -> EngineResult<()> {
        if self.archive_retention == 0 {
            return Err(EngineError::config("archive_retention must be at least 1"));
        }
        if self.archive_prune_to > self.archive_retention {
            return Err(EngineError::config(
                "archive_prune_to must not exceed archive_retention",
            ));
        }
        for (key, tuning) in &self.phases {
            if PhaseKey::from_str(key).is_none() {
                return Err(EngineError::config(format!("unknown phase key: {}", key)));
            }
            if tuning.timeout_secs == 0 {
                return Err(EngineError::config(format!(
                    "phase '{}' timeout must be positive",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Build the phase registry: built-in defaults overlaid with any
    /// per-phase tuning from this config
    pub fn registry(&self) -> PhaseRegistry {
        let defaults = PhaseRegistry::default();
        let specs = defaults
            .specs()
            .iter()
            .map(|spec| match self.phases.get(spec.key.as_str()) {
                Some(tuning) => PhaseSpec {
                    key: spec.key,
                    display_name: tuning
                        .display_name
                        .clone()
                        .unwrap_or_else(|| spec.display_name.clone()),
                    estimated_duration_secs: tuning.estimated_duration_secs,
                    timeout_secs: tuning.timeout_secs,
                },
                None => spec.clone(),
            })
            .collect();
        PhaseRegistry::new(specs)
    }
}
