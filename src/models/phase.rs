//! Phase Models
//!
//! The six analysis phases, their lifecycle state machine, and the ordered
//! registry that both the scheduler and the progress estimator consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for one analysis dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKey {
    /// Company overview - the gating phase; must complete before the cohort starts
    Company,
    /// Team assessment
    Team,
    /// Funding history
    Funding,
    /// Competitive landscape
    Competitive,
    /// Market analysis
    Market,
    /// IP and risk review
    IpRisk,
}

impl PhaseKey {
    /// All phases in registry order (gating phase first)
    pub const ALL: [PhaseKey; 6] = [
        PhaseKey::Company,
        PhaseKey::Team,
        PhaseKey::Funding,
        PhaseKey::Competitive,
        PhaseKey::Market,
        PhaseKey::IpRisk,
    ];

    /// The parallel cohort: every phase except the gating one
    pub const COHORT: [PhaseKey; 5] = [
        PhaseKey::Team,
        PhaseKey::Funding,
        PhaseKey::Competitive,
        PhaseKey::Market,
        PhaseKey::IpRisk,
    ];

    /// Whether this is the gating phase
    pub fn is_gating(&self) -> bool {
        matches!(self, PhaseKey::Company)
    }

    /// Parse a phase key from its wire string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "company" => Some(PhaseKey::Company),
            "team" => Some(PhaseKey::Team),
            "funding" => Some(PhaseKey::Funding),
            "competitive" => Some(PhaseKey::Competitive),
            "market" => Some(PhaseKey::Market),
            "iprisk" => Some(PhaseKey::IpRisk),
            _ => None,
        }
    }

    /// Wire string for this key
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKey::Company => "company",
            PhaseKey::Team => "team",
            PhaseKey::Funding => "funding",
            PhaseKey::Competitive => "competitive",
            PhaseKey::Market => "market",
            PhaseKey::IpRisk => "iprisk",
        }
    }
}

impl std::fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of one phase within a run
///
/// Transitions: pending -> active -> completed, or active -> error.
/// An error phase may be retried: error -> pending -> active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Pending,
    Active,
    Completed,
    Error,
}

impl PhaseState {
    /// Whether the phase has reached a terminal state for this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseState::Completed | PhaseState::Error)
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        PhaseState::Pending
    }
}

/// Static description of one phase: identity, label, and tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Stable identifier
    pub key: PhaseKey,
    /// Human label
    pub display_name: String,
    /// Heuristic duration used only for progress display
    pub estimated_duration_secs: u64,
    /// Per-call timeout enforced by the remote client
    pub timeout_secs: u64,
}

/// Ordered list of the six phases with their tuning
///
/// The first entry is the gating phase; the remainder form the parallel
/// cohort with no ordering constraints among themselves.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    specs: Vec<PhaseSpec>,
}

impl PhaseRegistry {
    /// Build a registry from explicit specs
    ///
    /// Specs are reordered into `PhaseKey::ALL` order; missing phases get
    /// default tuning.
    pub fn new(specs: Vec<PhaseSpec>) -> Self {
        let mut ordered = Vec::with_capacity(PhaseKey::ALL.len());
        for key in PhaseKey::ALL {
            let spec = specs
                .iter()
                .find(|s| s.key == key)
                .cloned()
                .unwrap_or_else(|| Self::default_spec(key));
            ordered.push(spec);
        }
        Self { specs: ordered }
    }

    /// Default tuning for one phase
    fn default_spec(key: PhaseKey) -> PhaseSpec {
        let (display_name, estimated_duration_secs, timeout_secs) = match key {
            PhaseKey::Company => ("Company Overview", 75, 720),
            PhaseKey::Team => ("Team Assessment", 150, 480),
            PhaseKey::Funding => ("Funding History", 140, 480),
            PhaseKey::Competitive => ("Competitive Landscape", 160, 600),
            PhaseKey::Market => ("Market Analysis", 180, 600),
            PhaseKey::IpRisk => ("IP & Risk Review", 170, 720),
        };
        PhaseSpec {
            key,
            display_name: display_name.to_string(),
            estimated_duration_secs,
            timeout_secs,
        }
    }

    /// All specs in registry order
    pub fn specs(&self) -> &[PhaseSpec] {
        &self.specs
    }

    /// Look up one phase's spec
    pub fn spec(&self, key: PhaseKey) -> &PhaseSpec {
        // The constructor guarantees all six keys are present.
        self.specs
            .iter()
            .find(|s| s.key == key)
            .expect("registry contains every phase key")
    }

    /// The gating phase's spec
    pub fn gating(&self) -> &PhaseSpec {
        &self.specs[0]
    }

    /// Total number of phases
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty (never true for a built registry)
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// One phase's record within a run: spec, state, timing, and outcome
#[derive(Debug, Clone)]
pub struct PhaseRecord {
    /// Static description
    pub spec: PhaseSpec,
    /// Current lifecycle state
    pub state: PhaseState,
    /// When the phase left pending, if it has
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase reached a terminal state, if it has
    pub ended_at: Option<DateTime<Utc>>,
    /// Opaque payload from the remote client, present once completed
    pub result: Option<serde_json::Value>,
    /// Last error encountered, present only in the error state
    pub failure: Option<String>,
}

impl PhaseRecord {
    /// Create a fresh pending record
    pub fn new(spec: PhaseSpec) -> Self {
        Self {
            spec,
            state: PhaseState::Pending,
            started_at: None,
            ended_at: None,
            result: None,
            failure: None,
        }
    }

    /// Transition pending/error -> active.
    ///
    /// Returns false without side effects if the phase is already active or
    /// completed, so a second concurrent begin never launches a duplicate
    /// remote call.
    pub fn begin(&mut self) -> bool {
        match self.state {
            PhaseState::Pending | PhaseState::Error => {
                self.state = PhaseState::Active;
                self.started_at = Some(Utc::now());
                self.ended_at = None;
                self.failure = None;
                true
            }
            PhaseState::Active | PhaseState::Completed => false,
        }
    }

    /// Transition active -> completed with the client's payload
    pub fn complete(&mut self, result: serde_json::Value) {
        self.state = PhaseState::Completed;
        self.ended_at = Some(Utc::now());
        self.result = Some(result);
        self.failure = None;
    }

    /// Transition active -> error with the failure message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = PhaseState::Error;
        self.ended_at = Some(Utc::now());
        self.failure = Some(error.into());
    }

    /// Phase key shorthand
    pub fn key(&self) -> PhaseKey {
        self.spec.key
    }
}
