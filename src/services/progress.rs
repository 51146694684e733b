//! Progress Estimator
//!
//! Pure two-stage weighted model: the gating phase contributes its elapsed
//! time up to its estimate, then the cohort contributes as one concurrent
//! block bounded by its slowest member's estimate. Display heuristic only;
//! nothing here gates correctness or control flow.

use chrono::{DateTime, Utc};

use crate::models::phase::PhaseState;
use crate::models::run::{PhaseSnapshot, RunSnapshot};

/// Progress cap while any phase is still non-terminal
const MAX_PERCENT_BEFORE_SETTLED: f64 = 95.0;
/// Credit granted to a terminal cohort phase, as a fraction of the cohort
/// max estimate; smooths the bar past individual completions
const TERMINAL_COHORT_CREDIT: f64 = 0.5;

/// Wall-clock completion estimate for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEstimate {
    /// 0-100, capped at 95 until every phase is terminal
    pub percentage: f64,
    /// Estimated seconds remaining
    pub remaining_seconds: u64,
    /// Phases in the completed state
    pub completed_count: usize,
    /// Total number of phases
    pub total_count: usize,
}

fn elapsed_secs(phase: &PhaseSnapshot, now: DateTime<Utc>) -> f64 {
    match phase.started_at {
        Some(started) => {
            let end = phase.ended_at.unwrap_or(now);
            ((end - started).num_milliseconds() as f64 / 1000.0).max(0.0)
        }
        None => 0.0,
    }
}

/// Estimate completion for a run snapshot at the given instant
pub fn estimate(snapshot: &RunSnapshot, now: DateTime<Utc>) -> ProgressEstimate {
    let gating = &snapshot.phases[0];
    let cohort = &snapshot.phases[1..];

    let gating_estimate = gating.estimated_duration_secs as f64;
    // The cohort runs concurrently, so its wall-clock contribution is
    // bounded by its slowest member, not the sum
    let cohort_max = cohort
        .iter()
        .map(|p| p.estimated_duration_secs as f64)
        .fold(0.0, f64::max);
    let total_estimate = gating_estimate + cohort_max;

    let gating_contribution = match gating.state {
        PhaseState::Pending => 0.0,
        PhaseState::Active | PhaseState::Error => elapsed_secs(gating, now).min(gating_estimate),
        PhaseState::Completed => gating_estimate,
    };

    let cohort_contribution = if gating.state == PhaseState::Completed {
        cohort
            .iter()
            .map(|p| match p.state {
                PhaseState::Pending => 0.0,
                PhaseState::Active => elapsed_secs(p, now).min(cohort_max),
                PhaseState::Completed | PhaseState::Error => cohort_max * TERMINAL_COHORT_CREDIT,
            })
            .fold(0.0, f64::max)
    } else {
        0.0
    };

    let all_terminal = snapshot.phases.iter().all(|p| p.state.is_terminal());
    let contribution = gating_contribution + cohort_contribution;

    let percentage = if all_terminal {
        100.0
    } else if total_estimate <= 0.0 {
        0.0
    } else {
        (contribution / total_estimate * 100.0).min(MAX_PERCENT_BEFORE_SETTLED)
    };

    let remaining_seconds = if all_terminal {
        0
    } else {
        (total_estimate - contribution).max(0.0).round() as u64
    };

    ProgressEstimate {
        percentage,
        remaining_seconds,
        completed_count: snapshot
            .phases
            .iter()
            .filter(|p| p.state == PhaseState::Completed)
            .count(),
        total_count: snapshot.phases.len(),
    }
}
