//! Integration Tests Module
//!
//! End-to-end tests for the analysis engine: orchestrator scheduling and
//! event order, checkpoint/archive durability across simulated reloads,
//! and interrupted-run recovery.


// Orchestrator scheduling, outcomes, cancellation, and retry
mod orchestrator_test;

// Checkpoint and archive durability
mod store_test;

// Interrupted-run detection and resume
mod recovery_test;
