//! Data Models
//!
//! Contains all data structures used throughout the engine.

pub mod assessment;
pub mod checkpoint;
pub mod config;
pub mod phase;
pub mod run;

pub use assessment::*;
pub use checkpoint::*;
pub use config::*;
pub use phase::*;
pub use run::*;
