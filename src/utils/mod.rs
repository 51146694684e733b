//! Utilities
//!
//! Cross-cutting helpers: error types and path resolution.

pub mod error;
pub mod paths;

pub use error::{EngineError, EngineResult};
