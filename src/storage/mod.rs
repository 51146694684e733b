//! Storage Layer
//!
//! The durable key-value boundary and the checkpoint/archive store built
//! on top of it.

pub mod keyvalue;
pub mod store;

pub use keyvalue::{FileStorage, KeyValueStorage, MemoryStorage, StorageError, StorageResult};
pub use store::{ArchiveWrite, AssessmentStore};
