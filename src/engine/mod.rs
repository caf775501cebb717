//! Top-level orchestration.

pub mod core;

pub use self::core::{ExploreResponse, MemoryBackends, MemoryCore, RecallResponse};
