//! Background maintenance for the topic graph.

pub mod background_consolidation;

pub use background_consolidation::{BackgroundConsolidation, MaintenanceConfig};
