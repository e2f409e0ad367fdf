//! Runtime layer for logcon.
//!
//! Owns record storage, drives batch consolidation through the normalizer and
//! runs the periodic monitoring loop.

pub mod consolidation;
pub mod orchestrator;
pub mod store;

pub use logcon_core as core;
pub use logcon_data as data;
