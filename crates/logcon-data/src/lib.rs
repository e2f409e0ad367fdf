//! Normalization and aggregation for logcon.
//!
//! Turns raw producer logs into canonical records, computes statistics over
//! record collections, and reads batches and stored records from disk.

pub mod aggregator;
pub mod normalizer;
pub mod reader;

pub use logcon_core as core;
