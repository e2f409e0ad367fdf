//! Core types for logcon.
//!
//! The canonical log record model, the static lookup tables that drive
//! classification, value and timestamp coercion, numeric helpers, the shared
//! error type and CLI settings.

pub mod catalog;
pub mod data_processors;
pub mod error;
pub mod models;
pub mod settings;
pub mod stats;

pub use error::{ConsolidatorError, Result};
