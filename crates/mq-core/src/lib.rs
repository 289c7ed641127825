//! mq-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for the other mq-* crates,
//! providing type-safe identifiers, a unified error type, catalog and
//! account enums, and application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod kinds;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use kinds::*;
