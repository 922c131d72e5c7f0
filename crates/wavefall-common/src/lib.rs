//! # Wavefall Common
//!
//! Common types, utilities, and shared abstractions for Wavefall.
//!
//! This crate provides foundational types used across all Wavefall crates:
//! - ID types (EntityId and the string-backed catalog ids)
//! - Version information for persisted schemas
//! - The recoverable error taxonomy
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
