//! # Wavefall Engine
//!
//! Headless driver for Wavefall.
//!
//! This crate ties the simulation core to the outside world:
//! - Configuration file (TOML)
//! - Catalog loading from JSON or RON tables
//! - Save files (JSON or binary snapshots, written atomically)
//! - A lock-guarded session shared between driver threads
//! - A simulated clock and a scripted autopilot

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod autopilot;
pub mod catalog_loader;
pub mod config;
pub mod save_manager;
pub mod session;
pub mod timing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::autopilot::*;
    pub use crate::catalog_loader::*;
    pub use crate::config::*;
    pub use crate::save_manager::*;
    pub use crate::session::*;
    pub use crate::timing::*;
}

pub use prelude::*;
