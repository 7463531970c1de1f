//! # PMV Common Library
//!
//! Shared code for the property-management validation crates:
//! - Error types
//! - Configuration loading (TOML + environment overrides)
//! - Logging initialisation
//! - Real-time event types and the broadcast EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
