//! # Tunebatch Common Library
//!
//! Shared code for the tunebatch pipeline service including:
//! - Error types (Error enum)
//! - Progress event types and the broadcast EventBus
//! - Configuration loading and working-directory resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
