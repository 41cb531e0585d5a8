//! Common utilities shared across the identity crates.
//!
//! This crate provides:
//! - Unified error handling
//! - Configuration structures
//! - Per-operation cancellation and deadlines

pub mod config;
pub mod context;
pub mod error;

pub use config::*;
pub use context::{CancellationToken, OperationContext};
pub use error::{AppError, AppResult, OptionExt};
