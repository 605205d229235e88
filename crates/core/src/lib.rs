//! Core types and utilities for the feed benchmark
//!
//! This crate provides shared types used across all components:
//! - Trading pair, source and quote definitions
//! - Merged snapshots
//! - Decoders for provider wire encodings
//! - Configuration and error types

pub mod types;
pub mod decode;
pub mod config;
pub mod errors;

pub use types::*;
pub use decode::*;
pub use config::*;
pub use errors::*;
