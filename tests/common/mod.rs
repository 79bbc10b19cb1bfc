//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Outbox database fixtures
//! - Scripted transports
//! - Custom assertion macros

pub mod database;

// Re-export commonly used utilities
pub use database::*;
pub use transport::*;
