//! Test suite for postsync
//!
//! This module organizes all tests

#[macro_use]
pub mod common;
pub mod property;
