//! Property-based tests

pub mod drain_proptest;
