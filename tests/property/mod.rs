//! Property-based tests for the circuit lifecycle manager.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for every policy.

pub mod reconnect;
