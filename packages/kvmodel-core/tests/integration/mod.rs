//! Integration test suite.
//!
//! Exercises entity declaration, saves, batched retrieval and table
//! administration end to end against the in-memory store.

pub mod admin_tests;
pub mod batch_get_tests;
pub mod connection_tests;
pub mod field_round_trip_tests;
pub mod helpers;
pub mod save_tests;
