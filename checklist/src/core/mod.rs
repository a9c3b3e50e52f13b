//! Deterministic, pure workflow logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! state versions and return deterministic outputs suitable for tests.

pub mod artifact;
pub mod checklist_update;
pub mod coordinator;
pub mod error;
pub mod immutability;
pub mod invariants;
pub mod memory;
pub mod outputs;
pub mod state;
pub mod types;
