//! Deterministic, pure logic for label reconciliation.
//!
//! Core modules must be free of I/O side effects. They operate on snapshots
//! handed over by the `io` adapters and return decisions the orchestrator acts on.

pub mod case;
pub mod cursor;
pub mod decision;
pub mod filter;
pub mod guard;
pub mod policy;
pub mod redirects;
pub mod types;
