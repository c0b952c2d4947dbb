//! fjgate workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual fjgate functionality is in the workspace member crates:
//! - `fjgate-types`: Shared types and JSON schemas
//! - `fjgate-domain`: Pure bound, input and aggregation logic
//! - `fjgate-config`: Config file loading and range parsing
//! - `fjgate-adapters`: Process execution
//! - `fjgate-app`: Trial scheduling, use cases and rendering
//! - `fjgate` (fjgate-cli): CLI interface
