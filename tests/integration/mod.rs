//! Integration test suite for forgegraph
//!
//! End-to-end tests that bake runtime archives written by the fixtures in
//! `forgegraph::test_utils`, replace dependencies through a full `Build` and
//! drive the binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **pipeline**: Step chaining, tree adapters, memoization and side isolation
//! - **execution**: Running built-in steps and up-to-date checks
//! - **deobfuscation**: Dependency replacement, transitive modules and IDE imports
//! - **repository**: Synthetic Ivy repository layout and coordinates
//! - **cli**: The `forgegraph` binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod deobfuscation;
mod execution;
mod pipeline;
mod repository;
