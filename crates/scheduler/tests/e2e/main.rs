//! E2E integration tests for vigil-scheduler.
//!
//! These tests drive a fully wired engine against scripted watchers and
//! auditors, and assert on the journal of collaborator calls and on the
//! exception records left behind.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (call journal, mocks, fixture builder)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p vigil-scheduler --test e2e
//! ```

mod scenarios;
