//! E2E test scenarios.
//!
//! Each module covers one part of the scheduling flow.

mod dependency;
mod fault_isolation;
mod queue_flow;
mod retry;
