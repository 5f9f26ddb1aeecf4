//! Single-worker debugging pipeline driving an external coding agent.
//!
//! Jobs advance through a fixed three-stage workflow (analyze →
//! generate-tests → fix-with-retries) on one worker thread, reporting
//! progress over a poll-drained event channel. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (jobs, events, sentinel
//!   matching). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (configuration, process
//!   execution, artifact writes, instruction building). Isolated to enable
//!   mocking in tests.
//!
//! Orchestration modules ([`engine`], [`pipeline`], [`events`]) coordinate
//! core logic with I/O to run submitted jobs.

pub mod core;
pub mod engine;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
