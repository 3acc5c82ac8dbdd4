//! # dynatask-ref-models
//!
//! Reference material for exercising the dynatask harness without a real
//! model:
//!
//! - **Bundled tasks**: `nli`, `qa`, `hs` (hate speech) and `sentiment`
//!   schemas, embedded at compile time.
//! - **Oracle model**: a `ModelHandler` that answers every declared output
//!   validly and signs its responses, with optional injected faults.
//! - **Scenarios**: per-example runs, batched runs, and defect detection.
//!
//! No network access and no model weights are involved.

pub mod oracle;
pub mod scenarios;
pub mod tasks;

pub use oracle::{Fault, OracleHandler};
pub use scenarios::Harness;
pub use tasks::{bundled_schema, BUNDLED_TASKS};
