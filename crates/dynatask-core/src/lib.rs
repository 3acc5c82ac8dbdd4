//! # dynatask-core
//!
//! The harness side of the task I/O contract.
//!
//! This crate provides:
//! - The trait seams (`EntryPoint`, `ModelHandler`, `Verifier`)
//! - `ServedModel`, which gives a `ModelHandler` its guarded lifecycle
//! - The `TestDriver` that feeds synthetic examples to an entry point, in
//!   individual or batched mode, and verifies every reply
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dynatask_core::{TestDriver, TestMode, lifecycle::{ServedModel, ServingContext}};
//!
//! let driver = TestDriver::new("nli", Box::new(verifier), ServingContext::local("my-model"));
//! let report = driver.run(&mut ServedModel::new(handler), &examples, TestMode::Individual)?;
//! ```

pub mod driver;
pub mod lifecycle;
pub mod traits;

pub use driver::{TestDriver, TestMode, TestReport};
