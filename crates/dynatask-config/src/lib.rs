//! # dynatask-config
//!
//! Everything the toolkit reads from disk before a test run.
//!
//! - [`ToolkitConfig`]: TOML settings for the secret, schema search path,
//!   tolerances, and mock data seed.
//! - [`SchemaLoader`]: resolves a task code to its `io_def` JSON artifact
//!   and validates it into a `TaskSchema`.
//! - [`SetupConfig`]: the per-model `setup_config.json` and the serving
//!   context derived from it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use dynatask_config::{SchemaLoader, ToolkitConfig};
//!
//! let config = ToolkitConfig::from_file(Path::new("dynatask.toml"))?;
//! let schema = SchemaLoader::from_config(&config).load("nli")?;
//! ```

pub mod loader;
pub mod setup;
pub mod toolkit;

pub use loader::SchemaLoader;
pub use setup::SetupConfig;
pub use toolkit::ToolkitConfig;
