//! Toolkit-wide settings, read from TOML.
//!
//! Every key is optional:
//!
//! ```toml
//! secret_env = "MY_SECRET"
//! default_secret = ""
//! schema_dirs = [".dynalab", "/home/model-server/code"]
//! pool_seed = 7
//!
//! [tolerances]
//! probability_sum = 1e-4
//! confidence_range = 1e-4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    verify::Tolerances,
};
use dynatask_signature::{ResponseSigner, DEFAULT_SECRET_ENV};

/// Where task schema artifacts are looked for, in order.
pub const DEFAULT_SCHEMA_DIRS: [&str; 2] = [".dynalab", "/home/model-server/code"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    /// Environment variable holding the signing secret.
    pub secret_env: String,
    /// Secret used when `secret_env` is unset.
    pub default_secret: String,
    pub schema_dirs: Vec<PathBuf>,
    pub tolerances: Tolerances,
    /// Seed for reproducible mock data pools. Unset means OS entropy.
    pub pool_seed: Option<u64>,
}

impl ToolkitConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TaskIoError::ConfigError` if the TOML is malformed or carries
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> TaskIoResult<Self> {
        toml::from_str(s).map_err(|e| TaskIoError::ConfigError {
            reason: format!("failed to parse toolkit TOML: {e}"),
        })
    }

    /// Read the file at `path` and parse it as TOML.
    pub fn from_file(path: &Path) -> TaskIoResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TaskIoError::ConfigError {
            reason: format!("failed to read toolkit config '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The signer this configuration describes.
    pub fn signer(&self) -> ResponseSigner {
        ResponseSigner::new(&self.secret_env, &self.default_secret)
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            secret_env: DEFAULT_SECRET_ENV.to_string(),
            default_secret: String::new(),
            schema_dirs: DEFAULT_SCHEMA_DIRS.iter().map(PathBuf::from).collect(),
            tolerances: Tolerances::default(),
            pool_seed: None,
        }
    }
}
