//! Per-model setup configuration.
//!
//! Stored as pretty JSON at `<root>/.dynalab/<model>/setup_config.json`.
//! `validate` checks every referenced file against the project root and
//! returns a copy with all paths normalized to be root-relative.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dynatask_contracts::error::{TaskIoError, TaskIoResult};
use dynatask_core::lifecycle::ServingContext;

/// Directory, relative to the project root, holding per-model state.
pub const CONFIG_DIR: &str = ".dynalab";
pub const CONFIG_FILE: &str = "setup_config.json";

const REQUIREMENTS_FILE: &str = "requirements.txt";
const SETUP_FILE: &str = "setup.py";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupConfig {
    /// Task code the model answers, e.g. `"nli"`.
    pub task: String,
    /// Serialized model weights.
    pub checkpoint: String,
    /// Handler source implementing the entry point.
    pub handler: String,
    /// Whether `requirements.txt` should be installed.
    pub requirements: bool,
    /// Whether `setup.py` should be run.
    pub setup: bool,
    /// Extra files shipped with the handler. Must sit next to it.
    #[serde(default)]
    pub model_files: Vec<String>,
    /// Paths left out of the model archive.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl SetupConfig {
    pub fn path(root: &Path, model: &str) -> PathBuf {
        root.join(CONFIG_DIR).join(model).join(CONFIG_FILE)
    }

    pub fn exists(root: &Path, model: &str) -> bool {
        Self::path(root, model).is_file()
    }

    pub fn load(root: &Path, model: &str) -> TaskIoResult<Self> {
        let path = Self::path(root, model);
        let contents = std::fs::read_to_string(&path).map_err(|e| TaskIoError::ConfigError {
            reason: format!(
                "no setup config for model '{model}' at '{}': {e}",
                path.display()
            ),
        })?;
        serde_json::from_str(&contents).map_err(|e| TaskIoError::ConfigError {
            reason: format!("invalid setup config '{}': {e}", path.display()),
        })
    }

    /// Write as pretty JSON, creating the model's config directory.
    pub fn write(&self, root: &Path, model: &str) -> TaskIoResult<PathBuf> {
        let path = Self::path(root, model);
        let write_err = |e: std::io::Error| TaskIoError::ConfigError {
            reason: format!("failed to write '{}': {e}", path.display()),
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| TaskIoError::ConfigError {
            reason: format!("failed to serialize setup config: {e}"),
        })?;
        std::fs::write(&path, json).map_err(write_err)?;
        debug!(model, path = %path.display(), "wrote setup config");
        Ok(path)
    }

    /// Check the config against the project at `root`.
    ///
    /// Exclusions must exist. The checkpoint and handler must be files inside
    /// the root and not excluded. Model files must be files next to the
    /// handler. Requested requirements/setup files must exist at the root.
    pub fn validate(&self, root: &Path) -> TaskIoResult<SetupConfig> {
        if self.task.trim().is_empty() {
            return Err(invalid("task must not be empty"));
        }

        let root = canonical(root)?;

        let mut excluded = BTreeSet::new();
        for path in &self.exclude {
            excluded.insert(inside_root(&root, path, false)?);
        }

        let mut normalized = self.clone();
        normalized.exclude = excluded.iter().map(|p| p.display().to_string()).collect();

        let checkpoint = inside_root(&root, &self.checkpoint, true)?;
        let handler = inside_root(&root, &self.handler, true)?;
        for (key, path) in [("checkpoint", &checkpoint), ("handler", &handler)] {
            if excluded.contains(path) {
                return Err(invalid(&format!("{key} file '{}' cannot be excluded", path.display())));
            }
        }

        let handler_dir = handler.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut model_files = BTreeSet::new();
        for path in &self.model_files {
            let file = inside_root(&root, path, true)?;
            if file.parent().map(Path::to_path_buf).unwrap_or_default() != handler_dir {
                return Err(invalid(&format!(
                    "model file '{}' is not next to handler '{}'",
                    file.display(),
                    handler.display()
                )));
            }
            if excluded.contains(&file) {
                return Err(invalid(&format!("model file '{}' cannot be excluded", file.display())));
            }
            model_files.insert(file);
        }

        for (wanted, file) in [(self.requirements, REQUIREMENTS_FILE), (self.setup, SETUP_FILE)] {
            if wanted && !root.join(file).is_file() {
                return Err(invalid(&format!("'{file}' is requested but missing")));
            }
        }

        normalized.checkpoint = checkpoint.display().to_string();
        normalized.handler = handler.display().to_string();
        normalized.model_files = model_files.iter().map(|p| p.display().to_string()).collect();
        info!(task = %self.task, handler = %normalized.handler, "setup config validated");
        Ok(normalized)
    }

    /// The local serving context a handler built from this config receives.
    ///
    /// `model_dir` is the checkpoint's directory under `root`, and
    /// `serialized_file` is the checkpoint's file name inside it.
    pub fn serving_context(&self, root: &Path, model: &str) -> ServingContext {
        let checkpoint = Path::new(&self.checkpoint);
        let model_dir = match checkpoint.parent() {
            Some(parent) => root.join(parent),
            None => root.to_path_buf(),
        };
        ServingContext {
            model_name: model.to_string(),
            model_dir,
            serialized_file: checkpoint
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            batch_size: 1,
            gpu: None,
        }
    }
}

fn invalid(reason: &str) -> TaskIoError {
    TaskIoError::ConfigError {
        reason: reason.to_string(),
    }
}

fn canonical(path: &Path) -> TaskIoResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| invalid(&format!("'{}' is not a valid path: {e}", path.display())))
}

/// `path` (absolute or root-relative) as a root-relative path.
///
/// Fails when it does not exist, escapes the root, or is not a file while
/// `is_file` is set.
fn inside_root(root: &Path, path: &str, is_file: bool) -> TaskIoResult<PathBuf> {
    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }
    let real = canonical(&root.join(path))?;
    if is_file && !real.is_file() {
        return Err(invalid(&format!("'{path}' is not a file")));
    }
    real.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| invalid(&format!("'{path}' is outside the project root")))
}
