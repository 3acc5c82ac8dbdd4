//! Task schema artifact loading.
//!
//! A task code resolves to the first existing `<dir>/<task>.json` across the
//! configured search directories. The raw artifact is checked against a JSON
//! Schema before typed decoding, so structural mistakes (a field without a
//! `type`, labels that are not strings) surface with a path to the problem.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    schema::TaskSchema,
};

use crate::toolkit::ToolkitConfig;

/// JSON Schema describing the `io_def` artifact shape.
fn artifact_shape() -> Value {
    json!({
        "type": "object",
        "required": ["task", "io_def"],
        "properties": {
            "task": { "type": "string", "minLength": 1 },
            "io_def": {
                "type": "object",
                "properties": {
                    "input": { "$ref": "#/$defs/fields" },
                    "context": { "$ref": "#/$defs/fields" },
                    "output": { "$ref": "#/$defs/fields" }
                },
                "additionalProperties": false
            }
        },
        "$defs": {
            "fields": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "type": { "type": "string" },
                        "constructor_args": {
                            "type": "object",
                            "properties": {
                                "labels": { "type": "array", "items": { "type": "string" } },
                                "reference_name": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Check a raw artifact's structure. Returns every violation joined.
pub fn check_artifact(artifact: &Value) -> TaskIoResult<()> {
    let validator =
        jsonschema::validator_for(&artifact_shape()).map_err(|e| TaskIoError::SchemaMalformed {
            reason: format!("invalid artifact shape document: {e}"),
        })?;

    let violations: Vec<String> = validator
        .iter_errors(artifact)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(TaskIoError::SchemaMalformed {
            reason: violations.join("; "),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchemaLoader {
    dirs: Vec<PathBuf>,
}

impl SchemaLoader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self::new(config.schema_dirs.clone())
    }

    /// Every path `task` may live at, in search order.
    pub fn candidates(&self, task: &str) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(format!("{task}.json")))
            .collect()
    }

    /// Load the schema for `task` from the first directory that has it.
    pub fn load(&self, task: &str) -> TaskIoResult<TaskSchema> {
        let candidates = self.candidates(task);
        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            warn!(task, searched = candidates.len(), "task schema not found");
            return Err(TaskIoError::SchemaNotFound {
                task: task.to_string(),
                searched: candidates.iter().map(|p| p.display().to_string()).collect(),
            });
        };

        Self::load_path_for(task, path)
    }

    /// Load the artifact at `path`, which must declare task `task`.
    pub fn load_path_for(task: &str, path: &Path) -> TaskIoResult<TaskSchema> {
        let schema = Self::load_path(path)?;
        if schema.task() != task {
            return Err(TaskIoError::SchemaMalformed {
                reason: format!(
                    "'{}' declares task '{}', expected '{task}'",
                    path.display(),
                    schema.task()
                ),
            });
        }
        Ok(schema)
    }

    /// Load and validate the artifact at an explicit path.
    pub fn load_path(path: &Path) -> TaskIoResult<TaskSchema> {
        debug!(path = %path.display(), "reading task schema");
        let contents = std::fs::read_to_string(path).map_err(|e| TaskIoError::SchemaMalformed {
            reason: format!("failed to read '{}': {e}", path.display()),
        })?;
        let artifact: Value =
            serde_json::from_str(&contents).map_err(|e| TaskIoError::SchemaMalformed {
                reason: format!("'{}' is not valid JSON: {e}", path.display()),
            })?;

        check_artifact(&artifact)?;
        let schema = TaskSchema::from_value(artifact)?;
        info!(
            task = %schema.task(),
            path = %path.display(),
            inputs = schema.inputs().len(),
            context = schema.context().len(),
            outputs = schema.outputs().len(),
            "loaded task schema"
        );
        Ok(schema)
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::from_config(&ToolkitConfig::default())
    }
}
