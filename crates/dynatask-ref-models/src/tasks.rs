//! Task schemas shipped with the toolkit.
//!
//! Embedded at compile time, so the reference scenarios run without any
//! artifact on disk.

use serde_json::Value;

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    schema::TaskSchema,
};
use dynatask_config::loader::check_artifact;

const NLI: &str = include_str!("../tasks/nli.json");
const QA: &str = include_str!("../tasks/qa.json");
const HATE_SPEECH: &str = include_str!("../tasks/hs.json");
const SENTIMENT: &str = include_str!("../tasks/sentiment.json");

/// Codes of every bundled task.
pub const BUNDLED_TASKS: [&str; 4] = ["nli", "qa", "hs", "sentiment"];

/// The raw artifact text for `task`, if bundled.
pub fn bundled_artifact(task: &str) -> Option<&'static str> {
    match task {
        "nli" => Some(NLI),
        "qa" => Some(QA),
        "hs" => Some(HATE_SPEECH),
        "sentiment" => Some(SENTIMENT),
        _ => None,
    }
}

/// The validated schema for a bundled task.
pub fn bundled_schema(task: &str) -> TaskIoResult<TaskSchema> {
    let text = bundled_artifact(task).ok_or_else(|| TaskIoError::SchemaNotFound {
        task: task.to_string(),
        searched: vec!["<bundled>".to_string()],
    })?;
    let artifact: Value = serde_json::from_str(text).map_err(|e| TaskIoError::SchemaMalformed {
        reason: format!("bundled '{task}' is not valid JSON: {e}"),
    })?;
    check_artifact(&artifact)?;
    TaskSchema::from_value(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bundled_task_loads() {
        for task in BUNDLED_TASKS {
            let schema = bundled_schema(task).unwrap();
            assert_eq!(schema.task(), task);
            assert!(schema.targets().count() >= 1, "{task} declares no target");
        }
    }

    #[test]
    fn qa_answer_references_context() {
        let schema = bundled_schema("qa").unwrap();
        let names: Vec<&str> = schema.example_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["question", "context"]);
        assert_eq!(schema.optional_outputs().count(), 1);
    }

    #[test]
    fn unknown_task_is_not_found() {
        assert!(matches!(
            bundled_schema("flores"),
            Err(TaskIoError::SchemaNotFound { .. })
        ));
    }
}
