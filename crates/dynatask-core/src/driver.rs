//! The test driver: runs a model's entry point against synthetic examples.
//!
//! Two modes are supported:
//!
//! - **Individual**: one entry-point call per example, each wrapped as
//!   `[{"body": <example>}]`. Exactly one reply is expected per call.
//! - **Batched**: every example is serialized to one JSON line, the lines
//!   are joined into a single body, and the entry point is called once. The
//!   single string reply is split on newlines and matched positionally.
//!
//! The driver is fail-fast. The first decode or verification failure aborts
//! the run with an error naming the offending example; there is no partial
//! success report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::{HandlerReply, RequestEnvelope, SyntheticExample},
};

use crate::{
    lifecycle::ServingContext,
    traits::{EntryPoint, Verifier},
};

/// How examples are delivered to the entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    Individual,
    Batched,
}

/// The record of one verified example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleOutcome {
    pub index: usize,
    pub uid: String,
    /// The decoded response that passed verification.
    pub response: Value,
}

/// Summary of a completed run. Only produced when every example passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub task: String,
    pub mode: TestMode,
    pub outcomes: Vec<ExampleOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TestReport {
    pub fn passed(&self) -> usize {
        self.outcomes.len()
    }
}

/// Drives an entry point through a set of synthetic examples.
///
/// Construct one driver per task. The driver owns the trusted verifier and
/// the serving context; the entry point under test is borrowed per run.
pub struct TestDriver {
    task: String,
    verifier: Box<dyn Verifier>,
    context: ServingContext,
}

impl TestDriver {
    pub fn new(task: impl Into<String>, verifier: Box<dyn Verifier>, context: ServingContext) -> Self {
        Self {
            task: task.into(),
            verifier,
            context,
        }
    }

    /// Replace the serving context handed to the entry point.
    pub fn with_context(mut self, context: ServingContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    /// Run every example through `entry` in the requested mode.
    ///
    /// # Errors
    ///
    /// Returns the first failure, wrapped in `TaskIoError::ExampleFailed`
    /// when it can be attributed to a single example. A reply count that
    /// does not match the request is reported as `ResponseCount`.
    pub fn run(
        &self,
        entry: &mut dyn EntryPoint,
        examples: &[SyntheticExample],
        mode: TestMode,
    ) -> TaskIoResult<TestReport> {
        let started_at = Utc::now();
        info!(
            task = %self.task,
            ?mode,
            examples = examples.len(),
            "test run starting"
        );

        let outcomes = match mode {
            TestMode::Individual => self.run_individually(entry, examples)?,
            TestMode::Batched => self.run_batched(entry, examples)?,
        };

        info!(task = %self.task, passed = outcomes.len(), "test run passed");
        Ok(TestReport {
            task: self.task.clone(),
            mode,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn run_individually(
        &self,
        entry: &mut dyn EntryPoint,
        examples: &[SyntheticExample],
    ) -> TaskIoResult<Vec<ExampleOutcome>> {
        let total = examples.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, example) in examples.iter().enumerate() {
            debug!(index, total, uid = %example.uid, "sending example");

            let result = entry
                .handle(vec![RequestEnvelope::example(example)], &self.context)
                .and_then(single_reply)
                .and_then(|reply| decode_reply(reply, &example.uid))
                .and_then(|response| {
                    self.verifier.verify(&response, example)?;
                    Ok(response)
                });

            let response = result.map_err(|e| wrap_failure(index, example, e))?;
            outcomes.push(ExampleOutcome {
                index,
                uid: example.uid.clone(),
                response,
            });
        }

        Ok(outcomes)
    }

    fn run_batched(
        &self,
        entry: &mut dyn EntryPoint,
        examples: &[SyntheticExample],
    ) -> TaskIoResult<Vec<ExampleOutcome>> {
        let lines = examples
            .iter()
            .map(|e| serde_json::to_string(&e.to_value()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TaskIoError::Handler {
                reason: format!("failed to encode batch body: {e}"),
            })?;

        let replies = entry.handle(vec![RequestEnvelope::batch(lines.join("\n"))], &self.context)?;
        let body = match single_reply(replies)? {
            HandlerReply::Text(text) => text,
            HandlerReply::Json(Value::String(text)) => text,
            HandlerReply::Json(other) => {
                return Err(TaskIoError::ResponseShape {
                    reason: format!("batched reply must be a newline-separated string, got {other}"),
                })
            }
        };

        let reply_lines: Vec<&str> = body.lines().collect();
        if reply_lines.len() != examples.len() {
            warn!(
                expected = examples.len(),
                actual = reply_lines.len(),
                "batched reply line count mismatch"
            );
            return Err(TaskIoError::ResponseCount {
                expected: examples.len(),
                actual: reply_lines.len(),
            });
        }

        let mut outcomes = Vec::with_capacity(examples.len());
        for (index, (example, line)) in examples.iter().zip(reply_lines).enumerate() {
            debug!(index, uid = %example.uid, "verifying batched response");

            let response = decode_reply(HandlerReply::Text(line.to_string()), &example.uid)
                .and_then(|response| {
                    self.verifier.verify(&response, example)?;
                    Ok(response)
                })
                .map_err(|e| wrap_failure(index, example, e))?;

            outcomes.push(ExampleOutcome {
                index,
                uid: example.uid.clone(),
                response,
            });
        }

        Ok(outcomes)
    }
}

fn single_reply(mut replies: Vec<HandlerReply>) -> TaskIoResult<HandlerReply> {
    if replies.len() != 1 {
        return Err(TaskIoError::ResponseCount {
            expected: 1,
            actual: replies.len(),
        });
    }
    Ok(replies.remove(0))
}

/// Decode a reply into JSON. Mapping replies are already JSON.
fn decode_reply(reply: HandlerReply, uid: &str) -> TaskIoResult<Value> {
    match reply {
        HandlerReply::Json(value) => Ok(value),
        HandlerReply::Text(text) => {
            serde_json::from_str(&text).map_err(|e| TaskIoError::ResponseDecode {
                uid: uid.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

fn wrap_failure(index: usize, example: &SyntheticExample, error: TaskIoError) -> TaskIoError {
    warn!(index, uid = %example.uid, error = %error, "example failed");
    TaskIoError::ExampleFailed {
        index,
        uid: example.uid.clone(),
        source: Box::new(error),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
