//! A reference model that always knows a valid answer.
//!
//! `OracleHandler` reads the task schema, answers every declared output with
//! a value its type accepts, and signs the response. It stands in for a real
//! model so the harness can be exercised end to end, and its `Fault` modes
//! produce the specific defects the verifier must catch.

use serde_json::{Map, Value};
use tracing::{debug, info};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::{HandlerReply, ModelResponse, RequestBody, RequestEnvelope, SyntheticExample},
    schema::{Collection, FieldDef, IoType, TaskSchema},
};
use dynatask_core::{lifecycle::ServingContext, traits::ModelHandler};
use dynatask_registry::kinds::SELECTION_PREFIX_CHARS;
use dynatask_signature::ResponseSigner;

/// Key the `ExtraField` fault adds to `model_response`.
pub const EXTRA_FIELD: &str = "oracle_note";

/// A deliberate defect injected into every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Leave the first target out of `model_response`.
    DropTarget,
    /// Add an undeclared field to `model_response`.
    ExtraField,
    /// Corrupt the signature after signing.
    TamperSignature,
}

/// One decoded request.
#[derive(Debug, Clone)]
pub enum OracleInput {
    Single(SyntheticExample),
    Batch(Vec<SyntheticExample>),
}

/// One answered request, before rendering.
#[derive(Debug, Clone)]
pub enum OracleOutput {
    Single(ModelResponse),
    Batch(Vec<ModelResponse>),
}

pub struct OracleHandler {
    schema: TaskSchema,
    signer: ResponseSigner,
    fault: Fault,
    initializations: u32,
    context: Option<ServingContext>,
}

impl OracleHandler {
    pub fn new(schema: TaskSchema, signer: ResponseSigner) -> Self {
        Self {
            schema,
            signer,
            fault: Fault::None,
            initializations: 0,
            context: None,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    /// How many times `initialize` has run.
    pub fn initializations(&self) -> u32 {
        self.initializations
    }

    /// The serving context `initialize` was given, once it has run.
    pub fn context(&self) -> Option<&ServingContext> {
        self.context.as_ref()
    }

    /// A valid `model_response` for `example`, covering every declared output.
    pub fn answer(&self, example: &SyntheticExample) -> TaskIoResult<Map<String, Value>> {
        let mut response = Map::new();
        for field in self.schema.outputs() {
            response.insert(field.name.clone(), self.answer_field(field, example)?);
        }
        Ok(response)
    }

    fn answer_field(&self, field: &FieldDef, example: &SyntheticExample) -> TaskIoResult<Value> {
        let first_label = || {
            field
                .labels()
                .and_then(<[String]>::first)
                .cloned()
                .ok_or_else(|| handler_error(format!("'{}' declares no labels", field.name)))
        };

        let value = match field.io_type {
            IoType::String => Value::from("oracle"),
            IoType::Image => Value::from(""),
            IoType::Conf => Value::from(0.5),
            IoType::Multiclass | IoType::TargetLabel => Value::from(first_label()?),
            IoType::Multilabel => Value::Array(vec![Value::from(first_label()?)]),
            IoType::MulticlassProbs => {
                let labels = self
                    .referent(field)?
                    .labels()
                    .ok_or_else(|| handler_error(format!("'{}' references no labels", field.name)))?;
                let share = 1.0 / labels.len() as f64;
                Value::Object(labels.iter().map(|l| (l.clone(), Value::from(share))).collect())
            }
            IoType::ContextStringSelection => {
                let referent = self.referent(field)?;
                match example.get(&referent.name) {
                    Some(Value::String(text)) => {
                        Value::from(text.chars().take(SELECTION_PREFIX_CHARS).collect::<String>())
                    }
                    Some(Value::Array(items)) if !items.is_empty() => items[0].clone(),
                    _ => {
                        return Err(handler_error(format!(
                            "example '{}' has nothing to select from in '{}'",
                            example.uid, referent.name
                        )))
                    }
                }
            }
        };
        Ok(value)
    }

    fn referent(&self, field: &FieldDef) -> TaskIoResult<&FieldDef> {
        self.schema
            .referent(Collection::Output, &field.name)
            .map(|(_, def)| def)
            .ok_or_else(|| handler_error(format!("'{}' has no resolved reference", field.name)))
    }

    /// Answer, sign, and apply the configured fault.
    fn respond(&self, example: &SyntheticExample) -> TaskIoResult<ModelResponse> {
        let mut model_response = self.answer(example)?;
        match self.fault {
            Fault::DropTarget => {
                if let Some(target) = self.schema.targets().next() {
                    model_response.remove(&target.name);
                }
            }
            Fault::ExtraField => {
                model_response.insert(EXTRA_FIELD.to_string(), Value::from(true));
            }
            Fault::None | Fault::TamperSignature => {}
        }

        let mut response = self.signer.sign(&self.schema, example, model_response);
        if self.fault == Fault::TamperSignature {
            response.signature = tamper(&response.signature);
        }
        Ok(response)
    }
}

impl ModelHandler for OracleHandler {
    type Prepared = Vec<OracleInput>;
    type Inferred = Vec<OracleOutput>;

    fn initialize(&mut self, context: &ServingContext) -> TaskIoResult<()> {
        self.initializations += 1;
        self.context = Some(context.clone());
        info!(
            model = %context.model_name,
            model_dir = %context.model_dir.display(),
            task = %self.schema.task(),
            fault = ?self.fault,
            "oracle handler initialized"
        );
        Ok(())
    }

    fn preprocess(&self, requests: &[RequestEnvelope]) -> TaskIoResult<Self::Prepared> {
        requests
            .iter()
            .map(|request| match &request.body {
                RequestBody::Example(value) => decode_example(value.clone()).map(OracleInput::Single),
                RequestBody::Batch(text) => text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| {
                        serde_json::from_str(line)
                            .map_err(|e| handler_error(format!("undecodable batch line: {e}")))
                    })
                    .collect::<TaskIoResult<Vec<SyntheticExample>>>()
                    .map(OracleInput::Batch),
            })
            .collect()
    }

    fn inference(&self, prepared: Self::Prepared) -> TaskIoResult<Self::Inferred> {
        prepared
            .into_iter()
            .map(|input| match input {
                OracleInput::Single(example) => self.respond(&example).map(OracleOutput::Single),
                OracleInput::Batch(examples) => {
                    debug!(examples = examples.len(), "answering batch");
                    examples
                        .iter()
                        .map(|example| self.respond(example))
                        .collect::<TaskIoResult<Vec<_>>>()
                        .map(OracleOutput::Batch)
                }
            })
            .collect()
    }

    fn postprocess(
        &self,
        inferred: Self::Inferred,
        _requests: &[RequestEnvelope],
    ) -> TaskIoResult<Vec<HandlerReply>> {
        Ok(inferred
            .into_iter()
            .map(|output| match output {
                OracleOutput::Single(response) => HandlerReply::Json(response.to_value()),
                OracleOutput::Batch(responses) => HandlerReply::Text(
                    responses
                        .iter()
                        .map(|r| r.to_value().to_string())
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
            })
            .collect())
    }
}

fn decode_example(value: Value) -> TaskIoResult<SyntheticExample> {
    serde_json::from_value(value).map_err(|e| handler_error(format!("undecodable example: {e}")))
}

fn handler_error(reason: String) -> TaskIoError {
    TaskIoError::Handler { reason }
}

/// Flip the last hex digit.
fn tamper(signature: &str) -> String {
    let mut tampered = signature.to_string();
    match tampered.pop() {
        Some('0') => tampered.push('1'),
        Some(_) => tampered.push('0'),
        None => tampered.push('0'),
    }
    tampered
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tasks::bundled_schema;

    fn oracle(task: &str) -> OracleHandler {
        OracleHandler::new(
            bundled_schema(task).unwrap(),
            ResponseSigner::new("DYNATASK_ORACLE_UNIT", ""),
        )
    }

    fn qa_example() -> SyntheticExample {
        let mut example = SyntheticExample::with_uid("q-1");
        example.insert("question", json!("Where is it?"));
        example.insert("context", json!("Old Trafford is a football stadium"));
        example
    }

    #[test]
    fn answers_every_output() {
        let answer = oracle("hs").answer(&SyntheticExample::with_uid("h-1")).unwrap();
        assert_eq!(answer["label"], json!("hate"));
        assert_eq!(answer["prob"], json!({"hate": 0.5, "nothate": 0.5}));
    }

    #[test]
    fn selection_is_a_context_prefix() {
        let answer = oracle("qa").answer(&qa_example()).unwrap();
        assert_eq!(answer["answer"], json!("Old Traffo"));
        assert_eq!(answer["conf"], json!(0.5));
    }

    #[test]
    fn selection_without_context_is_a_handler_error() {
        let err = oracle("qa").answer(&SyntheticExample::with_uid("q-2")).unwrap_err();
        assert!(matches!(err, TaskIoError::Handler { .. }), "unexpected error: {err}");
    }

    #[test]
    fn drop_target_fault_removes_label() {
        let handler = oracle("hs").with_fault(Fault::DropTarget);
        let response = handler.respond(&SyntheticExample::with_uid("h-2")).unwrap();
        assert!(!response.model_response.contains_key("label"));
        assert!(response.model_response.contains_key("prob"));
    }

    #[test]
    fn tamper_changes_signature() {
        let clean = oracle("hs").respond(&SyntheticExample::with_uid("h-3")).unwrap();
        let tampered = oracle("hs")
            .with_fault(Fault::TamperSignature)
            .respond(&SyntheticExample::with_uid("h-3"))
            .unwrap();
        assert_ne!(clean.signature, tampered.signature);
        assert_eq!(clean.signature.len(), tampered.signature.len());
    }

    #[test]
    fn batch_bodies_get_one_line_per_example() {
        let handler = oracle("qa");
        let mut second = qa_example();
        second.uid = "q-9".to_string();
        let body = [qa_example(), second]
            .iter()
            .map(|e| e.to_value().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let requests = vec![RequestEnvelope::batch(body)];

        let prepared = handler.preprocess(&requests).unwrap();
        let inferred = handler.inference(prepared).unwrap();
        let replies = handler.postprocess(inferred, &requests).unwrap();

        assert_eq!(replies.len(), 1);
        match &replies[0] {
            HandlerReply::Text(text) => assert_eq!(text.lines().count(), 2),
            other => panic!("expected a text reply, got {other:?}"),
        }
    }
}
