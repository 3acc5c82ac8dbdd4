//! Response verifier for the dynatask harness.
//!
//! `ResponseVerifier` implements the `Verifier` trait from `dynatask-core`.
//! Checks run in order and the first failure aborts:
//!
//! 1. **Shape**: the response is an object with exactly `id`,
//!    `model_response` and `signature`, validated with the `jsonschema` crate.
//! 2. **Identity**: `id` echoes the example's `uid`.
//! 3. **Signature**: the recomputed keyed digest matches `signature`.
//! 4. **Fields**: every declared output present in `model_response` passes
//!    its type's check from the `TypeRegistry`.
//! 5. **Coverage**: every target was supplied and nothing undeclared was.
//!
//! Step 5 uses two counters rather than a set difference: the response may
//! carry any subset of the optional outputs, but all of the targets and
//! nothing else.

use jsonschema::Validator;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::{ModelResponse, SyntheticExample},
    schema::{Collection, TaskSchema},
    verify::Tolerances,
};
use dynatask_core::traits::Verifier;
use dynatask_registry::{TypeRegistry, VerifyContext};
use dynatask_signature::ResponseSigner;

/// JSON Schema for the three-key response envelope.
fn response_shape() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "model_response": { "type": "object" },
            "signature": { "type": "string" }
        },
        "required": ["id", "model_response", "signature"],
        "additionalProperties": false
    })
}

pub struct ResponseVerifier {
    schema: TaskSchema,
    /// The envelope validator, compiled once. Holds the compile error if the
    /// shape document were ever rejected.
    shape: Result<Validator, String>,
    registry: TypeRegistry,
    signer: ResponseSigner,
    tolerances: Tolerances,
}

impl ResponseVerifier {
    /// A verifier with the built-in registry, default signer, and default
    /// tolerances.
    pub fn new(schema: TaskSchema) -> Self {
        let shape = jsonschema::validator_for(&response_shape())
            .map_err(|e| format!("invalid response shape document: {e}"));
        Self {
            schema,
            shape,
            registry: TypeRegistry::builtin(),
            signer: ResponseSigner::default(),
            tolerances: Tolerances::default(),
        }
    }

    pub fn with_signer(mut self, signer: ResponseSigner) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_tolerances(mut self, tolerances: Tolerances) -> Self {
        self.tolerances = tolerances;
        self
    }

    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn schema(&self) -> &TaskSchema {
        &self.schema
    }

    // ── Internal checks ──────────────────────────────────────────────────────

    fn check_shape(&self, response: &Value) -> TaskIoResult<ModelResponse> {
        let validator = self.shape.as_ref().map_err(|reason| TaskIoError::ResponseShape {
            reason: reason.clone(),
        })?;

        let violations: Vec<String> = validator
            .iter_errors(response)
            .map(|error| format!("at '{}': {}", error.instance_path, error))
            .collect();
        if !violations.is_empty() {
            let reason = violations.join("; ");
            warn!(task = %self.schema.task(), %reason, "response shape violation");
            return Err(TaskIoError::ResponseShape { reason });
        }

        serde_json::from_value(response.clone()).map_err(|e| TaskIoError::ResponseShape {
            reason: e.to_string(),
        })
    }

    fn check_fields(
        &self,
        model_response: &Map<String, Value>,
        example: &SyntheticExample,
    ) -> TaskIoResult<()> {
        let ctx = VerifyContext {
            schema: &self.schema,
            collection: Collection::Output,
            example,
            tolerances: &self.tolerances,
        };

        let mut missing = self.schema.targets().count();
        let mut extra = model_response.len();

        for field in self.schema.outputs() {
            let Some(value) = model_response.get(&field.name) else {
                continue;
            };
            extra -= 1;
            if self.schema.is_target(&field.name) {
                missing -= 1;
            }

            let kind = self.registry.lookup(field)?;
            kind.verify(value, field, &ctx).map_err(|reason| {
                warn!(field = %field.name, io_type = %field.io_type, %reason, "field check failed");
                TaskIoError::FieldInvalid {
                    field: field.name.clone(),
                    reason,
                }
            })?;
            debug!(field = %field.name, io_type = %field.io_type, "field check passed");
        }

        if missing > 0 {
            let missing = self
                .schema
                .targets()
                .filter(|f| !model_response.contains_key(&f.name))
                .map(|f| f.name.clone())
                .collect();
            return Err(TaskIoError::MissingTargets { missing });
        }
        if extra > 0 {
            let extra = model_response
                .keys()
                .filter(|name| self.schema.output(name).is_none())
                .cloned()
                .collect();
            return Err(TaskIoError::ExtraFields { extra });
        }
        Ok(())
    }
}

impl Verifier for ResponseVerifier {
    fn verify(&self, response: &Value, example: &SyntheticExample) -> TaskIoResult<()> {
        let response = self.check_shape(response)?;

        if response.id != example.uid {
            return Err(TaskIoError::IdMismatch {
                expected: example.uid.clone(),
                actual: response.id,
            });
        }

        self.signer.verify(
            &self.schema,
            example,
            &response.model_response,
            &response.signature,
        )?;

        self.check_fields(&response.model_response, example)?;
        debug!(task = %self.schema.task(), uid = %example.uid, "response verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use dynatask_contracts::schema::{FieldDef, IoType};

    use super::*;

    // ── Builder helpers ──────────────────────────────────────────────────────

    /// One string input, one `multiclass` output that is also an input.
    fn hate_speech_schema() -> TaskSchema {
        TaskSchema::new(
            "hs",
            vec![
                FieldDef::plain("statement", IoType::String),
                FieldDef::with_labels("label", IoType::Multiclass, &["hate", "nothate"]),
            ],
            vec![],
            vec![
                FieldDef::with_labels("label", IoType::Multiclass, &["hate", "nothate"]),
                FieldDef::with_reference("prob", IoType::MulticlassProbs, "label"),
            ],
        )
        .unwrap()
    }

    fn qa_schema() -> TaskSchema {
        TaskSchema::new(
            "qa",
            vec![
                FieldDef::plain("question", IoType::String),
                FieldDef::with_reference("answer", IoType::ContextStringSelection, "context"),
            ],
            vec![FieldDef::plain("context", IoType::String)],
            vec![
                FieldDef::with_reference("answer", IoType::ContextStringSelection, "context"),
                FieldDef::plain("conf", IoType::Conf),
            ],
        )
        .unwrap()
    }

    fn statement() -> SyntheticExample {
        let mut example = SyntheticExample::with_uid("ex-42");
        example.insert("statement", json!("It is a good day"));
        example
    }

    fn question() -> SyntheticExample {
        let mut example = SyntheticExample::with_uid("ex-7");
        example.insert("question", json!("What kind of day?"));
        example.insert("context", json!("It is a good day"));
        example
    }

    fn signer(var: &str) -> ResponseSigner {
        ResponseSigner::new(var, "")
    }

    fn verifier(schema: TaskSchema, var: &str) -> ResponseVerifier {
        ResponseVerifier::new(schema).with_signer(signer(var))
    }

    /// Sign `model_response` properly and render the wire value.
    fn signed(
        schema: &TaskSchema,
        var: &str,
        example: &SyntheticExample,
        model_response: Value,
    ) -> Value {
        let Value::Object(model_response) = model_response else {
            panic!("model_response must be an object");
        };
        signer(var).sign(schema, example, model_response).to_value()
    }

    // ── Happy paths ──────────────────────────────────────────────────────────

    /// A correctly signed response carrying the target passes.
    #[test]
    fn test_hate_speech_response_passes() {
        let var = "DYNATASK_VERIFY_HS_PASS";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(&schema, var, &example, json!({"label": "nothate"}));

        let result = verifier(schema, var).verify(&response, &example);
        assert!(result.is_ok(), "expected pass, got {result:?}");
    }

    /// Optional outputs may be supplied alongside the targets.
    #[test]
    fn test_optional_outputs_are_accepted() {
        let var = "DYNATASK_VERIFY_OPTIONAL";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(
            &schema,
            var,
            &example,
            json!({"label": "hate", "prob": {"hate": 0.7, "nothate": 0.3}}),
        );

        assert!(verifier(schema, var).verify(&response, &example).is_ok());
    }

    /// A probability distribution that sums to 1.00005 is within tolerance.
    #[test]
    fn test_probability_sum_within_tolerance() {
        let var = "DYNATASK_VERIFY_PROB_OK";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(
            &schema,
            var,
            &example,
            json!({"label": "hate", "prob": {"hate": 0.5, "nothate": 0.50005}}),
        );

        assert!(verifier(schema, var).verify(&response, &example).is_ok());
    }

    /// Sums exactly one tolerance away from 1 pass; a hair beyond fails.
    #[test]
    fn test_probability_sum_boundary() {
        let var = "DYNATASK_VERIFY_PROB_BOUNDARY";
        let schema = hate_speech_schema();
        let example = statement();
        let verifier = verifier(schema.clone(), var);
        let respond = |nothate: f64| {
            signed(
                &schema,
                var,
                &example,
                json!({"label": "hate", "prob": {"hate": 0.5, "nothate": nothate}}),
            )
        };

        for nothate in [0.5001, 0.4999] {
            let result = verifier.verify(&respond(nothate), &example);
            assert!(result.is_ok(), "nothate = {nothate}: {result:?}");
        }

        let err = verifier.verify(&respond(0.50011), &example).unwrap_err();
        match err {
            TaskIoError::FieldInvalid { field, reason } => {
                assert_eq!(field, "prob");
                assert!(reason.contains("sum"), "reason: {reason}");
            }
            other => panic!("expected FieldInvalid, got {other}"),
        }
    }

    /// Confidences exactly one tolerance outside [0, 1] still pass.
    #[test]
    fn test_confidence_boundary() {
        let var = "DYNATASK_VERIFY_CONF_BOUNDARY";
        let schema = qa_schema();
        let example = question();
        let verifier = verifier(schema.clone(), var);

        for conf in [1.0001, -0.0001] {
            let response = signed(&schema, var, &example, json!({"answer": "good", "conf": conf}));
            let result = verifier.verify(&response, &example);
            assert!(result.is_ok(), "conf = {conf}: {result:?}");
        }

        let response = signed(&schema, var, &example, json!({"answer": "good", "conf": 1.00011}));
        let err = verifier.verify(&response, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::FieldInvalid { .. }), "unexpected error: {err}");
    }

    /// The envelope validator is compiled at construction and serves every
    /// later response.
    #[test]
    fn test_shape_validator_compiled_once() {
        let var = "DYNATASK_VERIFY_SHAPE_ONCE";
        let schema = hate_speech_schema();
        let example = statement();
        let verifier = verifier(schema.clone(), var);
        assert!(verifier.shape.is_ok(), "shape document failed to compile");

        let good = signed(&schema, var, &example, json!({"label": "hate"}));
        for _ in 0..3 {
            assert!(verifier.verify(&good, &example).is_ok());
        }
        let bad = json!({"id": "ex-42", "model_response": {}});
        let err = verifier.verify(&bad, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::ResponseShape { .. }), "unexpected error: {err}");
    }

    /// A selection drawn from the example's context passes.
    #[test]
    fn test_context_selection_passes() {
        let var = "DYNATASK_VERIFY_QA_PASS";
        let schema = qa_schema();
        let example = question();
        let response = signed(&schema, var, &example, json!({"answer": "good", "conf": 0.9}));

        assert!(verifier(schema, var).verify(&response, &example).is_ok());
    }

    // ── Failures ─────────────────────────────────────────────────────────────

    /// Dropping the target yields a missing-target error naming it.
    #[test]
    fn test_missing_target_is_reported() {
        let var = "DYNATASK_VERIFY_MISSING";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(&schema, var, &example, json!({}));

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        match err {
            TaskIoError::MissingTargets { missing } => assert_eq!(missing, vec!["label"]),
            other => panic!("expected MissingTargets, got {other}"),
        }
    }

    /// An undeclared field in `model_response` is rejected.
    #[test]
    fn test_extra_field_is_rejected() {
        let var = "DYNATASK_VERIFY_EXTRA";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(&schema, var, &example, json!({"label": "hate", "mood": "sunny"}));

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        match err {
            TaskIoError::ExtraFields { extra } => assert_eq!(extra, vec!["mood"]),
            other => panic!("expected ExtraFields, got {other}"),
        }
    }

    /// A distribution summing to 1.01 fails the per-field check.
    #[test]
    fn test_probability_sum_out_of_tolerance() {
        let var = "DYNATASK_VERIFY_PROB_BAD";
        let schema = hate_speech_schema();
        let example = statement();
        let response = signed(
            &schema,
            var,
            &example,
            json!({"label": "hate", "prob": {"hate": 0.51, "nothate": 0.5}}),
        );

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(
            matches!(err, TaskIoError::FieldInvalid { ref field, .. } if field == "prob"),
            "unexpected error: {err}"
        );
    }

    /// A selection not present in the context fails.
    #[test]
    fn test_context_selection_must_be_contained() {
        let var = "DYNATASK_VERIFY_QA_BAD";
        let schema = qa_schema();
        let example = question();
        let response = signed(&schema, var, &example, json!({"answer": "rainy night"}));

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(
            matches!(err, TaskIoError::FieldInvalid { ref field, .. } if field == "answer"),
            "unexpected error: {err}"
        );
    }

    /// A fourth top-level key breaks the envelope shape.
    #[test]
    fn test_unexpected_top_level_key() {
        let var = "DYNATASK_VERIFY_SHAPE";
        let schema = hate_speech_schema();
        let example = statement();
        let mut response = signed(&schema, var, &example, json!({"label": "hate"}));
        response["extra"] = json!(true);

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::ResponseShape { .. }), "unexpected error: {err}");
    }

    /// A missing signature key is a shape error, not a signature error.
    #[test]
    fn test_missing_signature_key() {
        let var = "DYNATASK_VERIFY_NOSIG";
        let schema = hate_speech_schema();
        let example = statement();
        let response = json!({"id": example.uid, "model_response": {"label": "hate"}});

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::ResponseShape { .. }), "unexpected error: {err}");
    }

    /// A response answering another example is rejected.
    #[test]
    fn test_id_mismatch() {
        let var = "DYNATASK_VERIFY_ID";
        let schema = hate_speech_schema();
        let example = statement();
        let mut response = signed(&schema, var, &example, json!({"label": "hate"}));
        response["id"] = json!("someone-else");

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::IdMismatch { .. }), "unexpected error: {err}");
    }

    /// Editing an output after signing is detected.
    #[test]
    fn test_tampered_output() {
        let var = "DYNATASK_VERIFY_TAMPER";
        let schema = hate_speech_schema();
        let example = statement();
        let mut response = signed(&schema, var, &example, json!({"label": "hate"}));
        response["model_response"]["label"] = json!("nothate");

        let err = verifier(schema, var).verify(&response, &example).unwrap_err();
        assert!(matches!(err, TaskIoError::SignatureMismatch { .. }), "unexpected error: {err}");
    }

    /// Signed under one secret, verified under another: mismatch.
    #[test]
    fn test_secret_rotation_breaks_verification() {
        let var = "DYNATASK_VERIFY_ROTATE";
        let schema = hate_speech_schema();
        let example = statement();

        std::env::set_var(var, "s1");
        let response = signed(&schema, var, &example, json!({"label": "nothate"}));
        std::env::set_var(var, "s2");
        let result = verifier(schema, var).verify(&response, &example);
        std::env::remove_var(var);

        assert!(
            matches!(result, Err(TaskIoError::SignatureMismatch { .. })),
            "unexpected result: {result:?}"
        );
    }
}
