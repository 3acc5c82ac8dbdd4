//! # dynatask-contracts
//!
//! Shared types for the dynatask toolkit: task schemas, synthetic examples,
//! model responses, tolerances, and the unified error type.
//!
//! Every crate in the workspace imports from here. No generation,
//! verification, or signing logic lives in this crate, only data
//! definitions and load-time schema validation.

pub mod error;
pub mod example;
pub mod schema;
pub mod verify;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use error::TaskIoError;
    use example::{ModelResponse, RequestBody, RequestEnvelope, SyntheticExample};
    use verify::Tolerances;

    // ── SyntheticExample ─────────────────────────────────────────────────────

    #[test]
    fn example_serializes_flat() {
        let mut example = SyntheticExample::with_uid("u-1");
        example.insert("statement", json!("It is a good day"));

        let value = serde_json::to_value(&example).unwrap();
        assert_eq!(value, json!({ "uid": "u-1", "statement": "It is a good day" }));
        assert_eq!(value, example.to_value());

        let decoded: SyntheticExample = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, example);
    }

    #[test]
    fn example_uids_are_unique() {
        let uids: std::collections::HashSet<String> =
            (0..100).map(|_| SyntheticExample::new().uid).collect();
        assert_eq!(uids.len(), 100);
    }

    // ── ModelResponse ────────────────────────────────────────────────────────

    #[test]
    fn response_rejects_unknown_top_level_keys() {
        let result: Result<ModelResponse, _> = serde_json::from_value(json!({
            "id": "u-1",
            "model_response": {},
            "signature": "abc",
            "extra": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn response_to_value_matches_serde() {
        let response = ModelResponse {
            id: "u-1".to_string(),
            model_response: json!({ "label": "hate" }).as_object().unwrap().clone(),
            signature: "abc".to_string(),
        };
        assert_eq!(response.to_value(), serde_json::to_value(&response).unwrap());
    }

    // ── RequestEnvelope ──────────────────────────────────────────────────────

    #[test]
    fn envelope_wraps_body() {
        let example = SyntheticExample::with_uid("u-2");
        let envelope = RequestEnvelope::example(&example);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "body": { "uid": "u-2" } })
        );

        let batch = RequestEnvelope::batch("{}\n{}");
        assert_eq!(batch.body, RequestBody::Batch("{}\n{}".to_string()));
    }

    // ── Tolerances ───────────────────────────────────────────────────────────

    #[test]
    fn tolerances_default_and_partial_override() {
        let defaults = Tolerances::default();
        assert_eq!(defaults.probability_sum, 1e-4);
        assert_eq!(defaults.confidence_range, 1e-4);

        let partial: Tolerances = serde_json::from_value(json!({ "confidence_range": 0.01 })).unwrap();
        assert_eq!(partial.probability_sum, 1e-4);
        assert_eq!(partial.confidence_range, 0.01);
    }

    // ── TaskIoError display messages ─────────────────────────────────────────

    #[test]
    fn error_missing_targets_display() {
        let err = TaskIoError::MissingTargets {
            missing: vec!["label".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("missing 1 target field"));
        assert!(msg.contains("label"));
    }

    #[test]
    fn error_extra_fields_display() {
        let err = TaskIoError::ExtraFields {
            extra: vec!["bogus".to_string(), "other".to_string()],
        };
        assert!(err.to_string().contains("bogus, other"));
    }

    #[test]
    fn error_schema_not_found_lists_paths() {
        let err = TaskIoError::SchemaNotFound {
            task: "nli".to_string(),
            searched: vec![".dynalab/nli.json".to_string(), "/srv/nli.json".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'nli'"));
        assert!(msg.contains(".dynalab/nli.json, /srv/nli.json"));
    }

    #[test]
    fn example_failed_exposes_root_cause() {
        let err = TaskIoError::ExampleFailed {
            index: 2,
            uid: "u-9".to_string(),
            source: Box::new(TaskIoError::IdMismatch {
                expected: "u-9".to_string(),
                actual: "u-8".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("example 2 (u-9)"));
        assert!(msg.contains("u-8"));
        assert!(matches!(err.root(), TaskIoError::IdMismatch { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
