//! Error types for the dynatask toolkit.
//!
//! All fallible operations return `TaskIoResult<T>`. Variants fall into four
//! groups: schema errors (broken configuration, never retried), verification
//! errors (a response violates the task contract), transport errors (the
//! entry point replied with something that cannot be decoded), and
//! configuration errors. Every variant carries enough context to name the
//! offending field or example.

use thiserror::Error;

/// The unified error type for the dynatask toolkit.
#[derive(Debug, Error)]
pub enum TaskIoError {
    // ── Schema errors ────────────────────────────────────────────────────────
    /// A field declares a type name the registry does not know.
    #[error("field '{field}' declares unknown type '{type_name}'")]
    UnknownType { field: String, type_name: String },

    /// A field's `reference_name` points at a field that does not exist in
    /// the lookup table for its collection.
    #[error("field '{field}' references '{reference}', which is not declared")]
    MissingReference { field: String, reference: String },

    /// A field references a field of the wrong kind.
    #[error("field '{field}' cannot reference '{reference}': {reason}")]
    InvalidReference {
        field: String,
        reference: String,
        reason: String,
    },

    /// A type-specific constructor argument is absent.
    #[error("field '{field}' of type '{type_name}' requires constructor argument '{parameter}'")]
    MissingParameter {
        field: String,
        type_name: String,
        parameter: String,
    },

    /// Two fields in the same collection share a name.
    #[error("field '{name}' is declared twice in the {collection} collection")]
    DuplicateField { collection: String, name: String },

    /// A field carried by examples uses a name the example itself owns.
    #[error("field '{name}' in the {collection} collection uses a reserved name")]
    ReservedField { collection: String, name: String },

    /// The schema artifact could not be parsed or has the wrong shape.
    #[error("malformed task schema: {reason}")]
    SchemaMalformed { reason: String },

    /// No schema artifact exists for the task code in any searched location.
    #[error("no task schema found for '{task}' (searched: {})", searched.join(", "))]
    SchemaNotFound { task: String, searched: Vec<String> },

    // ── Verification errors ──────────────────────────────────────────────────
    /// The response does not have the expected top-level shape.
    #[error("response has an unexpected shape: {reason}")]
    ResponseShape { reason: String },

    /// The response identifier does not echo the example uid.
    #[error("response id '{actual}' does not match example uid '{expected}'")]
    IdMismatch { expected: String, actual: String },

    /// The embedded signature differs from a fresh recomputation.
    #[error("signature mismatch: expected {expected}, got {actual}")]
    SignatureMismatch { expected: String, actual: String },

    /// A declared output field failed its type's verifier.
    #[error("output field '{field}' is invalid: {reason}")]
    FieldInvalid { field: String, reason: String },

    /// One or more target fields are absent from `model_response`.
    #[error("response is missing {} target field(s): {}", missing.len(), missing.join(", "))]
    MissingTargets { missing: Vec<String> },

    /// `model_response` contains fields the schema does not declare.
    #[error("response contains {} undeclared field(s): {}", extra.len(), extra.join(", "))]
    ExtraFields { extra: Vec<String> },

    // ── Transport errors ─────────────────────────────────────────────────────
    /// A reply could not be decoded as JSON.
    #[error("response for example '{uid}' is not valid JSON: {reason}")]
    ResponseDecode { uid: String, reason: String },

    /// The entry point returned the wrong number of replies.
    #[error("expected {expected} response(s) from the entry point, got {actual}")]
    ResponseCount { expected: usize, actual: usize },

    /// The model handler itself failed.
    #[error("model handler failed: {reason}")]
    Handler { reason: String },

    /// A per-example failure, tagged with the example it belongs to.
    #[error("example {index} ({uid}) failed: {source}")]
    ExampleFailed {
        index: usize,
        uid: String,
        source: Box<TaskIoError>,
    },

    // ── Configuration errors ─────────────────────────────────────────────────
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A report or preview could not be rendered as JSON.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

impl TaskIoError {
    /// Return the innermost error, looking through `ExampleFailed` wrappers.
    pub fn root(&self) -> &TaskIoError {
        match self {
            TaskIoError::ExampleFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience alias used throughout the dynatask crates.
pub type TaskIoResult<T> = Result<T, TaskIoError>;
