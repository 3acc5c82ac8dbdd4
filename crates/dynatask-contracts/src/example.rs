//! Synthetic examples, model responses, and the request envelope.
//!
//! These are the values flowing between the harness and a model's entry
//! point. Examples are derived data, recomputed for every test run;
//! responses are transient and consumed within one run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which an example carries its identifier. Reserved: no input or
/// context field may use it.
pub const EXAMPLE_UID_KEY: &str = "uid";
/// Key under which a response echoes the example uid.
pub const RESPONSE_ID_KEY: &str = "id";
/// Key under which a response carries its output values.
pub const MODEL_RESPONSE_KEY: &str = "model_response";
/// Key under which a response carries its signature.
pub const SIGNATURE_KEY: &str = "signature";

/// One generated stand-in for real model input.
///
/// Serializes flat: `{"uid": "...", "<field>": <value>, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticExample {
    /// Unique identifier the response must echo.
    pub uid: String,
    /// Field name → generated value, for every non-target input and context field.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SyntheticExample {
    /// Create an empty example with a fresh v4 uid.
    pub fn new() -> Self {
        Self::with_uid(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            fields: Map::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The example as a JSON object, including `uid`.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(EXAMPLE_UID_KEY.to_string(), Value::String(self.uid.clone()));
        Value::Object(object)
    }
}

impl Default for SyntheticExample {
    fn default() -> Self {
        Self::new()
    }
}

/// A signed model response, in the generic three-key wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelResponse {
    /// Echo of the originating example's uid.
    pub id: String,
    /// Output-field name → predicted value.
    pub model_response: Map<String, Value>,
    /// Hex digest binding task, inputs, and outputs.
    pub signature: String,
}

impl ModelResponse {
    /// The response as a JSON object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(RESPONSE_ID_KEY.to_string(), Value::String(self.id.clone()));
        object.insert(
            MODEL_RESPONSE_KEY.to_string(),
            Value::Object(self.model_response.clone()),
        );
        object.insert(
            SIGNATURE_KEY.to_string(),
            Value::String(self.signature.clone()),
        );
        Value::Object(object)
    }
}

/// Preview of what a valid response looks like for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutput {
    /// Target names: present in every valid response.
    pub mandatory_fields: Vec<String>,
    /// Non-target outputs: the model may include them.
    pub optional_fields: Vec<String>,
    /// One example `{ "id", "model_response" }` record.
    pub output_entry: Value,
}

/// The body of one request handed to an entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// A single example, as a JSON object.
    Example(Value),
    /// Newline-separated JSON examples.
    Batch(String),
}

/// The minimal request envelope: `{"body": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub body: RequestBody,
}

impl RequestEnvelope {
    pub fn example(example: &SyntheticExample) -> Self {
        Self {
            body: RequestBody::Example(example.to_value()),
        }
    }

    pub fn batch(body: impl Into<String>) -> Self {
        Self {
            body: RequestBody::Batch(body.into()),
        }
    }
}

/// One reply from an entry point: a mapping, or a JSON-encoded string.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerReply {
    Json(Value),
    Text(String),
}
