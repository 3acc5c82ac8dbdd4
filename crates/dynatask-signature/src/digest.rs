//! Keyed digest primitives.
//!
//! Digest input layout (bytes, in order):
//!   1. secret as UTF-8 bytes
//!   2. task code as UTF-8 bytes
//!   3. for each input field, in lexicographic key order: its canonical string
//!   4. for each output field, in lexicographic key order: its canonical string
//!
//! Field names themselves are not hashed, only their order matters.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use dynatask_contracts::{example::SyntheticExample, schema::TaskSchema};

/// The string a value contributes to the digest.
///
/// Strings contribute their raw contents. Every other value contributes its
/// compact JSON rendering, so `0.5` hashes as `0.5` and `true` as `true`.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SHA-256 over the secret, the task code, and both field maps.
///
/// Returns a lowercase 64-character hex string.
pub fn compute_signature(
    secret: &str,
    task: &str,
    inputs: &Map<String, Value>,
    outputs: &Map<String, Value>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(task.as_bytes());
    for map in [inputs, outputs] {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort_unstable();
        for key in keys {
            if let Some(value) = map.get(key) {
                hasher.update(canonical_string(value).as_bytes());
            }
        }
    }
    hex::encode(hasher.finalize())
}

/// The input and output maps a response signature covers.
///
/// Inputs are the example's synthesized fields; outputs are the declared
/// output fields present in `model_response`. Undeclared response keys are
/// left out and caught by the verifier's extra-field check instead.
pub fn signature_inputs(
    schema: &TaskSchema,
    model_response: &Map<String, Value>,
    example: &SyntheticExample,
) -> (Map<String, Value>, Map<String, Value>) {
    let inputs = schema
        .example_fields()
        .filter_map(|f| example.get(&f.name).map(|v| (f.name.clone(), v.clone())))
        .collect();
    let outputs = schema
        .outputs()
        .iter()
        .filter_map(|f| model_response.get(&f.name).map(|v| (f.name.clone(), v.clone())))
        .collect();
    (inputs, outputs)
}
