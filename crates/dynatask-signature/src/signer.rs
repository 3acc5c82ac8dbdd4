//! Secret resolution and response signing.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::{ModelResponse, SyntheticExample},
    schema::TaskSchema,
};

use crate::digest::{compute_signature, signature_inputs};

/// Environment variable the secret is read from unless configured otherwise.
pub const DEFAULT_SECRET_ENV: &str = "MY_SECRET";

/// Signs and checks model responses with a process-wide secret.
///
/// The secret is read from the environment on every call, so rotating it
/// takes effect immediately. Signatures made under the old secret stop
/// verifying at the same moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSigner {
    secret_env: String,
    default_secret: String,
}

impl ResponseSigner {
    pub fn new(secret_env: impl Into<String>, default_secret: impl Into<String>) -> Self {
        Self {
            secret_env: secret_env.into(),
            default_secret: default_secret.into(),
        }
    }

    pub fn secret_env(&self) -> &str {
        &self.secret_env
    }

    /// The current secret: the environment variable if set, else the default.
    ///
    /// An empty default is only suitable for local testing.
    pub fn secret(&self) -> String {
        std::env::var(&self.secret_env).unwrap_or_else(|_| self.default_secret.clone())
    }

    /// The signature `model_response` should carry as an answer to `example`.
    pub fn signature_for(
        &self,
        schema: &TaskSchema,
        example: &SyntheticExample,
        model_response: &Map<String, Value>,
    ) -> String {
        let (inputs, outputs) = signature_inputs(schema, model_response, example);
        compute_signature(&self.secret(), schema.task(), &inputs, &outputs)
    }

    /// Wrap `model_response` into a signed response for `example`.
    pub fn sign(
        &self,
        schema: &TaskSchema,
        example: &SyntheticExample,
        model_response: Map<String, Value>,
    ) -> ModelResponse {
        let signature = self.signature_for(schema, example, &model_response);
        debug!(task = %schema.task(), uid = %example.uid, "signed response");
        ModelResponse {
            id: example.uid.clone(),
            model_response,
            signature,
        }
    }

    /// Recompute the signature of `model_response` and compare.
    pub fn verify(
        &self,
        schema: &TaskSchema,
        example: &SyntheticExample,
        model_response: &Map<String, Value>,
        signature: &str,
    ) -> TaskIoResult<()> {
        let expected = self.signature_for(schema, example, model_response);
        if expected != signature {
            warn!(
                task = %schema.task(),
                uid = %example.uid,
                secret_env = %self.secret_env,
                "signature mismatch"
            );
            return Err(TaskIoError::SignatureMismatch {
                expected,
                actual: signature.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ResponseSigner {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ENV, "")
    }
}
