//! Core trait definitions for the dynatask test pipeline.
//!
//! These traits define the seams between the harness and the code under test:
//!
//! - `EntryPoint`: the model's serving entry point (untrusted, user code)
//! - `ModelHandler`: the initialize / preprocess / inference / postprocess
//!   lifecycle a served model implements
//! - `Verifier`: the trusted checker that validates each response
//!
//! The driver never inspects model internals. It hands request envelopes to
//! an `EntryPoint` and passes whatever comes back to a `Verifier`.

use serde_json::Value;

use dynatask_contracts::{
    error::TaskIoResult,
    example::{HandlerReply, RequestEnvelope, SyntheticExample},
};

use crate::lifecycle::ServingContext;

/// A model's inference entry point.
///
/// Accepts a list of request envelopes and an opaque serving context.
/// A conforming entry point returns exactly one reply per call.
pub trait EntryPoint {
    fn handle(
        &mut self,
        requests: Vec<RequestEnvelope>,
        context: &ServingContext,
    ) -> TaskIoResult<Vec<HandlerReply>>;
}

impl<F> EntryPoint for F
where
    F: FnMut(Vec<RequestEnvelope>, &ServingContext) -> TaskIoResult<Vec<HandlerReply>>,
{
    fn handle(
        &mut self,
        requests: Vec<RequestEnvelope>,
        context: &ServingContext,
    ) -> TaskIoResult<Vec<HandlerReply>> {
        self(requests, context)
    }
}

/// The serving lifecycle of a model.
///
/// Wrap an implementation in [`crate::lifecycle::ServedModel`] to get an
/// `EntryPoint` that initializes once and then runs
/// `preprocess → inference → postprocess` on every call.
pub trait ModelHandler {
    /// Whatever `preprocess` hands to `inference`.
    type Prepared;
    /// Whatever `inference` hands to `postprocess`.
    type Inferred;

    /// One-time resource load. Called at most once per `ServedModel`.
    fn initialize(&mut self, context: &ServingContext) -> TaskIoResult<()>;

    /// Turn request envelopes into model input.
    fn preprocess(&self, requests: &[RequestEnvelope]) -> TaskIoResult<Self::Prepared>;

    /// Run the model.
    fn inference(&self, prepared: Self::Prepared) -> TaskIoResult<Self::Inferred>;

    /// Turn model output into replies. The originating requests are passed
    /// back so responses can echo uids and sign over input values.
    fn postprocess(
        &self,
        inferred: Self::Inferred,
        requests: &[RequestEnvelope],
    ) -> TaskIoResult<Vec<HandlerReply>>;
}

/// The response verifier: the gate every reply must pass.
///
/// Implementations are **trusted** and must be deterministic. They check a
/// decoded response against the example it answers and return the first
/// violation found.
pub trait Verifier: Send + Sync {
    fn verify(&self, response: &Value, example: &SyntheticExample) -> TaskIoResult<()>;
}
