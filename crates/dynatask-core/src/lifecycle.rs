//! The served-model lifecycle.
//!
//! `ServedModel` adapts a `ModelHandler` to the `EntryPoint` contract. It
//! owns an explicit state machine:
//!
//!   NotInitialized → Initialized → (preprocess → inference → postprocess)*
//!
//! Initialization is guarded: once the handler is initialized, later calls
//! skip straight to the processing cycle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dynatask_contracts::{
    error::TaskIoResult,
    example::{HandlerReply, RequestEnvelope},
};

use crate::traits::{EntryPoint, ModelHandler};

/// Opaque serving information handed to every entry-point call.
///
/// Mirrors what a serving runtime would pass: where the model lives and how
/// it should be run. The harness builds a local stand-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingContext {
    pub model_name: String,
    pub model_dir: PathBuf,
    /// File name of the serialized checkpoint inside `model_dir`.
    pub serialized_file: Option<String>,
    pub batch_size: usize,
    /// GPU ordinal, or `None` to run on CPU.
    pub gpu: Option<u32>,
}

impl ServingContext {
    /// A CPU, batch-size-1 context for a model in the current directory.
    pub fn local(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            model_dir: PathBuf::from("."),
            serialized_file: None,
            batch_size: 1,
            gpu: None,
        }
    }
}

/// Where a served model is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotInitialized,
    Initialized,
}

/// A `ModelHandler` behind the `EntryPoint` contract.
pub struct ServedModel<H> {
    handler: H,
    state: LifecycleState,
}

impl<H: ModelHandler> ServedModel<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            state: LifecycleState::NotInitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_inner(self) -> H {
        self.handler
    }
}

impl<H: ModelHandler> EntryPoint for ServedModel<H> {
    fn handle(
        &mut self,
        requests: Vec<RequestEnvelope>,
        context: &ServingContext,
    ) -> TaskIoResult<Vec<HandlerReply>> {
        if self.state == LifecycleState::NotInitialized {
            info!(model = %context.model_name, "initializing model handler");
            self.handler.initialize(context)?;
            self.state = LifecycleState::Initialized;
        }

        if requests.is_empty() {
            return Ok(Vec::new());
        }

        debug!(requests = requests.len(), "running handler cycle");
        let prepared = self.handler.preprocess(&requests)?;
        let inferred = self.handler.inference(prepared)?;
        self.handler.postprocess(inferred, &requests)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use dynatask_contracts::{
        error::TaskIoResult,
        example::{HandlerReply, RequestBody, RequestEnvelope},
    };

    use super::{LifecycleState, ServedModel, ServingContext};
    use crate::traits::{EntryPoint, ModelHandler};

    /// Counts lifecycle calls and echoes each request body back.
    #[derive(Default)]
    struct CountingHandler {
        initialized: u32,
    }

    impl ModelHandler for CountingHandler {
        type Prepared = Vec<RequestBody>;
        type Inferred = Vec<RequestBody>;

        fn initialize(&mut self, _context: &ServingContext) -> TaskIoResult<()> {
            self.initialized += 1;
            Ok(())
        }

        fn preprocess(&self, requests: &[RequestEnvelope]) -> TaskIoResult<Self::Prepared> {
            Ok(requests.iter().map(|r| r.body.clone()).collect())
        }

        fn inference(&self, prepared: Self::Prepared) -> TaskIoResult<Self::Inferred> {
            Ok(prepared)
        }

        fn postprocess(
            &self,
            inferred: Self::Inferred,
            _requests: &[RequestEnvelope],
        ) -> TaskIoResult<Vec<HandlerReply>> {
            Ok(inferred
                .into_iter()
                .map(|body| match body {
                    RequestBody::Example(v) => HandlerReply::Json(v),
                    RequestBody::Batch(s) => HandlerReply::Text(s),
                })
                .collect())
        }
    }

    #[test]
    fn initializes_exactly_once() {
        let mut model = ServedModel::new(CountingHandler::default());
        let ctx = ServingContext::local("counting");
        assert_eq!(model.state(), LifecycleState::NotInitialized);

        for _ in 0..3 {
            let replies = model
                .handle(vec![RequestEnvelope::batch("x")], &ctx)
                .unwrap();
            assert_eq!(replies, vec![HandlerReply::Text("x".to_string())]);
        }

        assert_eq!(model.state(), LifecycleState::Initialized);
        assert_eq!(model.handler().initialized, 1);
    }

    #[test]
    fn empty_request_list_yields_no_replies() {
        let mut model = ServedModel::new(CountingHandler::default());
        let replies = model.handle(vec![], &ServingContext::local("m")).unwrap();
        assert!(replies.is_empty());
        // Initialization still happens on first contact.
        assert_eq!(model.into_inner().initialized, 1);
    }

    #[test]
    fn example_body_passes_through_cycle() {
        let mut model = ServedModel::new(CountingHandler::default());
        let envelope = RequestEnvelope {
            body: RequestBody::Example(json!({ "uid": "u-1" })),
        };
        let replies = model
            .handle(vec![envelope], &ServingContext::local("m"))
            .unwrap();
        assert_eq!(replies, vec![HandlerReply::Json(json!({ "uid": "u-1" }))]);
    }
}
