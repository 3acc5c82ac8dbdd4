//! End-to-end reference scenarios.
//!
//! Each scenario wires real toolkit components (generator, verifier, signer,
//! driver) to the oracle model and demonstrates one behavior of the harness.
//! `Harness` is the shared wiring.

pub mod batched;
pub mod individual;
pub mod tampered;

use dynatask_config::ToolkitConfig;
use dynatask_contracts::{error::TaskIoResult, example::SyntheticExample, schema::TaskSchema};
use dynatask_core::{
    lifecycle::{ServedModel, ServingContext},
    TestDriver, TestMode, TestReport,
};
use dynatask_registry::{MockDataGenerator, TypeRegistry};
use dynatask_signature::ResponseSigner;
use dynatask_verify::ResponseVerifier;

use crate::{
    oracle::{Fault, OracleHandler},
    tasks::bundled_schema,
};

/// A schema, its examples, and a driver ready to test a model against them.
pub struct Harness {
    schema: TaskSchema,
    examples: Vec<SyntheticExample>,
    driver: TestDriver,
    signer: ResponseSigner,
}

impl Harness {
    /// Wire up a bundled task.
    pub fn bundled(task: &str, config: &ToolkitConfig) -> TaskIoResult<Self> {
        Self::from_schema(bundled_schema(task)?, config)
    }

    /// Wire up any validated schema.
    pub fn from_schema(schema: TaskSchema, config: &ToolkitConfig) -> TaskIoResult<Self> {
        let registry = TypeRegistry::builtin();
        let examples = {
            let mut generator = match config.pool_seed {
                Some(seed) => MockDataGenerator::with_seed(&schema, &registry, seed),
                None => MockDataGenerator::new(&schema, &registry),
            };
            generator.examples()?
        };

        let signer = config.signer();
        let verifier = ResponseVerifier::new(schema.clone())
            .with_registry(registry)
            .with_signer(signer.clone())
            .with_tolerances(config.tolerances);
        let context = ServingContext::local(format!("oracle-{}", schema.task()));
        let driver = TestDriver::new(schema.task(), Box::new(verifier), context);

        Ok(Self {
            schema,
            examples,
            driver,
            signer,
        })
    }

    pub fn schema(&self) -> &TaskSchema {
        &self.schema
    }

    pub fn examples(&self) -> &[SyntheticExample] {
        &self.examples
    }

    pub fn driver(&self) -> &TestDriver {
        &self.driver
    }

    /// Hand `context` to the model instead of the local default, e.g. one
    /// derived from a model's setup config.
    pub fn with_context(mut self, context: ServingContext) -> Self {
        self.driver = self.driver.with_context(context);
        self
    }

    /// A fresh, uninitialized oracle model for this task.
    pub fn oracle(&self, fault: Fault) -> ServedModel<OracleHandler> {
        ServedModel::new(
            OracleHandler::new(self.schema.clone(), self.signer.clone()).with_fault(fault),
        )
    }

    /// Run the oracle, with `fault` injected, through every example.
    pub fn run_oracle(&self, fault: Fault, mode: TestMode) -> TaskIoResult<TestReport> {
        let mut model = self.oracle(fault);
        self.driver.run(&mut model, &self.examples, mode)
    }
}

/// Run every scenario in order. Stops at the first failing one.
pub fn run_all(config: &ToolkitConfig) -> TaskIoResult<()> {
    individual::run_scenario(config)?;
    batched::run_scenario(config)?;
    tampered::run_scenario(config)?;
    Ok(())
}
