//! Scenario 2: batch testing.
//!
//! All examples travel in a single request whose body is one JSON example
//! per line. The oracle answers with one JSON response per line, and the
//! driver verifies the lines positionally.

use dynatask_config::ToolkitConfig;
use dynatask_contracts::error::TaskIoResult;
use dynatask_core::{TestMode, TestReport};

use crate::{oracle::Fault, scenarios::Harness, tasks::BUNDLED_TASKS};

/// Test the oracle for `task` with a single batched request.
pub fn run(task: &str, config: &ToolkitConfig) -> TaskIoResult<TestReport> {
    Harness::bundled(task, config)?.run_oracle(Fault::None, TestMode::Batched)
}

pub fn run_scenario(config: &ToolkitConfig) -> TaskIoResult<()> {
    println!("=== Scenario 2: Batch testing ===");
    println!();

    for task in BUNDLED_TASKS {
        let harness = Harness::bundled(task, config)?;

        // Two runs against the same model: initialization happens once.
        let mut model = harness.oracle(Fault::None);
        let first = harness
            .driver()
            .run(&mut model, harness.examples(), TestMode::Batched)?;
        let second = harness
            .driver()
            .run(&mut model, harness.examples(), TestMode::Batched)?;

        println!(
            "  {:<10} {} + {} line(s) verified, handler initialized {} time(s), state {:?}",
            task,
            first.passed(),
            second.passed(),
            model.handler().initializations(),
            model.state()
        );
    }

    println!();
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
