//! Scenario 1: per-example testing.
//!
//! Every bundled task is generated, and the oracle is invoked once per
//! example with a `{"body": <example>}` envelope. Each reply is decoded and
//! verified before the next example is sent.

use dynatask_config::ToolkitConfig;
use dynatask_contracts::error::TaskIoResult;
use dynatask_core::{TestMode, TestReport};

use crate::{oracle::Fault, scenarios::Harness, tasks::BUNDLED_TASKS};

/// Test the oracle for `task` one example at a time.
pub fn run(task: &str, config: &ToolkitConfig) -> TaskIoResult<TestReport> {
    Harness::bundled(task, config)?.run_oracle(Fault::None, TestMode::Individual)
}

pub fn run_scenario(config: &ToolkitConfig) -> TaskIoResult<()> {
    println!("=== Scenario 1: Per-example testing ===");
    println!();

    for task in BUNDLED_TASKS {
        let report = run(task, config)?;
        let elapsed = report.finished_at - report.started_at;
        println!(
            "  {:<10} {} example(s) verified in {} ms",
            task,
            report.passed(),
            elapsed.num_milliseconds()
        );
    }

    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
