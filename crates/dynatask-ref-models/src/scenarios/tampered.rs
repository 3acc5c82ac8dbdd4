//! Scenario 3: defect detection.
//!
//! The oracle is run once per injected fault. Each run must abort on the
//! first example with the error that names the defect:
//!
//! | fault             | expected failure      |
//! |-------------------|-----------------------|
//! | `DropTarget`      | `MissingTargets`      |
//! | `ExtraField`      | `ExtraFields`         |
//! | `TamperSignature` | `SignatureMismatch`   |

use dynatask_config::ToolkitConfig;
use dynatask_contracts::error::{TaskIoError, TaskIoResult};
use dynatask_core::TestMode;

use crate::{oracle::Fault, scenarios::Harness};

/// Task the fault runs use.
pub const SCENARIO_TASK: &str = "hs";

pub const FAULTS: [Fault; 3] = [Fault::DropTarget, Fault::ExtraField, Fault::TamperSignature];

/// Whether `error` is the failure `fault` should produce.
pub fn is_expected(fault: Fault, error: &TaskIoError) -> bool {
    matches!(
        (fault, error.root()),
        (Fault::DropTarget, TaskIoError::MissingTargets { .. })
            | (Fault::ExtraField, TaskIoError::ExtraFields { .. })
            | (Fault::TamperSignature, TaskIoError::SignatureMismatch { .. })
    )
}

/// Run `fault` against `task` and return the error the harness raised.
///
/// A run that passes is itself an error: the defect went unnoticed.
pub fn detect(
    task: &str,
    fault: Fault,
    mode: TestMode,
    config: &ToolkitConfig,
) -> TaskIoResult<TaskIoError> {
    match Harness::bundled(task, config)?.run_oracle(fault, mode) {
        Err(error) => Ok(error),
        Ok(report) => Err(TaskIoError::Handler {
            reason: format!(
                "{fault:?} went undetected across {} example(s) of '{task}'",
                report.passed()
            ),
        }),
    }
}

pub fn run_scenario(config: &ToolkitConfig) -> TaskIoResult<()> {
    println!("=== Scenario 3: Defect detection ===");
    println!();

    for fault in FAULTS {
        for mode in [TestMode::Individual, TestMode::Batched] {
            let error = detect(SCENARIO_TASK, fault, mode, config)?;
            let verdict = if is_expected(fault, &error) {
                "CAUGHT"
            } else {
                "WRONG ERROR"
            };
            println!(
                "  {:<16} {:<10} {verdict}: {error}",
                format!("{fault:?}"),
                format!("{mode:?}")
            );
            if !is_expected(fault, &error) {
                return Err(error);
            }
        }
    }

    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
