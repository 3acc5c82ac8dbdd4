//! Numeric tolerances applied by the type verifiers.

use serde::{Deserialize, Serialize};

/// Default slack for both the probability-sum and confidence-range checks.
pub const DEFAULT_EPSILON: f64 = 1e-4;

/// Independently tunable tolerances.
///
/// `probability_sum` bounds how far a `multiclass_probs` distribution may
/// sum away from 1. `confidence_range` widens the `[0, 1]` interval a `conf`
/// value must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub probability_sum: f64,
    pub confidence_range: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            probability_sum: DEFAULT_EPSILON,
            confidence_range: DEFAULT_EPSILON,
        }
    }
}
