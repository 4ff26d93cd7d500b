use serde::{Deserialize, Serialize};

use super::super::domain::Question;

pub const DEFAULT_QUESTION_WEIGHT: f64 = 10.0;

/// Weighting policy for auto-graded answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub default_question_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_question_weight: DEFAULT_QUESTION_WEIGHT,
        }
    }
}

impl ScoringConfig {
    pub fn new(default_question_weight: f64) -> Self {
        let sanitized = if default_question_weight.is_finite() && default_question_weight > 0.0 {
            default_question_weight
        } else {
            DEFAULT_QUESTION_WEIGHT
        };

        Self {
            default_question_weight: sanitized,
        }
    }

    /// Points awarded for a correct auto-graded answer to `question`.
    pub fn weight_for(&self, question: &Question) -> f64 {
        question
            .weight
            .filter(|weight| weight.is_finite() && *weight > 0.0)
            .unwrap_or(self.default_question_weight)
    }
}
