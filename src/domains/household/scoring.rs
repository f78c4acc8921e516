use crate::domains::household::catalog;
use crate::domains::household::types::AssessmentAnswers;
use serde::{Deserialize, Serialize};

/// Points added for each answer that signals deprivation.
pub const POINTS_PER_INDICATOR: u32 = 3;
pub const MAX_POVERTY_SCORE: u32 = 15;

pub const HIGH_VULNERABILITY_THRESHOLD: u32 = 12;
pub const MEDIUM_VULNERABILITY_THRESHOLD: u32 = 6;

/// (question id, answer that scores)
const SCORING_RULES: &[(&str, &str)] = &[
    (catalog::HOUSING, "Temporary"),
    (catalog::WATER, "River/Stream"),
    (catalog::INCOME, "None"),
    (catalog::EDUCATION, "None in School"),
    (catalog::MEALS, "One"),
];

/// Score a set of answers. Unanswered questions contribute nothing.
pub fn calculate_poverty_score(answers: &AssessmentAnswers) -> u32 {
    SCORING_RULES
        .iter()
        .filter(|(question_id, scoring_answer)| answers.get(question_id) == Some(*scoring_answer))
        .count() as u32
        * POINTS_PER_INDICATOR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VulnerabilityTier {
    Low,
    Medium,
    High,
}

impl VulnerabilityTier {
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_VULNERABILITY_THRESHOLD {
            VulnerabilityTier::High
        } else if score >= MEDIUM_VULNERABILITY_THRESHOLD {
            VulnerabilityTier::Medium
        } else {
            VulnerabilityTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilityTier::Low => "Low",
            VulnerabilityTier::Medium => "Medium",
            VulnerabilityTier::High => "High",
        }
    }
}
