use serde::{Deserialize, Serialize};

use super::step::StepOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepVerdict {
    pub outcome: StepOutcome,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedVerdict {
    pub is_solved: bool,
    #[serde(default)]
    pub feedback: String,
}

/// Body of `POST {judge_url}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeStepRequest {
    pub question: String,
    pub expected_answer: String,
    pub prior_steps: Vec<String>,
    pub current_step: String,
}

/// Body of `POST {judge_url}/final`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeFinalRequest {
    pub question: String,
    pub expected_answer: String,
    pub all_steps: Vec<String>,
}
