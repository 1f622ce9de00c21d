use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{problem::Problem, step::Step};
use crate::canvas::Point;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, max = 128, message = "problem_id must be 1-128 characters"))]
    pub problem_id: String,
    /// Start a fresh attempt even when a solved one exists.
    #[serde(default)]
    pub restart: bool,
}

/// Exactly one of the three inputs must be present.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubmitStepRequest {
    #[validate(length(max = 500, message = "step text must be at most 500 characters"))]
    pub text: Option<String>,
    pub image_base64: Option<String>,
    pub strokes: Option<Vec<Vec<Point>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub attempt_id: String,
    pub problem: Problem,
    pub steps: Vec<Step>,
    pub solved: bool,
    pub read_only: bool,
    /// False when the store was unavailable and the attempt lives only here.
    pub persisted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitStepResponse {
    pub step: Step,
    pub solved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_feedback: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UndoResponse {
    pub removed: Option<Step>,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProblemListQuery {
    pub skill: Option<String>,
    pub max_difficulty: Option<u32>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemListResponse {
    pub problems: Vec<Problem>,
    pub total: usize,
}
