use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::step::{Step, StepOutcome};

/// One user's run through a single problem. Maps 1:1 onto a
/// `problem_attempts` row, with `steps` stored as an embedded JSON list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub problem_id: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub solved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn new(user_id: &str, problem_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            problem_id: problem_id.to_string(),
            steps: Vec::new(),
            solved: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
        self.updated_at = Utc::now();
    }

    /// Truncates the tail by one step. Outcomes of the remaining steps are
    /// never touched.
    pub fn undo_step(&mut self) -> Option<Step> {
        let removed = self.steps.pop();
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Solved predicate used to decide whether to run the final check.
    ///
    /// Only looks at the last step, so a correct intermediate step makes a
    /// multi-step problem eligible as well. Kept as is.
    pub fn last_step_correct(&self) -> bool {
        self.steps
            .last()
            .map(|step| step.outcome == StepOutcome::Correct)
            .unwrap_or(false)
    }

    /// Sticky: there is no way back to unsolved.
    pub fn mark_solved(&mut self, at: DateTime<Utc>) {
        if !self.solved {
            self.solved = true;
            self.completed_at = Some(at);
        }
        self.updated_at = at;
    }

    pub fn step_texts(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.text.clone()).collect()
    }
}
