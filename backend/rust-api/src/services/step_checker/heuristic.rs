use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::{normalize_math, StepChecker};
use crate::models::judge::{SolvedVerdict, StepVerdict};
use crate::models::{Problem, StepOutcome};

// Hand-written for the demonstration problem only:
//   x/10 = 6  ->  x = 60  ->  60 - 15 = 45
lazy_static! {
    static ref SETUP: Regex = Regex::new(r"^(x/10=6|6=x/10)$").unwrap();
    static ref SOLVE_X: Regex = Regex::new(r"^(x=60|60=x|x=6\*10|x=10\*6|x=60/1)$").unwrap();
    static ref FINAL: Regex = Regex::new(r"^(60-15=45|x-15=45|45=60-15|45)$").unwrap();

    static ref WRONG_SETUP: Regex = Regex::new(r"^x/10=(-?\d+(?:\.\d+)?)$").unwrap();
    static ref WRONG_X: Regex = Regex::new(r"^x=(-?\d+(?:\.\d+)?)$").unwrap();
    static ref WRONG_SUBTRACTION: Regex = Regex::new(r"^60-15=(-?\d+(?:\.\d+)?)$").unwrap();
    static ref ADDED_INSTEAD: Regex = Regex::new(r"^(60|x)\+15(=.*)?$").unwrap();
}

const NEUTRAL_FEEDBACK: &str = "I can't tell whether this step helps yet. Keep going!";

/// Offline judge. Not general: anything it does not recognize is neutral.
#[derive(Debug, Default, Clone)]
pub struct HeuristicChecker;

impl HeuristicChecker {
    pub fn new() -> Self {
        Self
    }

    fn classify(&self, candidate: &str) -> StepVerdict {
        let step = normalize_math(candidate);

        if SETUP.is_match(&step) {
            return correct("Nice setup: the number divided by 10 is 6.");
        }
        if SOLVE_X.is_match(&step) {
            return correct("Right, multiplying both sides by 10 gives x = 60.");
        }
        if FINAL.is_match(&step) {
            return correct("That's it: 60 - 15 = 45.");
        }

        if let Some(caps) = WRONG_SUBTRACTION.captures(&step) {
            return incorrect(format!(
                "Check your subtraction: 60 - 15 is not {}.",
                &caps[1]
            ));
        }
        if ADDED_INSTEAD.is_match(&step) {
            return incorrect(
                "The question asks for 15 less than the number, so subtract 15 instead of adding it."
                    .to_string(),
            );
        }
        if let Some(caps) = WRONG_X.captures(&step) {
            let feedback = if &caps[1] == "0.6" {
                "Dividing by 10 again goes the wrong way: multiply both sides by 10.".to_string()
            } else {
                format!(
                    "x = {} doesn't satisfy x/10 = 6. Multiply both sides by 10.",
                    &caps[1]
                )
            };
            return incorrect(feedback);
        }
        if let Some(caps) = WRONG_SETUP.captures(&step) {
            return incorrect(format!(
                "The problem says the number divided by 10 equals 6, not {}.",
                &caps[1]
            ));
        }

        StepVerdict {
            outcome: StepOutcome::Neutral,
            feedback: NEUTRAL_FEEDBACK.to_string(),
        }
    }
}

#[async_trait]
impl StepChecker for HeuristicChecker {
    async fn check_step(
        &self,
        _problem: &Problem,
        _prior_steps: &[String],
        candidate: &str,
    ) -> StepVerdict {
        self.classify(candidate)
    }

    async fn check_solved(&self, _problem: &Problem, all_steps: &[String]) -> SolvedVerdict {
        let reached = all_steps
            .iter()
            .any(|step| FINAL.is_match(&normalize_math(step)));

        if reached {
            SolvedVerdict {
                is_solved: true,
                feedback: "Solved! The answer is 45.".to_string(),
            }
        } else {
            SolvedVerdict {
                is_solved: false,
                feedback: "Not finished yet: take 15 away from the number.".to_string(),
            }
        }
    }
}

fn correct(feedback: &str) -> StepVerdict {
    StepVerdict {
        outcome: StepOutcome::Correct,
        feedback: feedback.to_string(),
    }
}

fn incorrect(feedback: String) -> StepVerdict {
    StepVerdict {
        outcome: StepOutcome::Incorrect,
        feedback,
    }
}
