//! Step validation behind a single capability, with two judges:
//! [`HeuristicChecker`] (local fallback) and [`RemoteJudge`] (LLM service).
//!
//! Implementations never fail: every error is absorbed into a safe verdict
//! so the learner can always continue.

use async_trait::async_trait;

use crate::models::judge::{SolvedVerdict, StepVerdict};
use crate::models::Problem;

mod heuristic;
mod remote;

pub use heuristic::HeuristicChecker;
pub use remote::{RemoteJudge, FALLBACK_STEP_FEEDBACK};

#[async_trait]
pub trait StepChecker: Send + Sync {
    async fn check_step(&self, problem: &Problem, prior_steps: &[String], candidate: &str)
        -> StepVerdict;

    async fn check_solved(&self, problem: &Problem, all_steps: &[String]) -> SolvedVerdict;
}

/// Canonical form used by both judges: lower case, no whitespace, ASCII
/// operators, and the common LaTeX the OCR proxy emits reduced to plain text.
pub fn normalize_math(text: &str) -> String {
    lazy_static::lazy_static! {
        static ref FRAC: regex::Regex = regex::Regex::new(r"\\frac\{([^{}]*)\}\{([^{}]*)\}").unwrap();
    }

    let mut s = text.trim().to_lowercase();
    for delimiter in ["\\(", "\\)", "\\[", "\\]", "$"] {
        s = s.replace(delimiter, "");
    }
    s = FRAC.replace_all(&s, "$1/$2").into_owned();
    s = s
        .replace("\\div", "/")
        .replace("\\times", "*")
        .replace("\\cdot", "*")
        .replace("\\left", "")
        .replace("\\right", "");

    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '÷' => '/',
            '×' | '·' | '⋅' => '*',
            '−' | '–' | '—' => '-',
            other => other,
        })
        .filter(|c| *c != '{' && *c != '}')
        .collect()
}
