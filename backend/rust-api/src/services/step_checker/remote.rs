use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::StepChecker;
use crate::metrics::JUDGE_FALLBACKS_TOTAL;
use crate::models::judge::{JudgeFinalRequest, JudgeStepRequest, SolvedVerdict, StepVerdict};
use crate::models::{Problem, StepOutcome};

pub const FALLBACK_STEP_FEEDBACK: &str =
    "Sorry, I couldn't check this step right now. Keep going!";

/// Forwards the attempt to an external LLM judge and trusts its verdict.
#[derive(Clone)]
pub struct RemoteJudge {
    http_client: Client,
    url: String,
}

impl RemoteJudge {
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build().context("Failed to build judge HTTP client")?,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to call judge")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Judge returned error {}: {}", status, error_text));
        }

        response
            .json::<R>()
            .await
            .context("Failed to parse judge response")
    }
}

#[async_trait]
impl StepChecker for RemoteJudge {
    async fn check_step(
        &self,
        problem: &Problem,
        prior_steps: &[String],
        candidate: &str,
    ) -> StepVerdict {
        let body = JudgeStepRequest {
            question: problem.question.clone(),
            expected_answer: problem.answer.clone(),
            prior_steps: prior_steps.to_vec(),
            current_step: candidate.to_string(),
        };

        match self.post_json::<_, StepVerdict>(&self.url, &body).await {
            Ok(mut verdict) => {
                // pending is not a verdict
                if verdict.outcome == StepOutcome::Pending {
                    verdict.outcome = StepOutcome::Neutral;
                }
                verdict
            }
            Err(e) => {
                JUDGE_FALLBACKS_TOTAL.with_label_values(&["step"]).inc();
                tracing::warn!(
                    "Step judge failed for problem={}, using neutral fallback: {:#}",
                    problem.id,
                    e
                );
                StepVerdict {
                    outcome: StepOutcome::Neutral,
                    feedback: FALLBACK_STEP_FEEDBACK.to_string(),
                }
            }
        }
    }

    async fn check_solved(&self, problem: &Problem, all_steps: &[String]) -> SolvedVerdict {
        let body = JudgeFinalRequest {
            question: problem.question.clone(),
            expected_answer: problem.answer.clone(),
            all_steps: all_steps.to_vec(),
        };
        let url = format!("{}/final", self.url);

        match self.post_json::<_, SolvedVerdict>(&url, &body).await {
            Ok(verdict) => verdict,
            Err(e) => {
                JUDGE_FALLBACKS_TOTAL.with_label_values(&["final"]).inc();
                tracing::warn!(
                    "Final judge failed for problem={}, using substring fallback: {:#}",
                    problem.id,
                    e
                );
                substring_fallback(problem, all_steps)
            }
        }
    }
}

/// Naive offline check: the canonical answer appears somewhere in the work.
fn substring_fallback(problem: &Problem, all_steps: &[String]) -> SolvedVerdict {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
    };

    let answer = squash(&problem.answer);
    let work = squash(&all_steps.join(" "));
    let is_solved = !answer.is_empty() && work.contains(&answer);

    SolvedVerdict {
        is_solved,
        feedback: if is_solved {
            "Looks like you reached the answer.".to_string()
        } else {
            "Couldn't confirm the final answer right now.".to_string()
        },
    }
}
