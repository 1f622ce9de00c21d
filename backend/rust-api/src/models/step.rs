use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Pending,
    Correct,
    Incorrect,
    Neutral,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Pending => "pending",
            StepOutcome::Correct => "correct",
            StepOutcome::Incorrect => "incorrect",
            StepOutcome::Neutral => "neutral",
        }
    }
}

/// One line of working. The outcome is assigned when the step is created
/// and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub text: String,
    pub outcome: StepOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Step {
    pub fn new(
        text: impl Into<String>,
        outcome: StepOutcome,
        feedback: Option<String>,
        image_base64: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            outcome,
            feedback,
            image_base64,
            created_at: Utc::now(),
        }
    }
}
