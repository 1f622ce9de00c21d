use serde::{Deserialize, Serialize};

pub const DEMO_PROBLEM_ID: &str = "demo";

/// A word problem from the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default, alias = "difficulty_rank")]
    pub difficulty: Option<u32>,
}

impl Problem {
    /// The single problem the heuristic judge knows how to grade.
    pub fn demo() -> Self {
        Self {
            id: DEMO_PROBLEM_ID.to_string(),
            question: "A number divided by 10 equals 6. What do you get when you subtract 15 from that number?"
                .to_string(),
            answer: "45".to_string(),
            skill_tags: vec!["division".to_string(), "subtraction".to_string()],
            difficulty: Some(1),
        }
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skill_tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(skill.trim()))
    }
}

// Dataset ids are integers, catalog ids are strings
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "problem id must be a string or number, got {}",
            other
        ))),
    }
}
