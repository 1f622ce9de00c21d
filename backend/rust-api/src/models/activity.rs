use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of `activity_log`: per user, per UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: String,
    pub activity_date: NaiveDate,
    pub problems_solved: u32,
    pub steps_completed: u32,
}

impl ActivityRecord {
    pub fn empty(user_id: &str, activity_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            activity_date,
            problems_solved: 0,
            steps_completed: 0,
        }
    }
}
