use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ProgressStore, StoreError, ACTIVITY_LOG, PROBLEM_ATTEMPTS};
use crate::models::{ActivityRecord, Attempt, Profile, Step};

#[derive(Default)]
struct Tables {
    profiles: HashMap<String, Profile>,
    attempts: Vec<Attempt>,
    activity: HashMap<(String, NaiveDate), ActivityRecord>,
}

/// In-process tables. Used when no backend is configured and in tests.
#[derive(Default)]
pub struct MemoryProgressStore {
    tables: RwLock<Tables>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attempts_for(&self, user_id: &str, problem_id: &str) -> Vec<Attempt> {
        self.tables
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.problem_id == problem_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn find_open_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.problem_id == problem_id && !a.solved)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn find_latest_solved_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.problem_id == problem_id && a.solved)
            .max_by_key(|a| a.completed_at.unwrap_or(a.updated_at))
            .cloned())
    }

    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, StoreError> {
        self.tables.write().await.attempts.push(attempt.clone());
        Ok(attempt.clone())
    }

    async fn save_steps(
        &self,
        attempt_id: &str,
        steps: &[Step],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let attempt = tables
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or_else(|| StoreError::NotFound {
                table: PROBLEM_ATTEMPTS,
                key: attempt_id.to_string(),
            })?;
        attempt.steps = steps.to_vec();
        attempt.updated_at = updated_at;
        Ok(())
    }

    async fn mark_solved(
        &self,
        attempt_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let attempt = tables
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or_else(|| StoreError::NotFound {
                table: PROBLEM_ATTEMPTS,
                key: attempt_id.to_string(),
            })?;
        attempt.mark_solved(completed_at);
        Ok(())
    }

    async fn count_solved_attempts(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<usize, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.problem_id == problem_id && a.solved)
            .count())
    }

    async fn get_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ActivityRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.activity.get(&(user_id.to_string(), date)).cloned())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        self.tables.write().await.activity.insert(
            (record.user_id.clone(), record.activity_date),
            record.clone(),
        );
        Ok(())
    }

    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables
            .activity
            .get_mut(&(record.user_id.clone(), record.activity_date))
        {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                table: ACTIVITY_LOG,
                key: format!("{}:{}", record.user_id, record.activity_date),
            }),
        }
    }

    async fn list_activity(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ActivityRecord> = tables
            .activity
            .values()
            .filter(|r| r.user_id == user_id && r.activity_date >= from && r.activity_date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.activity_date);
        Ok(rows)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .profiles
            .entry(profile.id.clone())
            .or_insert_with(|| profile.clone());
        Ok(())
    }
}
