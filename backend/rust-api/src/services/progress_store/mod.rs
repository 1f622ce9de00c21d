//! Persistence for attempts, daily activity and profiles.
//!
//! Tables: `profiles`, `problem_attempts` (steps embedded as a JSON list)
//! and `activity_log` (one row per user per UTC day). None of the
//! operations are transactional; callers doing read-modify-write on
//! `activity_log` can race with other sessions of the same user.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;

use crate::models::{ActivityRecord, Attempt, Profile, Step};

mod memory;
mod rest;

pub use memory::MemoryProgressStore;
pub use rest::RestProgressStore;

pub const PROFILES: &str = "profiles";
pub const PROBLEM_ATTEMPTS: &str = "problem_attempts";
pub const ACTIVITY_LOG: &str = "activity_log";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Most recent unsolved attempt for (user, problem).
    async fn find_open_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Most recently completed attempt for (user, problem).
    async fn find_latest_solved_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError>;

    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, StoreError>;

    /// Replaces the whole step list of an attempt.
    async fn save_steps(
        &self,
        attempt_id: &str,
        steps: &[Step],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn mark_solved(
        &self,
        attempt_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn count_solved_attempts(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<usize, StoreError>;

    async fn get_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ActivityRecord>, StoreError>;

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;

    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;

    /// Rows with `from <= activity_date <= to`, oldest first.
    async fn list_activity(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    async fn create_profile(&self, profile: &Profile) -> Result<(), StoreError>;
}
