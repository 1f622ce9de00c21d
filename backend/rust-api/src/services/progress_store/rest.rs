use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{ProgressStore, StoreError, ACTIVITY_LOG, PROBLEM_ATTEMPTS, PROFILES};
use crate::models::{ActivityRecord, Attempt, Profile, Step};

/// Backend-as-a-service tables over their REST gateway (PostgREST
/// dialect: `eq.` filters, `Prefer` headers, JSON arrays back).
#[derive(Clone)]
pub struct RestProgressStore {
    http_client: Client,
    base_url: String,
    service_key: String,
}

impl RestProgressStore {
    pub fn new(store_url: &str, service_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: format!("{}/rest/v1", store_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    fn table(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Status { status, body });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        Ok(Self::send(request).await?.json::<Vec<T>>().await?)
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ProgressStore for RestProgressStore {
    async fn find_open_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let rows: Vec<Attempt> = Self::fetch(
            self.table(reqwest::Method::GET, PROBLEM_ATTEMPTS).query(&[
                ("user_id", eq(user_id)),
                ("problem_id", eq(problem_id)),
                ("solved", eq(false)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_latest_solved_attempt(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let rows: Vec<Attempt> = Self::fetch(
            self.table(reqwest::Method::GET, PROBLEM_ATTEMPTS).query(&[
                ("user_id", eq(user_id)),
                ("problem_id", eq(problem_id)),
                ("solved", eq(true)),
                ("order", "completed_at.desc.nullslast".to_string()),
                ("limit", "1".to_string()),
            ]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_attempt(&self, attempt: &Attempt) -> Result<Attempt, StoreError> {
        let rows: Vec<Attempt> = Self::fetch(
            self.table(reqwest::Method::POST, PROBLEM_ATTEMPTS)
                .header("Prefer", "return=representation")
                .json(attempt),
        )
        .await?;
        rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            table: PROBLEM_ATTEMPTS,
            key: attempt.id.clone(),
        })
    }

    async fn save_steps(
        &self,
        attempt_id: &str,
        steps: &[Step],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Self::send(
            self.table(reqwest::Method::PATCH, PROBLEM_ATTEMPTS)
                .query(&[("id", eq(attempt_id))])
                .json(&json!({ "steps": steps, "updated_at": updated_at })),
        )
        .await?;
        Ok(())
    }

    async fn mark_solved(
        &self,
        attempt_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Self::send(
            self.table(reqwest::Method::PATCH, PROBLEM_ATTEMPTS)
                .query(&[("id", eq(attempt_id))])
                .json(&json!({
                    "solved": true,
                    "completed_at": completed_at,
                    "updated_at": completed_at,
                })),
        )
        .await?;
        Ok(())
    }

    async fn count_solved_attempts(
        &self,
        user_id: &str,
        problem_id: &str,
    ) -> Result<usize, StoreError> {
        let rows: Vec<serde_json::Value> = Self::fetch(
            self.table(reqwest::Method::GET, PROBLEM_ATTEMPTS).query(&[
                ("select", "id".to_string()),
                ("user_id", eq(user_id)),
                ("problem_id", eq(problem_id)),
                ("solved", eq(true)),
            ]),
        )
        .await?;
        Ok(rows.len())
    }

    async fn get_activity(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ActivityRecord>, StoreError> {
        let rows: Vec<ActivityRecord> = Self::fetch(
            self.table(reqwest::Method::GET, ACTIVITY_LOG).query(&[
                ("user_id", eq(user_id)),
                ("activity_date", eq(date)),
                ("limit", "1".to_string()),
            ]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        Self::send(
            self.table(reqwest::Method::POST, ACTIVITY_LOG)
                .header("Prefer", "return=minimal")
                .json(record),
        )
        .await?;
        Ok(())
    }

    async fn update_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        Self::send(
            self.table(reqwest::Method::PATCH, ACTIVITY_LOG)
                .query(&[
                    ("user_id", eq(&record.user_id)),
                    ("activity_date", eq(record.activity_date)),
                ])
                .json(&json!({
                    "problems_solved": record.problems_solved,
                    "steps_completed": record.steps_completed,
                })),
        )
        .await?;
        Ok(())
    }

    async fn list_activity(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        Self::fetch(
            self.table(reqwest::Method::GET, ACTIVITY_LOG).query(&[
                ("user_id", eq(user_id)),
                ("activity_date", format!("gte.{}", from)),
                ("activity_date", format!("lte.{}", to)),
                ("order", "activity_date.asc".to_string()),
            ]),
        )
        .await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Profile> = Self::fetch(
            self.table(reqwest::Method::GET, PROFILES)
                .query(&[("id", eq(user_id)), ("limit", "1".to_string())]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        Self::send(
            self.table(reqwest::Method::POST, PROFILES)
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .json(profile),
        )
        .await?;
        Ok(())
    }
}
