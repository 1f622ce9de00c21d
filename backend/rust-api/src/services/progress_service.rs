use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::metrics::{track_store_operation, PROBLEMS_SOLVED_TOTAL};
use crate::models::{ActivityRecord, Attempt, Profile};
use crate::services::progress_store::{
    ProgressStore, StoreError, ACTIVITY_LOG, PROBLEM_ATTEMPTS, PROFILES,
};
use crate::utils::time::today_utc;

/// Result of entering a problem.
#[derive(Debug, Clone)]
pub struct EnteredAttempt {
    pub attempt: Attempt,
    /// A previously solved attempt replayed for viewing.
    pub read_only: bool,
    /// False when the store could not create the row.
    pub persisted: bool,
}

/// Progress synchronization on top of a [`ProgressStore`].
///
/// Every store failure is logged and swallowed; the worst case is progress
/// that silently isn't saved.
#[derive(Clone)]
pub struct ProgressSync {
    store: Arc<dyn ProgressStore>,
}

impl ProgressSync {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub async fn ensure_profile(&self, user_id: &str) {
        let existing = track_store_operation("select", PROFILES, self.store.get_profile(user_id)).await;
        match existing {
            Ok(Some(_)) => {}
            Ok(None) => {
                let profile = Profile {
                    id: user_id.to_string(),
                    display_name: None,
                    created_at: Utc::now(),
                };
                if let Err(e) =
                    track_store_operation("insert", PROFILES, self.store.create_profile(&profile)).await
                {
                    log_store_error("create profile", user_id, &e);
                } else {
                    tracing::info!("Profile created for user={}", user_id);
                }
            }
            Err(e) => log_store_error("load profile", user_id, &e),
        }
    }

    pub async fn profile(&self, user_id: &str) -> Option<Profile> {
        match track_store_operation("select", PROFILES, self.store.get_profile(user_id)).await {
            Ok(profile) => profile,
            Err(e) => {
                log_store_error("load profile", user_id, &e);
                None
            }
        }
    }

    /// Open attempt first, then the latest solved one (read-only, unless
    /// `restart`), otherwise a new empty attempt.
    pub async fn enter_problem(&self, user_id: &str, problem_id: &str, restart: bool) -> EnteredAttempt {
        match track_store_operation(
            "select",
            PROBLEM_ATTEMPTS,
            self.store.find_open_attempt(user_id, problem_id),
        )
        .await
        {
            Ok(Some(attempt)) => {
                tracing::info!(
                    "Resuming attempt {} for user={}, problem={} ({} steps)",
                    attempt.id,
                    user_id,
                    problem_id,
                    attempt.steps.len()
                );
                return EnteredAttempt {
                    attempt,
                    read_only: false,
                    persisted: true,
                };
            }
            Ok(None) => {}
            Err(e) => log_store_error("find open attempt", user_id, &e),
        }

        if !restart {
            match track_store_operation(
                "select",
                PROBLEM_ATTEMPTS,
                self.store.find_latest_solved_attempt(user_id, problem_id),
            )
            .await
            {
                Ok(Some(attempt)) => {
                    tracing::info!(
                        "Replaying solved attempt {} for user={}, problem={}",
                        attempt.id,
                        user_id,
                        problem_id
                    );
                    return EnteredAttempt {
                        attempt,
                        read_only: true,
                        persisted: true,
                    };
                }
                Ok(None) => {}
                Err(e) => log_store_error("find solved attempt", user_id, &e),
            }
        }

        let attempt = Attempt::new(user_id, problem_id);
        match track_store_operation(
            "insert",
            PROBLEM_ATTEMPTS,
            self.store.create_attempt(&attempt),
        )
        .await
        {
            Ok(created) => {
                tracing::info!(
                    "Created attempt {} for user={}, problem={}",
                    created.id,
                    user_id,
                    problem_id
                );
                EnteredAttempt {
                    attempt: created,
                    read_only: false,
                    persisted: true,
                }
            }
            Err(e) => {
                log_store_error("create attempt", user_id, &e);
                EnteredAttempt {
                    attempt,
                    read_only: false,
                    persisted: false,
                }
            }
        }
    }

    /// Saves the full step list, then counts one completed step for today.
    pub async fn record_step(&self, attempt: &Attempt, persisted: bool) {
        self.save_steps(attempt, persisted).await;
        self.bump_activity(&attempt.user_id, today_utc(), |row| {
            row.steps_completed += 1;
        })
        .await;
    }

    /// Saves the truncated step list and takes one step off today's count.
    pub async fn record_undo(&self, attempt: &Attempt, persisted: bool) {
        self.save_steps(attempt, persisted).await;

        let user_id = &attempt.user_id;
        let today = today_utc();
        match track_store_operation("select", ACTIVITY_LOG, self.store.get_activity(user_id, today)).await {
            Ok(Some(mut row)) if row.steps_completed > 0 => {
                row.steps_completed -= 1;
                if let Err(e) =
                    track_store_operation("update", ACTIVITY_LOG, self.store.update_activity(&row)).await
                {
                    log_store_error("decrement steps", user_id, &e);
                }
            }
            Ok(_) => {}
            Err(e) => log_store_error("load activity", user_id, &e),
        }
    }

    /// Marks the attempt solved. Returns true when this is the user's first
    /// solve of the problem, which is the only case counted in
    /// `problems_solved`.
    pub async fn record_solved(&self, attempt: &Attempt, persisted: bool) -> bool {
        let user_id = &attempt.user_id;

        let first_time = match track_store_operation(
            "select",
            PROBLEM_ATTEMPTS,
            self.store
                .count_solved_attempts(user_id, &attempt.problem_id),
        )
        .await
        {
            Ok(previous) => previous == 0,
            Err(e) => {
                log_store_error("count solved attempts", user_id, &e);
                false
            }
        };

        if persisted {
            let completed_at = attempt.completed_at.unwrap_or_else(Utc::now);
            if let Err(e) = track_store_operation(
                "update",
                PROBLEM_ATTEMPTS,
                self.store.mark_solved(&attempt.id, completed_at),
            )
            .await
            {
                log_store_error("mark solved", user_id, &e);
            }
        }

        PROBLEMS_SOLVED_TOTAL
            .with_label_values(&[if first_time { "true" } else { "false" }])
            .inc();

        if first_time {
            self.bump_activity(user_id, today_utc(), |row| {
                row.problems_solved += 1;
            })
            .await;
        }

        tracing::info!(
            "Attempt {} solved: user={}, problem={}, first_time={}",
            attempt.id,
            user_id,
            attempt.problem_id,
            first_time
        );

        first_time
    }

    pub async fn activity(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<ActivityRecord> {
        match track_store_operation(
            "select",
            ACTIVITY_LOG,
            self.store.list_activity(user_id, from, to),
        )
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log_store_error("list activity", user_id, &e);
                Vec::new()
            }
        }
    }

    async fn save_steps(&self, attempt: &Attempt, persisted: bool) {
        if !persisted {
            tracing::debug!("Attempt {} is local only, steps not saved", attempt.id);
            return;
        }

        if let Err(e) = track_store_operation(
            "update",
            PROBLEM_ATTEMPTS,
            self.store
                .save_steps(&attempt.id, &attempt.steps, attempt.updated_at),
        )
        .await
        {
            log_store_error("save steps", &attempt.user_id, &e);
        }
    }

    // Read-modify-write without a transaction: two sessions of the same
    // user on the same day can lose an increment.
    async fn bump_activity<F>(&self, user_id: &str, date: NaiveDate, apply: F)
    where
        F: FnOnce(&mut ActivityRecord),
    {
        match track_store_operation("select", ACTIVITY_LOG, self.store.get_activity(user_id, date)).await {
            Ok(Some(mut row)) => {
                apply(&mut row);
                if let Err(e) =
                    track_store_operation("update", ACTIVITY_LOG, self.store.update_activity(&row)).await
                {
                    log_store_error("update activity", user_id, &e);
                }
            }
            Ok(None) => {
                let mut row = ActivityRecord::empty(user_id, date);
                apply(&mut row);
                if let Err(e) =
                    track_store_operation("insert", ACTIVITY_LOG, self.store.insert_activity(&row)).await
                {
                    log_store_error("insert activity", user_id, &e);
                }
            }
            Err(e) => log_store_error("load activity", user_id, &e),
        }
    }
}

fn log_store_error(operation: &str, user_id: &str, error: &StoreError) {
    tracing::error!(
        "Progress store failed to {} for user={}: {}",
        operation,
        user_id,
        error
    );
}
