use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::canvas::{Canvas, CanvasError, Point};
use crate::config::CanvasConfig;
use crate::metrics::{SESSIONS_ACTIVE, STEPS_VALIDATED_TOTAL};
use crate::models::session::{SessionView, SubmitStepRequest, SubmitStepResponse, UndoResponse};
use crate::models::{Attempt, Problem, Step};
use crate::services::problem_catalog::ProblemCatalog;
use crate::services::progress_service::ProgressSync;
use crate::services::recognition_service::{RecognitionClient, RecognitionError};
use crate::services::step_checker::StepChecker;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session belongs to another user")]
    Forbidden,
    #[error("a step is already being checked")]
    Busy,
    #[error("this attempt is finished and read-only")]
    ReadOnly,
    #[error("{0}")]
    InvalidInput(String),
    #[error("could not read the handwriting, please write the step more clearly")]
    Unrecognized,
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("failed to capture canvas: {0}")]
    Canvas(#[from] CanvasError),
    #[error("problem {0} not found")]
    ProblemNotFound(String),
}

/// One step submission. Ink is rendered to an image, images go through
/// recognition, text is used as is.
#[derive(Debug, Clone)]
pub enum StepInput {
    Text(String),
    Image(String),
    Ink(Vec<Vec<Point>>),
}

impl TryFrom<SubmitStepRequest> for StepInput {
    type Error = SessionError;

    fn try_from(req: SubmitStepRequest) -> Result<Self, Self::Error> {
        match (req.text, req.image_base64, req.strokes) {
            (Some(text), None, None) => Ok(StepInput::Text(text)),
            (None, Some(image), None) => Ok(StepInput::Image(image)),
            (None, None, Some(strokes)) => Ok(StepInput::Ink(strokes)),
            (None, None, None) => Err(SessionError::InvalidInput(
                "one of text, image_base64 or strokes is required".to_string(),
            )),
            _ => Err(SessionError::InvalidInput(
                "only one of text, image_base64 or strokes may be sent".to_string(),
            )),
        }
    }
}

struct SessionState {
    attempt: Attempt,
    read_only: bool,
    persisted: bool,
}

struct Session {
    id: String,
    user_id: String,
    attempt_id: String,
    problem: Problem,
    state: Mutex<SessionState>,
    validating: AtomicBool,
    /// Unix millis of the last request that touched the session.
    last_active: AtomicI64,
}

impl Session {
    fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_for(&self, now_millis: i64) -> Duration {
        let idle = now_millis - self.last_active.load(Ordering::Relaxed);
        Duration::from_millis(idle.max(0) as u64)
    }

    fn view(&self, state: &SessionState) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            attempt_id: state.attempt.id.clone(),
            problem: self.problem.clone(),
            steps: state.attempt.steps.clone(),
            solved: state.attempt.solved,
            read_only: state.read_only,
            persisted: state.persisted,
        }
    }

    fn begin_validation(&self) -> Result<ValidatingGuard<'_>, SessionError> {
        self.validating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(ValidatingGuard(&self.validating))
    }
}

struct ValidatingGuard<'a>(&'a AtomicBool);

impl Drop for ValidatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns every open problem session and drives the step flow:
/// recognize, validate, append, persist, then the final solved check.
pub struct SessionController {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    catalog: Arc<ProblemCatalog>,
    checker: Arc<dyn StepChecker>,
    judge_label: &'static str,
    recognition: RecognitionClient,
    progress: ProgressSync,
    canvas: CanvasConfig,
}

impl SessionController {
    pub fn new(
        catalog: Arc<ProblemCatalog>,
        checker: Arc<dyn StepChecker>,
        judge_label: &'static str,
        recognition: RecognitionClient,
        progress: ProgressSync,
        canvas: CanvasConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            catalog,
            checker,
            judge_label,
            recognition,
            progress,
            canvas,
        }
    }

    /// Opens the problem for the user. An attempt already open in another
    /// session of the same user is shared rather than duplicated.
    pub async fn open(
        &self,
        user_id: &str,
        problem_id: &str,
        restart: bool,
    ) -> Result<SessionView, SessionError> {
        let problem = self
            .catalog
            .get(problem_id)
            .await
            .ok_or_else(|| SessionError::ProblemNotFound(problem_id.to_string()))?;

        self.progress.ensure_profile(user_id).await;
        let entered = self.progress.enter_problem(user_id, problem_id, restart).await;

        // Lookup, replacement and insert share one write lock so two
        // concurrent opens cannot register the same attempt twice.
        let mut sessions = self.sessions.write().await;

        let existing = sessions
            .values()
            .find(|s| s.user_id == user_id && s.attempt_id == entered.attempt.id)
            .cloned();
        if let Some(session) = existing {
            drop(sessions);
            session.touch();
            let mut state = session.state.lock().await;
            state.read_only |= entered.read_only;
            return Ok(session.view(&state));
        }

        // A new attempt on the same problem replaces the user's older session
        let replaced: Vec<String> = sessions
            .values()
            .filter(|s| s.user_id == user_id && s.problem.id == problem_id)
            .map(|s| s.id.clone())
            .collect();
        for id in &replaced {
            sessions.remove(id);
            SESSIONS_ACTIVE.dec();
            tracing::info!("Session {} replaced by a new attempt", id);
        }

        let session = Arc::new(Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            attempt_id: entered.attempt.id.clone(),
            problem,
            state: Mutex::new(SessionState {
                attempt: entered.attempt,
                read_only: entered.read_only,
                persisted: entered.persisted,
            }),
            validating: AtomicBool::new(false),
            last_active: AtomicI64::new(Utc::now().timestamp_millis()),
        });

        let view = {
            let state = session.state.lock().await;
            session.view(&state)
        };

        sessions.insert(session.id.clone(), session.clone());
        drop(sessions);
        SESSIONS_ACTIVE.inc();

        tracing::info!(
            "Session {} opened: user={}, problem={}, attempt={}, read_only={}",
            session.id,
            user_id,
            problem_id,
            view.attempt_id,
            view.read_only
        );

        Ok(view)
    }

    pub async fn view(&self, user_id: &str, session_id: &str) -> Result<SessionView, SessionError> {
        let session = self.session(user_id, session_id).await?;
        let state = session.state.lock().await;
        Ok(session.view(&state))
    }

    pub async fn submit_step(
        &self,
        user_id: &str,
        session_id: &str,
        input: StepInput,
    ) -> Result<SubmitStepResponse, SessionError> {
        let session = self.session(user_id, session_id).await?;
        let _validating = session.begin_validation()?;

        let prior_steps = {
            let state = session.state.lock().await;
            if state.read_only || state.attempt.solved {
                return Err(SessionError::ReadOnly);
            }
            state.attempt.step_texts()
        };

        let (text, image) = self.resolve_input(input).await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SessionError::Unrecognized);
        }

        let verdict = self
            .checker
            .check_step(&session.problem, &prior_steps, &text)
            .await;

        STEPS_VALIDATED_TOTAL
            .with_label_values(&[self.judge_label, verdict.outcome.as_str()])
            .inc();

        let mut state = session.state.lock().await;
        let persisted = state.persisted;

        let step = Step::new(text, verdict.outcome, Some(verdict.feedback), image);
        state.attempt.push_step(step.clone());
        self.progress.record_step(&state.attempt, persisted).await;

        let mut solved_feedback = None;
        if state.attempt.last_step_correct() {
            let all_steps = state.attempt.step_texts();
            let solved = self.checker.check_solved(&session.problem, &all_steps).await;
            if solved.is_solved {
                state.attempt.mark_solved(Utc::now());
                self.progress.record_solved(&state.attempt, persisted).await;
            }
            solved_feedback = Some(solved.feedback);
        }

        tracing::info!(
            "Session {} step {}: outcome={}, solved={}",
            session.id,
            state.attempt.steps.len(),
            step.outcome.as_str(),
            state.attempt.solved
        );

        Ok(SubmitStepResponse {
            step,
            solved: state.attempt.solved,
            solved_feedback,
            session: session.view(&state),
        })
    }

    pub async fn undo(&self, user_id: &str, session_id: &str) -> Result<UndoResponse, SessionError> {
        let session = self.session(user_id, session_id).await?;
        let _validating = session.begin_validation()?;

        let mut state = session.state.lock().await;
        if state.read_only || state.attempt.solved {
            return Err(SessionError::ReadOnly);
        }

        let removed = state.attempt.undo_step();
        if removed.is_some() {
            let persisted = state.persisted;
            self.progress.record_undo(&state.attempt, persisted).await;
        }

        Ok(UndoResponse {
            removed,
            session: session.view(&state),
        })
    }

    pub async fn close(&self, user_id: &str, session_id: &str) -> Result<(), SessionError> {
        self.session(user_id, session_id).await?;
        if self.sessions.write().await.remove(session_id).is_some() {
            SESSIONS_ACTIVE.dec();
            tracing::info!("Session {} closed", session_id);
        }
        Ok(())
    }

    /// Drops sessions idle for at least `max_idle`. Sessions with a step
    /// in flight are kept. Returns how many were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now().timestamp_millis();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.validating.load(Ordering::Acquire) || session.idle_for(now) < max_idle;
            if !keep {
                tracing::info!(
                    "Session {} expired after {}s idle",
                    id,
                    session.idle_for(now).as_secs()
                );
            }
            keep
        });
        let evicted = before - sessions.len();
        SESSIONS_ACTIVE.sub(evicted as i64);
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, user_id: &str, session_id: &str) -> Result<Arc<Session>, SessionError> {
        let session = self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.user_id != user_id {
            tracing::warn!(
                "User {} tried to access session {} owned by {}",
                user_id,
                session_id,
                session.user_id
            );
            return Err(SessionError::Forbidden);
        }

        session.touch();
        Ok(session)
    }

    async fn resolve_input(
        &self,
        input: StepInput,
    ) -> Result<(String, Option<String>), SessionError> {
        match input {
            StepInput::Text(text) if text.trim().is_empty() => Err(SessionError::InvalidInput(
                "step text is empty".to_string(),
            )),
            StepInput::Text(text) => Ok((text, None)),
            StepInput::Image(image) => {
                let text = self.recognition.recognize(&image).await?;
                Ok((text, Some(image)))
            }
            StepInput::Ink(strokes) => {
                let canvas = Canvas::from_strokes(&self.canvas, &strokes);
                if canvas.is_empty() {
                    return Err(SessionError::InvalidInput(
                        "the canvas is empty".to_string(),
                    ));
                }
                let image = canvas.snapshot()?;
                let text = self.recognition.recognize(&image).await?;
                Ok((text, Some(image)))
            }
        }
    }
}
