use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, JudgeMode, StoreBackend};

pub mod enrichment_service;
pub mod llm_client;
pub mod mathpix_service;
pub mod problem_catalog;
pub mod progress_service;
pub mod progress_store;
pub mod recognition_service;
pub mod session_service;
pub mod step_checker;

use mathpix_service::MathpixService;
use problem_catalog::ProblemCatalog;
use progress_service::ProgressSync;
use progress_store::{MemoryProgressStore, ProgressStore, RestProgressStore};
use recognition_service::RecognitionClient;
use session_service::SessionController;
use step_checker::{HeuristicChecker, RemoteJudge, StepChecker};

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<ProblemCatalog>,
    pub progress: ProgressSync,
    pub sessions: SessionController,
    /// Present only when Mathpix credentials are configured.
    pub mathpix: Option<MathpixService>,
    pub judge_label: &'static str,
    pub store_label: &'static str,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let (store, store_label): (Arc<dyn ProgressStore>, &'static str) = match config.store_backend {
            StoreBackend::Rest => {
                let url = config
                    .store_url
                    .as_deref()
                    .context("STORE_URL is required for the rest store backend")?;
                let key = config
                    .store_service_key
                    .as_deref()
                    .context("STORE_SERVICE_KEY is required for the rest store backend")?;
                tracing::info!("Progress store: REST tables at {}", url);
                (Arc::new(RestProgressStore::new(url, key)), "rest")
            }
            StoreBackend::Memory => {
                tracing::warn!("Progress store: in-memory, progress is lost on restart");
                (Arc::new(MemoryProgressStore::new()), "memory")
            }
        };

        let (checker, judge_label): (Arc<dyn StepChecker>, &'static str) = match (
            config.judge_mode,
            config.judge_url.as_deref(),
        ) {
            (JudgeMode::Remote, Some(url)) => {
                let timeout = config.judge_timeout_secs.map(Duration::from_secs);
                tracing::info!("Step judge: remote at {} (timeout {:?})", url, timeout);
                (Arc::new(RemoteJudge::new(url, timeout)?), "remote")
            }
            _ => {
                tracing::info!("Step judge: local heuristic");
                (Arc::new(HeuristicChecker::new()), "heuristic")
            }
        };

        let catalog = Arc::new(ProblemCatalog::new(Some(PathBuf::from(&config.problems_path))));

        let mut state = Self::with_parts(config, store, checker, judge_label, catalog)?;
        state.store_label = store_label;
        Ok(state)
    }

    /// Assembles the state from already built parts.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn ProgressStore>,
        checker: Arc<dyn StepChecker>,
        judge_label: &'static str,
        catalog: Arc<ProblemCatalog>,
    ) -> anyhow::Result<Self> {
        let mathpix = match config.mathpix_credentials() {
            Some((app_id, app_key)) => Some(MathpixService::new(app_id, app_key)?),
            None => {
                tracing::warn!("Mathpix credentials not set, /recognize is disabled");
                None
            }
        };

        let progress = ProgressSync::new(store);
        let sessions = SessionController::new(
            catalog.clone(),
            checker,
            judge_label,
            RecognitionClient::new(config.recognition_url.clone()),
            progress.clone(),
            config.canvas.clone(),
        );

        Ok(Self {
            config,
            catalog,
            progress,
            sessions,
            mathpix,
            judge_label,
            store_label: "custom",
        })
    }
}

/// Background loop that drops idle sessions, checking every half idle period.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let max_idle = Duration::from_secs(state.config.session_idle_secs.max(1));
    let interval = (max_idle / 2).max(Duration::from_secs(1));
    tracing::info!(
        "Starting session sweeper (idle limit {}s, interval {}s)",
        max_idle.as_secs(),
        interval.as_secs()
    );

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = state.sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                tracing::info!("Session sweeper dropped {} idle sessions", evicted);
            }
        }
    })
}
