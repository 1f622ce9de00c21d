use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::problem::DEMO_PROBLEM_ID;
use crate::models::Problem;
use crate::utils::jsonl::read_jsonl;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Filter and paging for [`ProblemCatalog::list`].
#[derive(Debug, Default, Clone)]
pub struct ProblemFilter {
    pub skill: Option<String>,
    pub max_difficulty: Option<u32>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// In-memory problem dataset, loaded lazily from JSONL.
///
/// The demonstration problem is always first. A missing dataset file leaves
/// only the demonstration problem; a dataset that fails to load is not
/// cached, so the next call tries again.
pub struct ProblemCatalog {
    path: Option<PathBuf>,
    problems: RwLock<Option<Arc<Vec<Problem>>>>,
    retry: RetryConfig,
}

impl ProblemCatalog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            problems: RwLock::new(None),
            retry: RetryConfig::default(),
        }
    }

    /// Catalog with a fixed problem set, never reloaded from disk.
    pub fn from_problems(problems: Vec<Problem>) -> Self {
        Self {
            path: None,
            problems: RwLock::new(Some(Arc::new(with_demo(problems)))),
            retry: RetryConfig::default(),
        }
    }

    async fn problems(&self) -> Arc<Vec<Problem>> {
        if let Some(loaded) = self.problems.read().await.as_ref() {
            return loaded.clone();
        }

        let mut guard = self.problems.write().await;
        if let Some(loaded) = guard.as_ref() {
            return loaded.clone();
        }

        let Some(path) = self.path.clone() else {
            let loaded = Arc::new(with_demo(Vec::new()));
            *guard = Some(loaded.clone());
            return loaded;
        };

        let result = retry_async_with_config(self.retry.clone(), || {
            let path = path.clone();
            async move { read_jsonl::<Problem>(&path).await }
        })
        .await;

        match result {
            Ok(problems) => {
                tracing::info!(
                    "Loaded {} problems from {}",
                    problems.len(),
                    path.display()
                );
                let loaded = Arc::new(with_demo(problems));
                *guard = Some(loaded.clone());
                loaded
            }
            Err(e) => {
                tracing::error!("Failed to load problems from {}: {:#}", path.display(), e);
                Arc::new(with_demo(Vec::new()))
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Problem> {
        self.problems()
            .await
            .iter()
            .find(|problem| problem.id == id)
            .cloned()
    }

    /// Returns the requested page and the total number of matches.
    pub async fn list(&self, filter: &ProblemFilter) -> (Vec<Problem>, usize) {
        let problems = self.problems().await;
        let matching: Vec<&Problem> = problems
            .iter()
            .filter(|problem| {
                filter
                    .skill
                    .as_deref()
                    .is_none_or(|skill| problem.has_skill(skill))
            })
            .filter(|problem| match (filter.max_difficulty, problem.difficulty) {
                (Some(max), Some(rank)) => rank <= max,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();

        let total = matching.len();
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .cloned()
            .collect();

        (page, total)
    }

    /// Drops the cached dataset; the next read reloads it.
    pub async fn invalidate(&self) {
        if self.path.is_none() {
            return;
        }
        *self.problems.write().await = None;
        tracing::info!("Problem catalog invalidated");
    }

    pub async fn len(&self) -> usize {
        self.problems().await.len()
    }
}

fn with_demo(problems: Vec<Problem>) -> Vec<Problem> {
    let mut all = Vec::with_capacity(problems.len() + 1);
    all.push(Problem::demo());
    all.extend(
        problems
            .into_iter()
            .filter(|problem| problem.id != DEMO_PROBLEM_ID),
    );
    all
}
