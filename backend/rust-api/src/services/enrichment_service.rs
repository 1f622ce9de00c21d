//! Offline dataset enrichment: skill tags per problem, then a difficulty
//! rank from pairwise comparisons.
//!
//! Both stages checkpoint to JSONL under the data directory and can be
//! restarted at any point. Tagging skips ids already written; ranking
//! never asks the same pair twice.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::config::{EnrichConfig, LlmConfig};
use crate::services::llm_client::{Completion, LlmClient};
use crate::utils::jsonl::{append_jsonl, read_jsonl, read_jsonl_while};

const MAX_FEW_SHOT_EXAMPLES: usize = 12;
const FINAL_WRITE_CHUNK: usize = 1000;

/// One dataset row as it moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichItem {
    pub id: u64,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_rank: Option<u32>,
}

/// Relative difficulty of the first item against the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "<")]
    Easier,
    #[serde(rename = ">")]
    Harder,
    #[serde(rename = "=")]
    Same,
}

impl Difficulty {
    /// Anything other than a leading `<` or `>` counts as a tie.
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().chars().next() {
            Some('<') => Difficulty::Easier,
            Some('>') => Difficulty::Harder,
            _ => Difficulty::Same,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Difficulty::Easier => Difficulty::Harder,
            Difficulty::Harder => Difficulty::Easier,
            Difficulty::Same => Difficulty::Same,
        }
    }
}

#[async_trait]
pub trait SkillTagger: Send + Sync {
    async fn tag(&self, item: &EnrichItem, examples: &[EnrichItem]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait DifficultyComparator: Send + Sync {
    async fn compare(&self, first: &EnrichItem, second: &EnrichItem) -> Result<Difficulty>;
}

const SKILL_SYSTEM_PROMPT: &str = "You are a skill tagger for math word problems.
You read a problem and its solution, then output a concise, comma-separated list of skill tags
(e.g., \"division, unit conversion, proportional reasoning\").
- Invent new tags when helpful. Prefer 1-4 words per tag.
- Be consistent: prefer reusing tags from the provided examples when applicable.
- Avoid duplication or near-duplicates (\"multiplication\" vs \"multiply\").
- Prefer general concepts over overly fine-grained steps unless critical.
- Do not include difficulty in tags.
";

const DIFF_SYSTEM_PROMPT: &str = "You are a judge comparing the relative difficulty of TWO grade-school math problem+solution pairs.
Assess difficulty for a typical grade-school student (ages ~8-12). Consider these heuristics:
- Number of reasoning steps
- Presence of multi-step arithmetic (esp. with carrying/borrowing) or unit conversions
- Need for forming equations/unknowns, proportional reasoning, or geometry reasoning
- Linguistic complexity and distractors
- Requirement to combine skills

Output a single character:
- '<' if the FIRST pair is EASIER than the second
- '>' if the FIRST pair is HARDER than the second
- '=' if they are roughly the same difficulty
No extra text.
";

pub fn build_skill_prompt(item: &EnrichItem, examples: &[EnrichItem]) -> String {
    let mut prompt = String::new();
    for example in examples {
        prompt.push_str(&format!(
            "Example:\nQ: {}\nA: {}\nTAGS: {}\n\n",
            example.question,
            example.answer,
            example.skill_tags.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "Now tag this item.\nQ: {}\nA: {}\nReturn only the tags, comma-separated.",
        item.question, item.answer
    ));
    prompt
}

pub fn build_diff_prompt(first: &EnrichItem, second: &EnrichItem) -> String {
    format!(
        "FIRST:\nQ1: {}\nA1: {}\n\nSECOND:\nQ2: {}\nA2: {}\n\n\
         Is the first easier (<), harder (>), or about the same (=)? Return exactly one of '<', '>', '='.",
        first.question, first.answer, second.question, second.answer
    )
}

pub fn parse_tags(reply: &str) -> Vec<String> {
    reply
        .split([',', ';'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// LLM-backed tagger and comparator.
pub struct LlmEnricher {
    client: LlmClient,
    skill_model: String,
    diff_model: String,
}

impl LlmEnricher {
    pub fn new(llm: &LlmConfig, retry_limit: usize) -> Result<Self> {
        let client = LlmClient::new(llm.api_key.clone(), &llm.api_endpoint, retry_limit);
        if !client.is_available() {
            bail!("OPENAI_API_KEY is required for enrichment");
        }
        Ok(Self {
            client,
            skill_model: llm.skill_model.clone(),
            diff_model: llm.diff_model.clone(),
        })
    }
}

#[async_trait]
impl SkillTagger for LlmEnricher {
    async fn tag(&self, item: &EnrichItem, examples: &[EnrichItem]) -> Result<Vec<String>> {
        let params = Completion {
            purpose: "skill",
            model: &self.skill_model,
            temperature: 0.2,
            max_tokens: 256,
        };
        let reply = self
            .client
            .complete(&params, SKILL_SYSTEM_PROMPT, &build_skill_prompt(item, examples))
            .await?;
        Ok(parse_tags(&reply))
    }
}

#[async_trait]
impl DifficultyComparator for LlmEnricher {
    async fn compare(&self, first: &EnrichItem, second: &EnrichItem) -> Result<Difficulty> {
        let params = Completion {
            purpose: "difficulty",
            model: &self.diff_model,
            temperature: 0.0,
            max_tokens: 4,
        };
        let reply = self
            .client
            .complete(&params, DIFF_SYSTEM_PROMPT, &build_diff_prompt(first, second))
            .await?;
        Ok(Difficulty::from_reply(&reply))
    }
}

// ---------------------------------------------------------------------------
// Skill tagging
// ---------------------------------------------------------------------------

async fn few_shot_examples(tagged_path: &Path) -> Result<Vec<EnrichItem>> {
    read_jsonl_while(
        tagged_path,
        |item: &EnrichItem| !item.skill_tags.is_empty() && !item.question.is_empty(),
        MAX_FEW_SHOT_EXAMPLES,
    )
    .await
}

/// Tags every raw item not yet in the tagged file. Returns how many were
/// written in this run. Items whose tagging fails are left for the next run.
pub async fn run_tagging(config: &EnrichConfig, tagger: &dyn SkillTagger) -> Result<usize> {
    let raw_path = PathBuf::from(config.raw_path());
    let tagged_path = PathBuf::from(config.tagged_path());

    if !tokio::fs::try_exists(&raw_path).await.unwrap_or(false) {
        bail!("No raw data at {}", raw_path.display());
    }

    let done: HashSet<u64> = read_jsonl::<EnrichItem>(&tagged_path)
        .await?
        .into_iter()
        .map(|item| item.id)
        .collect();

    let pending: Vec<EnrichItem> = read_jsonl::<EnrichItem>(&raw_path)
        .await?
        .into_iter()
        .filter(|item| !done.contains(&item.id))
        .collect();

    tracing::info!(
        "Skill tagging: {} already tagged, {} pending",
        done.len(),
        pending.len()
    );

    let mut written = 0;
    let mut examples = few_shot_examples(&tagged_path).await?;
    for batch in pending.chunks(config.skill_batch_size.max(1)) {
        if examples.len() < MAX_FEW_SHOT_EXAMPLES {
            examples = few_shot_examples(&tagged_path).await?;
        }

        let tagged: Vec<EnrichItem> = stream::iter(batch)
            .map(|item| {
                let examples = &examples;
                async move {
                    match tagger.tag(item, examples).await {
                        Ok(skill_tags) => Some(EnrichItem {
                            skill_tags,
                            ..item.clone()
                        }),
                        Err(e) => {
                            tracing::warn!("Tagging failed for item {}: {:#}", item.id, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(config.max_workers_skill.max(1))
            .filter_map(|item| async move { item })
            .collect()
            .await;

        append_jsonl(&tagged_path, &tagged).await?;
        written += tagged.len();
        tracing::info!("Tagged batch of {} ({} this run)", tagged.len(), written);
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// Difficulty ranking
// ---------------------------------------------------------------------------

/// Order-independent cache key for a pair of item indices.
pub fn pair_key(i: usize, j: usize) -> String {
    if i <= j {
        format!("{}|{}", i, j)
    } else {
        format!("{}|{}", j, i)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedComparison {
    k: String,
    r: Difficulty,
}

/// Pairwise results keyed by [`pair_key`]. Values are stored from the point
/// of view of the smaller index and flipped on read when needed.
pub struct ComparisonCache {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, Difficulty>>,
}

impl ComparisonCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_jsonl::<CachedComparison>(&path)
            .await
            .with_context(|| format!("Failed to load comparison cache {}", path.display()))?
            .into_iter()
            .map(|record| (record.k, record.r))
            .collect::<HashMap<_, _>>();

        tracing::info!("Loaded {} cached comparisons", entries.len());

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub async fn get(&self, i: usize, j: usize) -> Option<Difficulty> {
        let stored = *self.entries.lock().await.get(&pair_key(i, j))?;
        Some(if i <= j { stored } else { stored.reversed() })
    }

    pub async fn insert(&self, i: usize, j: usize, result: Difficulty) -> Result<()> {
        let stored = if i <= j { result } else { result.reversed() };
        let key = pair_key(i, j);
        self.entries.lock().await.insert(key.clone(), stored);

        if let Some(path) = &self.path {
            append_jsonl(path, &[CachedComparison { k: key, r: stored }]).await?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

type Groups = Vec<Vec<usize>>;

/// Bottom-up merge sort over equivalence groups. Runs at the same level are
/// merged concurrently; comparisons inside one merge are sequential.
pub struct Tournament<'a> {
    items: &'a [EnrichItem],
    comparator: &'a dyn DifficultyComparator,
    cache: &'a ComparisonCache,
    concurrency: usize,
}

impl<'a> Tournament<'a> {
    pub fn new(
        items: &'a [EnrichItem],
        comparator: &'a dyn DifficultyComparator,
        cache: &'a ComparisonCache,
        concurrency: usize,
    ) -> Self {
        Self {
            items,
            comparator,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    async fn compare(&self, i: usize, j: usize) -> Result<Difficulty> {
        if let Some(cached) = self.cache.get(i, j).await {
            return Ok(cached);
        }
        let result = self
            .comparator
            .compare(&self.items[i], &self.items[j])
            .await
            .with_context(|| format!("comparing items {} and {}", i, j))?;
        self.cache.insert(i, j, result).await?;
        Ok(result)
    }

    async fn merge(&self, left: Groups, right: Groups) -> Result<Groups> {
        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();

        loop {
            let (i, j) = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => (l[0], r[0]),
                _ => break,
            };
            match self.compare(i, j).await? {
                Difficulty::Easier => merged.extend(left.next()),
                Difficulty::Harder => merged.extend(right.next()),
                Difficulty::Same => {
                    if let (Some(mut l), Some(r)) = (left.next(), right.next()) {
                        l.extend(r);
                        l.sort_unstable();
                        merged.push(l);
                    }
                }
            }
        }

        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }

    /// Equivalence groups of item indices, easiest first.
    pub async fn sort(&self) -> Result<Groups> {
        let mut runs: Vec<Groups> = (0..self.items.len()).map(|i| vec![vec![i]]).collect();

        while runs.len() > 1 {
            let mut pairs = Vec::with_capacity(runs.len().div_ceil(2));
            let mut remaining = runs.into_iter();
            while let Some(left) = remaining.next() {
                pairs.push((left, remaining.next()));
            }

            runs = stream::iter(pairs)
                .map(|(left, right)| async move {
                    match right {
                        Some(right) => self.merge(left, right).await,
                        None => Ok(left),
                    }
                })
                .buffered(self.concurrency)
                .try_collect()
                .await?;

            tracing::debug!("Tournament level done, {} runs left", runs.len());
        }

        Ok(runs.pop().unwrap_or_default())
    }
}

/// Rank per item index; 1 is easiest and equal items share a rank.
pub fn assign_ranks(groups: &[Vec<usize>], len: usize) -> Vec<u32> {
    let mut ranks = vec![0; len];
    for (rank, group) in (1u32..).zip(groups) {
        for &idx in group {
            if let Some(slot) = ranks.get_mut(idx) {
                *slot = rank;
            }
        }
    }
    ranks
}

/// Ranks the tagged dataset (raw when nothing is tagged yet) and rewrites
/// the final file. Returns the number of difficulty levels.
pub async fn run_ranking(config: &EnrichConfig, comparator: &dyn DifficultyComparator) -> Result<usize> {
    let tagged_path = PathBuf::from(config.tagged_path());
    let source = if tokio::fs::try_exists(&tagged_path).await.unwrap_or(false) {
        tagged_path
    } else {
        PathBuf::from(config.raw_path())
    };
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        bail!("No data found. Run the tag stage first or place raw JSONL at {}", config.raw_path());
    }

    let items = read_jsonl::<EnrichItem>(&source).await?;
    tracing::info!("Ranking {} items from {}", items.len(), source.display());

    let cache = ComparisonCache::load(config.compare_cache_path()).await?;
    let groups = Tournament::new(&items, comparator, &cache, config.max_workers_diff)
        .sort()
        .await?;
    let ranks = assign_ranks(&groups, items.len());

    let final_path = PathBuf::from(config.final_path());
    match tokio::fs::remove_file(&final_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to reset {}", final_path.display())),
    }

    let ranked: Vec<EnrichItem> = items
        .into_iter()
        .zip(ranks)
        .map(|(item, rank)| EnrichItem {
            difficulty_rank: Some(rank),
            ..item
        })
        .collect();
    for chunk in ranked.chunks(FINAL_WRITE_CHUNK) {
        append_jsonl(&final_path, chunk).await?;
    }

    tracing::info!(
        "Wrote {} ranked items in {} difficulty levels to {}",
        ranked.len(),
        groups.len(),
        final_path.display()
    );

    Ok(groups.len())
}
