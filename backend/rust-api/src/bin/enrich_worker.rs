use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orcamath_api::{
    config::Config,
    services::enrichment_service::{run_ranking, run_tagging, LlmEnricher},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Tag,
    Rank,
    All,
}

impl std::str::FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tag" => Ok(Stage::Tag),
            "rank" => Ok(Stage::Rank),
            "all" | "" => Ok(Stage::All),
            other => bail!("Unknown ENRICH_STAGE '{}', expected tag, rank or all", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orcamath_api=info,enrich_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    let stage: Stage = std::env::var("ENRICH_STAGE")
        .unwrap_or_default()
        .parse()?;

    tokio::fs::create_dir_all(&config.enrich.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.enrich.data_dir))?;

    let enricher = LlmEnricher::new(&config.llm, config.enrich.retry_limit)?;

    tracing::info!(
        "Enrichment worker starting: stage={:?}, data_dir={}",
        stage,
        config.enrich.data_dir
    );

    if matches!(stage, Stage::Tag | Stage::All) {
        let written = run_tagging(&config.enrich, &enricher).await?;
        tracing::info!(
            "Tagged {} items into {}",
            written,
            config.enrich.tagged_path()
        );
    }

    if matches!(stage, Stage::Rank | Stage::All) {
        let levels = run_ranking(&config.enrich, &enricher).await?;
        tracing::info!(
            "Ranked dataset into {} levels at {}",
            levels,
            config.enrich.final_path()
        );
    }

    Ok(())
}
