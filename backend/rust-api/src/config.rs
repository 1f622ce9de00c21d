use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMode {
    Heuristic,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub stroke_width: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 512,
            stroke_width: 6.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub skill_model: String,
    pub diff_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichConfig {
    pub data_dir: String,
    pub max_workers_skill: usize,
    pub max_workers_diff: usize,
    pub skill_batch_size: usize,
    pub retry_limit: usize,
}

impl EnrichConfig {
    pub fn raw_path(&self) -> String {
        format!("{}/orca_math_word_problems_200k.jsonl", self.data_dir)
    }

    pub fn tagged_path(&self) -> String {
        format!("{}/tagged.jsonl", self.data_dir)
    }

    pub fn compare_cache_path(&self) -> String {
        format!("{}/compare_cache.jsonl", self.data_dir)
    }

    pub fn final_path(&self) -> String {
        format!("{}/final_tagged_ranked.jsonl", self.data_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub recognition_url: String,
    pub mathpix_app_id: Option<String>,
    pub mathpix_app_key: Option<String>,
    pub judge_mode: JudgeMode,
    pub judge_url: Option<String>,
    pub judge_timeout_secs: Option<u64>,
    /// Sessions untouched for this long are dropped by the sweeper.
    pub session_idle_secs: u64,
    pub store_backend: StoreBackend,
    pub store_url: Option<String>,
    pub store_service_key: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub problems_path: String,
    pub canvas: CanvasConfig,
    pub llm: LlmConfig,
    pub enrich: EnrichConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the crate-local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(var).ok())
                .filter(|value| !value.trim().is_empty())
        };

        let bind_addr = lookup("server.bind_addr", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8081".to_string());

        let recognition_url = lookup("recognition.url", "RECOGNITION_URL")
            .unwrap_or_else(|| "http://localhost:8081/recognize".to_string());
        ensure_url("recognition.url", &recognition_url)?;

        let mathpix_app_id = lookup("mathpix.app_id", "MATHPIX_APP_ID");
        let mathpix_app_key = lookup("mathpix.app_key", "MATHPIX_APP_KEY");

        let judge_url = lookup("judge.url", "LLM_JUDGE_URL");
        if let Some(url) = &judge_url {
            ensure_url("judge.url", url)?;
        }
        let judge_mode = match lookup("judge.mode", "JUDGE_MODE").as_deref() {
            Some("remote") if judge_url.is_some() => JudgeMode::Remote,
            Some("remote") => {
                eprintln!("WARNING: judge.mode=remote without judge.url, using heuristic judge");
                JudgeMode::Heuristic
            }
            Some("heuristic") | None => JudgeMode::Heuristic,
            Some(other) => {
                return Err(config::ConfigError::Message(format!(
                    "unknown judge.mode '{}'",
                    other
                )))
            }
        };
        let judge_timeout_secs = parse_opt("judge.timeout_secs", lookup("judge.timeout_secs", "JUDGE_TIMEOUT_SECS"))?;
        let session_idle_secs = parse_opt(
            "sessions.idle_secs",
            lookup("sessions.idle_secs", "SESSION_IDLE_SECS"),
        )?
        .unwrap_or(1800);

        let store_url = lookup("store.url", "STORE_URL");
        if let Some(url) = &store_url {
            ensure_url("store.url", url)?;
        }
        let store_service_key = lookup("store.service_key", "STORE_SERVICE_KEY");
        let store_backend = match lookup("store.backend", "STORE_BACKEND").as_deref() {
            Some("rest") if store_url.is_some() && store_service_key.is_some() => {
                StoreBackend::Rest
            }
            Some("rest") => {
                if app_env == "prod" {
                    return Err(config::ConfigError::Message(
                        "store.backend=rest requires store.url and store.service_key".to_string(),
                    ));
                }
                eprintln!("WARNING: REST store not configured, progress kept in memory");
                StoreBackend::Memory
            }
            Some("memory") | None => StoreBackend::Memory,
            Some(other) => {
                return Err(config::ConfigError::Message(format!(
                    "unknown store.backend '{}'",
                    other
                )))
            }
        };

        let jwt_secret = lookup("auth.jwt_secret", "JWT_SECRET").unwrap_or_else(|| {
            if app_env == "prod" {
                panic!("FATAL: JWT_SECRET must be set in production!");
            }
            eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
            "dev-secret-only-for-local-testing".to_string()
        });
        let jwt_audience = lookup("auth.jwt_audience", "JWT_AUDIENCE");

        let problems_path = lookup("problems.path", "PROBLEMS_PATH")
            .unwrap_or_else(|| "./data/final_tagged_ranked.jsonl".to_string());

        let defaults = CanvasConfig::default();
        let canvas = CanvasConfig {
            width: parse_opt("canvas.width", lookup("canvas.width", "CANVAS_WIDTH"))?
                .unwrap_or(defaults.width),
            height: parse_opt("canvas.height", lookup("canvas.height", "CANVAS_HEIGHT"))?
                .unwrap_or(defaults.height),
            stroke_width: parse_opt(
                "canvas.stroke_width",
                lookup("canvas.stroke_width", "CANVAS_STROKE_WIDTH"),
            )?
            .unwrap_or(defaults.stroke_width),
        };

        let llm = LlmConfig {
            api_key: lookup("llm.api_key", "OPENAI_API_KEY"),
            api_endpoint: lookup("llm.api_endpoint", "LLM_API_ENDPOINT")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            skill_model: lookup("llm.skill_model", "SKILL_MODEL")
                .unwrap_or_else(|| "gpt-4.1-mini".to_string()),
            diff_model: lookup("llm.diff_model", "DIFF_MODEL")
                .unwrap_or_else(|| "gpt-4.1-mini".to_string()),
        };

        let enrich = EnrichConfig {
            data_dir: lookup("enrich.data_dir", "DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            max_workers_skill: parse_opt(
                "enrich.max_workers_skill",
                lookup("enrich.max_workers_skill", "MAX_WORKERS_SKILL"),
            )?
            .unwrap_or(128),
            max_workers_diff: parse_opt(
                "enrich.max_workers_diff",
                lookup("enrich.max_workers_diff", "MAX_WORKERS_DIFF"),
            )?
            .unwrap_or(128),
            skill_batch_size: parse_opt(
                "enrich.skill_batch_size",
                lookup("enrich.skill_batch_size", "SKILL_BATCH_SIZE"),
            )?
            .unwrap_or(50),
            retry_limit: parse_opt("enrich.retry_limit", lookup("enrich.retry_limit", "RETRY_LIMIT"))?
                .unwrap_or(6),
        };

        Ok(Config {
            bind_addr,
            recognition_url,
            mathpix_app_id,
            mathpix_app_key,
            judge_mode,
            judge_url,
            judge_timeout_secs,
            session_idle_secs,
            store_backend,
            store_url,
            store_service_key,
            jwt_secret,
            jwt_audience,
            problems_path,
            canvas,
            llm,
            enrich,
        })
    }

    pub fn mathpix_credentials(&self) -> Option<(&str, &str)> {
        match (&self.mathpix_app_id, &self.mathpix_app_key) {
            (Some(id), Some(key)) => Some((id.as_str(), key.as_str())),
            _ => None,
        }
    }
}

fn ensure_url(key: &str, value: &str) -> Result<(), config::ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| config::ConfigError::Message(format!("{} is not a valid URL: {}", key, e)))
}

fn parse_opt<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
) -> Result<Option<T>, config::ConfigError> {
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|_| {
            config::ConfigError::Message(format!("{} has an invalid value '{}'", key, value))
        })
    })
    .transpose()
}
