use std::time::Duration;

use crate::completion::direct::SamplingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Local SQLite database owned by the worker.
    Sqlite,
    /// The web API's inquiry endpoint.
    Http,
}

impl StoreBackend {
    fn from_env(value: &str) -> anyhow::Result<Self> {
        match value {
            "sqlite" => Ok(Self::Sqlite),
            "http" => Ok(Self::Http),
            other => Err(anyhow::anyhow!(
                "Invalid INQUIRY_STORE '{other}'. Expected 'sqlite' or 'http'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the event receiver listens on
    pub port: u16,
    /// Which status store records terminal writes
    pub store_backend: StoreBackend,
    /// SQLite database used when `store_backend` is `Sqlite`
    pub database_url: String,
    /// Web API base URL used when `store_backend` is `Http`
    pub inquiry_api_base_url: Option<String>,
    /// `x-api-key` credential for the web API
    pub inquiry_api_key: Option<String>,
    /// Direct completion service base URL
    pub completion_base_url: String,
    pub completion_api_key: String,
    /// Fixed sampling policy for direct completions
    pub sampling: SamplingConfig,
    /// Workflow engine apps URL; runs live under `{base}/{owner}/{persona}/runs`
    pub managed_run_base_url: String,
    pub managed_run_owner: String,
    pub managed_run_api_key: String,
    /// Cumulative wall-clock budget for polling one managed run
    pub poll_ceiling: Duration,
    /// Jitter unit of the polling backoff
    pub poll_base_delay: Duration,
    /// Transport timeout for every outbound call
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let store_backend = StoreBackend::from_env(&env.str("INQUIRY_STORE", "sqlite"))?;
        let inquiry_api_base_url = env.opt("INQUIRY_API_BASE_URL");
        let inquiry_api_key = env.opt("INQUIRY_API_KEY");
        if store_backend == StoreBackend::Http
            && (inquiry_api_base_url.is_none() || inquiry_api_key.is_none())
        {
            return Err(anyhow::anyhow!(
                "INQUIRY_STORE=http requires INQUIRY_API_BASE_URL and INQUIRY_API_KEY"
            ));
        }

        let defaults = SamplingConfig::default();
        let sampling = SamplingConfig {
            model: env.str("COMPLETION_MODEL", &defaults.model),
            temperature: env.parse("COMPLETION_TEMPERATURE", defaults.temperature)?,
            max_tokens: env.parse("COMPLETION_MAX_TOKENS", defaults.max_tokens)?,
            top_p: env.parse("COMPLETION_TOP_P", defaults.top_p)?,
            frequency_penalty: env.parse(
                "COMPLETION_FREQUENCY_PENALTY",
                defaults.frequency_penalty,
            )?,
            presence_penalty: env.parse("COMPLETION_PRESENCE_PENALTY", defaults.presence_penalty)?,
        };

        let poll_base_ms: u64 = env.parse("MANAGED_RUN_POLL_BASE_MS", 1000)?;
        if poll_base_ms == 0 {
            return Err(anyhow::anyhow!("MANAGED_RUN_POLL_BASE_MS must be positive"));
        }

        Ok(Self {
            port: env.parse("INQUIRY_WORKER_PORT", 9191)?,
            store_backend,
            database_url: env.str("INQUIRY_DATABASE_URL", "sqlite:./data/inquiries.db"),
            inquiry_api_base_url,
            inquiry_api_key,
            completion_base_url: env.str("COMPLETION_BASE_URL", "https://api.openai.com/v1"),
            completion_api_key: env.required("OPENAI_API_KEY")?,
            sampling,
            managed_run_base_url: env.str("MANAGED_RUN_BASE_URL", "https://dust.tt/api/v1/apps"),
            managed_run_owner: env.required("MANAGED_RUN_OWNER")?,
            managed_run_api_key: env.required("DUST_API_KEY")?,
            poll_ceiling: Duration::from_millis(env.parse("MANAGED_RUN_POLL_CEILING_MS", 25_000)?),
            poll_base_delay: Duration::from_millis(poll_base_ms),
            http_timeout: Duration::from_secs(env.parse("HTTP_TIMEOUT_SECS", 120)?),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn str(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.opt(key)
            .ok_or_else(|| anyhow::anyhow!("Missing required env var {key}"))
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.opt(key) {
            Some(val) => val
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
            None => Ok(default),
        }
    }
}
