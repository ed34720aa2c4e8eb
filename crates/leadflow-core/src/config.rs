//! Layered settings.
//!
//! Order (later wins):
//! 1. defaults in code
//! 2. `config/default.toml` (optional)
//! 3. `config/{RUN_ENV}.toml` (optional, `RUN_ENV` defaults to `development`)
//! 4. `LEADFLOW__SECTION__KEY` environment variables
//!
//! `OPENAI_API_KEY` is also honoured for `openai.api_key`. `.env` is read
//! first when present.

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use config::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub timeouts: TimeoutSettings,
    pub openai: OpenAiSettings,
    pub scraper: ScraperSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Leads processed at once in the concurrent stages.
    pub concurrency: usize,
    /// Per-stage retry budget for auto-created (new lead) tasks.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 2,
            retry_delay_secs: 5,
            queue_capacity: 64,
            workers: 2,
        }
    }
}

impl PipelineSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub scrape_secs: u64,
    pub extract_secs: u64,
    pub briefing_secs: u64,
    pub email_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            scrape_secs: 45,
            extract_secs: 30,
            briefing_secs: 90,
            email_secs: 45,
        }
    }
}

impl TimeoutSettings {
    pub fn scrape(&self) -> Duration {
        Duration::from_secs(self.scrape_secs)
    }

    pub fn extract(&self) -> Duration {
        Duration::from_secs(self.extract_secs)
    }

    pub fn briefing(&self) -> Duration {
        Duration::from_secs(self.briefing_secs)
    }

    pub fn email(&self) -> Duration {
        Duration::from_secs(self.email_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// Without a key, extraction, briefing and email generation are disabled.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
        }
    }
}

impl OpenAiSettings {
    /// Configured, non-blank API key.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub user_agent: String,
    pub max_content_chars: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            max_content_chars: 20_000,
        }
    }
}

impl Settings {
    /// Load from files and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // .env は無くてもよい
        let _ = dotenvy::dotenv();

        let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_env}")).required(false))
            .add_source(
                Environment::with_prefix("LEADFLOW")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_override("openai.api_key", key)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
