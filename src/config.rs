use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::types::{DigestError, Result};

/// One configured syndication endpoint. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    999
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub max_articles_per_source: usize,
    pub max_total_articles: usize,
    /// Entries older than this many hours are dropped.
    pub hours_threshold: i64,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Total attempts allowed per source.
    pub max_retries: u32,
    pub rotate_user_agent: bool,
    /// Used when rotation is disabled.
    pub user_agent: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: 20,
            max_total_articles: 60,
            hours_threshold: 24,
            request_timeout: 10,
            max_retries: 3,
            rotate_user_agent: true,
            user_agent: "Mozilla/5.0 (compatible; NewsBot/1.0)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
    /// How many stories the digest should contain.
    pub summary_count: usize,
    pub language: String,
    /// Minimum acceptable digest length in characters. When unset it is
    /// derived from `summary_count` (80 chars per expected item, clamped to
    /// 200..=800).
    pub min_summary_length: Option<usize>,
    /// Approximate prompt-size ceiling, in model tokens.
    pub token_budget: usize,
    /// Character-to-token ratio for the estimator used when no exact
    /// tokenizer is injected.
    pub chars_per_token: usize,
    pub safety_settings: SafetyConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash-8b".to_string(),
            temperature: 0.3,
            max_output_tokens: 2048,
            top_p: 0.9,
            top_k: 40,
            summary_count: 10,
            language: "ko".to_string(),
            min_summary_length: None,
            token_budget: 28_000,
            chars_per_token: 3,
            safety_settings: SafetyConfig::default(),
        }
    }
}

/// Block thresholds per harm category, passed through to the AI service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub harassment: String,
    pub hate_speech: String,
    pub sexually_explicit: String,
    pub dangerous_content: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            harassment: "BLOCK_NONE".to_string(),
            hate_speech: "BLOCK_NONE".to_string(),
            sexually_explicit: "BLOCK_NONE".to_string(),
            dangerous_content: "BLOCK_NONE".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub max_message_length: usize,
    pub disable_preview: bool,
    pub parse_mode: Option<String>,
    pub escape_markdown: bool,
    /// Pause between consecutive chunks, in seconds.
    pub send_interval: f64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            disable_preview: true,
            parse_mode: Some("Markdown".to_string()),
            escape_markdown: true,
            send_interval: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Digest prompt template. Placeholders: {summary_count},
    /// {hours_threshold}, {language}, {now}, {articles_text}.
    pub summary: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            summary: "\
You are a news editor. Below are articles collected from RSS feeds over the \
last {hours_threshold} hours. Current time: {now}.

Select exactly the {summary_count} most significant stories. When several \
articles cover the same event, merge them into a single item. Write the \
digest in {language}: one numbered item per story, a one- or two-sentence \
summary, then the source link on its own line.

Articles:

{articles_text}
"
            .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full configuration, constructed once at startup and passed by reference
/// into each component. No component reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rss_feeds: Vec<FeedSource>,
    pub collection: CollectionConfig,
    pub ai: AiConfig,
    pub telegram: TelegramConfig,
    pub prompts: PromptConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rss_feeds: default_feeds(),
            collection: CollectionConfig::default(),
            ai: AiConfig::default(),
            telegram: TelegramConfig::default(),
            prompts: PromptConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const KNOWN_MODELS: [&str; 6] = [
    "gemini-1.5-flash-8b",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
    "gemini-2.5-flash",
    "gemini-pro",
];

impl AppConfig {
    /// Loads the YAML config file. A missing file falls back to the built-in
    /// defaults; parse and validation errors are propagated. Missing fields
    /// and sections are filled from the defaults, so a partial file works.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Enabled feeds in priority order (lowest ordinal first).
    pub fn enabled_feeds(&self) -> Vec<FeedSource> {
        let mut feeds: Vec<FeedSource> = self
            .rss_feeds
            .iter()
            .filter(|feed| feed.enabled)
            .cloned()
            .collect();
        feeds.sort_by_key(|feed| feed.priority);
        feeds
    }

    /// Range checks mirroring what the deployment tooling enforces. The
    /// pipeline still receives this as already-validated input, but values it
    /// cannot act on sensibly are rejected here rather than deep inside a
    /// component.
    pub fn validate(&self) -> Result<()> {
        if self.rss_feeds.is_empty() {
            return Err(config_err("rss_feeds must not be empty"));
        }
        for feed in &self.rss_feeds {
            if feed.name.trim().is_empty() {
                return Err(config_err(format!("feed '{}' has an empty name", feed.url)));
            }
            let parsed = Url::parse(&feed.url)
                .map_err(|e| config_err(format!("feed '{}': invalid URL: {}", feed.name, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(config_err(format!(
                    "feed '{}': URL must be http(s), got {}",
                    feed.name, feed.url
                )));
            }
        }
        if !self.rss_feeds.iter().any(|feed| feed.enabled) {
            return Err(config_err("at least one feed must be enabled"));
        }

        let c = &self.collection;
        if !(1..=100).contains(&c.max_articles_per_source) {
            return Err(config_err(format!(
                "max_articles_per_source must be 1..=100, got {}",
                c.max_articles_per_source
            )));
        }
        if !(1..=200).contains(&c.max_total_articles) {
            return Err(config_err(format!(
                "max_total_articles must be 1..=200, got {}",
                c.max_total_articles
            )));
        }
        if !(1..=168).contains(&c.hours_threshold) {
            return Err(config_err(format!(
                "hours_threshold must be 1..=168, got {}",
                c.hours_threshold
            )));
        }
        if !(1..=60).contains(&c.request_timeout) {
            return Err(config_err(format!(
                "request_timeout must be 1..=60, got {}",
                c.request_timeout
            )));
        }
        if !(1..=10).contains(&c.max_retries) {
            return Err(config_err(format!(
                "max_retries must be 1..=10, got {}",
                c.max_retries
            )));
        }

        let ai = &self.ai;
        if !KNOWN_MODELS.contains(&ai.model.as_str()) {
            warn!("unknown model '{}', continuing anyway", ai.model);
        }
        if !(0.0..=2.0).contains(&ai.temperature) {
            return Err(config_err(format!(
                "temperature must be 0.0..=2.0, got {}",
                ai.temperature
            )));
        }
        if !(100..=8192).contains(&ai.max_output_tokens) {
            return Err(config_err(format!(
                "max_output_tokens must be 100..=8192, got {}",
                ai.max_output_tokens
            )));
        }
        if !(1..=50).contains(&ai.summary_count) {
            return Err(config_err(format!(
                "summary_count must be 1..=50, got {}",
                ai.summary_count
            )));
        }
        if ai.token_budget == 0 {
            return Err(config_err("token_budget must be at least 1"));
        }
        if ai.chars_per_token == 0 {
            return Err(config_err("chars_per_token must be at least 1"));
        }

        let tg = &self.telegram;
        if tg.max_message_length == 0 {
            return Err(config_err("max_message_length must be at least 1"));
        }
        if !tg.send_interval.is_finite() || tg.send_interval < 0.0 {
            return Err(config_err(format!(
                "send_interval must be a non-negative number, got {}",
                tg.send_interval
            )));
        }

        Ok(())
    }
}

fn config_err(message: impl Into<String>) -> DigestError {
    DigestError::Config(message.into())
}

fn default_feeds() -> Vec<FeedSource> {
    [
        ("The Jakarta Post", "https://www.thejakartapost.com/rss", 1),
        ("CNBC Indonesia", "https://www.cnbcindonesia.com/rss", 2),
        ("Tempo.co", "https://www.tempo.co/rss", 3),
        ("Antara News", "https://www.antaranews.com/rss/terkini", 4),
    ]
    .into_iter()
    .map(|(name, url, priority)| FeedSource {
        name: name.to_string(),
        url: url.to_string(),
        enabled: true,
        priority,
    })
    .collect()
}

/// API credentials, read from the environment before any network activity.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        const REQUIRED: [(&str, &str); 3] = [
            ("GEMINI_API_KEY", "Gemini API key"),
            ("TELEGRAM_BOT_TOKEN", "Telegram bot token"),
            ("TELEGRAM_CHAT_ID", "Telegram chat id"),
        ];

        let mut missing = Vec::new();
        let mut values = Vec::new();
        for (key, label) in REQUIRED {
            match env::var(key) {
                Ok(value) if !value.is_empty() => values.push(value),
                _ => missing.push(format!("{} ({})", key, label)),
            }
        }
        if !missing.is_empty() {
            return Err(DigestError::MissingEnv(missing.join(", ")));
        }

        let mut values = values.into_iter();
        let credentials = Self {
            gemini_api_key: values.next().unwrap_or_default(),
            telegram_bot_token: values.next().unwrap_or_default(),
            telegram_chat_id: values.next().unwrap_or_default(),
        };
        if !credentials.gemini_api_key.starts_with("AIza") {
            warn!("GEMINI_API_KEY does not look like a Gemini key");
        }
        Ok(credentials)
    }
}
