//! Configuration loader and validator for the daily digest bot.
use crate::i18n::Locale;
use crate::questions::{SelectionPlan, TopicTarget};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema. Secrets normally come
/// from the environment (see [`apply_env`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub weather: Weather,
    pub ai: Ai,
    pub database: Database,
    pub questions: Questions,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    pub locale: Locale,
    pub default_timezone: String,
    pub tick_interval_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for App {
    fn default() -> Self {
        Self {
            locale: Locale::Ru,
            default_timezone: "Europe/Minsk".into(),
            tick_interval_secs: 60,
            http_timeout_secs: 10,
        }
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Telegram {
    pub bot_token: String,
}

/// OpenWeatherMap settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Weather {
    pub api_key: String,
    pub base_url: String,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openweathermap.org/".into(),
        }
    }
}

/// Gemini settings. The whole section is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Ai {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub digest_line: bool,
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/".into(),
            model: "gemini-1.5-flash".into(),
            digest_line: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Database {
    pub url: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/digestbot.db".into(),
        }
    }
}

/// Question content location and per-topic selection table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Questions {
    pub path: PathBuf,
    pub recent_window_days: u32,
    pub default_count: usize,
    pub primary: Vec<TopicTarget>,
}

impl Default for Questions {
    fn default() -> Self {
        let primary = ["javascript", "typescript", "react", "css"]
            .into_iter()
            .map(|topic| TopicTarget {
                topic: topic.into(),
                count: 2,
            })
            .collect();
        Self {
            path: PathBuf::from("./data/questions"),
            recent_window_days: 7,
            default_count: 1,
            primary,
        }
    }
}

impl Questions {
    pub fn selection_plan(&self) -> SelectionPlan {
        SelectionPlan {
            primary: self.primary.clone(),
            default_count: self.default_count,
        }
    }
}

impl Config {
    pub fn ai_key(&self) -> Option<&str> {
        self.ai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn default_tz(&self) -> chrono_tz::Tz {
        self.app
            .default_timezone
            .parse()
            .unwrap_or(crate::time_util::FALLBACK_TZ)
    }
}

/// Load configuration from a YAML file, overlay the process environment and
/// validate the result.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A missing file is not an error; defaults are used instead.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let mut cfg = if path.exists() {
        let content = fs::read_to_string(path)?;
        parse(&content)?
    } else {
        Config::default()
    };
    apply_env(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

pub fn parse(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Overlay environment values on top of file settings. Non-empty env values win.
pub fn apply_env<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
        cfg.telegram.bot_token = v;
    }
    if let Some(v) = get("WEATHER_API_KEY") {
        cfg.weather.api_key = v;
    }
    if let Some(v) = get("GEMINI_API_KEY") {
        cfg.ai.api_key = Some(v);
    }
    if let Some(v) = get("DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = lookup("AI_DIGEST_LINE") {
        cfg.ai.digest_line = v.trim().eq_ignore_ascii_case("true");
    }
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token (TELEGRAM_BOT_TOKEN) must be non-empty"));
    }
    if cfg.weather.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("weather.api_key (WEATHER_API_KEY) must be non-empty"));
    }
    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Invalid("database.url (DATABASE_URL) must be non-empty"));
    }
    if cfg.app.default_timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::Invalid("app.default_timezone must be a known IANA timezone"));
    }
    if cfg.app.tick_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.tick_interval_secs must be > 0"));
    }
    if cfg.app.http_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.http_timeout_secs must be > 0"));
    }
    if cfg.questions.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("questions.path must be non-empty"));
    }
    let primary = &cfg.questions.primary;
    for (i, target) in primary.iter().enumerate() {
        if target.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("questions.primary topics must be non-empty"));
        }
        if primary[..i].iter().any(|t| t.topic == target.topic) {
            return Err(ConfigError::Invalid("questions.primary topics must be unique"));
        }
    }
    if cfg.ai.digest_line && cfg.ai_key().is_none() {
        return Err(ConfigError::Invalid("ai.digest_line (AI_DIGEST_LINE) requires ai.api_key (GEMINI_API_KEY)"));
    }
    Ok(())
}

/// Returns a sample YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  locale: ru
  default_timezone: "Europe/Minsk"
  tick_interval_secs: 60
  http_timeout_secs: 10

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"

weather:
  api_key: "YOUR_OPENWEATHER_API_KEY"
  base_url: "https://api.openweathermap.org/"

ai:
  model: "gemini-1.5-flash"
  digest_line: false

database:
  url: "sqlite://./data/digestbot.db"

questions:
  path: "./data/questions"
  recent_window_days: 7
  default_count: 1
  primary:
    - { topic: javascript, count: 2 }
    - { topic: typescript, count: 2 }
    - { topic: react, count: 2 }
    - { topic: css, count: 2 }
"#
}
