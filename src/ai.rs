//! Gemini-backed assistant: free-form answers and short digest taglines.
//!
//! The two capabilities are separate traits so that callers decide at
//! construction time whether a tagline source exists at all.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::i18n::Locale;

pub const TAGLINE_MAX_CHARS: usize = 120;
const ANSWER_MAX_CHARS: usize = 1200;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to reach AI API: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid AI API URL: {0}")]
    InvalidUrl(String),
    #[error("AI returned an empty answer")]
    Empty,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, AiError>;
}

#[async_trait]
pub trait TaglineProvider: Send + Sync {
    /// One short phrase derived from `text`, or `None` on any failure.
    async fn one_liner(&self, text: &str) -> Option<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    model: String,
    locale: Locale,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Default, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        model: &str,
        locale: Locale,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = Client::builder()
            .user_agent("tg-digestbot/0.1")
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(base_url).map_err(|e| AiError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model: model.to_string(),
            locale,
        })
    }

    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, AiError> {
        let mut url = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|e| AiError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![PartOut { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature,
            },
        };

        let res = self.http.post(url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }
        let payload: GenerateResponse = res.json().await?;
        let text = payload.text();
        if text.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    #[instrument(skip_all)]
    async fn ask(&self, question: &str) -> Result<String, AiError> {
        let prompt = [
            "You are an interview assistant for a frontend developer.".to_string(),
            format!(
                "Answer in {}, briefly and in a structured way.",
                self.locale.language_name()
            ),
            "If you are not sure, say so.".to_string(),
            format!("At most {} characters.", ANSWER_MAX_CHARS),
            "Add code samples only when explicitly asked.".to_string(),
            "Question:".to_string(),
            question.to_string(),
        ]
        .join("\n");
        self.generate(&prompt, 512, 0.2).await
    }
}

#[async_trait]
impl TaglineProvider for GeminiClient {
    #[instrument(skip_all)]
    async fn one_liner(&self, text: &str) -> Option<String> {
        let prompt = [
            format!(
                "Write one short interview phrase in {}.",
                self.locale.language_name()
            ),
            format!("No more than {} characters.", TAGLINE_MAX_CHARS),
            "Text:".to_string(),
            text.to_string(),
        ]
        .join("\n");
        match self.generate(&prompt, 80, 0.3).await {
            Ok(line) => Some(truncate_chars(&line, TAGLINE_MAX_CHARS)),
            Err(err) => {
                warn!(?err, "tagline generation failed");
                None
            }
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
