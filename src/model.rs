use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-chat preference record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub chat_id: i64,
    pub city: Option<String>,
    pub daily_time: Option<String>,
    pub timezone: Option<String>,
    pub enabled_daily_digest: bool,
    pub last_digest_at: Option<DateTime<Utc>>,
}

impl User {
    /// Enabled, with both a city and a send time configured.
    pub fn digest_eligible(&self) -> bool {
        self.enabled_daily_digest && self.city.is_some() && self.daily_time.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Junior,
    Middle,
    Senior,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub level: Option<Level>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SentQuestionRecord {
    pub user_id: i64,
    pub question_id: String,
    pub sent_at: DateTime<Utc>,
}
