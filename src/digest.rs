//! Daily digest composition.
use crate::ai::TaglineProvider;
use crate::db::Pool;
use crate::i18n::{Messages, ANSWER_MARK, QUESTION_MARK};
use crate::model::{Question, User};
use crate::questions::QuestionBank;
use crate::weather::WeatherService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Render questions as `❓ [topic] question` / `✅ answer` pairs, one blank
/// line before each pair.
pub fn render_questions(questions: &[Question]) -> String {
    let mut lines = Vec::with_capacity(questions.len() * 2);
    for q in questions {
        if q.topic.trim().is_empty() {
            lines.push(format!("\n{} {}", QUESTION_MARK, q.question));
        } else {
            lines.push(format!("\n{} [{}] {}", QUESTION_MARK, q.topic, q.question));
        }
        lines.push(format!("{} {}", ANSWER_MARK, q.answer));
    }
    lines.join("\n")
}

pub struct DigestComposer {
    bank: Arc<QuestionBank>,
    weather: Arc<dyn WeatherService>,
    tagline: Option<Arc<dyn TaglineProvider>>,
    messages: Messages,
}

impl DigestComposer {
    pub fn new(
        bank: Arc<QuestionBank>,
        weather: Arc<dyn WeatherService>,
        tagline: Option<Arc<dyn TaglineProvider>>,
        messages: Messages,
    ) -> Self {
        Self {
            bank,
            weather,
            tagline,
            messages,
        }
    }

    /// Build the digest text for `user` and record the selected questions as
    /// sent. Weather and tagline failures degrade to placeholder/omission;
    /// only store errors are returned.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn compose(
        &self,
        pool: &Pool,
        user: &User,
        city: &str,
        local_now: DateTime<Tz>,
    ) -> Result<String> {
        let now_utc = local_now.with_timezone(&Utc);
        let header = self.messages.digest_header(local_now.date_naive(), city);

        let weather_line = match self.weather.current(city).await {
            Ok(w) => self.messages.digest_weather_line(&w),
            Err(err) => {
                warn!(?err, user_id = user.id, city, "weather lookup failed; using placeholder");
                self.messages.weather_no_data().to_string()
            }
        };

        let questions = match self.bank.select_questions(pool, user.id, now_utc).await {
            Ok(qs) => qs,
            Err(err) => {
                warn!(?err, user_id = user.id, "question selection failed; digest without questions");
                Vec::new()
            }
        };
        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        self.bank.record_sent(pool, user.id, &ids, now_utc).await?;

        let mut lines = vec![header, weather_line];
        if let (Some(provider), Some(first)) = (&self.tagline, questions.first()) {
            if let Some(tagline) = provider.one_liner(&first.question).await {
                lines.push(format!("\u{1f4a1} {}", tagline));
            }
        }
        if !questions.is_empty() {
            lines.push(render_questions(&questions));
        }
        Ok(lines.join("\n"))
    }
}
