//! Interview question bank: load-once content cache and topic-weighted,
//! no-repeat selection.
use crate::db::{self, Pool};
use crate::model::Question;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question content {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse question file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Target question count for one topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicTarget {
    pub topic: String,
    pub count: usize,
}

/// Primary topics in draw order plus the count for every other topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    pub primary: Vec<TopicTarget>,
    pub default_count: usize,
}

impl SelectionPlan {
    fn is_primary(&self, topic: &str) -> bool {
        self.primary.iter().any(|t| t.topic == topic)
    }
}

pub struct QuestionBank {
    source: PathBuf,
    plan: SelectionPlan,
    recent_window: Duration,
    cache: OnceCell<Arc<Vec<Question>>>,
}

impl QuestionBank {
    pub fn new(source: impl Into<PathBuf>, plan: SelectionPlan, recent_window_days: u32) -> Self {
        Self {
            source: source.into(),
            plan,
            recent_window: Duration::days(i64::from(recent_window_days)),
            cache: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.initialized()
    }

    /// The full question set. The first caller loads it; concurrent callers
    /// wait for that load. A failed load is not cached and is retried on the
    /// next call.
    pub async fn questions(&self) -> Result<Arc<Vec<Question>>, QuestionBankError> {
        self.cache
            .get_or_try_init(|| async {
                let questions = load_questions(&self.source).await?;
                info!(count = questions.len(), source = %self.source.display(), "loaded question bank");
                Ok::<_, QuestionBankError>(Arc::new(questions))
            })
            .await
            .cloned()
    }

    /// Pick questions for `user_id`, avoiding anything sent within the recent
    /// window where the content allows it. Does not record anything.
    #[instrument(skip(self, pool))]
    pub async fn select_questions(
        &self,
        pool: &Pool,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Question>> {
        let questions = self.questions().await?;
        if questions.is_empty() {
            return Ok(Vec::new());
        }
        let recent: HashSet<String> =
            db::sent_questions_since(pool, user_id, now - self.recent_window)
                .await?
                .into_iter()
                .map(|r| r.question_id)
                .collect();
        let selected = select_from(&questions, &recent, &self.plan, &mut rand::thread_rng());
        Ok(selected)
    }

    /// Append the given ids to the user's sent log.
    pub async fn record_sent(
        &self,
        pool: &Pool,
        user_id: i64,
        question_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        db::record_sent_questions(pool, user_id, question_ids, now).await
    }
}

/// Read a single JSON file, or every `*.json` file of a directory in file-name
/// order. Later duplicates of an id are dropped.
pub async fn load_questions(source: &Path) -> Result<Vec<Question>, QuestionBankError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| QuestionBankError::Io { path, source }
    };

    let meta = tokio::fs::metadata(source).await.map_err(io_err(source))?;
    let files = if meta.is_dir() {
        let mut entries = tokio::fs::read_dir(source).await.map_err(io_err(source))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(source))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        files
    } else {
        vec![source.to_path_buf()]
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for file in files {
        let raw = tokio::fs::read_to_string(&file).await.map_err(io_err(file.as_path()))?;
        let shard: Vec<Question> =
            serde_json::from_str(&raw).map_err(|source| QuestionBankError::Parse {
                path: file.clone(),
                source,
            })?;
        for q in shard {
            if seen.insert(q.id.clone()) {
                out.push(q);
            } else {
                warn!(id = %q.id, file = %file.display(), "duplicate question id ignored");
            }
        }
    }
    Ok(out)
}

/// Topic-weighted selection over an in-memory question set.
///
/// Primary topics are visited in plan order, then the remaining topics in the
/// order they first appear in `questions`. Each topic first draws from items
/// not in `recent`; if that falls short, it backfills from the rest of the
/// topic. No id is returned twice.
pub fn select_from<R: Rng + ?Sized>(
    questions: &[Question],
    recent: &HashSet<String>,
    plan: &SelectionPlan,
    rng: &mut R,
) -> Vec<Question> {
    let mut topic_order: Vec<&str> = Vec::new();
    let mut by_topic: HashMap<&str, Vec<&Question>> = HashMap::new();
    for q in questions {
        by_topic
            .entry(q.topic.as_str())
            .or_insert_with(|| {
                topic_order.push(q.topic.as_str());
                Vec::new()
            })
            .push(q);
    }

    let visits = plan
        .primary
        .iter()
        .map(|t| (t.topic.as_str(), t.count))
        .chain(
            topic_order
                .iter()
                .filter(|topic| !plan.is_primary(topic))
                .map(|topic| (*topic, plan.default_count)),
        );

    let mut picked: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for (topic, target) in visits {
        let Some(pool) = by_topic.get(topic) else {
            continue;
        };

        let fresh: Vec<&Question> = pool
            .iter()
            .copied()
            .filter(|q| !recent.contains(&q.id) && !picked.contains(q.id.as_str()))
            .collect();
        let mut picks = take_random(fresh, target, rng);

        if picks.len() < target {
            let backfill: Vec<&Question> = pool
                .iter()
                .copied()
                .filter(|q| !picked.contains(q.id.as_str()) && !picks.iter().any(|p| p.id == q.id))
                .collect();
            let missing = target - picks.len();
            picks.extend(take_random(backfill, missing, rng));
        }

        for q in picks {
            picked.insert(q.id.as_str());
            out.push(q.clone());
        }
    }
    out
}

fn take_random<'a, R: Rng + ?Sized>(
    mut items: Vec<&'a Question>,
    count: usize,
    rng: &mut R,
) -> Vec<&'a Question> {
    items.shuffle(rng);
    items.truncate(count);
    items
}
