use crate::model::{SentQuestionRecord, User};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

const USER_COLUMNS: &str =
    "id, chat_id, city, daily_time, timezone, enabled_daily_digest, last_digest_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask sqlx to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_or_create_user(pool: &Pool, chat_id: i64) -> Result<User> {
    if let Some(user) = find_user_by_chat(pool, chat_id).await? {
        return Ok(user);
    }
    // Two racing handlers for the same chat both land on the same row.
    sqlx::query("INSERT INTO users (chat_id) VALUES (?) ON CONFLICT(chat_id) DO NOTHING")
        .bind(chat_id)
        .execute(pool)
        .await?;
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?"
    ))
    .bind(chat_id)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn find_user_by_chat(pool: &Pool, chat_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?"
    ))
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn set_city(pool: &Pool, user_id: i64, city: &str) -> Result<()> {
    sqlx::query("UPDATE users SET city = ? WHERE id = ?")
        .bind(city)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn set_daily_time(pool: &Pool, user_id: i64, daily_time: &str) -> Result<()> {
    sqlx::query("UPDATE users SET daily_time = ? WHERE id = ?")
        .bind(daily_time)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn set_timezone(pool: &Pool, user_id: i64, timezone: &str) -> Result<()> {
    sqlx::query("UPDATE users SET timezone = ? WHERE id = ?")
        .bind(timezone)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn set_digest_enabled(pool: &Pool, user_id: i64, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE users SET enabled_daily_digest = ? WHERE id = ?")
        .bind(enabled)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Users with the digest switched on and both city and time configured.
#[instrument(skip_all)]
pub async fn list_digest_candidates(pool: &Pool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE enabled_daily_digest = 1 AND daily_time IS NOT NULL AND city IS NOT NULL \
         ORDER BY id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

#[instrument(skip_all)]
pub async fn mark_digest_sent(pool: &Pool, user_id: i64, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE users SET last_digest_at = ? WHERE id = ?")
        .bind(at)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Append-only; duplicates are allowed.
#[instrument(skip_all)]
pub async fn record_sent_questions(
    pool: &Pool,
    user_id: i64,
    question_ids: &[String],
    at: DateTime<Utc>,
) -> Result<()> {
    if question_ids.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    for question_id in question_ids {
        sqlx::query("INSERT INTO sent_questions (user_id, question_id, sent_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(question_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn sent_questions_since(
    pool: &Pool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<Vec<SentQuestionRecord>> {
    let rows = sqlx::query_as::<_, SentQuestionRecord>(
        "SELECT user_id, question_id, sent_at FROM sent_questions \
         WHERE user_id = ? AND datetime(sent_at) >= datetime(?) ORDER BY id ASC",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
