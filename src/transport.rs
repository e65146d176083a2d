//! Outbound message delivery.
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use thiserror::Error;

/// Telegram rejects text messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),
    #[error("transport rejected message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DispatchError>;
}

/// A bot whose HTTP client gives up on any request after `timeout`.
pub fn build_bot(token: &str, timeout: Duration) -> Result<Bot, reqwest::Error> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()?;
    Ok(Bot::with_client(token, client))
}

/// `getUpdates` long-poll duration that still fits inside the client timeout.
pub fn long_poll_timeout(http_timeout: Duration) -> Duration {
    http_timeout / 2
}

#[async_trait]
impl Transport for Bot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::Rejected("empty message text".into()));
        }
        for part in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_message(ChatId(chat_id), part).await?;
        }
        Ok(())
    }
}

/// Split `text` into chunks of at most `max` characters, preferring line
/// breaks as cut points. Lines longer than `max` are cut mid-line.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.split('\n') {
        let mut line_chars: Vec<char> = line.chars().collect();
        let sep = usize::from(!current.is_empty());
        if current_len + sep + line_chars.len() <= max {
            if sep == 1 {
                current.push('\n');
            }
            current.extend(line_chars.iter());
            current_len += sep + line_chars.len();
            continue;
        }
        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }
        while line_chars.len() > max {
            let rest = line_chars.split_off(max);
            parts.push(line_chars.iter().collect());
            line_chars = rest;
        }
        current.extend(line_chars.iter());
        current_len = line_chars.len();
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_part() {
        assert_eq!(split_message("hello\nworld", 20), vec!["hello\nworld"]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let parts = split_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(parts, vec!["aaaa\nbbbb", "cccc"]);
        assert!(parts.iter().all(|p| p.chars().count() <= 9));
    }

    #[test]
    fn long_line_is_cut() {
        let parts = split_message("xy\nabcdefghij", 4);
        assert_eq!(parts, vec!["xy", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn long_poll_fits_in_client_timeout() {
        assert_eq!(long_poll_timeout(Duration::from_secs(10)), Duration::from_secs(5));
        assert!(long_poll_timeout(Duration::from_secs(1)) < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_sending() {
        let bot = build_bot("123:test", Duration::from_secs(1)).unwrap();
        let err = bot.send_text(1, "  \n ").await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)), "{err:?}");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ж".repeat(10);
        assert_eq!(split_message(&text, 10), vec![text.clone()]);
    }
}
