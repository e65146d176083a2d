use crate::ai::AiProvider;
use crate::db::{self, Pool};
use crate::digest::render_questions;
use crate::i18n::Messages;
use crate::questions::QuestionBank;
use crate::time_util::parse_time;
use crate::transport::Transport;
use crate::weather::WeatherService;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, instrument, warn};

/// A parsed chat command. Arguments are trimmed; empty arguments are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    SetCity(Option<String>),
    SetTime(Option<String>),
    SetTimezone(Option<String>),
    On,
    Off,
    Weather,
    Interview,
    Ask(Option<String>),
    Unknown(String),
}

/// Parse `/name[@bot] [args]`. Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let arg = (!args.is_empty()).then(|| args.to_string());

    let cmd = match name.as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "setcity" => Command::SetCity(arg),
        "settime" => Command::SetTime(arg),
        "settz" => Command::SetTimezone(arg),
        "on" => Command::On,
        "off" => Command::Off,
        "weather" => Command::Weather,
        "interview" => Command::Interview,
        "ask" => Command::Ask(arg),
        _ => Command::Unknown(name),
    };
    Some(cmd)
}

/// Shared collaborators for the command surface, built once at startup.
pub struct BotDeps {
    pub pool: Pool,
    pub bank: Arc<QuestionBank>,
    pub weather: Arc<dyn WeatherService>,
    pub ai: Option<Arc<dyn AiProvider>>,
    pub messages: Messages,
}

/// Execute `cmd` for `chat_id` and return the reply text.
#[instrument(skip(deps))]
pub async fn handle_command(deps: &BotDeps, chat_id: i64, cmd: Command) -> Result<String> {
    let m = &deps.messages;
    match cmd {
        Command::Start => {
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            info!(user_id = user.id, chat_id, "user started the bot");
            Ok(m.greeting())
        }
        Command::Help => Ok(m.help()),
        Command::SetCity(None) => Ok(m.setcity_usage().to_string()),
        Command::SetCity(Some(city)) => {
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            db::set_city(&deps.pool, user.id, &city).await?;
            Ok(m.city_saved(&city))
        }
        Command::SetTime(raw) => {
            let Some(time) = raw.as_deref().and_then(parse_time) else {
                return Ok(m.settime_usage().to_string());
            };
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            let normalized = time.to_string();
            db::set_daily_time(&deps.pool, user.id, &normalized).await?;
            Ok(m.time_saved(&normalized))
        }
        Command::SetTimezone(raw) => {
            let Some(tz) = raw.as_deref().and_then(|s| s.parse::<chrono_tz::Tz>().ok()) else {
                return Ok(m.settz_usage().to_string());
            };
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            db::set_timezone(&deps.pool, user.id, tz.name()).await?;
            Ok(m.tz_saved(tz.name()))
        }
        Command::On => {
            set_digest_enabled(deps, chat_id, true).await?;
            Ok(m.digest_enabled().to_string())
        }
        Command::Off => {
            set_digest_enabled(deps, chat_id, false).await?;
            Ok(m.digest_disabled().to_string())
        }
        Command::Weather => {
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            let Some(city) = user.city else {
                return Ok(m.city_required().to_string());
            };
            match deps.weather.current(&city).await {
                Ok(w) => Ok(m.weather_now(&city, &w)),
                Err(err) => {
                    warn!(?err, user_id = user.id, city = %city, "weather lookup failed");
                    Ok(m.weather_unavailable().to_string())
                }
            }
        }
        Command::Interview => {
            let user = db::get_or_create_user(&deps.pool, chat_id).await?;
            let now = Utc::now();
            let questions = deps.bank.select_questions(&deps.pool, user.id, now).await?;
            if questions.is_empty() {
                return Ok(m.no_questions().to_string());
            }
            let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
            deps.bank.record_sent(&deps.pool, user.id, &ids, now).await?;
            Ok(render_questions(&questions).trim().to_string())
        }
        Command::Ask(None) => Ok(m.ask_usage().to_string()),
        Command::Ask(Some(question)) => {
            let Some(ai) = &deps.ai else {
                return Ok(m.ai_unavailable().to_string());
            };
            match ai.ask(&question).await {
                Ok(answer) => Ok(answer),
                Err(err) => {
                    warn!(?err, chat_id, "AI request failed");
                    Ok(m.ai_failed().to_string())
                }
            }
        }
        Command::Unknown(name) => {
            info!(chat_id, command = %name, "unknown command");
            Ok(m.unknown_command().to_string())
        }
    }
}

async fn set_digest_enabled(deps: &BotDeps, chat_id: i64, enabled: bool) -> Result<()> {
    let user = db::get_or_create_user(&deps.pool, chat_id).await?;
    db::set_digest_enabled(&deps.pool, user.id, enabled).await?;
    info!(user_id = user.id, enabled, "daily digest toggled");
    Ok(())
}

/// Route one inbound message: commands get a reply, other text is ignored.
#[instrument(skip_all)]
pub async fn handle_update(deps: &BotDeps, transport: &dyn Transport, msg: &Message) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(cmd) = parse_command(text) else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;

    let reply = match handle_command(deps, chat_id, cmd).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(?err, chat_id, "command failed");
            deps.messages.internal_error().to_string()
        }
    };
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}
