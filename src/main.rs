use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::Update;
use teloxide::update_listeners::Polling;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tg_digestbot::ai::{AiProvider, GeminiClient, TaglineProvider};
use tg_digestbot::config;
use tg_digestbot::db;
use tg_digestbot::digest::DigestComposer;
use tg_digestbot::handlers::{self, BotDeps};
use tg_digestbot::i18n::Messages;
use tg_digestbot::questions::QuestionBank;
use tg_digestbot::scheduler::DigestScheduler;
use tg_digestbot::shutdown::ShutdownSignals;
use tg_digestbot::transport::{build_bot, long_poll_timeout, Transport};
use tg_digestbot::weather::{OpenWeatherClient, WeatherService};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let signals = ShutdownSignals::install()?;
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.database.url).await?;
    db::run_migrations(&pool).await?;

    let timeout = Duration::from_secs(cfg.app.http_timeout_secs);
    let messages = Messages::new(cfg.app.locale);

    let weather: Arc<dyn WeatherService> = Arc::new(OpenWeatherClient::new(
        cfg.weather.api_key.clone(),
        &cfg.weather.base_url,
        cfg.app.locale.code(),
        timeout,
    )?);

    let gemini = match cfg.ai_key() {
        Some(key) => Some(Arc::new(GeminiClient::new(
            key.to_string(),
            &cfg.ai.base_url,
            &cfg.ai.model,
            cfg.app.locale,
            timeout,
        )?)),
        None => None,
    };
    let ai: Option<Arc<dyn AiProvider>> = gemini.clone().map(|g| g as Arc<dyn AiProvider>);
    let tagline: Option<Arc<dyn TaglineProvider>> = if cfg.ai.digest_line {
        gemini.map(|g| g as Arc<dyn TaglineProvider>)
    } else {
        None
    };

    let bank = Arc::new(QuestionBank::new(
        cfg.questions.path.clone(),
        cfg.questions.selection_plan(),
        cfg.questions.recent_window_days,
    ));

    let bot = build_bot(&cfg.telegram.bot_token, timeout)?;
    let transport: Arc<dyn Transport> = Arc::new(bot.clone());

    let composer = DigestComposer::new(bank.clone(), weather.clone(), tagline, messages);
    let scheduler = Arc::new(DigestScheduler::new(
        pool.clone(),
        composer,
        transport,
        cfg.default_tz(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(
        scheduler.run(Duration::from_secs(cfg.app.tick_interval_secs), shutdown_rx),
    );

    let deps = Arc::new(BotDeps {
        pool: pool.clone(),
        bank,
        weather,
        ai,
        messages,
    });

    let listener = Polling::builder(bot.clone())
        .timeout(long_poll_timeout(timeout))
        .delete_webhook()
        .await
        .build();
    let mut dispatcher = Dispatcher::builder(bot, Update::filter_message().endpoint(on_message))
        .dependencies(dptree::deps![deps])
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        signals.recv().await;
        // The dispatcher may not have started polling yet.
        loop {
            match token.shutdown() {
                Ok(stopped) => {
                    stopped.await;
                    break;
                }
                Err(err) => {
                    warn!(?err, "dispatcher not running yet; retrying shutdown");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
            }
        }
    });

    info!("starting telegram bot");
    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("update listener error"),
        )
        .await;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(err) = scheduler_task.await {
        error!(?err, "scheduler task ended abnormally");
    }
    pool.close().await;
    Ok(())
}

async fn on_message(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> ResponseResult<()> {
    if let Err(err) = handlers::handle_update(&deps, &bot, &msg).await {
        error!(?err, "failed to handle update");
    }
    Ok(())
}
