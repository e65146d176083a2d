use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;
use tg_digestbot::ai::{AiError, AiProvider};
use tg_digestbot::db;
use tg_digestbot::handlers::{handle_command, parse_command, BotDeps, Command};
use tg_digestbot::i18n::{Locale, Messages};
use tg_digestbot::questions::{QuestionBank, SelectionPlan, TopicTarget};
use tg_digestbot::weather::{WeatherFetchError, WeatherService, WeatherSummary};
use tokio::sync::Mutex;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Default)]
struct RecordingWeather {
    fail: bool,
    cities: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl WeatherService for RecordingWeather {
    async fn current(&self, city: &str) -> Result<WeatherSummary, WeatherFetchError> {
        self.cities.lock().await.push(city.to_string());
        if self.fail {
            return Err(WeatherFetchError::Malformed("missing main block".into()));
        }
        Ok(WeatherSummary {
            description: "overcast clouds".into(),
            temp: 7.2,
            feels_like: 4.8,
            precipitation_mm: Some(0.4),
        })
    }
}

struct EchoAi;

#[async_trait::async_trait]
impl AiProvider for EchoAi {
    async fn ask(&self, question: &str) -> Result<String, AiError> {
        if question.contains("fail") {
            return Err(AiError::Empty);
        }
        Ok(format!("answer to: {question}"))
    }
}

struct Fixture {
    deps: BotDeps,
    weather: Arc<RecordingWeather>,
    _dir: TempDir,
}

async fn fixture(weather_fails: bool, ai: Option<Arc<dyn AiProvider>>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let body = serde_json::json!([
        {"id": "js-1", "topic": "javascript", "question": "What is hoisting?", "answer": "Declarations move up."},
        {"id": "css-1", "topic": "css", "question": "What is specificity?", "answer": "Selector weight."}
    ]);
    std::fs::write(dir.path().join("q.json"), body.to_string()).unwrap();
    let plan = SelectionPlan {
        primary: vec![TopicTarget {
            topic: "javascript".into(),
            count: 1,
        }],
        default_count: 1,
    };
    let weather = Arc::new(RecordingWeather {
        fail: weather_fails,
        ..Default::default()
    });
    let deps = BotDeps {
        pool: setup_pool().await,
        bank: Arc::new(QuestionBank::new(dir.path(), plan, 7)),
        weather: weather.clone(),
        ai,
        messages: Messages::new(Locale::En),
    };
    Fixture {
        deps,
        weather,
        _dir: dir,
    }
}

async fn run(f: &Fixture, chat_id: i64, text: &str) -> String {
    let cmd = parse_command(text).expect("command");
    handle_command(&f.deps, chat_id, cmd).await.unwrap()
}

#[tokio::test]
async fn start_registers_user_once() {
    let f = fixture(false, None).await;
    let reply = run(&f, 42, "/start").await;
    assert!(reply.starts_with("Hi! The bot is ready."));
    assert!(reply.contains("/setcity"));
    run(&f, 42, "/start").await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE chat_id = 42")
        .fetch_one(&f.deps.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn setcity_without_argument_keeps_city() {
    let f = fixture(false, None).await;
    assert_eq!(run(&f, 1, "/setcity Berlin").await, "City saved: Berlin");
    assert_eq!(
        run(&f, 1, "/setcity   ").await,
        "Add a city after the command, for example: /setcity Berlin"
    );
    let user = db::find_user_by_chat(&f.deps.pool, 1).await.unwrap().unwrap();
    assert_eq!(user.city.as_deref(), Some("Berlin"));
}

#[tokio::test]
async fn settime_validates_and_stores() {
    let f = fixture(false, None).await;
    assert_eq!(
        run(&f, 1, "/settime 24:00").await,
        "Invalid format. Example: /settime 08:30"
    );
    assert_eq!(
        run(&f, 1, "/settime 8:30").await,
        "Invalid format. Example: /settime 08:30"
    );
    assert_eq!(run(&f, 1, "/settime").await, "Invalid format. Example: /settime 08:30");
    assert!(db::find_user_by_chat(&f.deps.pool, 1).await.unwrap().is_none());

    assert_eq!(run(&f, 1, "/settime 07:05").await, "Digest time saved: 07:05");
    let user = db::find_user_by_chat(&f.deps.pool, 1).await.unwrap().unwrap();
    assert_eq!(user.daily_time.as_deref(), Some("07:05"));
}

#[tokio::test]
async fn settz_accepts_only_known_zones() {
    let f = fixture(false, None).await;
    assert_eq!(
        run(&f, 1, "/settz Mars/Olympus").await,
        "Unknown timezone. Example: /settz Europe/Berlin"
    );
    assert_eq!(run(&f, 1, "/settz Europe/Berlin").await, "Timezone saved: Europe/Berlin");
    let user = db::find_user_by_chat(&f.deps.pool, 1).await.unwrap().unwrap();
    assert_eq!(user.timezone.as_deref(), Some("Europe/Berlin"));
}

#[tokio::test]
async fn on_and_off_toggle_digest() {
    let f = fixture(false, None).await;
    assert_eq!(run(&f, 5, "/on").await, "Daily digest enabled.");
    let user = db::find_user_by_chat(&f.deps.pool, 5).await.unwrap().unwrap();
    assert!(user.enabled_daily_digest);

    run(&f, 5, "/off").await;
    let user = db::find_user_by_chat(&f.deps.pool, 5).await.unwrap().unwrap();
    assert!(!user.enabled_daily_digest);
}

#[tokio::test]
async fn weather_requires_city() {
    let f = fixture(false, None).await;
    assert_eq!(run(&f, 3, "/weather").await, "Set your city first with /setcity");
    assert!(f.weather.cities.lock().await.is_empty());
}

#[tokio::test]
async fn weather_reports_current_conditions() {
    let f = fixture(false, None).await;
    run(&f, 3, "/setcity Minsk").await;
    assert_eq!(
        run(&f, 3, "/weather").await,
        "Weather now in Minsk: overcast clouds, 7°C (feels like 5°C), precipitation ~0.4 mm"
    );
    assert_eq!(*f.weather.cities.lock().await, vec!["Minsk".to_string()]);
}

#[tokio::test]
async fn weather_failure_is_reported_to_user() {
    let f = fixture(true, None).await;
    run(&f, 3, "/setcity Minsk").await;
    assert_eq!(
        run(&f, 3, "/weather").await,
        "Could not fetch the weather. Try again later."
    );
}

#[tokio::test]
async fn interview_records_sent_questions() {
    let f = fixture(false, None).await;
    let reply = run(&f, 8, "/interview").await;
    assert!(reply.starts_with("\u{2753} [javascript] What is hoisting?"), "{reply}");
    assert!(reply.contains("\u{2705} Selector weight."), "{reply}");

    let user = db::find_user_by_chat(&f.deps.pool, 8).await.unwrap().unwrap();
    let since = Utc::now() - chrono::Duration::minutes(5);
    let mut ids: Vec<String> = db::sent_questions_since(&f.deps.pool, user.id, since)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.question_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["css-1", "js-1"]);
}

#[tokio::test]
async fn ask_without_provider_or_argument() {
    let f = fixture(false, None).await;
    assert_eq!(
        run(&f, 1, "/ask").await,
        "Add a question after the command, for example: /ask what is a closure?"
    );
    assert_eq!(
        run(&f, 1, "/ask what is a promise?").await,
        "The assistant is not configured."
    );
}

#[tokio::test]
async fn ask_uses_provider_and_hides_errors() {
    let f = fixture(false, Some(Arc::new(EchoAi))).await;
    assert_eq!(
        run(&f, 1, "/ask what is a promise?").await,
        "answer to: what is a promise?"
    );
    assert_eq!(run(&f, 1, "/ask please fail").await, "Could not get an answer.");
}

#[tokio::test]
async fn unknown_command_gets_hint() {
    let f = fixture(false, None).await;
    let reply = handle_command(&f.deps, 1, Command::Unknown("dance".into()))
        .await
        .unwrap();
    assert_eq!(reply, "Unknown command. /help lists the commands.");
}
