use std::time::Duration;
use tg_digestbot::ai::{AiError, AiProvider, GeminiClient, TaglineProvider, TAGLINE_MAX_CHARS};
use tg_digestbot::i18n::Locale;
use tg_digestbot::transport::{build_bot, DispatchError, Transport};
use tg_digestbot::weather::{OpenWeatherClient, WeatherFetchError, WeatherService};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-test";

fn weather_client(server: &MockServer) -> OpenWeatherClient {
    OpenWeatherClient::new("owm-key".into(), &server.uri(), "en", Duration::from_secs(5)).unwrap()
}

fn gemini_client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        "ai-key".into(),
        &server.uri(),
        MODEL,
        Locale::En,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

#[tokio::test]
async fn weather_success_maps_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Berlin"))
        .and(query_param("appid", "owm-key"))
        .and(query_param("units", "metric"))
        .and(query_param("lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "weather": [{"main": "Rain", "description": "light rain"}],
            "main": {"temp": 11.6, "feels_like": 9.1, "humidity": 80},
            "rain": {"1h": 0.7},
            "name": "Berlin"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let w = weather_client(&server).current("Berlin").await.unwrap();
    assert_eq!(w.description, "light rain");
    assert_eq!(w.temp, 11.6);
    assert_eq!(w.feels_like, 9.1);
    assert_eq!(w.precipitation_mm, Some(0.7));
}

#[tokio::test]
async fn weather_error_status_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"cod":"404","message":"city not found"}"#))
        .mount(&server)
        .await;

    let err = weather_client(&server).current("Atlantis").await.unwrap_err();
    match err {
        WeatherFetchError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("city not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn weather_malformed_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"weather": []})))
        .mount(&server)
        .await;

    let err = weather_client(&server).current("Berlin").await.unwrap_err();
    assert!(matches!(err, WeatherFetchError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn ask_posts_prompt_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
        .and(query_param("key", "ai-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": {"maxOutputTokens": 512}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(" A closure captures scope. ")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = gemini_client(&server).ask("What is a closure?").await.unwrap();
    assert_eq!(answer, "A closure captures scope.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("What is a closure?"));
    assert!(prompt.contains("English"));
}

#[tokio::test]
async fn ask_surfaces_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let err = gemini_client(&server).ask("q").await.unwrap_err();
    assert!(matches!(err, AiError::Status { status: 500, .. }), "{err:?}");
}

#[tokio::test]
async fn ask_rejects_empty_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
        .mount(&server)
        .await;
    let err = gemini_client(&server).ask("q").await.unwrap_err();
    assert!(matches!(err, AiError::Empty), "{err:?}");
}

#[tokio::test]
async fn tagline_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": {"maxOutputTokens": 80}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(&"x".repeat(300))))
        .mount(&server)
        .await;

    let line = gemini_client(&server).one_liner("What is a closure?").await.unwrap();
    assert_eq!(line.chars().count(), TAGLINE_MAX_CHARS);
}

#[tokio::test]
async fn tagline_failure_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    assert_eq!(gemini_client(&server).one_liner("text").await, None);
}

#[tokio::test]
async fn telegram_send_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let bot = build_bot("123:test", Duration::from_secs(1))
        .unwrap()
        .set_api_url(server.uri().parse().unwrap());
    let started = std::time::Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(4), bot.send_text(42, "digest"))
        .await
        .expect("send should give up before the server answers")
        .unwrap_err();
    assert!(matches!(err, DispatchError::Telegram(_)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(4));
}
