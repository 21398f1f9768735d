//! Router-level tests: requests go through the real axum router with the
//! in-memory cache and registry, a canned country directory, and a notifier
//! that records instead of posting.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use renewables_api::api::routes::create_router;
use renewables_api::cache::Cache;
use renewables_api::config::Config;
use renewables_api::countries::CountryDirectory;
use renewables_api::dataset::DatasetRow;
use renewables_api::dispatcher::Notifier;
use renewables_api::error::{AppError, Result};
use renewables_api::index::LetterIndex;
use renewables_api::registry::{MemoryRegistry, WebhookSubscription};
use renewables_api::AppState;

struct CannedCountries;

#[async_trait]
impl CountryDirectory for CannedCountries {
    async fn neighbours(&self, country: &str) -> Result<Vec<String>> {
        Ok(match country.to_lowercase().as_str() {
            "norway" => vec!["Sweden".to_string(), "Finland".to_string()],
            _ => Vec::new(),
        })
    }

    async fn probe(&self) -> u16 {
        200
    }
}

/// Country service that answers every neighbour query with an upstream error.
struct DownCountries;

#[async_trait]
impl CountryDirectory for DownCountries {
    async fn neighbours(&self, _country: &str) -> Result<Vec<String>> {
        Err(AppError::CountryApi("upstream 500".to_string()))
    }

    async fn probe(&self) -> u16 {
        500
    }
}

/// Country service that never answers.
struct StalledCountries;

#[async_trait]
impl CountryDirectory for StalledCountries {
    async fn neighbours(&self, _country: &str) -> Result<Vec<String>> {
        std::future::pending().await
    }

    async fn probe(&self) -> u16 {
        503
    }
}

#[derive(Default)]
struct RecordingNotifier {
    delivered: Mutex<Vec<WebhookSubscription>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, subscription: &WebhookSubscription) -> Result<()> {
        self.delivered.lock().unwrap().push(subscription.clone());
        Ok(())
    }
}

fn config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        dataset_path: PathBuf::from("unused.csv"),
        countries_api_url: "http://countries.test".to_string(),
        current_year: 2021,
        cache_ttl: chrono::Duration::days(2),
        purge_interval: Duration::from_secs(3600),
        http_timeout: Duration::from_secs(5),
    }
}

fn dataset() -> Vec<DatasetRow> {
    vec![
        DatasetRow::new("Norway", "NOR", 2019, 70.0),
        DatasetRow::new("Norway", "NOR", 2020, 60.0),
        DatasetRow::new("Norway", "NOR", 2021, 65.0),
        DatasetRow::new("Sweden", "SWE", 2021, 55.0),
    ]
}

fn app_with(rows: Vec<DatasetRow>) -> (axum::Router, Arc<RecordingNotifier>) {
    app_with_directory(rows, Arc::new(CannedCountries))
}

fn app_with_directory(
    rows: Vec<DatasetRow>,
    countries: Arc<dyn CountryDirectory>,
) -> (axum::Router, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(
        config(),
        LetterIndex::build(rows),
        Cache::in_memory(),
        Arc::new(MemoryRegistry::new()),
        notifier.clone(),
        countries,
    );
    (create_router(state), notifier)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn row(name: &str, code: &str, year: i32, percentage: f64) -> Value {
    json!({ "name": name, "isoCode": code, "year": year, "percentage": percentage })
}

#[tokio::test]
async fn current_by_name_and_by_code() {
    let (app, _) = app_with(dataset());

    let (status, body) = send(&app, "GET", "/energy/v1/renewables/current/Norway", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([row("Norway", "NOR", 2021, 65.0)]));
    assert_eq!(body["meta"]["status"], "success");
    assert_eq!(body["meta"]["count"], 1);

    let (status, body) = send(&app, "GET", "/energy/v1/renewables/current/nor", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([row("Norway", "NOR", 2021, 65.0)]));
}

#[tokio::test]
async fn current_without_country_lists_current_year() {
    let (app, _) = app_with(dataset());
    let (status, body) = send(&app, "GET", "/energy/v1/renewables/current/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn neighbours_are_appended_when_known() {
    let (app, _) = app_with(dataset());
    let (status, body) = send(
        &app,
        "GET",
        "/energy/v1/renewables/current/norway?neighbours=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([row("Norway", "NOR", 2021, 65.0), row("Sweden", "SWE", 2021, 55.0)])
    );
}

#[tokio::test]
async fn failing_country_service_keeps_base_rows() {
    let (app, _) = app_with_directory(dataset(), Arc::new(DownCountries));
    let (status, body) = send(
        &app,
        "GET",
        "/energy/v1/renewables/current/norway?neighbours=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([row("Norway", "NOR", 2021, 65.0)]));
}

#[tokio::test(start_paused = true)]
async fn stalled_country_service_answers_within_budget() {
    let (app, _) = app_with_directory(dataset(), Arc::new(StalledCountries));
    let (status, body) = send(
        &app,
        "GET",
        "/energy/v1/renewables/current/norway?neighbours=true",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([row("Norway", "NOR", 2021, 65.0)]));
}

#[tokio::test]
async fn bad_flag_is_rejected() {
    let (app, _) = app_with(dataset());
    let (status, body) = send(
        &app,
        "GET",
        "/energy/v1/renewables/current/norway?neighbours=maybe",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["meta"]["status"], "error");
}

#[tokio::test]
async fn history_range_and_sorting() {
    let (app, _) = app_with(dataset());

    let (status, body) = send(&app, "GET", "/energy/v1/renewables/history/norway?begin=2020", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([row("Norway", "NOR", 2020, 60.0), row("Norway", "NOR", 2021, 65.0)])
    );

    let (status, body) = send(&app, "GET", "/energy/v1/renewables/history/norway?sortByValue=true", None).await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["percentage"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![60.0, 65.0, 70.0]);
}

#[tokio::test]
async fn history_outside_range_is_not_found() {
    let (app, _) = app_with(dataset());
    let (status, _) = send(&app, "GET", "/energy/v1/renewables/history/Sweden?begin=2022", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/energy/v1/renewables/history/Sweden?begin=2022&end=2000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/energy/v1/renewables/history/Sweden?end=last", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unloaded_dataset_answers_not_found() {
    let (app, _) = app_with(Vec::new());
    let (status, body) = send(&app, "GET", "/energy/v1/renewables/current/norway", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["meta"]["message"], "No return for the given search found");
}

#[tokio::test]
async fn webhook_lifecycle() {
    let (app, _) = app_with(dataset());

    let (status, body) = send(
        &app,
        "POST",
        "/energy/v1/notifications",
        Some(json!({ "url": "http://hooks.test/a", "country": "Norway", "calls": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["webhook_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["calls"], 2);

    let (status, body) = send(&app, "GET", &format!("/energy/v1/notifications/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["country"], "Norway");

    let (_, body) = send(&app, "GET", "/energy/v1/status", None).await;
    assert_eq!(body["data"]["webhooks"], 1);
    assert_eq!(body["data"]["countries_api"], 200);
    assert_eq!(body["data"]["version"], "v1");

    let (status, _) = send(&app, "DELETE", &format!("/energy/v1/notifications/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/energy/v1/notifications/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_interval_registration_is_rejected() {
    let (app, _) = app_with(dataset());
    let (status, _) = send(
        &app,
        "POST",
        "/energy/v1/notifications",
        Some(json!({ "url": "http://hooks.test/a", "country": "Norway", "calls": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_registration_gets_error_envelope() {
    let (app, _) = app_with(dataset());

    let request = Request::builder()
        .method("POST")
        .uri("/energy/v1/notifications")
        .header("content-type", "application/json")
        .body(Body::from("{\"url\": \"http://hooks.test/a\", \"calls\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["meta"]["status"], "error");
    assert_eq!(body["data"], Value::Null);

    let (status, body) = send(
        &app,
        "POST",
        "/energy/v1/notifications",
        Some(json!({ "url": "http://hooks.test/a", "country": "Norway" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["meta"]["status"], "error");
}

#[tokio::test]
async fn lookups_trigger_webhook_every_nth_call() {
    let (app, notifier) = app_with(dataset());
    send(
        &app,
        "POST",
        "/energy/v1/notifications",
        Some(json!({ "url": "http://hooks.test/sweden", "country": "sweden", "calls": 2 })),
    )
    .await;

    // One direct lookup of Sweden plus one via Norway's neighbours.
    send(&app, "GET", "/energy/v1/renewables/current/Sweden", None).await;
    send(&app, "GET", "/energy/v1/renewables/current/norway?neighbours=true", None).await;

    // Dispatch runs in the background.
    for _ in 0..100 {
        if !notifier.delivered.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let delivered = notifier.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].webhook.url, "http://hooks.test/sweden");
}
