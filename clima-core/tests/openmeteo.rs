use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chrono::NaiveDate;
use clima_core::{
    Collector, DataError, ForecastProvider, ForecastRequest,
    http::{HttpClient, cache::CacheConfig, retry::RetryConfig},
    provider::openmeteo::OpenMeteoProvider,
    store::OutputLayout,
};
use tokio::net::TcpListener;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

const FIXTURE: &str = include_str!("fixtures/forecast_gmt.json");

fn fast_retry() -> RetryConfig {
    RetryConfig::new(2, 1, 5)
}

fn provider(server: &MockServer, cache_dir: &Path, cache: CacheConfig) -> OpenMeteoProvider {
    let http = HttpClient::new(fast_retry())
        .expect("client builds")
        .with_cache(cache_dir, &cache);
    OpenMeteoProvider::new(http).with_base_url(format!("{}/v1/forecast", server.uri()))
}

fn no_cache() -> CacheConfig {
    CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 9).expect("valid date")
}

#[tokio::test]
async fn sends_fixed_query_and_parses_fixture() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "20.659698"))
        .and(query_param("longitude", "-103.349609"))
        .and(query_param("timezone", "auto"))
        .and(query_param("past_days", "31"))
        .and(query_param("forecast_days", "1"))
        .and(query_param("timeformat", "unixtime"))
        .and(query_param(
            "hourly",
            "temperature_2m,precipitation_probability,wind_speed_10m,uv_index,\
             uv_index_clear_sky,is_day,sunshine_duration,direct_radiation",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let response = provider(&server, dir.path(), no_cache())
        .fetch(&ForecastRequest::default())
        .await
        .expect("fetch succeeds");

    assert_eq!(response.location.timezone, "GMT");
    assert_eq!(response.location.elevation, 1552.0);
    assert_eq!(response.hourly.variables.len(), 8);
    assert_eq!(response.daily.variables.len(), 10);
    assert_eq!(response.hourly.variables[0].values.len(), 768);
    assert_eq!(response.daily.variables[3].name, "sunrise");
}

#[tokio::test]
async fn fixture_run_writes_expected_tables() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let collector = Collector::new(
        Arc::new(provider(&server, dir.path(), no_cache())),
        ForecastRequest::default(),
        OutputLayout::new(dir.path()),
    );

    let report = collector.run_for(date()).await.expect("run succeeds");
    assert_eq!(report.hourly_rows, 768);
    assert_eq!(report.daily_rows, 32);

    let hourly = fs::read_to_string(&report.hourly_path).expect("hourly csv");
    let lines: Vec<&str> = hourly.lines().collect();
    assert_eq!(lines.len(), 769);
    assert_eq!(
        lines[0],
        "date,temperature_2m,precipitation_probability,wind_speed_10m,uv_index,\
         uv_index_clear_sky,is_day,sunshine_duration,direct_radiation"
    );
    assert!(lines[1].starts_with("2024-05-01T00:00:00Z,"));
    assert!(lines[768].starts_with("2024-06-01T23:00:00Z,"));
    // Missing samples at the end of the window stay empty.
    assert!(lines[768].contains(",,,"));

    let daily = fs::read_to_string(&report.daily_path).expect("daily csv");
    let lines: Vec<&str> = daily.lines().collect();
    assert_eq!(lines.len(), 33);
    assert!(lines[0].starts_with("date,weather_code,temperature_2m_max,"));
    assert!(lines[1].starts_with("2024-05-01T00:00:00Z,0,29,14,1714545600,1714592700,"));
    assert!(lines[32].starts_with("2024-06-01T00:00:00Z,"));
}

#[tokio::test]
async fn missing_daily_block_fails_without_writing() {
    let mut doc: serde_json::Value = serde_json::from_str(FIXTURE).expect("fixture is json");
    doc.as_object_mut().expect("object").remove("daily");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let layout = OutputLayout::new(dir.path());
    let collector = Collector::new(
        Arc::new(provider(&server, dir.path(), no_cache())),
        ForecastRequest::default(),
        layout.clone(),
    );

    let err = collector.run_for(date()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DataError>(),
        Some(DataError::MissingBlock { block }) if block == "daily"
    ));
    assert!(!layout.table_path(date(), "hourly").exists());
    assert!(!layout.table_path(date(), "daily").exists());
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let response = provider(&server, dir.path(), no_cache())
        .fetch(&ForecastRequest::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.daily.variables[0].values.len(), 32);
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let err = provider(&server, dir.path(), no_cache())
        .fetch(&ForecastRequest::default())
        .await
        .unwrap_err();

    let chain = format!("{err:#}");
    assert!(chain.contains("500"));
    assert!(chain.contains("upstream down"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"error":true,"reason":"Cannot initialize WeatherVariable from invalid String value foo"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let err = provider(&server, dir.path(), no_cache())
        .fetch(&ForecastRequest::default())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("invalid String value foo"));
}

#[tokio::test]
async fn cached_response_skips_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let provider = provider(&server, dir.path(), CacheConfig::default());
    let request = ForecastRequest::default();

    let first = provider.fetch(&request).await.expect("first fetch");
    let second = provider.fetch(&request).await.expect("second fetch");

    assert_eq!(first, second);
    assert!(dir.path().join("http_cache.json").exists());
}

#[tokio::test]
async fn expired_cache_entries_go_back_to_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheConfig {
        enabled: true,
        expire_after_secs: 0,
    };
    let provider = provider(&server, dir.path(), cache);
    let request = ForecastRequest::default();

    provider.fetch(&request).await.expect("first fetch");
    provider.fetch(&request).await.expect("second fetch");
}

#[tokio::test]
async fn dropped_connections_are_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let http = HttpClient::new(fast_retry()).expect("client builds");
    let err = http
        .get_text(&format!("http://{addr}/v1/forecast"), &[])
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Failed to send request"));
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}
