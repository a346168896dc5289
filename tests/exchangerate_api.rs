use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use lira_lens::errors::RateError;
use lira_lens::rates::{ExchangeRateApi, RateProvider};

/// Stands in for the public API: USD has a table, BAD returns junk, anything
/// else is a 404.
async fn latest(Path(base): Path<String>) -> impl IntoResponse {
    match base.as_str() {
        "USD" => (
            StatusCode::OK,
            r#"{"provider":"https://www.exchangerate-api.com","base":"USD","date":"2024-05-01","time_last_updated":1714521601,"rates":{"USD":1,"EUR":0.936,"TRY":32.25,"ZZZ":0}}"#,
        ),
        "BAD" => (StatusCode::OK, "<html>maintenance</html>"),
        _ => (StatusCode::NOT_FOUND, r#"{"result":"error"}"#),
    }
}

async fn spawn_server() -> String {
    let app = Router::new().route("/v4/latest/{base}", get(latest));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn reads_the_requested_rate() {
    let api = ExchangeRateApi::new(spawn_server().await);
    assert_eq!(api.fetch_rate("USD", "TRY").await.unwrap(), 32.25);
    assert_eq!(api.fetch_rate("USD", "EUR").await.unwrap(), 0.936);
}

#[tokio::test]
async fn missing_currency_is_an_error() {
    let api = ExchangeRateApi::new(spawn_server().await);
    assert!(matches!(
        api.fetch_rate("USD", "GBP").await,
        Err(RateError::MissingRate { .. })
    ));
}

#[tokio::test]
async fn zero_rate_is_rejected() {
    let api = ExchangeRateApi::new(spawn_server().await);
    assert!(matches!(
        api.fetch_rate("USD", "ZZZ").await,
        Err(RateError::InvalidRate(_))
    ));
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let api = ExchangeRateApi::new(spawn_server().await);
    assert!(matches!(
        api.fetch_rate("BAD", "TRY").await,
        Err(RateError::Parse(_))
    ));
}

#[tokio::test]
async fn error_status_is_reported() {
    let api = ExchangeRateApi::new(spawn_server().await);
    assert!(matches!(
        api.fetch_rate("XYZ", "TRY").await,
        Err(RateError::Status(404))
    ));
}

#[tokio::test]
async fn unreachable_host_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ExchangeRateApi::new(format!("http://{addr}"));
    assert!(matches!(
        api.fetch_rate("USD", "TRY").await,
        Err(RateError::Http(_))
    ));
}
