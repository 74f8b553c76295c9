//! Integration tests for the TeslaFi API client
//!
//! These tests use mockito to simulate TeslaFi feed responses

use mockito::{Matcher, Server};
use teslafi_exporter::{client::TeslaFiClient, config::TeslaFiConfig, FetchError};

/// Helper to create a TeslaFi config pointing to the mock server
fn create_test_config(server_url: &str) -> TeslaFiConfig {
    TeslaFiConfig {
        endpoint: format!("{}/feed.php", server_url),
        api_token: "abc123".to_string(),
        command: "lastGood".to_string(),
        timeout_seconds: 5,
    }
}

fn feed_query(token: &str, command: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("token".into(), token.into()),
        Matcher::UrlEncoded("command".into(), command.into()),
    ])
}

#[tokio::test]
async fn test_fetch_snapshot_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/feed.php")
        .match_query(feed_query("abc123", "lastGood"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "data_id": "123456",
            "Date": "2021-02-02 14:06:17",
            "display_name": "Roadrunner",
            "vin": "5YJ3E1EA7KF000001",
            "battery_level": "72",
            "charging_state": "Charging",
            "outside_temp": "4.5",
            "odometer": "1000",
            "locked": "1",
            "polling": "True",
            "speed": null,
            "Notes": ""
        }"#,
        )
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    let snapshot = client.fetch_snapshot().await.unwrap();

    assert_eq!(snapshot.data_id, Some(123456.0));
    assert_eq!(snapshot.battery_level, Some(72.0));
    assert_eq!(snapshot.charging_state.as_deref(), Some("Charging"));
    assert_eq!(snapshot.outside_temp, Some(4.5));
    assert_eq!(snapshot.locked, Some(true));
    assert_eq!(snapshot.polling, Some(true));
    assert_eq!(snapshot.speed, Some(0.0));
    assert_eq!(snapshot.display_name.as_deref(), Some("Roadrunner"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_command_sends_token_only() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/feed.php")
        .match_query(Matcher::Regex("^token=abc123$".to_string()))
        .with_status(200)
        .with_body(r#"{"battery_level": 50}"#)
        .create_async()
        .await;

    let mut config = create_test_config(&server.url());
    config.command = String::new();
    let client = TeslaFiClient::new(config).unwrap();

    let snapshot = client.fetch_snapshot().await.unwrap();
    assert_eq!(snapshot.battery_level, Some(50.0));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_explicit_command() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/feed.php")
        .match_query(feed_query("abc123", "lastGoodTemp"))
        .with_status(200)
        .with_body(r#"{"outside_temp": "-2.5", "inside_temp": "3"}"#)
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    let snapshot = client.fetch_command("lastGoodTemp").await.unwrap();
    assert_eq!(snapshot.outside_temp, Some(-2.5));
    assert_eq!(snapshot.inside_temp, Some(3.0));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_token_is_url_encoded() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/feed.php")
        .match_query(feed_query("a b&c=d", "lastGood"))
        .with_status(200)
        .with_body(r#"{"battery_level": 10}"#)
        .create_async()
        .await;

    let mut config = create_test_config(&server.url());
    config.api_token = "a b&c=d".to_string();
    let client = TeslaFiClient::new(config).unwrap();

    assert!(client.fetch_snapshot().await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_is_http_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/feed.php")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body("Unauthorized")
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    let result = client.fetch_snapshot().await;

    assert!(matches!(result, Err(FetchError::Http { status: 401 })));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/feed.php")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    match client.fetch_snapshot().await {
        Err(FetchError::Http { status }) => assert_eq!(status, 503),
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/feed.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html><body>maintenance</body></html>")
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    let result = client.fetch_snapshot().await;
    assert!(matches!(result, Err(FetchError::Parse(_))));
}

#[tokio::test]
async fn test_error_envelope_is_rejected() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/feed.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"response": {"result": "unauthorized", "reason": "Invalid token"}}"#)
        .create_async()
        .await;

    let client = TeslaFiClient::new(create_test_config(&server.url())).unwrap();

    match client.fetch_snapshot().await {
        Err(FetchError::Rejected { result }) => assert_eq!(result, "unauthorized"),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Reserve a port, then release it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = TeslaFiConfig {
        endpoint: format!("http://127.0.0.1:{}/feed.php", port),
        api_token: "abc123".to_string(),
        command: "lastGood".to_string(),
        timeout_seconds: 2,
    };
    let client = TeslaFiClient::new(config).unwrap();

    let result = client.fetch_snapshot().await;
    assert!(matches!(result, Err(FetchError::Network(_))));
}

#[tokio::test]
async fn test_network_error_does_not_reveal_token() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = TeslaFiConfig {
        endpoint: format!("http://127.0.0.1:{}/feed.php", port),
        api_token: "SECRET_TOKEN_XYZ".to_string(),
        command: "lastGood".to_string(),
        timeout_seconds: 2,
    };
    let client = TeslaFiClient::new(config).unwrap();

    let err = client.fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
    assert!(!err.to_string().contains("SECRET_TOKEN_XYZ"), "{}", err);
    assert!(!format!("{:?}", err).contains("SECRET_TOKEN_XYZ"), "{:?}", err);

    let err = client.fetch_command("lastGoodTemp").await.unwrap_err();
    assert!(!err.to_string().contains("SECRET_TOKEN_XYZ"), "{}", err);
}
