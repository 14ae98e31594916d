use coinswitch_futures::coinswitch::{build_rest_client, CoinSwitchRestClient};
use coinswitch_futures::core::config::{ExchangeConfig, SigningScheme};
use coinswitch_futures::core::errors::ExchangeError;
use coinswitch_futures::core::kernel::{ReqwestRest, RestClient};
use coinswitch_futures::core::types::{ApiResponse, OrderSide, RequestDescriptor};
use coinswitch_futures::coinswitch::CreateOrderRequest;
use mockito::Matcher;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

// RFC 8032 test vector 2 private key
const SECRET_HEX: &str = "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb";

fn ed25519_client(base_url: String) -> CoinSwitchRestClient<ReqwestRest> {
    let config = ExchangeConfig::new("test-key".to_string(), SECRET_HEX.to_string()).base_url(base_url);
    build_rest_client(&config).unwrap()
}

#[tokio::test]
async fn test_success_returns_data_with_signed_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/trade/api/v2/ping")
        .match_header("X-AUTH-APIKEY", "test-key")
        .match_header("X-AUTH-SIGNATURE", Matcher::Regex("^[0-9a-f]{128}$".to_string()))
        .match_header("X-AUTH-EPOCH", Matcher::Regex(r"^\d{13}$".to_string()))
        .match_header("X-REQUEST-ID", Matcher::Regex("^coinswitch-futures-".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"OK"}"#)
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    let response = client.ping().await.unwrap();

    assert_eq!(response, ApiResponse::Data(json!({"message": "OK"})));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_hmac_scheme_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/trade/api/v2/futures/cancel_all")
        .match_header("x-api-key", "test-key")
        .match_header("x-api-signature", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
        .match_header("x-api-timestamp", Matcher::Regex(r"^\d+$".to_string()))
        .match_body(r#"{"exchange":"EXCHANGE_2"}"#)
        .with_status(200)
        .with_body(r#"{"data":{}}"#)
        .create_async()
        .await;

    let config = ExchangeConfig::new("test-key".to_string(), "shared-secret".to_string())
        .scheme(SigningScheme::Hmac)
        .base_url(server.url());
    let client = build_rest_client(&config).unwrap();
    client
        .cancel_all(&Default::default())
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_order_sends_order_id_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/trade/api/v2/futures/order")
        .match_query(Matcher::UrlEncoded("order_id".to_string(), "abc".to_string()))
        .with_status(200)
        .with_body(r#"{"data":{"order_id":"abc"}}"#)
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    let response = client.get_order("abc").await.unwrap();
    assert_eq!(response.data().unwrap()["data"]["order_id"], "abc");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_order_body_is_exact() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/trade/api/v2/futures/order")
        .match_header("content-type", "application/json")
        .match_body(
            r#"{"exchange":"EXCHANGE_2","symbol":"BTCUSDT","side":"BUY","quantity":0.004,"order_type":"MARKET","reduce_only":false}"#,
        )
        .with_status(200)
        .with_body(r#"{"data":{"order_id":"1","status":"OPEN"}}"#)
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    let order = CreateOrderRequest::market(
        "BTCUSDT",
        OrderSide::Buy,
        Decimal::from_str("0.004").unwrap(),
    );
    let response = client.create_order(&order).await.unwrap();
    assert!(!response.is_rate_limited());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_429_is_rate_limited_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/trade/api/v2/futures/wallet_balance")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("Too many requests")
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    let response = client.get_wallet_balance().await.unwrap();

    assert_eq!(
        response,
        ApiResponse::RateLimited {
            body: "Too many requests".to_string()
        }
    );
    assert!(response.into_result().unwrap_err().is_rate_limited());
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/trade/api/v2/futures/positions")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"message":"boom"}"#)
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    match client.get_positions(None).await {
        Err(ExchangeError::HttpError { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("expected HttpError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/trade/api/v2/futures/order")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let client = ed25519_client(server.url());
    let response = client.cancel_order("abc").await.unwrap();
    assert_eq!(response, ApiResponse::Data(serde_json::Value::Null));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ed25519_client(format!("http://{}", addr));
    assert!(matches!(
        client.ping().await,
        Err(ExchangeError::TransportError(_))
    ));
}

#[tokio::test]
async fn test_malformed_secret_fails_before_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/trade/api/v2/ping")
        .expect(0)
        .create_async()
        .await;

    for secret in ["abc", "zz", "00ff"] {
        let config = ExchangeConfig::new("test-key".to_string(), secret.to_string())
            .base_url(server.url());
        let client = build_rest_client(&config).unwrap();
        assert!(matches!(
            client.ping().await,
            Err(ExchangeError::InvalidCredentials(_))
        ));
    }

    let empty = build_rest_client(
        &ExchangeConfig::new(String::new(), String::new()).base_url(server.url()),
    )
    .unwrap();
    assert!(matches!(
        empty.inner().execute(&RequestDescriptor::get("/trade/api/v2/ping")).await,
        Err(ExchangeError::InvalidCredentials(_))
    ));

    mock.assert_async().await;
}
