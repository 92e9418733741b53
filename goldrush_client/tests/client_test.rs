use goldrush_client::{GoldRushClient, GoldRushConfig, GoldRushError};
use httpmock::prelude::*;
use portfolio_core::{FetchError, PortfolioFetcher};
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;

const WALLET: &str = "0x742d35cc6131b2f6e7f4c3b5e8a8c8d8f0b4c4e3";

fn client_for(server: &MockServer, timeout_seconds: u64) -> GoldRushClient {
    GoldRushClient::with_config(GoldRushConfig {
        api_key: "test-key".to_string(),
        base_url: server.base_url(),
        timeout_seconds,
    })
    .unwrap()
}

fn balances_body(chain_id: u64) -> serde_json::Value {
    json!({
        "data": {
            "address": WALLET,
            "chain_id": chain_id,
            "chain_name": "eth-mainnet",
            "quote_currency": "USD",
            "updated_at": "2024-05-01T12:00:00Z",
            "items": [
                {
                    "contract_decimals": 6,
                    "contract_name": "USD Coin",
                    "contract_ticker_symbol": "USDC",
                    "contract_address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                    "logo_url": "https://logos.example/usdc.png",
                    "native_token": false,
                    "type": "stablecoin",
                    "is_spam": false,
                    "balance": "300000000",
                    "quote_rate": 1.0,
                    "quote": 300.0
                },
                {
                    "contract_decimals": 18,
                    "contract_name": "Ether",
                    "contract_ticker_symbol": "ETH",
                    "contract_address": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
                    "native_token": true,
                    "type": "cryptocurrency",
                    "is_spam": false,
                    "balance": "100000000000000000",
                    "quote_rate": 2000.0,
                    "quote": 200.0
                },
                {
                    "contract_decimals": 18,
                    "contract_ticker_symbol": "FREE",
                    "contract_address": "0x1111111111111111111111111111111111111111",
                    "is_spam": true,
                    "balance": "5000000000000000000000",
                    "quote": 99999.0
                }
            ]
        },
        "error": false,
        "error_message": null,
        "error_code": null
    })
}

#[tokio::test]
async fn test_fetch_normalizes_balances() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/1/address/{}/balances_v2/", WALLET))
            .query_param("quote-currency", "USD")
            .query_param("no-spam", "true")
            .header("Authorization", "Bearer test-key");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(balances_body(1));
    });

    let client = client_for(&server, 5);
    let portfolio = client.fetch(1, WALLET).await.unwrap();

    mock.assert();
    assert_eq!(portfolio.chain_id, 1);
    assert_eq!(portfolio.chain_name, "Ethereum");
    assert_eq!(portfolio.positions.len(), 2);
    assert_eq!(portfolio.total_value_usd, dec!(500));

    let usdc = portfolio
        .positions
        .iter()
        .find(|p| p.symbol == "USDC")
        .unwrap();
    assert_eq!(usdc.balance, dec!(300));
    assert_eq!(usdc.token_address, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
}

#[tokio::test]
async fn test_checksummed_address_is_lowercased_in_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/137/address/{}/balances_v2/", WALLET));
        then.status(200).json_body(balances_body(137));
    });

    let client = client_for(&server, 5);
    let portfolio = client
        .fetch(137, "0x742D35CC6131B2F6E7F4C3B5E8A8C8D8F0B4C4E3")
        .await
        .unwrap();

    mock.assert();
    assert_eq!(portfolio.chain_name, "Polygon");
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/137/address/{}/balances_v2/", WALLET));
        then.status(500).body("internal error: db pool exhausted");
    });

    let client = client_for(&server, 5);
    let err = client.fetch(137, WALLET).await.unwrap_err();

    // One request per fetch, no internal retries
    mock.assert_hits(1);
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.public_message(), "Upstream request failed with HTTP 500");
}

#[tokio::test]
async fn test_not_found_and_rate_limit_statuses() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("/1/address/{}/balances_v2/", WALLET));
        then.status(404).body("not found");
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/10/address/{}/balances_v2/", WALLET));
        then.status(429).body("slow down");
    });

    let client = client_for(&server, 5);
    assert_eq!(client.fetch(1, WALLET).await.unwrap_err().status(), Some(404));

    match client.get_wallet_balances(WALLET, 10).await {
        Err(GoldRushError::RateLimit) => {}
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_malformed_payload() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("/1/address/{}/balances_v2/", WALLET));
        then.status(200).body("<html>maintenance</html>");
    });

    let client = client_for(&server, 5);
    let err = client.fetch(1, WALLET).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedPayload(_)));
}

#[tokio::test]
async fn test_overflowing_total_is_malformed_payload() {
    let server = MockServer::start();
    let whale = |address: &str| {
        json!({
            "contract_decimals": 18,
            "contract_ticker_symbol": "WHL",
            "contract_address": address,
            "is_spam": false,
            "balance": "1000000000000000000",
            "quote_rate": 5e28,
            "quote": 5e28
        })
    };
    server.mock(|when, then| {
        when.method(GET).path(format!("/1/address/{}/balances_v2/", WALLET));
        then.status(200).json_body(json!({
            "data": {
                "address": WALLET,
                "chain_id": 1,
                "items": [
                    whale("0x2222222222222222222222222222222222222222"),
                    whale("0x3333333333333333333333333333333333333333")
                ]
            },
            "error": false
        }));
    });

    let client = client_for(&server, 5);
    let err = client.fetch(1, WALLET).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedPayload(_)));
    assert_eq!(err.public_message(), "Upstream returned an unreadable response");
}

#[tokio::test]
async fn test_api_error_flag_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("/1/address/{}/balances_v2/", WALLET));
        then.status(200).json_body(json!({
            "data": null,
            "error": true,
            "error_message": "Malformed address provided",
            "error_code": 400
        }));
    });

    let client = client_for(&server, 5);
    match client.get_wallet_balances(WALLET, 1).await {
        Err(GoldRushError::ApiError { message, code }) => {
            assert_eq!(message, "Malformed address provided");
            assert_eq!(code, Some(400));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("/1/address/{}/balances_v2/", WALLET));
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(balances_body(1));
    });

    let client = client_for(&server, 1);
    let err = client.fetch(1, WALLET).await.unwrap_err();
    assert_eq!(err, FetchError::Timeout(Duration::from_secs(1)));
}

#[tokio::test]
async fn test_invalid_address_is_rejected_without_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(balances_body(1));
    });

    let client = client_for(&server, 5);
    let err = client.fetch(1, "not-an-address").await.unwrap_err();

    mock.assert_hits(0);
    assert_eq!(err.status(), Some(400));
}
