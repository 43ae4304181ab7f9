//! ERC-721 JSON-RPC adapter against a mock node

use collection_downloader::downloader::{AcquisitionConfig, AcquisitionEngine};
use collection_downloader::fetcher::erc721_rpc::Erc721RpcSource;
use collection_downloader::fetcher::{EnumerableSource, FetcherError};
use collection_downloader::shutdown::ShutdownCoordinator;
use collection_downloader::{EnumerationStrategy, OwnershipRecord, TokenId};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: &str = "0x972170dcf963e1dc7bdd7bdf85a3abb35fb4f15d";
const TOTAL_SUPPLY: &str = "0x18160ddd";
const TOKEN_BY_INDEX: &str = "0x4f6ccce7";
const OWNER_OF: &str = "0x6352211e";

fn word(n: u64) -> String {
    format!("{n:064x}")
}

fn owner_word(n: u64) -> String {
    format!("0x{:024x}{:040x}", 0, n)
}

fn result(hex: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": hex}))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": code, "message": message}
    }))
}

async fn mount(server: &MockServer, calldata: String, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_string_contains(calldata))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_total_supply_and_owner_decoding() {
    let server = MockServer::start().await;
    mount(&server, TOTAL_SUPPLY.to_string(), result(format!("0x{}", word(7)))).await;
    mount(
        &server,
        format!("{TOKEN_BY_INDEX}{}", word(0)),
        result(format!("0x{}", word(42))),
    )
    .await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(42)),
        result(owner_word(0xABCDEF)),
    )
    .await;

    let source = Erc721RpcSource::new(server.uri(), CONTRACT);

    assert_eq!(source.total_supply().await.unwrap(), 7);
    let token = source.token_by_index(0).await.unwrap();
    assert_eq!(token, TokenId::from(42));
    let owner = source.owner_of(&token).await.unwrap();
    assert_eq!(owner, "0x0000000000000000000000000000000000abcdef");
}

#[tokio::test]
async fn test_malformed_result_hex_is_parse_error() {
    let server = MockServer::start().await;
    mount(&server, TOTAL_SUPPLY.to_string(), result("0xa\u{e9}0".to_string())).await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(1)),
        result("0xnothex".to_string()),
    )
    .await;

    let source = Erc721RpcSource::new(server.uri(), CONTRACT);

    let supply = source.total_supply().await.unwrap_err();
    assert!(matches!(supply, FetcherError::Parse(_)));
    assert!(!supply.is_retryable());

    let owner = source.owner_of(&TokenId::from(1)).await.unwrap_err();
    assert!(matches!(owner, FetcherError::Parse(_)));
}

#[tokio::test]
async fn test_errors_are_classified() {
    let server = MockServer::start().await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(1)),
        rpc_error(3, "execution reverted: ERC721: invalid token ID"),
    )
    .await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(2)),
        rpc_error(-32005, "limit exceeded"),
    )
    .await;
    mount(&server, format!("{OWNER_OF}{}", word(3)), result("0x".to_string())).await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(4)),
        ResponseTemplate::new(429),
    )
    .await;
    mount(
        &server,
        format!("{OWNER_OF}{}", word(5)),
        rpc_error(-32601, "method not found"),
    )
    .await;

    let source = Erc721RpcSource::new(server.uri(), CONTRACT);

    let reverted = source.owner_of(&TokenId::from(1)).await.unwrap_err();
    assert!(matches!(reverted, FetcherError::Reverted(_)));
    assert!(reverted.is_absent());

    let limited = source.owner_of(&TokenId::from(2)).await.unwrap_err();
    assert!(matches!(limited, FetcherError::RateLimited));

    let empty = source.owner_of(&TokenId::from(3)).await.unwrap_err();
    assert!(matches!(empty, FetcherError::Reverted(_)));

    let throttled = source.owner_of(&TokenId::from(4)).await.unwrap_err();
    assert!(throttled.is_retryable());

    let other = source.owner_of(&TokenId::from(5)).await.unwrap_err();
    assert!(matches!(other, FetcherError::Rpc { code: -32601, .. }));
    assert!(!other.is_retryable());
}

#[tokio::test]
async fn test_snapshot_against_mock_node() {
    let server = MockServer::start().await;
    mount(&server, TOTAL_SUPPLY.to_string(), result(format!("0x{}", word(3)))).await;
    for index in 0..3 {
        let token = 10 + index;
        mount(
            &server,
            format!("{TOKEN_BY_INDEX}{}", word(index)),
            result(format!("0x{}", word(token))),
        )
        .await;
        mount(
            &server,
            format!("{OWNER_OF}{}", word(token)),
            result(owner_word(token)),
        )
        .await;
    }

    let source = Erc721RpcSource::new(server.uri(), CONTRACT);
    let config = AcquisitionConfig {
        rate_limit_per_minute: 60_000,
        safety_factor: 1.0,
        retry_base_delay: Duration::from_millis(1),
        batch_delay: Duration::ZERO,
        batch_size: 2,
        ..AcquisitionConfig::default()
    };
    let engine = AcquisitionEngine::new(config).with_shutdown(ShutdownCoordinator::shared());
    let mut records: Vec<OwnershipRecord> = Vec::new();

    let summary = engine.run_snapshot(&source, &mut records).await.unwrap();

    assert_eq!(summary.strategy, Some(EnumerationStrategy::Indexed));
    assert_eq!(summary.item_count, 3);
    assert_eq!(records[2].index, 2);
    assert_eq!(records[2].token_id, TokenId::from(12));
    assert_eq!(records[2].owner, format!("0x{:040x}", 12));
}
