//! Marketplace listing adapter against a mock HTTP server

use collection_downloader::downloader::{AcquisitionConfig, AcquisitionEngine, PageRequest};
use collection_downloader::fetcher::magic_eden::{MagicEdenSource, ASSETS_ENDPOINT};
use collection_downloader::fetcher::{FetcherError, ListingSource};
use collection_downloader::output::csv::CsvRecordSink;
use collection_downloader::shutdown::ShutdownCoordinator;
use collection_downloader::{Chain, CollectionIdentifier};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "0xa6423b238f3936c3922b375f8ebf42005fecc40b";

fn source(server: &MockServer) -> MagicEdenSource {
    let collection = CollectionIdentifier::new(Chain::Ethereum, ADDRESS).unwrap();
    MagicEdenSource::new(collection).with_base_url(server.uri())
}

fn assets(first: u64, count: u64) -> Vec<Value> {
    (first..first + count)
        .map(|id| {
            json!({
                "asset": {
                    "tokenId": id.to_string(),
                    "name": format!("Pudgy #{id}"),
                    "rarity": [{"rank": id, "provider": "ME"}],
                    "owner": "0xowner"
                },
                "floorAsk": {
                    "price": {
                        "amount": {"native": "1.5"},
                        "currency": {"symbol": "WETH"}
                    }
                }
            })
        })
        .collect()
}

#[tokio::test]
async fn test_first_page_request_and_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ASSETS_ENDPOINT))
        .and(query_param("chain", "ethereum"))
        .and(query_param("collectionId", ADDRESS))
        .and(query_param("limit", "2"))
        .and(query_param("sortBy", "price"))
        .and(query_param("sortDir", "asc"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": assets(7, 2),
            "continuation": "next-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = source(&server)
        .with_api_key(Some("secret".to_string()))
        .fetch_page(&PageRequest::first(2))
        .await
        .unwrap();

    assert_eq!(page.continuation.as_deref(), Some("next-token"));
    assert_eq!(page.items.len(), 2);
    let record = &page.items[0];
    assert_eq!(record.token_id, "7");
    assert_eq!(record.name, "Pudgy #7");
    assert_eq!(record.rarity_rank, Some(7));
    assert_eq!(record.currency, "WETH");
    assert_eq!(record.market_price.map(|p| p.to_string()).as_deref(), Some("1.5"));
    assert_eq!(record.collection_address, ADDRESS);
    assert_eq!(record.chain, "ethereum");
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("continuation", "throttled"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("continuation", "missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("continuation", "bad"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid limit"))
        .mount(&server)
        .await;

    let source = source(&server);
    let throttled = source
        .fetch_page(&PageRequest::after("throttled".to_string(), 100))
        .await;
    let missing = source
        .fetch_page(&PageRequest::after("missing".to_string(), 100))
        .await;
    let bad = source
        .fetch_page(&PageRequest::after("bad".to_string(), 100))
        .await;

    assert!(matches!(throttled, Err(FetcherError::RateLimited)));
    assert!(matches!(missing, Err(FetcherError::NotFound(_))));
    match bad {
        Err(FetcherError::BadRequest(message)) => assert_eq!(message, "invalid limit"),
        other => panic!("expected BadRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_listing_end_to_end_writes_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ASSETS_ENDPOINT))
        .and(query_param("continuation", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": assets(3, 1)
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ASSETS_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": assets(1, 2),
            "continuation": "page-2"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("listing.csv");
    let mut sink = CsvRecordSink::new(&csv_path);
    let config = AcquisitionConfig {
        page_size: 2,
        rate_limit_per_minute: 60_000,
        safety_factor: 1.0,
        retry_base_delay: Duration::from_millis(1),
        ..AcquisitionConfig::default()
    };
    let engine = AcquisitionEngine::new(config).with_shutdown(ShutdownCoordinator::shared());

    let summary = engine.run_listing(&source(&server), &mut sink).await.unwrap();

    assert_eq!(summary.item_count, 3);
    assert_eq!(summary.pages_fetched, 2);
    let content = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = content.lines();
    assert!(lines
        .next()
        .unwrap()
        .starts_with("Token ID,Name,Description,Rarity Rank,Rarity Provider"));
    assert_eq!(lines.count(), 3);
}
