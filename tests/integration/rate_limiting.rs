//! Integration tests for request spacing

use collection_downloader::downloader::config::{
    DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_SAFETY_FACTOR,
};
use collection_downloader::downloader::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[test]
fn test_default_budget_spacing() {
    let limiter = RateLimiter::per_minute(DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_SAFETY_FACTOR);
    assert_eq!(limiter.interval(), Duration::from_millis(400));
}

#[test]
fn test_spacing_rounds_up() {
    // 60000 / 7 = 8571.43ms
    let limiter = RateLimiter::per_minute(7, 1.0);
    assert_eq!(limiter.interval(), Duration::from_millis(8572));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_budget() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(400)));
    let start = Instant::now();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            })
        })
        .collect();

    let mut grants = Vec::new();
    for handle in handles {
        grants.push(handle.await.unwrap() - start);
    }
    grants.sort();

    assert_eq!(
        grants,
        (0..5).map(|i| Duration::from_millis(400 * i)).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_unlimited_never_waits() {
    let limiter = RateLimiter::unlimited();
    let start = Instant::now();
    for _ in 0..100 {
        limiter.acquire().await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_idle_limiter_grants_immediately() {
    let limiter = RateLimiter::new(Duration::from_millis(400));
    limiter.acquire().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let before = Instant::now();
    limiter.acquire().await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}
