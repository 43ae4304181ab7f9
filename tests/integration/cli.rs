//! Argument validation through the compiled binary

use assert_cmd::Command;
use tempfile::TempDir;

const ENV_KEYS: [&str; 16] = [
    "COLLECTION_ADDRESS",
    "CHAIN",
    "API_KEY",
    "OUTPUT_DIR",
    "RPC_URL",
    "CONTRACT_ADDRESS",
    "BATCH_SIZE",
    "DELAY_MS",
    "DOWNLOAD_START_ID",
    "DOWNLOAD_END_ID",
    "DOWNLOAD_IMAGES",
    "DOWNLOAD_JSON",
    "IMAGE_BASE_URL",
    "JSON_BASE_URL",
    "JSON_URL_EXTENSION",
    "DOWNLOAD_CONCURRENCY",
];

/// Binary run from an empty directory with no inherited configuration
fn command(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("collection-downloader").unwrap();
    cmd.current_dir(dir.path());
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd.env_remove("METRICS_ADDR");
    cmd
}

#[test]
fn test_help_lists_modes() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for mode in ["listing", "snapshot", "download"] {
        assert!(stdout.contains(mode), "help should mention {mode}");
    }
}

#[test]
fn test_unsupported_chain_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir)
        .args([
            "listing",
            "--chain",
            "solana",
            "--collection",
            "0xa6423b238f3936c3922b375f8ebf42005fecc40b",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("solana"));
}

#[test]
fn test_invalid_collection_address_fails() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .args(["listing", "--collection", "not-an-address"])
        .assert()
        .failure();
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .args([
            "snapshot",
            "--contract",
            "0x972170dcf963e1dc7bdd7bdf85a3abb35fb4f15d",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_inverted_download_range_fails() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .args([
            "download",
            "--start-id",
            "10",
            "--end-id",
            "1",
            "--image-base-url",
            "http://127.0.0.1:9/images/",
            "--images",
            "true",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_full_u64_download_range_fails() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir)
        .args([
            "download",
            "--start-id",
            "0",
            "--end-id",
            "18446744073709551615",
            "--image-base-url",
            "http://127.0.0.1:9/images/",
            "--images",
            "true",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("output").join("images").exists());
}

#[test]
fn test_images_require_base_url() {
    let dir = TempDir::new().unwrap();
    command(&dir)
        .args(["download", "--end-id", "3", "--images", "true"])
        .assert()
        .failure();
}

#[test]
fn test_env_fallback_is_honoured() {
    let dir = TempDir::new().unwrap();
    // End id comes from the environment; the range is still invalid so nothing is fetched
    command(&dir)
        .env("DOWNLOAD_START_ID", "9")
        .env("DOWNLOAD_END_ID", "2")
        .env("DOWNLOAD_IMAGES", "true")
        .env("IMAGE_BASE_URL", "http://127.0.0.1:9/images/")
        .arg("download")
        .assert()
        .code(1);
}
