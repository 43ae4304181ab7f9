//! Acquisition commands: `listing`, `snapshot` and `download`

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::CliError;
use crate::downloader::config::{
    DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE,
    DEFAULT_RATE_LIMIT_PER_MINUTE, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SAFETY_FACTOR,
};
use crate::downloader::progress::{ProgressCallback, ProgressEvent};
use crate::downloader::{AcquisitionConfig, AcquisitionEngine, DownloadPlan, Summary};
use crate::fetcher::erc721_rpc::{Erc721RpcSource, DEFAULT_RPC_URL};
use crate::fetcher::item_download::{HttpItemSource, DEFAULT_JSON_URL_EXTENSION};
use crate::fetcher::magic_eden::{
    MagicEdenSource, DEFAULT_BASE_URL, DEFAULT_SORT_BY, DEFAULT_SORT_DIR,
};
use crate::identifier::{normalize_address, Chain, CollectionIdentifier};
use crate::output::csv::CsvRecordSink;
use crate::output::files::FsItemSink;
use crate::output::{listing_filename, snapshot_filename, ArtifactKind};
use crate::shutdown::SharedShutdown;

/// Upper bound on items in flight per batch
const MAX_BATCH_SIZE: usize = 64;

/// Parse and validate a batch size or download concurrency value
fn parse_batch_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("batch size must be at least 1".to_string());
    }
    if value > MAX_BATCH_SIZE {
        return Err(format!("batch size {value} exceeds maximum of {MAX_BATCH_SIZE}"));
    }
    Ok(value)
}

/// Collection downloader CLI
#[derive(Parser, Debug)]
#[command(name = "collection-downloader")]
#[command(
    about = "Rate-limited acquisition of NFT collection listings, ownership snapshots and token artifacts",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Directory that receives CSV files and downloaded artifacts
    #[arg(long, global = true, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Upstream request budget per minute
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_RATE_LIMIT_PER_MINUTE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub rate_limit: u32,

    /// Divisor applied to the rate limit to stay under the upstream ceiling
    #[arg(long, global = true, default_value_t = DEFAULT_SAFETY_FACTOR)]
    pub safety_factor: f64,

    /// Attempts per logical request, including the first (range: 1-20)
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=20)
    )]
    pub max_attempts: u32,

    /// Base delay before the first retry, doubled on every further retry
    #[arg(long, global = true, default_value_t = DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn acquisition_config(
        &self,
        batch_size: usize,
        batch_delay_ms: u64,
        page_size: usize,
    ) -> AcquisitionConfig {
        AcquisitionConfig {
            rate_limit_per_minute: self.rate_limit,
            safety_factor: self.safety_factor,
            max_attempts: self.max_attempts,
            retry_base_delay: Duration::from_millis(self.retry_delay_ms),
            batch_size,
            batch_delay: Duration::from_millis(batch_delay_ms),
            page_size,
        }
    }

    fn engine(
        &self,
        config: AcquisitionConfig,
        shutdown: SharedShutdown,
        pb: &ProgressBar,
    ) -> AcquisitionEngine {
        AcquisitionEngine::new(config)
            .with_shutdown(shutdown)
            .with_progress(progress_callback(pb))
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every asset of a marketplace collection into a CSV file
    Listing(ListingArgs),

    /// Record the owner of every token of an ERC-721 contract into a CSV file
    Snapshot(SnapshotArgs),

    /// Mirror token images and metadata for a range of ids
    Download(DownloadArgs),
}

/// Arguments for the listing mode
#[derive(Parser, Debug)]
pub struct ListingArgs {
    /// Collection contract address (0x-prefixed)
    #[arg(long, env = "COLLECTION_ADDRESS")]
    pub collection: String,

    /// Chain the collection lives on
    #[arg(long, env = "CHAIN", default_value = "ethereum")]
    pub chain: Chain,

    /// Bearer token for the listing API
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Listing API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Sort field
    #[arg(long, default_value = DEFAULT_SORT_BY)]
    pub sort_by: String,

    /// Sort direction (asc or desc)
    #[arg(long, default_value = DEFAULT_SORT_DIR)]
    pub sort_dir: String,

    /// Records requested per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size)]
    pub page_size: usize,
}

/// Arguments for the snapshot mode
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// ERC-721 contract address (0x-prefixed)
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract: String,

    /// JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Tokens resolved concurrently per batch
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, env = "DELAY_MS", default_value_t = DEFAULT_BATCH_DELAY_MS)]
    pub delay_ms: u64,
}

/// Arguments for the download mode
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// First token id (inclusive)
    #[arg(long, env = "DOWNLOAD_START_ID", default_value_t = 1)]
    pub start_id: u64,

    /// Last token id (inclusive)
    #[arg(long, env = "DOWNLOAD_END_ID")]
    pub end_id: u64,

    /// Download images; enabled only by the exact value `true`
    #[arg(long, env = "DOWNLOAD_IMAGES", default_value = "false", action = ArgAction::Set, value_parser = parse_switch)]
    pub images: bool,

    /// Download metadata JSON; enabled only by the exact value `true`
    #[arg(long, env = "DOWNLOAD_JSON", default_value = "false", action = ArgAction::Set, value_parser = parse_switch)]
    pub json: bool,

    /// Base URL for images; `<base><id>.jpg` is requested
    #[arg(long, env = "IMAGE_BASE_URL")]
    pub image_base_url: Option<String>,

    /// Base URL for metadata; `<base><id><extension>` is requested
    #[arg(long, env = "JSON_BASE_URL")]
    pub json_base_url: Option<String>,

    /// Remote metadata extension (saved locally as `.json` regardless)
    #[arg(long, env = "JSON_URL_EXTENSION", default_value = DEFAULT_JSON_URL_EXTENSION)]
    pub json_extension: String,

    /// Ids processed concurrently per batch
    #[arg(long, env = "DOWNLOAD_CONCURRENCY", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub concurrency: usize,

    /// Pause between batches in milliseconds
    #[arg(long, env = "DELAY_MS", default_value_t = DEFAULT_BATCH_DELAY_MS)]
    pub delay_ms: u64,
}

/// `.env` style switch: only the literal `true` turns it on
fn parse_switch(s: &str) -> Result<bool, String> {
    Ok(s == "true")
}

/// Parse a listing page size (at least 1)
fn parse_page_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("page size must be at least 1".to_string());
    }
    Ok(value)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl ListingArgs {
    /// Run a listing acquisition
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<Summary, CliError> {
        let collection = CollectionIdentifier::new(self.chain, &self.collection)?;
        let source = MagicEdenSource::new(collection.clone())
            .with_base_url(self.base_url.clone())
            .with_api_key(self.api_key.clone())
            .with_sort(self.sort_by.clone(), self.sort_dir.clone());

        let path = cli.output_dir.join(listing_filename(
            collection.chain().as_str(),
            collection.address(),
            Utc::now(),
        ));
        let mut sink = CsvRecordSink::new(&path);

        let config = cli.acquisition_config(DEFAULT_BATCH_SIZE, 0, self.page_size);
        let pb = create_progress_bar(cli.output_format, None, format!("Listing {collection}"));
        let engine = cli.engine(config, shutdown, &pb);

        info!(collection = %collection, output = %path.display(), "Starting listing");
        let result = engine.run_listing(&source, &mut sink).await;
        pb.finish_and_clear();

        report("listing", cli.output_format, result)
    }
}

impl SnapshotArgs {
    /// Run an ownership snapshot
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<Summary, CliError> {
        let contract = normalize_address(&self.contract)?;
        let source = Erc721RpcSource::new(self.rpc_url.clone(), contract.clone());

        let path = cli.output_dir.join(snapshot_filename(Utc::now()));
        let mut sink = CsvRecordSink::new(&path);

        let config = cli.acquisition_config(self.batch_size, self.delay_ms, DEFAULT_PAGE_SIZE);
        let pb = create_progress_bar(cli.output_format, Some(0), format!("Snapshot {contract}"));
        let engine = cli.engine(config, shutdown, &pb);

        info!(contract = %contract, rpc_url = %self.rpc_url, output = %path.display(), "Starting snapshot");
        let result = engine.run_snapshot(&source, &mut sink).await;
        pb.finish_and_clear();

        report("snapshot", cli.output_format, result)
    }
}

impl DownloadArgs {
    /// Artifact kinds enabled by the flags, validated against the configured base URLs
    pub fn kinds(&self) -> Result<Vec<ArtifactKind>, CliError> {
        let mut kinds = Vec::new();
        if self.images {
            if self.image_base_url.is_none() {
                return Err(CliError::InvalidArgument(
                    "--image-base-url (IMAGE_BASE_URL) is required when images are enabled"
                        .to_string(),
                ));
            }
            kinds.push(ArtifactKind::Image);
        }
        if self.json {
            if self.json_base_url.is_none() {
                return Err(CliError::InvalidArgument(
                    "--json-base-url (JSON_BASE_URL) is required when metadata is enabled"
                        .to_string(),
                ));
            }
            kinds.push(ArtifactKind::Metadata);
        }
        if kinds.is_empty() {
            return Err(CliError::InvalidArgument(
                "nothing to download: enable images and/or json".to_string(),
            ));
        }
        Ok(kinds)
    }

    /// Run an artifact download
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<Summary, CliError> {
        let plan = DownloadPlan::new(self.start_id, self.end_id, self.kinds()?);
        plan.validate()?;

        let mut source = HttpItemSource::new().with_json_extension(self.json_extension.clone());
        if let Some(base) = &self.image_base_url {
            source = source.with_image_base_url(base.clone());
        }
        if let Some(base) = &self.json_base_url {
            source = source.with_json_base_url(base.clone());
        }
        let sink = FsItemSink::new(&cli.output_dir);

        let config = cli.acquisition_config(self.concurrency, self.delay_ms, DEFAULT_PAGE_SIZE);
        let pb = create_progress_bar(
            cli.output_format,
            Some(plan.total()),
            format!("Downloading ids {}..={}", plan.start_id, plan.end_id),
        );
        let engine = cli.engine(config, shutdown, &pb);

        let result = engine.run_download(&source, &sink, &plan).await;
        pb.finish_and_clear();

        report("download", cli.output_format, result)
    }
}

/// Print the outcome and pass it through
fn report(
    command: &str,
    format: OutputFormat,
    result: Result<Summary, crate::downloader::AcquisitionError>,
) -> Result<Summary, CliError> {
    match format {
        OutputFormat::Json => output_json(command, &result),
        OutputFormat::Human => output_human(command, &result),
    }
    result.map_err(CliError::from)
}

fn output_json(command: &str, result: &Result<Summary, crate::downloader::AcquisitionError>) {
    let output = match result {
        Ok(summary) => serde_json::json!({
            "success": true,
            "command": command,
            "summary": summary,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "command": command,
            "error": e.to_string(),
        }),
    };
    println!("{output}");
}

fn output_human(command: &str, result: &Result<Summary, crate::downloader::AcquisitionError>) {
    match result {
        Ok(summary) => {
            if summary.interrupted {
                println!("\n{command} interrupted, partial results kept");
            } else {
                println!("\n{command} completed");
            }
            if let Some(strategy) = summary.strategy {
                println!("Strategy: {strategy}");
            }
            println!("Succeeded: {}", summary.item_count);
            if summary.skipped_count > 0 {
                println!("Skipped: {}", summary.skipped_count);
            }
            if summary.error_count > 0 {
                println!("Failed: {}", summary.error_count);
            }
            if summary.pages_fetched > 0 {
                println!("Pages: {}", summary.pages_fetched);
            }
            match &summary.output_location {
                Some(path) => println!("Output: {}", path.display()),
                None => println!("Output: none (nothing to write)"),
            }
        }
        Err(e) => {
            eprintln!("\n{command} failed!");
            eprintln!("Error: {e}");
            error!(command = command, error = %e, "Acquisition failed");
        }
    }
}

/// Progress bar for a run; `len` of `None` renders a spinner for open-ended listings
fn create_progress_bar(format: OutputFormat, len: Option<u64>, message: String) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let pb = match len {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .expect("hardcoded template is valid")
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .expect("hardcoded template is valid"),
            );
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
    };
    pb.set_message(message);
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressCallback {
    let pb = pb.clone();
    Arc::new(move |event: &ProgressEvent| match event {
        ProgressEvent::Page { .. } => pb.set_message(event.format_progress()),
        ProgressEvent::Batch { completed, total } => {
            pb.set_length(*total);
            pb.set_position(*completed);
        }
    })
}
