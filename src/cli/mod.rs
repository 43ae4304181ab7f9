//! CLI command implementations

pub mod acquire;
pub mod error;

pub use acquire::{Cli, Commands, DownloadArgs, ListingArgs, OutputFormat, SnapshotArgs};
pub use error::CliError;
