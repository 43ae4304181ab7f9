//! Chain and collection identifier parsing and validation
//!
//! A collection is addressed as `CHAIN:0xADDRESS`, or by a bare address paired with a
//! separately supplied chain.

use std::fmt;
use std::str::FromStr;

/// EVM chains supported by the marketplace listing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chain {
    /// Ethereum mainnet
    Ethereum,
    /// Polygon PoS
    Polygon,
    /// Arbitrum One
    Arbitrum,
    /// Optimism
    Optimism,
    /// Base
    Base,
    /// Sei EVM
    Sei,
    /// BNB Smart Chain
    Bsc,
    /// Avalanche C-Chain
    Avalanche,
    /// Fantom Opera
    Fantom,
    /// Cronos
    Cronos,
}

impl Chain {
    /// Every supported chain, in display order.
    pub const ALL: [Chain; 10] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Base,
        Chain::Sei,
        Chain::Bsc,
        Chain::Avalanche,
        Chain::Fantom,
        Chain::Cronos,
    ];

    /// Lowercase name used in API parameters and filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Sei => "sei",
            Chain::Bsc => "bsc",
            Chain::Avalanche => "avalanche",
            Chain::Fantom => "fantom",
            Chain::Cronos => "cronos",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Chain::ALL
            .iter()
            .copied()
            .find(|chain| chain.as_str() == wanted)
            .ok_or_else(|| {
                let supported: Vec<&str> = Chain::ALL.iter().map(Chain::as_str).collect();
                IdentifierError::UnsupportedChain(format!(
                    "{s}. Supported chains: {}",
                    supported.join(", ")
                ))
            })
    }
}

/// Collection identifier: a chain plus a contract address.
///
/// # Examples
///
/// ```
/// use collection_downloader::identifier::{Chain, CollectionIdentifier};
///
/// let id = CollectionIdentifier::parse("sei:0x972170dCF963E1Dc7Bdd7BDf85A3Abb35Fb4F15d").unwrap();
/// assert_eq!(id.chain(), Chain::Sei);
/// assert_eq!(id.address(), "0x972170dcf963e1dc7bdd7bdf85a3abb35fb4f15d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionIdentifier {
    chain: Chain,
    address: String,
}

impl CollectionIdentifier {
    /// Build from separately supplied chain and address.
    pub fn new(chain: Chain, address: &str) -> Result<Self, IdentifierError> {
        Ok(Self {
            chain,
            address: normalize_address(address)?,
        })
    }

    /// Parse `CHAIN:ADDRESS`.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let (chain, address) = s.split_once(':').ok_or_else(|| {
            IdentifierError::InvalidFormat(
                "invalid identifier format: expected CHAIN:ADDRESS".to_string(),
            )
        })?;
        Self::new(chain.parse()?, address)
    }

    /// Chain component
    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Normalized (lowercase, 0x-prefixed) address
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for CollectionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// Validate and normalize a 20-byte hex address.
pub fn normalize_address(address: &str) -> Result<String, IdentifierError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(IdentifierError::InvalidAddress(
            "address cannot be empty".to_string(),
        ));
    }

    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| IdentifierError::InvalidAddress(format!("{trimmed}: missing 0x prefix")))?;

    if hex.len() != 40 {
        return Err(IdentifierError::InvalidAddress(format!(
            "{trimmed}: expected 40 hex digits, got {}",
            hex.len()
        )));
    }

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdentifierError::InvalidAddress(format!(
            "{trimmed}: contains non-hex characters"
        )));
    }

    Ok(format!("0x{}", hex.to_lowercase()))
}

/// Errors that can occur during identifier parsing
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid identifier format
    #[error("identifier error: {0}")]
    InvalidFormat(String),

    /// Chain not in the supported list
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Malformed contract address
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
