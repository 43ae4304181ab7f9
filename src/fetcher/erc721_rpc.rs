//! ERC-721 enumeration over Ethereum JSON-RPC
//!
//! Issues `eth_call` against an ERC-721 contract for the three calls a snapshot needs:
//!
//! - `totalSupply()` (selector `0x18160ddd`)
//! - `tokenByIndex(uint256)` (selector `0x4f6ccce7`)
//! - `ownerOf(uint256)` (selector `0x6352211e`)
//!
//! A reverted call or an empty return (`0x`) maps to [`FetcherError::Reverted`], so the
//! engine reports the token as skipped rather than failed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fetcher::http::HttpClient;
use crate::fetcher::{EnumerableSource, FetcherError, FetcherResult};
use crate::TokenId;

/// Default Sei EVM endpoint
pub const DEFAULT_RPC_URL: &str = "https://evm-rpc.sei-apis.com";

const TOTAL_SUPPLY_SELECTOR: [u8; 4] = [0x18, 0x16, 0x0d, 0xdd];
const TOKEN_BY_INDEX_SELECTOR: [u8; 4] = [0x4f, 0x6c, 0xcc, 0xe7];
const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];

/// JSON-RPC error code for `execution reverted`
const RPC_EXECUTION_REVERTED: i64 = 3;
/// JSON-RPC error code many providers use for throttling
const RPC_LIMIT_EXCEEDED: i64 = -32005;

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Enumerable source backed by an ERC-721 contract
#[derive(Debug)]
pub struct Erc721RpcSource {
    http: HttpClient,
    rpc_url: String,
    contract: String,
    next_id: AtomicU64,
}

impl Erc721RpcSource {
    /// Source for `contract` reached through `rpc_url`
    pub fn new(rpc_url: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            http: HttpClient::default(),
            rpc_url: rpc_url.into(),
            contract: contract.into().to_lowercase(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Contract address
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// RPC endpoint
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn eth_call(&self, calldata: &[u8]) -> FetcherResult<Vec<u8>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_call",
            params: json!([
                {"to": self.contract, "data": encode_hex(calldata)},
                "latest"
            ]),
        };

        let response: RpcResponse = self.http.post_json(&self.rpc_url, &request).await?;

        if let Some(error) = response.error {
            return Err(classify_rpc_error(error));
        }

        let result = response
            .result
            .ok_or_else(|| FetcherError::InvalidResponse("missing result field".to_string()))?;
        let bytes = decode_hex(&result)?;
        if bytes.is_empty() {
            return Err(FetcherError::Reverted("empty return data".to_string()));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl EnumerableSource for Erc721RpcSource {
    async fn total_supply(&self) -> FetcherResult<u64> {
        let word = first_word(&self.eth_call(&TOTAL_SUPPLY_SELECTOR).await?)?;
        TokenId::from_be_bytes(word).as_u64().ok_or_else(|| {
            FetcherError::InvalidResponse("totalSupply does not fit in 64 bits".to_string())
        })
    }

    async fn token_by_index(&self, index: u64) -> FetcherResult<TokenId> {
        let calldata = encode_call(TOKEN_BY_INDEX_SELECTOR, TokenId::from(index));
        let word = first_word(&self.eth_call(&calldata).await?)?;
        Ok(TokenId::from_be_bytes(word))
    }

    async fn owner_of(&self, token_id: &TokenId) -> FetcherResult<String> {
        let calldata = encode_call(OWNER_OF_SELECTOR, *token_id);
        let word = first_word(&self.eth_call(&calldata).await?)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(FetcherError::InvalidResponse(
                "ownerOf returned a non-address word".to_string(),
            ));
        }
        Ok(encode_hex(&word[12..]))
    }
}

fn classify_rpc_error(error: RpcErrorObject) -> FetcherError {
    let lowered = error.message.to_lowercase();
    if error.code == RPC_EXECUTION_REVERTED || lowered.contains("revert") {
        FetcherError::Reverted(error.message)
    } else if error.code == RPC_LIMIT_EXCEEDED || lowered.contains("rate limit") {
        FetcherError::RateLimited
    } else {
        FetcherError::Rpc {
            code: error.code,
            message: error.message,
        }
    }
}

fn encode_call(selector: [u8; 4], arg: TokenId) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(36);
    calldata.extend_from_slice(&selector);
    calldata.extend_from_slice(&arg.to_be_bytes());
    calldata
}

fn first_word(data: &[u8]) -> FetcherResult<[u8; 32]> {
    data.get(..32)
        .and_then(|w| <[u8; 32]>::try_from(w).ok())
        .ok_or_else(|| {
            FetcherError::InvalidResponse(format!(
                "expected a 32-byte word, got {} bytes",
                data.len()
            ))
        })
}

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(text: &str) -> FetcherResult<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|e| FetcherError::Parse(format!("invalid hex {text}: {e}")))
}
