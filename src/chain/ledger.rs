/// Ledger query capability
///
/// Cursors only need two calls: the current block height and the logs in a
/// block range. `JsonRpcLedger` implements them over Ethereum JSON-RPC.

use crate::chain::{EventKind, RawLog};
use crate::error::LedgerError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Contract address plus the event whose topic0 filters the logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: String,
    pub event: EventKind,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn current_height(&self) -> Result<u64, LedgerError>;

    /// Logs matching `filter` in the inclusive range `[from_block, to_block]`
    async fn query_logs(&self, filter: &LogFilter, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, LedgerError>;
}

/// Ethereum JSON-RPC ledger (`eth_blockNumber`, `eth_getLogs`)
#[derive(Debug)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    /// Null for pending logs
    block_number: Option<String>,
    log_index: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("⛓️ RPC {} (id {})", method, id);

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| LedgerError::Malformed(format!("{method} returned no result")))
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn current_height(&self) -> Result<u64, LedgerError> {
        let height: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&height)
    }

    async fn query_logs(&self, filter: &LogFilter, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, LedgerError> {
        let logs: Vec<RpcLog> = self
            .call(
                "eth_getLogs",
                json!([{
                    "address": filter.address,
                    "topics": [filter.event.topic()],
                    "fromBlock": format!("{from_block:#x}"),
                    "toBlock": format!("{to_block:#x}"),
                }]),
            )
            .await?;

        let mut decoded = Vec::with_capacity(logs.len());
        for log in logs {
            let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
                continue;
            };
            decoded.push(RawLog {
                block_number: parse_quantity(&block_number)?,
                log_index: parse_quantity(&log_index)?,
                topics: log.topics,
                data: log.data,
            });
        }
        Ok(decoded)
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`
fn parse_quantity(raw: &str) -> Result<u64, LedgerError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Malformed(format!("quantity without 0x prefix: {raw}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| LedgerError::Malformed(format!("bad quantity {raw}: {e}")))
}
