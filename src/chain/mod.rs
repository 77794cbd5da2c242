/// Chain access layer
///
/// Everything the trigger cursors need from the ledger:
/// - Known contract events and address validation
/// - The `Ledger` query capability (JSON-RPC implementation included)
/// - The `LogDecoder` turning raw logs into named-field payloads

// Known events, topics and address checks
pub mod event;

// Ledger query capability
pub mod ledger;

// Raw log -> payload decoding
pub mod decoder;

pub use decoder::{AbiLogDecoder, LogDecoder};
pub use event::{is_valid_address, EventKind};
pub use ledger::{JsonRpcLedger, Ledger, LogFilter};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A log entry as returned by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub block_number: u64,
    pub log_index: u64,
    pub topics: Vec<String>,
    pub data: String,
}

impl RawLog {
    pub fn id(&self) -> LogId {
        LogId {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

/// Composite identity of a log, displayed as `blockNumber:logIndex`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogId {
    pub block_number: u64,
    pub log_index: u64,
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}
