/// Contract events a trigger can watch

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// keccak256("Approval(address,address,uint256)")
const APPROVAL_TOPIC: &str = "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

/// ERC-20 style events with two indexed addresses and one uint256 value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    Approval,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Transfer => "Transfer",
            EventKind::Approval => "Approval",
        }
    }

    pub fn signature(self) -> &'static str {
        match self {
            EventKind::Transfer => "Transfer(address,address,uint256)",
            EventKind::Approval => "Approval(address,address,uint256)",
        }
    }

    /// topic0 used to filter logs
    pub fn topic(self) -> &'static str {
        match self {
            EventKind::Transfer => TRANSFER_TOPIC,
            EventKind::Approval => APPROVAL_TOPIC,
        }
    }

    /// Payload field names: two indexed addresses, then the value
    pub fn fields(self) -> [&'static str; 3] {
        match self {
            EventKind::Transfer => ["from", "to", "value"],
            EventKind::Approval => ["owner", "spender", "value"],
        }
    }

    /// Field identifying who caused the event
    pub fn sender_field(self) -> &'static str {
        self.fields()[0]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        [EventKind::Transfer, EventKind::Approval]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name) || kind.signature() == name)
            .ok_or_else(|| format!("unknown event: {name}"))
    }
}

/// `0x` followed by exactly 40 hex digits
pub fn is_valid_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
