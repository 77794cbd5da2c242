/// Raw log decoding
///
/// Turns a log matching a known event into a JSON object keyed by the event's
/// field names. Integers are rendered as exact decimal strings so nothing is
/// lost crossing into the engine.

use crate::chain::{EventKind, RawLog};
use crate::error::DecodeError;
use serde_json::{Map, Value};

/// Decodes raw logs for a given event
pub trait LogDecoder: Send + Sync {
    fn decode(&self, event: EventKind, log: &RawLog) -> Result<Value, DecodeError>;
}

/// ABI decoder for `Event(address indexed, address indexed, uint256)`
#[derive(Debug, Default, Clone, Copy)]
pub struct AbiLogDecoder;

impl LogDecoder for AbiLogDecoder {
    fn decode(&self, event: EventKind, log: &RawLog) -> Result<Value, DecodeError> {
        if log.topics.len() != 3 {
            return Err(DecodeError::TopicCount {
                expected: 3,
                actual: log.topics.len(),
            });
        }
        if !log.topics[0].eq_ignore_ascii_case(event.topic()) {
            return Err(DecodeError::SignatureMismatch(log.topics[0].clone()));
        }

        let [first, second, value] = event.fields();
        let data = decode_hex(&log.data)?;
        if data.len() < 32 {
            return Err(DecodeError::DataTooShort(data.len()));
        }

        let mut payload = Map::new();
        payload.insert(first.to_string(), Value::String(topic_to_address(&log.topics[1])?));
        payload.insert(second.to_string(), Value::String(topic_to_address(&log.topics[2])?));
        payload.insert(value.to_string(), Value::String(word_to_decimal(&data[..32])));
        Ok(Value::Object(payload))
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, DecodeError> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
    hex::decode(digits).map_err(|_| DecodeError::InvalidHex(raw.to_string()))
}

/// Indexed address topics are left-padded to 32 bytes
fn topic_to_address(topic: &str) -> Result<String, DecodeError> {
    let word = decode_hex(topic)?;
    if word.len() != 32 {
        return Err(DecodeError::InvalidHex(topic.to_string()));
    }
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

/// Big-endian bytes to decimal, using base 1e9 limbs
fn word_to_decimal(word: &[u8]) -> String {
    const BASE: u64 = 1_000_000_000;
    let mut limbs: Vec<u64> = vec![0];

    for &byte in word {
        let mut carry = u64::from(byte);
        for limb in limbs.iter_mut() {
            let value = *limb * 256 + carry;
            *limb = value % BASE;
            carry = value / BASE;
        }
        if carry > 0 {
            limbs.push(carry);
        }
    }

    let mut digits = limbs.iter().rev();
    let mut decimal = digits.next().map(u64::to_string).unwrap_or_default();
    for limb in digits {
        decimal.push_str(&format!("{limb:09}"));
    }
    decimal
}
