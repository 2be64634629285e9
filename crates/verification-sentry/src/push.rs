//! Decoding of verification request pushes.
//!
//! A push looks like
//!
//! ```json
//! {"blockbody": {"header": <header>, "body": {"transactions": [...]}}, "committee_index": 3}
//! ```
//!
//! where `<header>` comes in one of two historical shapes, see [`HeaderShape`].

use std::str::FromStr;

use alloy_primitives::B256;
use attestor_types::{CommitteeIndex, Slot};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Layout of `blockbody.header`, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderShape {
    /// Sealed block envelope: `{"header": {"number": .., "hash": .., ...}, "body": ..}`.
    Sealed,
    /// Bare header fields: `{"number": .., "hash": ..}`.
    Flat,
}

impl HeaderShape {
    const ORDER: [Self; 2] = [Self::Sealed, Self::Flat];

    /// Returns the object holding `number`/`hash` under this shape, if any.
    fn fields(self, header: &Value) -> Option<&Map<String, Value>> {
        match self {
            Self::Sealed => header.get("header")?.as_object(),
            Self::Flat => header.as_object(),
        }
    }
}

/// How the push identifies its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIdentity {
    Number(Slot),
    Hash(B256),
}

/// A push reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPush {
    pub identity: BlockIdentity,
    pub shape: HeaderShape,
    pub committee_index: CommitteeIndex,
    /// Length of `blockbody.body.transactions`, zero when absent.
    pub tx_count: usize,
    /// Inner header object of a sealed envelope.
    pub header: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPush {
    #[serde(default)]
    blockbody: RawBlockBody,
    #[serde(default)]
    committee_index: Value,
}

#[derive(Debug, Default, Deserialize)]
struct RawBlockBody {
    #[serde(default)]
    header: Value,
    #[serde(default)]
    body: Value,
}

/// Parses a push payload.
///
/// Shapes are tried in order and never mixed: within a shape a parseable
/// `number` wins over a well-formed `hash`. A payload where neither shape
/// yields an identity is rejected with [`Error::Decode`].
pub fn decode_push(raw: &Value) -> Result<DecodedPush> {
    let push = RawPush::deserialize(raw)
        .map_err(|e| Error::Decode(format!("not a verification request: {e}")))?;

    let committee_index = match &push.committee_index {
        Value::Null => 0,
        value => parse_u64_flexible(value)
            .map_err(|e| Error::Decode(format!("committee_index: {e}")))?,
    };

    let (shape, identity) = HeaderShape::ORDER
        .into_iter()
        .find_map(|shape| {
            let fields = shape.fields(&push.blockbody.header)?;
            identity_from(shape, fields).map(|identity| (shape, identity))
        })
        .ok_or_else(|| Error::Decode("insufficient fields (no number/hash)".into()))?;

    let tx_count = push
        .blockbody
        .body
        .get("transactions")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    let header = match shape {
        HeaderShape::Sealed => push.blockbody.header.get("header").cloned(),
        HeaderShape::Flat => None,
    };

    Ok(DecodedPush {
        identity,
        shape,
        committee_index,
        tx_count,
        header,
    })
}

fn identity_from(shape: HeaderShape, fields: &Map<String, Value>) -> Option<BlockIdentity> {
    if let Some(number) = fields.get("number").filter(|v| !v.is_null()) {
        match parse_u64_flexible(number) {
            Ok(n) => return Some(BlockIdentity::Number(n)),
            Err(e) => debug!(?shape, error = %e, "Ignoring unparseable block number"),
        }
    }

    if let Some(hash) = fields.get("hash").filter(|v| !v.is_null()) {
        match parse_block_hash(hash) {
            Some(h) => return Some(BlockIdentity::Hash(h)),
            None => debug!(?shape, %hash, "Ignoring invalid block hash"),
        }
    }

    None
}

/// Accepts only `0x` followed by exactly 64 hex digits.
pub(crate) fn parse_block_hash(value: &Value) -> Option<B256> {
    let s = value.as_str()?;
    if s.len() != 66 || !s.starts_with("0x") {
        return None;
    }
    B256::from_str(s).ok()
}

/// Normalizes the numeric encodings seen in the wild to `u64`: quoted hex
/// (`"0x64"`, `"0X64"`), quoted decimal (`"100"`, surrounding whitespace
/// allowed) and bare JSON numbers.
pub fn parse_u64_flexible(value: &Value) -> std::result::Result<u64, String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err("empty string".into());
            }
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(digits) => {
                    u64::from_str_radix(digits, 16).map_err(|e| format!("bad hex number {s:?}: {e}"))
                }
                None => s.parse().map_err(|e| format!("bad decimal number {s:?}: {e}")),
            }
        }
        Value::Number(n) => n.as_u64().ok_or_else(|| format!("not a u64: {n}")),
        other => Err(format!("unsupported number encoding: {other}")),
    }
}
