//! Transaction metadata decoding.
//!
//! Extracts the auxiliary application-metadata section from a binary-encoded
//! transaction. Decoding walks the transaction structure with a real CBOR
//! decoder; if the structure cannot be parsed the transaction is treated as
//! payload-less rather than falling back to byte scanning.

use minicbor::data::Type;
use minicbor::Decoder;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

use crate::error::MonitorError;

/// The only metadata label this system interprets. Content under other
/// labels is preserved in the payload map but not specially processed.
pub const APP_METADATA_LABEL: u64 = 1337;

/// Nesting depth cap for metadata values
const MAX_METADATA_DEPTH: usize = 16;

/// A decoded metadata value.
///
/// CBOR byte strings are hex-encoded into `Text`; the metadata model here
/// has no separate bytes variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    List(Vec<MetadataValue>),
    Mapping(Vec<(MetadataValue, MetadataValue)>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert structurally into a JSON value.
    ///
    /// Mappings whose keys are all text become objects; any other mapping
    /// becomes an array of `[key, value]` pairs. Text is carried verbatim —
    /// a text value that itself contains JSON is parsed later, at payload
    /// interpretation, never here (chunk fragments must stay untouched).
    pub fn to_json(&self) -> JsonValue {
        match self {
            MetadataValue::Text(s) => JsonValue::String(s.clone()),
            MetadataValue::Integer(i) => JsonValue::from(*i),
            MetadataValue::List(items) => {
                JsonValue::Array(items.iter().map(MetadataValue::to_json).collect())
            }
            MetadataValue::Mapping(pairs) => {
                if pairs.iter().all(|(k, _)| matches!(k, MetadataValue::Text(_))) {
                    let mut obj = JsonMap::new();
                    for (key, value) in pairs {
                        if let MetadataValue::Text(k) = key {
                            obj.insert(k.clone(), value.to_json());
                        }
                    }
                    JsonValue::Object(obj)
                } else {
                    JsonValue::Array(
                        pairs
                            .iter()
                            .map(|(k, v)| JsonValue::Array(vec![k.to_json(), v.to_json()]))
                            .collect(),
                    )
                }
            }
        }
    }
}

/// The metadata labels found in one transaction's auxiliary data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPayload {
    pub labels: BTreeMap<u64, MetadataValue>,
}

impl DecodedPayload {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The value under the application label, if any
    pub fn application_payload(&self) -> Option<&MetadataValue> {
        self.labels.get(&APP_METADATA_LABEL)
    }
}

/// Decode a hex-encoded transaction and extract its metadata labels.
///
/// Returns `Ok(None)` when the transaction is structurally valid but
/// carries no metadata. Structural failures are errors; the caller treats
/// them as payload-less and logs at debug.
pub fn decode_transaction(cbor_hex: &str) -> Result<Option<DecodedPayload>, MonitorError> {
    let bytes = hex::decode(cbor_hex)
        .map_err(|e| MonitorError::Decode(format!("transaction hex: {}", e)))?;

    let mut dec = Decoder::new(&bytes);

    // Transaction structure: [body, witness_set, (validity,) auxiliary_data]
    let len = dec
        .array()
        .map_err(cbor_err)?
        .ok_or_else(|| MonitorError::Decode("indefinite-length transaction array".into()))?;
    if len < 2 {
        return Err(MonitorError::Decode(format!(
            "transaction array too short: {} elements",
            len
        )));
    }

    dec.skip().map_err(cbor_err)?; // body
    dec.skip().map_err(cbor_err)?; // witness set

    let mut payload: Option<DecodedPayload> = None;
    for _ in 2..len {
        match dec.datatype().map_err(cbor_err)? {
            Type::Bool => {
                dec.bool().map_err(cbor_err)?;
            }
            Type::Null => {
                dec.null().map_err(cbor_err)?;
            }
            _ if payload.is_none() => {
                payload = Some(decode_auxiliary(&mut dec)?);
            }
            _ => {
                dec.skip().map_err(cbor_err)?;
            }
        }
    }

    Ok(payload.filter(|p| !p.is_empty()))
}

/// Decode the auxiliary-data section in any of its accepted forms:
/// a tag-wrapped keyed map (metadata under key 0), a two-or-more element
/// array whose first element is the metadata map, or a bare label-keyed map.
fn decode_auxiliary(dec: &mut Decoder) -> Result<DecodedPayload, MonitorError> {
    match dec.datatype().map_err(cbor_err)? {
        Type::Tag => {
            let _ = dec.tag().map_err(cbor_err)?;
            decode_keyed_auxiliary(dec)
        }
        Type::Array => {
            let len = dec
                .array()
                .map_err(cbor_err)?
                .ok_or_else(|| MonitorError::Decode("indefinite-length auxiliary array".into()))?;
            if len == 0 {
                return Ok(DecodedPayload::default());
            }
            let payload = decode_label_map(dec)?;
            for _ in 1..len {
                dec.skip().map_err(cbor_err)?;
            }
            Ok(payload)
        }
        Type::Map => decode_label_map(dec),
        Type::ArrayIndef | Type::MapIndef => Err(MonitorError::Decode(
            "indefinite-length auxiliary section".into(),
        )),
        _ => {
            dec.skip().map_err(cbor_err)?;
            Ok(DecodedPayload::default())
        }
    }
}

/// The tag-wrapped form keys sections by small integers; metadata is under
/// key 0, other sections (scripts) are skipped.
fn decode_keyed_auxiliary(dec: &mut Decoder) -> Result<DecodedPayload, MonitorError> {
    let len = dec
        .map()
        .map_err(cbor_err)?
        .ok_or_else(|| MonitorError::Decode("indefinite-length auxiliary map".into()))?;

    let mut payload = DecodedPayload::default();
    for _ in 0..len {
        let key = dec.u64().map_err(cbor_err)?;
        if key == 0 {
            payload = decode_label_map(dec)?;
        } else {
            dec.skip().map_err(cbor_err)?;
        }
    }
    Ok(payload)
}

/// Decode a metadata map: every key convertible to a non-negative integer
/// is retained; other keys are skipped together with their values.
fn decode_label_map(dec: &mut Decoder) -> Result<DecodedPayload, MonitorError> {
    let len = dec
        .map()
        .map_err(cbor_err)?
        .ok_or_else(|| MonitorError::Decode("indefinite-length metadata map".into()))?;

    let mut labels = BTreeMap::new();
    for _ in 0..len {
        let label = match dec.datatype().map_err(cbor_err)? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
                Some(dec.u64().map_err(cbor_err)?)
            }
            // Some encoders emit labels as decimal text
            Type::String => dec.str().map_err(cbor_err)?.parse::<u64>().ok(),
            _ => {
                dec.skip().map_err(cbor_err)?;
                None
            }
        };
        match label {
            Some(label) => {
                let value = decode_metadata_value(dec, 0)?;
                labels.insert(label, value);
            }
            None => {
                dec.skip().map_err(cbor_err)?; // value
            }
        }
    }

    Ok(DecodedPayload { labels })
}

fn decode_metadata_value(dec: &mut Decoder, depth: usize) -> Result<MetadataValue, MonitorError> {
    if depth > MAX_METADATA_DEPTH {
        return Err(MonitorError::Decode("metadata nesting too deep".into()));
    }

    match dec.datatype().map_err(cbor_err)? {
        Type::String => Ok(MetadataValue::Text(dec.str().map_err(cbor_err)?.to_string())),
        Type::Bytes => Ok(MetadataValue::Text(hex::encode(
            dec.bytes().map_err(cbor_err)?,
        ))),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            let value = dec.u64().map_err(cbor_err)?;
            let value = i64::try_from(value)
                .map_err(|_| MonitorError::Decode("metadata integer out of range".into()))?;
            Ok(MetadataValue::Integer(value))
        }
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => {
            Ok(MetadataValue::Integer(dec.i64().map_err(cbor_err)?))
        }
        Type::Array => {
            let len = dec
                .array()
                .map_err(cbor_err)?
                .ok_or_else(|| MonitorError::Decode("indefinite-length metadata list".into()))?;
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(decode_metadata_value(dec, depth + 1)?);
            }
            Ok(MetadataValue::List(items))
        }
        Type::Map => {
            let len = dec
                .map()
                .map_err(cbor_err)?
                .ok_or_else(|| MonitorError::Decode("indefinite-length metadata map".into()))?;
            let mut pairs = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                let key = decode_metadata_value(dec, depth + 1)?;
                let value = decode_metadata_value(dec, depth + 1)?;
                pairs.push((key, value));
            }
            Ok(MetadataValue::Mapping(pairs))
        }
        Type::Tag => {
            let _ = dec.tag().map_err(cbor_err)?;
            decode_metadata_value(dec, depth + 1)
        }
        other => Err(MonitorError::Decode(format!(
            "unsupported metadata type {:?}",
            other
        ))),
    }
}

fn cbor_err(e: minicbor::decode::Error) -> MonitorError {
    MonitorError::Decode(format!("cbor: {}", e))
}
