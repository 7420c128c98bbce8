//! Structural binary backend.
//!
//! Encodes values through CBOR (via `ciborium`). The format is compact
//! and schema-less, but not identity-preserving: tuples encode as plain
//! arrays and decode as lists, and sets have no CBOR representation at
//! all. This is a documented lossy-but-deterministic normalization, not
//! a bug; callers who need exact round-trips use the `native` backend.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as Cbor;

/// Name of this backend, used in error messages.
pub const BACKEND: &str = "cbor";

/// Encodes a value to CBOR bytes.
pub fn pack(value: &Value) -> CodecResult<Vec<u8>> {
    let cbor = to_cbor(value)?;
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(&cbor, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decodes a value from CBOR bytes.
pub fn unpack(bytes: &[u8]) -> CodecResult<Value> {
    let cbor: Cbor = ciborium::de::from_reader(bytes)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    from_cbor(cbor)
}

fn to_cbor(value: &Value) -> CodecResult<Cbor> {
    Ok(match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Int(n) => Cbor::Integer((*n).into()),
        Value::Float(f) => Cbor::Float(*f),
        Value::Str(s) => Cbor::Text(s.clone()),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        // Tuples normalize to arrays; the distinction is lost on decode.
        Value::List(items) | Value::Tuple(items) => Cbor::Array(
            items
                .iter()
                .map(to_cbor)
                .collect::<CodecResult<Vec<_>>>()?,
        ),
        Value::Set(_) => return Err(CodecError::unsupported(BACKEND, value)),
        Value::Map(pairs) => Cbor::Map(
            pairs
                .iter()
                .map(|(k, v)| Ok((to_cbor(k)?, to_cbor(v)?)))
                .collect::<CodecResult<Vec<_>>>()?,
        ),
    })
}

fn from_cbor(cbor: Cbor) -> CodecResult<Value> {
    Ok(match cbor {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(n) => {
            let wide = i128::from(n);
            Value::Int(i64::try_from(wide).map_err(|_| CodecError::IntegerOverflow)?)
        }
        Cbor::Float(f) => Value::Float(f),
        Cbor::Text(s) => Value::Str(s),
        Cbor::Bytes(b) => Value::Bytes(b),
        Cbor::Array(items) => Value::List(
            items
                .into_iter()
                .map(from_cbor)
                .collect::<CodecResult<Vec<_>>>()?,
        ),
        Cbor::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| Ok((from_cbor(k)?, from_cbor(v)?)))
                .collect::<CodecResult<_>>()?,
        ),
        Cbor::Tag(tag, _) => {
            return Err(CodecError::decoding_failed(format!(
                "unexpected CBOR tag {tag}"
            )))
        }
        other => {
            return Err(CodecError::decoding_failed(format!(
                "unexpected CBOR item: {other:?}"
            )))
        }
    })
}
