//! Materialized serialization pipeline.
//!
//! The backend is chosen once, at configuration-create time, and
//! materialized into this small dispatch table so per-call code never
//! branches on a backend name. Compression, when enabled, composes
//! around the backend transparently (packing is
//! `compress(backend.pack(x))`, unpacking is
//! `backend.unpack(decompress(x))`) and applies to values only. Keys
//! stay uncompressed: they are small, the store makes no ordering
//! guarantee over them, and presence tests rely on exact byte equality
//! of packed keys.

use crate::config::{Backend, StoreConfig};
use crate::error::{StoreError, StoreResult};
use diskdict_codec::{cbor, native, CodecError, CodecResult, Value};

/// The pack/unpack pipeline of one store handle.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    backend: Backend,
    compress: bool,
}

impl Codec {
    /// Materializes the codec a configuration record describes.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            backend: config.serial,
            compress: config.compress,
        }
    }

    /// Packs a key. Top-level null keys are rejected before any I/O.
    pub fn pack_key(&self, key: &Value) -> StoreResult<Vec<u8>> {
        if key.is_null() {
            return Err(StoreError::NullNotAllowed { slot: "key" });
        }
        self.pack(key)
            .map_err(|e| StoreError::serialization(format!("key {key:?}"), e))
    }

    /// Unpacks a key read back from the engine.
    pub fn unpack_key(&self, bytes: &[u8]) -> StoreResult<Value> {
        self.unpack(bytes)
            .map_err(|e| StoreError::serialization("stored key", e))
    }

    /// Packs a value, compressing the packed bytes when enabled.
    /// Top-level null values are rejected before any I/O.
    pub fn pack_value(&self, value: &Value) -> StoreResult<Vec<u8>> {
        if value.is_null() {
            return Err(StoreError::NullNotAllowed { slot: "value" });
        }
        let packed = self
            .pack(value)
            .map_err(|e| StoreError::serialization(format!("value {value:?}"), e))?;
        if !self.compress {
            return Ok(packed);
        }
        zstd::encode_all(packed.as_slice(), zstd::DEFAULT_COMPRESSION_LEVEL).map_err(|e| {
            StoreError::serialization(
                format!("value {value:?}"),
                CodecError::encoding_failed(format!("compression failed: {e}")),
            )
        })
    }

    /// Unpacks a value, decompressing first when enabled.
    pub fn unpack_value(&self, bytes: &[u8]) -> StoreResult<Value> {
        if self.compress {
            let raw = zstd::decode_all(bytes).map_err(|e| {
                StoreError::serialization(
                    "stored value",
                    CodecError::decoding_failed(format!("decompression failed: {e}")),
                )
            })?;
            self.unpack(&raw)
                .map_err(|e| StoreError::serialization("stored value", e))
        } else {
            self.unpack(bytes)
                .map_err(|e| StoreError::serialization("stored value", e))
        }
    }

    fn pack(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match self.backend {
            Backend::Cbor => cbor::pack(value),
            Backend::Native => native::pack(value),
        }
    }

    fn unpack(&self, bytes: &[u8]) -> CodecResult<Value> {
        match self.backend {
            Backend::Cbor => cbor::unpack(bytes),
            Backend::Native => native::unpack(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreOptions;

    fn codec(backend: Backend, compress: bool) -> Codec {
        Codec::new(&StoreOptions::new().serial(backend).compress(compress).config())
    }

    #[test]
    fn value_round_trip_all_pipelines() {
        let value = Value::map(vec![
            (Value::Str("nums".to_string()), Value::list((0..64).map(Value::Int))),
            (Value::Str("flag".to_string()), Value::Bool(true)),
        ]);
        for backend in [Backend::Cbor, Backend::Native] {
            for compress in [false, true] {
                let codec = codec(backend, compress);
                let bytes = codec.pack_value(&value).unwrap();
                assert_eq!(codec.unpack_value(&bytes).unwrap(), value);
            }
        }
    }

    #[test]
    fn keys_are_never_compressed() {
        let plain = codec(Backend::Cbor, false);
        let compressed = codec(Backend::Cbor, true);
        let key = Value::Str("some key".to_string());
        assert_eq!(
            plain.pack_key(&key).unwrap(),
            compressed.pack_key(&key).unwrap()
        );
    }

    #[test]
    fn compression_changes_value_bytes() {
        let plain = codec(Backend::Native, false);
        let compressed = codec(Backend::Native, true);
        let value = Value::Str("a".repeat(512));
        let raw = plain.pack_value(&value).unwrap();
        let packed = compressed.pack_value(&value).unwrap();
        assert_ne!(raw, packed);
        assert!(packed.len() < raw.len());
        assert_eq!(compressed.unpack_value(&packed).unwrap(), value);
    }

    #[test]
    fn null_rejected_at_top_level_only() {
        let codec = codec(Backend::Cbor, false);
        assert!(matches!(
            codec.pack_key(&Value::Null),
            Err(StoreError::NullNotAllowed { slot: "key" })
        ));
        assert!(matches!(
            codec.pack_value(&Value::Null),
            Err(StoreError::NullNotAllowed { slot: "value" })
        ));
        // Nested nulls are data.
        let nested = Value::list(vec![Value::Null]);
        let bytes = codec.pack_value(&nested).unwrap();
        assert_eq!(codec.unpack_value(&bytes).unwrap(), nested);
    }

    #[test]
    fn unsupported_value_carries_context() {
        let codec = codec(Backend::Cbor, false);
        let err = codec.pack_value(&Value::set(vec![Value::Int(1)])).unwrap_err();
        match err {
            StoreError::Serialization { context, source } => {
                assert!(context.starts_with("value"));
                assert!(matches!(source, CodecError::UnsupportedType { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
