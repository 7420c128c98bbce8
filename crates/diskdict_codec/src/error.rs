//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The backend has no representation for this value.
    #[error("the {backend} backend cannot encode {type_name} values: {value}")]
    UnsupportedType {
        /// Backend that rejected the value.
        backend: &'static str,
        /// Variant name of the rejected value.
        type_name: &'static str,
        /// Debug rendering of the offending value.
        value: String,
    },

    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Integer does not fit in the i64 range on decode.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Unknown type tag in the native format.
    #[error("unknown type tag: {tag:#04x}")]
    UnknownTag {
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// Input contained bytes past the end of the encoded value.
    #[error("trailing bytes after value")]
    TrailingBytes,
}

impl CodecError {
    /// Creates an unsupported type error for the given backend and value.
    pub fn unsupported(backend: &'static str, value: &crate::Value) -> Self {
        Self::UnsupportedType {
            backend,
            type_name: value.type_name(),
            value: format!("{value:?}"),
        }
    }

    /// Creates an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Creates a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
