//! Error types for diskdict core.

use diskdict_codec::{CodecError, Value};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in diskdict store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad constructor argument, unknown serialization backend, or
    /// invalid path.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// A key or value could not be packed or unpacked.
    #[error("serialization failed for {context}: {source}")]
    Serialization {
        /// The key or value the failure applies to.
        context: String,
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// Null is never a valid top-level key or value.
    #[error("null cannot be stored as a {slot}")]
    NullNotAllowed {
        /// Either `"key"` or `"value"`.
        slot: &'static str,
    },

    /// Strict lookup or pop of an absent key.
    #[error("key not found: {key}")]
    NotFound {
        /// Debug rendering of the missing key.
        key: String,
    },

    /// Pop on a store holding zero entries.
    #[error("store is empty")]
    Empty,

    /// The storage size cap was exceeded during a write.
    #[error("storage size cap of {map_size} bytes exceeded")]
    Capacity {
        /// The configured cap in bytes.
        map_size: u64,
    },

    /// Operation attempted on a closed or dropped store.
    #[error("store at {} is closed or dropped", path.display())]
    Lifecycle {
        /// Path of the store the handle was opened from.
        path: PathBuf,
    },

    /// Residual fault in the embedded storage engine.
    #[error("storage engine error: {0}")]
    Engine(heed::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a serialization error carrying the offending context.
    pub fn serialization(context: impl Into<String>, source: CodecError) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Creates a not-found error for the given key.
    pub fn not_found(key: &Value) -> Self {
        Self::NotFound {
            key: format!("{key:?}"),
        }
    }

    /// Creates a lifecycle error naming the store path.
    pub fn lifecycle(path: impl Into<PathBuf>) -> Self {
        Self::Lifecycle { path: path.into() }
    }

    /// Maps an engine fault, surfacing a full map as [`StoreError::Capacity`].
    pub fn engine(map_size: u64, error: heed::Error) -> Self {
        match error {
            heed::Error::Mdb(heed::MdbError::MapFull) => Self::Capacity { map_size },
            other => Self::Engine(other),
        }
    }
}
