//! Store configuration.
//!
//! A store's settings are fixed when the store path is first initialized
//! (or explicitly reset): the [`StoreOptions`] a caller passes are
//! validated, turned into a [`StoreConfig`], and persisted inside the
//! store directory. Every subsequent open loads the persisted record
//! verbatim and ignores conflicting constructor arguments; only `path`
//! and `reset` are honored on reopen.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum number of concurrent reader processes.
pub const DEFAULT_MAX_READERS: u32 = 100;

/// Default number of mutations after which an implicit sync triggers.
pub const DEFAULT_BUFFER_SIZE: u64 = 100_000;

/// Default storage size cap: 1 TiB, effectively "use all available
/// space" for the memory-mapped engine, which allocates lazily.
pub const DEFAULT_MAP_SIZE: u64 = 1 << 40;

/// Serialization backend, selected once at store creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Structural binary codec (CBOR). Normalizes tuples to lists and
    /// rejects sets.
    Cbor,
    /// Full object-graph codec. Preserves every value exactly.
    Native,
}

impl Backend {
    /// Returns the name this backend is persisted under.
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Cbor => "cbor",
            Backend::Native => "native",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "cbor" => Ok(Backend::Cbor),
            "native" => Ok(Backend::Native),
            other => Err(StoreError::validation(format!(
                "serialization backend must be \"cbor\" or \"native\", not {other:?}"
            ))),
        }
    }
}

/// The persisted, immutable-after-creation settings of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Serialization backend for keys and values.
    pub serial: Backend,
    /// Whether packed values (never keys) are compressed.
    pub compress: bool,
    /// Maximum number of concurrent reader processes.
    pub max_readers: u32,
    /// Number of mutations after which an implicit sync triggers.
    pub buffer_size: u64,
    /// Maximum bytes the storage map may grow to.
    pub map_size: u64,
}

impl StoreConfig {
    /// Checks the numeric fields. Zero is invalid for all of them.
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_readers == 0 {
            return Err(StoreError::validation("max_readers must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(StoreError::validation("buffer_size must be positive"));
        }
        if self.map_size == 0 {
            return Err(StoreError::validation("map_size must be positive"));
        }
        Ok(())
    }
}

/// Options for opening a store.
///
/// Everything except `reset` only matters the first time a store path is
/// initialized; reopening an existing store loads its persisted
/// [`StoreConfig`] instead.
///
/// # Example
///
/// ```rust,ignore
/// use diskdict_core::{Backend, Store, StoreOptions};
///
/// let options = StoreOptions::new()
///     .reset(true)
///     .serial(Backend::Native)
///     .compress(true)
///     .buffer_size(1_000);
///
/// let store = Store::open_with("my_data", options)?;
/// ```
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Whether to delete anything at the path before (re)creation.
    pub reset: bool,
    /// Serialization backend for new stores.
    pub serial: Backend,
    /// Whether to compress packed values in new stores.
    pub compress: bool,
    /// Maximum concurrent reader processes for new stores.
    pub max_readers: u32,
    /// Buffered-sync threshold for new stores.
    pub buffer_size: u64,
    /// Storage size cap in bytes for new stores.
    pub map_size: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reset: false,
            serial: Backend::Cbor,
            compress: false,
            max_readers: DEFAULT_MAX_READERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to delete anything at the path before creation.
    #[must_use]
    pub const fn reset(mut self, value: bool) -> Self {
        self.reset = value;
        self
    }

    /// Sets the serialization backend.
    #[must_use]
    pub const fn serial(mut self, value: Backend) -> Self {
        self.serial = value;
        self
    }

    /// Sets whether to compress packed values.
    #[must_use]
    pub const fn compress(mut self, value: bool) -> Self {
        self.compress = value;
        self
    }

    /// Sets the maximum number of concurrent reader processes.
    #[must_use]
    pub const fn max_readers(mut self, value: u32) -> Self {
        self.max_readers = value;
        self
    }

    /// Sets the buffered-sync threshold.
    #[must_use]
    pub const fn buffer_size(mut self, value: u64) -> Self {
        self.buffer_size = value;
        self
    }

    /// Sets the storage size cap in bytes.
    #[must_use]
    pub const fn map_size(mut self, value: u64) -> Self {
        self.map_size = value;
        self
    }

    /// Builds the configuration record these options describe.
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            serial: self.serial,
            compress: self.compress,
            max_readers: self.max_readers,
            buffer_size: self.buffer_size,
            map_size: self.map_size,
        }
    }
}
