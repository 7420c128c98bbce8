//! # diskdict core
//!
//! A persistent, process-shareable key-value store with a map-like
//! API. Data lives in a memory-mapped LMDB environment inside a
//! `<name>.diskdict` directory; keys and values are dynamic
//! [`Value`]s packed by a serialization backend that is fixed when the
//! store is first created.
//!
//! Durability is buffered: mutations commit immediately but are
//! flushed to disk in batches of `buffer_size`, on an explicit
//! [`Store::sync`], or when the store closes. One process writes while
//! up to `max_readers` processes read concurrently; the engine's own
//! locking arbitrates access, so a handle never blocks itself.
//!
//! ## Usage
//!
//! ```no_run
//! use diskdict_core::{Store, StoreResult, Value};
//!
//! fn main() -> StoreResult<()> {
//!     let store = Store::open("./cache")?;
//!     store.set(&Value::from("answer"), &Value::from(42i64))?;
//!     assert_eq!(store.get(&Value::from("answer"))?, Value::from(42i64));
//!     Ok(())
//! }
//! ```
//!
//! A handle is deliberately single-threaded: it keeps its buffered
//! write counter in a [`std::cell::Cell`] and holds no locks, so
//! sharing one across threads requires external synchronization.

#![warn(missing_docs)]

mod codec;
pub mod config;
mod dir;
mod error;
pub mod iter;
mod store;

pub use config::{Backend, StoreConfig, StoreOptions};
pub use dir::{normalize_path, STORE_SUFFIX};
pub use error::{StoreError, StoreResult};
pub use iter::{ContainsMany, GetMany, Iter, Keys, PopMany, Values};
pub use store::Store;

pub use diskdict_codec::{CodecError, Value};
