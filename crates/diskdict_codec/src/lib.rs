//! # diskdict codec
//!
//! Dynamic value type and serialization backends for diskdict.
//!
//! Two mutually exclusive backends pack a [`Value`] to bytes and back:
//!
//! - [`cbor`]: structural binary codec. Compact, schema-less, and
//!   deterministic, but normalizing: tuples decode as lists and sets are
//!   rejected outright.
//! - [`native`]: full object-graph codec. Round-trips every `Value`
//!   exactly, including unordered sets and the tuple-vs-list
//!   distinction.
//!
//! The store layer picks one backend when a store is first created and
//! records the choice in the persisted configuration, so all data under
//! one path is encoded uniformly.
//!
//! ## Usage
//!
//! ```
//! use diskdict_codec::{cbor, Value};
//!
//! let value = Value::from(42i64);
//! let bytes = cbor::pack(&value).unwrap();
//! assert_eq!(cbor::unpack(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cbor;
mod error;
pub mod native;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::Value;
