//! Lazy cursors over store contents.
//!
//! Full-store scans hold a read transaction for their whole lifetime
//! and never materialize more than one entry at a time. Rather than
//! pinning an engine cursor, a scan remembers the last raw key it
//! produced and asks the engine for the successor on each step, so the
//! scan struct owns all of its state and the transaction outlives
//! nothing but itself.
//!
//! Batch cursors ([`GetMany`], [`ContainsMany`], [`PopMany`]) walk a
//! caller-supplied key list instead of the whole store. [`PopMany`] is
//! the one write-side cursor: it removes entries as it yields them and
//! commits whatever it removed when it finishes or is dropped early.

use crate::codec::Codec;
use crate::error::{StoreError, StoreResult};
use diskdict_codec::Value;
use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use std::cell::Cell;
use std::vec;
use tracing::warn;

/// Successor-lookup scan over the raw key space.
struct RawScan<'s> {
    txn: RoTxn<'s>,
    db: Database<Bytes, Bytes>,
    last: Option<Vec<u8>>,
    done: bool,
}

impl<'s> RawScan<'s> {
    fn new(txn: RoTxn<'s>, db: Database<Bytes, Bytes>) -> Self {
        Self {
            txn,
            db,
            last: None,
            done: false,
        }
    }

    fn next_raw(&mut self) -> Option<StoreResult<(Vec<u8>, Vec<u8>)>> {
        if self.done {
            return None;
        }
        let lookup = match &self.last {
            None => self.db.first(&self.txn),
            Some(last) => self.db.get_greater_than(&self.txn, last),
        };
        match lookup {
            Ok(Some((key, value))) => {
                let key = key.to_vec();
                let value = value.to_vec();
                self.last = Some(key.clone());
                Some(Ok((key, value)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(StoreError::Engine(e)))
            }
        }
    }
}

/// Lazy iterator over `(key, value)` pairs.
pub struct Iter<'s> {
    scan: RawScan<'s>,
    codec: Codec,
}

impl<'s> Iter<'s> {
    pub(crate) fn new(txn: RoTxn<'s>, db: Database<Bytes, Bytes>, codec: Codec) -> Self {
        Self {
            scan: RawScan::new(txn, db),
            codec,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = StoreResult<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.scan.next_raw()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e)),
        };
        let key = match self.codec.unpack_key(&key) {
            Ok(k) => k,
            Err(e) => {
                self.scan.done = true;
                return Some(Err(e));
            }
        };
        let value = match self.codec.unpack_value(&value) {
            Ok(v) => v,
            Err(e) => {
                self.scan.done = true;
                return Some(Err(e));
            }
        };
        Some(Ok((key, value)))
    }
}

/// Lazy iterator over keys.
pub struct Keys<'s> {
    scan: RawScan<'s>,
    codec: Codec,
}

impl<'s> Keys<'s> {
    pub(crate) fn new(txn: RoTxn<'s>, db: Database<Bytes, Bytes>, codec: Codec) -> Self {
        Self {
            scan: RawScan::new(txn, db),
            codec,
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = StoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, _) = match self.scan.next_raw()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e)),
        };
        match self.codec.unpack_key(&key) {
            Ok(k) => Some(Ok(k)),
            Err(e) => {
                self.scan.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lazy iterator over values.
pub struct Values<'s> {
    scan: RawScan<'s>,
    codec: Codec,
}

impl<'s> Values<'s> {
    pub(crate) fn new(txn: RoTxn<'s>, db: Database<Bytes, Bytes>, codec: Codec) -> Self {
        Self {
            scan: RawScan::new(txn, db),
            codec,
        }
    }
}

impl Iterator for Values<'_> {
    type Item = StoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, value) = match self.scan.next_raw()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e)),
        };
        match self.codec.unpack_value(&value) {
            Ok(v) => Some(Ok(v)),
            Err(e) => {
                self.scan.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lazy batch lookup over a key list.
///
/// With a default, absent keys yield a clone of it; without one they
/// yield [`StoreError::NotFound`] and the cursor stops.
pub struct GetMany<'s> {
    txn: RoTxn<'s>,
    db: Database<Bytes, Bytes>,
    codec: Codec,
    keys: vec::IntoIter<Value>,
    default: Option<Value>,
    done: bool,
}

impl<'s> GetMany<'s> {
    pub(crate) fn new(
        txn: RoTxn<'s>,
        db: Database<Bytes, Bytes>,
        codec: Codec,
        keys: Vec<Value>,
        default: Option<Value>,
    ) -> Self {
        Self {
            txn,
            db,
            codec,
            keys: keys.into_iter(),
            default,
            done: false,
        }
    }

    fn lookup(&self, key: &Value) -> StoreResult<Value> {
        let packed = self.codec.pack_key(key)?;
        match self.db.get(&self.txn, &packed).map_err(StoreError::Engine)? {
            Some(bytes) => self.codec.unpack_value(bytes),
            None => match &self.default {
                Some(default) => Ok(default.clone()),
                None => Err(StoreError::not_found(key)),
            },
        }
    }
}

impl Iterator for GetMany<'_> {
    type Item = StoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = self.keys.next()?;
        let item = self.lookup(&key);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Lazy batch membership test over a key list.
pub struct ContainsMany<'s> {
    txn: RoTxn<'s>,
    db: Database<Bytes, Bytes>,
    codec: Codec,
    keys: vec::IntoIter<Value>,
    done: bool,
}

impl<'s> ContainsMany<'s> {
    pub(crate) fn new(
        txn: RoTxn<'s>,
        db: Database<Bytes, Bytes>,
        codec: Codec,
        keys: Vec<Value>,
    ) -> Self {
        Self {
            txn,
            db,
            codec,
            keys: keys.into_iter(),
            done: false,
        }
    }

    fn check(&self, key: &Value) -> StoreResult<bool> {
        let packed = self.codec.pack_key(key)?;
        let hit = self.db.get(&self.txn, &packed).map_err(StoreError::Engine)?;
        Ok(hit.is_some())
    }
}

impl Iterator for ContainsMany<'_> {
    type Item = StoreResult<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = self.keys.next()?;
        let item = self.check(&key);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

/// Lazy strict removal over a key list.
///
/// Each step deletes one entry and yields its former value inside a
/// single write transaction. The transaction commits when the key list
/// is exhausted, when an error stops the cursor, or when the cursor is
/// dropped early, so removals performed before a failure stay removed.
pub struct PopMany<'s> {
    txn: Option<RwTxn<'s>>,
    db: Database<Bytes, Bytes>,
    codec: Codec,
    env: &'s Env,
    keys: vec::IntoIter<Value>,
    pending: &'s Cell<u64>,
    buffer_size: u64,
    map_size: u64,
    done: bool,
}

impl<'s> PopMany<'s> {
    pub(crate) fn new(
        txn: RwTxn<'s>,
        db: Database<Bytes, Bytes>,
        codec: Codec,
        env: &'s Env,
        keys: Vec<Value>,
        pending: &'s Cell<u64>,
        buffer_size: u64,
        map_size: u64,
    ) -> Self {
        Self {
            txn: Some(txn),
            db,
            codec,
            env,
            keys: keys.into_iter(),
            pending,
            buffer_size,
            map_size,
            done: false,
        }
    }

    fn pop_in(
        db: Database<Bytes, Bytes>,
        codec: Codec,
        pending: &Cell<u64>,
        map_size: u64,
        txn: &mut RwTxn<'_>,
        key: &Value,
    ) -> StoreResult<Value> {
        let packed = codec.pack_key(key)?;
        let value = match db
            .get(txn, &packed)
            .map_err(|e| StoreError::engine(map_size, e))?
        {
            Some(bytes) => codec.unpack_value(bytes)?,
            None => return Err(StoreError::not_found(key)),
        };
        db.delete(txn, &packed)
            .map_err(|e| StoreError::engine(map_size, e))?;
        pending.set(pending.get() + 1);
        Ok(value)
    }

    fn finish(&mut self) -> StoreResult<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };
        txn.commit().map_err(|e| StoreError::engine(self.map_size, e))?;
        if self.pending.get() >= self.buffer_size {
            self.env
                .force_sync()
                .map_err(|e| StoreError::engine(self.map_size, e))?;
            self.pending.set(0);
        }
        Ok(())
    }
}

impl Iterator for PopMany<'_> {
    type Item = StoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(key) = self.keys.next() else {
            self.done = true;
            if let Err(e) = self.finish() {
                return Some(Err(e));
            }
            return None;
        };
        let item = match self.txn.as_mut() {
            Some(txn) => {
                Self::pop_in(self.db, self.codec, self.pending, self.map_size, txn, &key)
            }
            None => {
                self.done = true;
                return None;
            }
        };
        if item.is_err() {
            self.done = true;
            if let Err(e) = self.finish() {
                warn!("commit after failed batch pop failed: {e}");
            }
        }
        Some(item)
    }
}

impl Drop for PopMany<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("commit on dropped batch pop failed: {e}");
        }
    }
}
