//! The store handle.
//!
//! A [`Store`] is a persistent, on-disk map from [`Value`] keys to
//! [`Value`] values, backed by a memory-mapped LMDB environment inside
//! a `<name>.diskdict` directory. One process writes, up to
//! `max_readers` processes read concurrently; the engine's own
//! advisory locking arbitrates between them, so the handle itself
//! carries no locks.
//!
//! Durability is buffered: each element-level mutation bumps a pending
//! counter and the data file is flushed to disk once the counter
//! reaches `buffer_size`, on an explicit [`Store::sync`], or on
//! [`Store::close`]. Between flushes, committed writes live in the OS
//! page cache.
//!
//! The handle has three lifecycle states. It starts alive; `close`
//! flushes and releases the engine; `destroy` additionally deletes the
//! store directory. Both are terminal and idempotent, reporting whether
//! they transitioned the handle. Every other operation on a closed or
//! destroyed handle fails with [`StoreError::Lifecycle`].

use crate::codec::Codec;
use crate::config::{StoreConfig, StoreOptions};
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::iter::{ContainsMany, GetMany, Iter, Keys, PopMany, Values};
use diskdict_codec::Value;
use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};
use std::cell::Cell;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// A persistent key-value store handle.
pub struct Store {
    dir: StoreDir,
    config: StoreConfig,
    codec: Codec,
    env: Option<Env>,
    db: Database<Bytes, Bytes>,
    pending: Cell<u64>,
}

impl Store {
    /// Opens (or creates) a store at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Opens (or creates) a store at `path` with the given options.
    ///
    /// If the path already holds a store, its persisted configuration
    /// wins and the option fields other than `reset` are ignored.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let dir = StoreDir::open(path.as_ref(), options.reset)?;

        let config = if dir.has_config() {
            dir.load_config()?
        } else {
            let config = options.config();
            config.validate()?;
            dir.save_config(&config)?;
            config
        };
        let codec = Codec::new(&config);

        let map_size = usize::try_from(config.map_size).map_err(|_| {
            StoreError::validation(format!(
                "map_size {} exceeds addressable memory",
                config.map_size
            ))
        })?;

        #[allow(unsafe_code)]
        // The mmap the environment hands out is only unsound if the
        // data file is mutated behind LMDB's back; nothing else touches
        // the files inside the store directory. WRITE_MAP and MAP_ASYNC
        // defer fsync to force_sync, which is what makes the buffered
        // durability counter meaningful: without them the engine
        // flushes on every commit.
        let env = unsafe {
            let mut options = EnvOpenOptions::new();
            options
                .map_size(map_size)
                .max_readers(config.max_readers)
                .flags(EnvFlags::WRITE_MAP | EnvFlags::MAP_ASYNC);
            options.open(dir.path())
        }
        .map_err(|e| StoreError::engine(config.map_size, e))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::engine(config.map_size, e))?;
        let db = env
            .create_database::<Bytes, Bytes>(&mut wtxn, None)
            .map_err(|e| StoreError::engine(config.map_size, e))?;
        wtxn.commit()
            .map_err(|e| StoreError::engine(config.map_size, e))?;

        debug!(
            "opened store at {} (serial={}, compress={})",
            dir.path().display(),
            config.serial,
            config.compress
        );

        Ok(Self {
            dir,
            config,
            codec,
            env: Some(env),
            db,
            pending: Cell::new(0),
        })
    }

    /// Returns the engine handle, or the lifecycle error for a closed
    /// store.
    fn env(&self) -> StoreResult<&Env> {
        self.env
            .as_ref()
            .ok_or_else(|| StoreError::lifecycle(self.dir.path()))
    }

    fn engine_err(&self, error: heed::Error) -> StoreError {
        StoreError::engine(self.config.map_size, error)
    }

    /// Records `count` committed mutations and flushes once the
    /// pending counter reaches the configured threshold.
    fn note_write(&self, count: u64) -> StoreResult<()> {
        self.pending.set(self.pending.get() + count);
        if self.pending.get() >= self.config.buffer_size {
            self.env()?.force_sync().map_err(|e| self.engine_err(e))?;
            self.pending.set(0);
            debug!(
                "implicit sync flushed buffered writes at {}",
                self.dir.path().display()
            );
        }
        Ok(())
    }

    /// Stores a key-value pair, replacing any existing value.
    pub fn set(&self, key: &Value, value: &Value) -> StoreResult<()> {
        let env = self.env()?;
        let packed_key = self.codec.pack_key(key)?;
        let packed_value = self.codec.pack_value(value)?;

        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        self.db
            .put(&mut wtxn, &packed_key, &packed_value)
            .map_err(|e| self.engine_err(e))?;
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(1)
    }

    /// Stores a batch of pairs inside a single transaction.
    ///
    /// The first failing pair aborts the whole batch; nothing persists.
    pub fn set_many<I>(&self, pairs: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        let env = self.env()?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        let mut count = 0u64;
        for (key, value) in pairs {
            let packed_key = self.codec.pack_key(&key)?;
            let packed_value = self.codec.pack_value(&value)?;
            self.db
                .put(&mut wtxn, &packed_key, &packed_value)
                .map_err(|e| self.engine_err(e))?;
            count += 1;
        }
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(count)
    }

    /// Returns the value stored under `key`, failing if it is absent.
    pub fn get(&self, key: &Value) -> StoreResult<Value> {
        let env = self.env()?;
        let packed = self.codec.pack_key(key)?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        match self.db.get(&rtxn, &packed).map_err(|e| self.engine_err(e))? {
            Some(bytes) => self.codec.unpack_value(bytes),
            None => Err(StoreError::not_found(key)),
        }
    }

    /// Returns the value stored under `key`, or `default` if absent.
    pub fn get_or(&self, key: &Value, default: Value) -> StoreResult<Value> {
        match self.get(key) {
            Err(StoreError::NotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Looks up a batch of keys lazily under one read transaction,
    /// yielding values in input order.
    ///
    /// With a `default`, absent keys yield a clone of it; without one
    /// the first absent key fails the cursor.
    pub fn get_many(&self, keys: Vec<Value>, default: Option<Value>) -> StoreResult<GetMany<'_>> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        Ok(GetMany::new(rtxn, self.db, self.codec, keys, default))
    }

    /// Tests whether `key` is present without deserializing its value.
    pub fn contains_key(&self, key: &Value) -> StoreResult<bool> {
        let env = self.env()?;
        let packed = self.codec.pack_key(key)?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        let hit = self.db.get(&rtxn, &packed).map_err(|e| self.engine_err(e))?;
        Ok(hit.is_some())
    }

    /// Tests a batch of keys lazily under one read transaction.
    pub fn contains_many(&self, keys: Vec<Value>) -> StoreResult<ContainsMany<'_>> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        Ok(ContainsMany::new(rtxn, self.db, self.codec, keys))
    }

    /// Deletes `key` if present. An absent key is not an error.
    pub fn remove(&self, key: &Value) -> StoreResult<()> {
        let env = self.env()?;
        let packed = self.codec.pack_key(key)?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        self.db
            .delete(&mut wtxn, &packed)
            .map_err(|e| self.engine_err(e))?;
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(1)
    }

    /// Deletes a batch of keys inside a single transaction, tolerating
    /// absent keys individually.
    pub fn remove_many<I>(&self, keys: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let env = self.env()?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        let mut count = 0u64;
        for key in keys {
            let packed = self.codec.pack_key(&key)?;
            self.db
                .delete(&mut wtxn, &packed)
                .map_err(|e| self.engine_err(e))?;
            count += 1;
        }
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(count)
    }

    /// Deletes `key` and returns its former value, failing if absent.
    pub fn pop(&self, key: &Value) -> StoreResult<Value> {
        let env = self.env()?;
        let packed = self.codec.pack_key(key)?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        let value = match self.db.get(&wtxn, &packed).map_err(|e| self.engine_err(e))? {
            Some(bytes) => self.codec.unpack_value(bytes)?,
            None => return Err(StoreError::not_found(key)),
        };
        self.db
            .delete(&mut wtxn, &packed)
            .map_err(|e| self.engine_err(e))?;
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(1)?;
        Ok(value)
    }

    /// Deletes `key` and returns its former value, or `default` if
    /// absent.
    pub fn pop_or(&self, key: &Value, default: Value) -> StoreResult<Value> {
        match self.pop(key) {
            Err(StoreError::NotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Deletes a batch of keys lazily, yielding former values in input
    /// order.
    ///
    /// The cursor holds one write transaction. The first absent key
    /// fails the cursor, but deletions performed before the failure are
    /// committed anyway; the batch is deliberately not atomic.
    pub fn pop_many(&self, keys: Vec<Value>) -> StoreResult<PopMany<'_>> {
        let env = self.env()?;
        let wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        Ok(PopMany::new(
            wtxn,
            self.db,
            self.codec,
            env,
            keys,
            &self.pending,
            self.config.buffer_size,
            self.config.map_size,
        ))
    }

    /// Removes and returns the first pair in the engine's key order.
    /// An empty store fails with [`StoreError::Empty`].
    pub fn pop_item(&self) -> StoreResult<(Value, Value)> {
        let env = self.env()?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        let (raw, key, value) = match self.db.first(&wtxn).map_err(|e| self.engine_err(e))? {
            Some((k, v)) => (
                k.to_vec(),
                self.codec.unpack_key(k)?,
                self.codec.unpack_value(v)?,
            ),
            None => return Err(StoreError::Empty),
        };
        self.db
            .delete(&mut wtxn, &raw)
            .map_err(|e| self.engine_err(e))?;
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(1)?;
        Ok((key, value))
    }

    /// Removes and returns up to `count` pairs in the engine's key
    /// order.
    ///
    /// Asking for more pairs than the store holds pops everything
    /// without an error. Candidates are collected fully before any
    /// deletion so the scan never walks a mutating tree.
    pub fn pop_items(&self, count: usize) -> StoreResult<Vec<(Value, Value)>> {
        let env = self.env()?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;

        let mut taken: Vec<(Vec<u8>, Value, Value)> = Vec::new();
        let mut last: Option<Vec<u8>> = None;
        while taken.len() < count {
            let entry = match &last {
                None => self.db.first(&wtxn),
                Some(l) => self.db.get_greater_than(&wtxn, l),
            }
            .map_err(|e| self.engine_err(e))?;
            let Some((k, v)) = entry else {
                break;
            };
            let raw = k.to_vec();
            let key = self.codec.unpack_key(k)?;
            let value = self.codec.unpack_value(v)?;
            last = Some(raw.clone());
            taken.push((raw, key, value));
        }

        for (raw, _, _) in &taken {
            self.db
                .delete(&mut wtxn, raw)
                .map_err(|e| self.engine_err(e))?;
        }
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        self.note_write(taken.len() as u64)?;

        Ok(taken.into_iter().map(|(_, k, v)| (k, v)).collect())
    }

    /// Iterates over all pairs lazily under one read transaction.
    ///
    /// The iterator is single-pass; the transaction is released when it
    /// is exhausted or dropped.
    pub fn iter(&self) -> StoreResult<Iter<'_>> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        Ok(Iter::new(rtxn, self.db, self.codec))
    }

    /// Iterates over all keys lazily under one read transaction.
    pub fn keys(&self) -> StoreResult<Keys<'_>> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        Ok(Keys::new(rtxn, self.db, self.codec))
    }

    /// Iterates over all values lazily under one read transaction.
    pub fn values(&self) -> StoreResult<Values<'_>> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        Ok(Values::new(rtxn, self.db, self.codec))
    }

    /// Deletes every entry. The store directory and configuration stay.
    pub fn clear(&self) -> StoreResult<()> {
        let env = self.env()?;
        let mut wtxn = env.write_txn().map_err(|e| self.engine_err(e))?;
        self.db.clear(&mut wtxn).map_err(|e| self.engine_err(e))?;
        wtxn.commit().map_err(|e| self.engine_err(e))?;
        // Pending writes covered entries that no longer exist.
        self.pending.set(0);
        Ok(())
    }

    /// Returns the number of stored pairs from the engine's entry
    /// statistic, without scanning.
    pub fn len(&self) -> StoreResult<u64> {
        let env = self.env()?;
        let rtxn = env.read_txn().map_err(|e| self.engine_err(e))?;
        self.db.len(&rtxn).map_err(|e| self.engine_err(e))
    }

    /// Checks whether the store holds zero pairs.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flushes buffered writes to disk and resets the pending counter.
    pub fn sync(&self) -> StoreResult<()> {
        self.env()?.force_sync().map_err(|e| self.engine_err(e))?;
        self.pending.set(0);
        debug!("explicit sync at {}", self.dir.path().display());
        Ok(())
    }

    /// Flushes and releases the engine.
    ///
    /// Returns `Ok(true)` when this call performed the close and
    /// `Ok(false)` when the handle was already closed or destroyed.
    pub fn close(&mut self) -> StoreResult<bool> {
        let Some(env) = self.env.take() else {
            return Ok(false);
        };
        if self.pending.get() > 0 {
            env.force_sync()
                .map_err(|e| StoreError::engine(self.config.map_size, e))?;
            self.pending.set(0);
        }
        drop(env);
        debug!("closed store at {}", self.dir.path().display());
        Ok(true)
    }

    /// Deletes every entry, releases the engine, and removes the store
    /// directory tree.
    ///
    /// Returns `Ok(true)` when this call performed the destruction and
    /// `Ok(false)` when the handle was already closed or destroyed.
    pub fn destroy(&mut self) -> StoreResult<bool> {
        let Some(env) = self.env.take() else {
            return Ok(false);
        };
        let mut wtxn = env
            .write_txn()
            .map_err(|e| StoreError::engine(self.config.map_size, e))?;
        self.db
            .clear(&mut wtxn)
            .map_err(|e| StoreError::engine(self.config.map_size, e))?;
        wtxn.commit()
            .map_err(|e| StoreError::engine(self.config.map_size, e))?;
        drop(env);
        self.pending.set(0);
        self.dir.remove()?;
        debug!("destroyed store at {}", self.dir.path().display());
        Ok(true)
    }

    /// Returns the normalized store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the store's persisted configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the number of mutations committed since the last flush.
    #[must_use]
    pub fn pending_writes(&self) -> u64 {
        self.pending.get()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.dir.path())
            .field("serial", &self.config.serial)
            .field("compress", &self.config.compress)
            .field("alive", &self.env.is_some())
            .finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.env.is_some() {
            if let Err(e) = self.close() {
                warn!(
                    "close on drop failed for {}: {e}",
                    self.dir.path().display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use tempfile::{tempdir, TempDir};

    fn open_store(options: StoreOptions) -> (TempDir, Store) {
        let temp = tempdir().unwrap();
        let store = Store::open_with(temp.path().join("store"), options).unwrap();
        (temp, store)
    }

    fn default_store() -> (TempDir, Store) {
        open_store(StoreOptions::default())
    }

    fn key(n: i64) -> Value {
        Value::list(vec![Value::Str("key".to_string()), Value::Int(n)])
    }

    fn val(n: i64) -> Value {
        Value::Int(n * 10)
    }

    #[test]
    fn set_get_round_trip() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();
        assert_eq!(store.get(&key(1)).unwrap(), val(1));

        // Upsert replaces.
        store.set(&key(1), &Value::Str("new".to_string())).unwrap();
        assert_eq!(store.get(&key(1)).unwrap(), Value::Str("new".to_string()));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn strict_get_vs_default() {
        let (_temp, store) = default_store();
        assert!(matches!(
            store.get(&key(9)),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.get_or(&key(9), val(0)).unwrap(), val(0));
    }

    #[test]
    fn null_rejected_as_key_and_value() {
        let (_temp, store) = default_store();
        assert!(matches!(
            store.set(&Value::Null, &val(1)),
            Err(StoreError::NullNotAllowed { slot: "key" })
        ));
        assert!(matches!(
            store.set(&key(1), &Value::Null),
            Err(StoreError::NullNotAllowed { slot: "value" })
        ));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn contains_and_remove_idempotent() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();
        assert!(store.contains_key(&key(1)).unwrap());
        assert!(!store.contains_key(&key(2)).unwrap());

        store.remove(&key(1)).unwrap();
        assert!(!store.contains_key(&key(1)).unwrap());
        // Removing an absent key is fine.
        store.remove(&key(1)).unwrap();
        store.remove(&key(2)).unwrap();
    }

    #[test]
    fn pop_is_strict() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();

        assert_eq!(store.pop(&key(1)).unwrap(), val(1));
        assert!(matches!(
            store.pop(&key(1)),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.pop_or(&key(1), val(7)).unwrap(), val(7));
    }

    #[test]
    fn set_many_and_get_many() {
        let (_temp, store) = default_store();
        store
            .set_many((0..5).map(|n| (key(n), val(n))))
            .unwrap();
        assert_eq!(store.len().unwrap(), 5);

        let got: Vec<Value> = store
            .get_many(vec![key(3), key(0), key(4)], None)
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(got, vec![val(3), val(0), val(4)]);
    }

    #[test]
    fn get_many_default_and_strict() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();

        let got: Vec<Value> = store
            .get_many(vec![key(1), key(9)], Some(Value::Null))
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(got, vec![val(1), Value::Null]);

        let mut strict = store.get_many(vec![key(1), key(9), key(1)], None).unwrap();
        assert_eq!(strict.next().unwrap().unwrap(), val(1));
        assert!(matches!(
            strict.next().unwrap(),
            Err(StoreError::NotFound { .. })
        ));
        // Cursor stops after the failure.
        assert!(strict.next().is_none());
    }

    #[test]
    fn set_many_aborts_whole_batch() {
        let (_temp, store) = open_store(StoreOptions::new().serial(Backend::Cbor));
        let poison = Value::set(vec![Value::Int(1)]);
        let result = store.set_many(vec![
            (key(1), val(1)),
            (key(2), poison),
            (key(3), val(3)),
        ]);
        assert!(matches!(result, Err(StoreError::Serialization { .. })));
        // Nothing before the failure persisted either.
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn contains_many_in_order() {
        let (_temp, store) = default_store();
        store.set(&key(2), &val(2)).unwrap();

        let hits: Vec<bool> = store
            .contains_many(vec![key(1), key(2), key(3)])
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(hits, vec![false, true, false]);
    }

    #[test]
    fn remove_many_tolerates_absent() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();
        store.set(&key(2), &val(2)).unwrap();

        store.remove_many(vec![key(1), key(9), key(2)]).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn pop_many_commits_prefix_on_failure() {
        let (_temp, store) = default_store();
        store
            .set_many((0..4).map(|n| (key(n), val(n))))
            .unwrap();

        let mut popped = store.pop_many(vec![key(0), key(1), key(9), key(3)]).unwrap();
        assert_eq!(popped.next().unwrap().unwrap(), val(0));
        assert_eq!(popped.next().unwrap().unwrap(), val(1));
        assert!(matches!(
            popped.next().unwrap(),
            Err(StoreError::NotFound { .. })
        ));
        assert!(popped.next().is_none());
        drop(popped);

        // The prefix stayed deleted, the tail stayed present.
        assert!(!store.contains_key(&key(0)).unwrap());
        assert!(!store.contains_key(&key(1)).unwrap());
        assert!(store.contains_key(&key(3)).unwrap());
    }

    #[test]
    fn pop_many_early_drop_commits() {
        let (_temp, store) = default_store();
        store.set(&key(1), &val(1)).unwrap();
        store.set(&key(2), &val(2)).unwrap();

        let mut popped = store.pop_many(vec![key(1), key(2)]).unwrap();
        assert_eq!(popped.next().unwrap().unwrap(), val(1));
        drop(popped);

        assert!(!store.contains_key(&key(1)).unwrap());
        assert!(store.contains_key(&key(2)).unwrap());
    }

    #[test]
    fn pop_item_and_empty() {
        let (_temp, store) = default_store();
        assert!(matches!(store.pop_item(), Err(StoreError::Empty)));

        store.set(&key(1), &val(1)).unwrap();
        let (k, v) = store.pop_item().unwrap();
        assert_eq!(k, key(1));
        assert_eq!(v, val(1));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn pop_items_clamps() {
        let (_temp, store) = default_store();
        store
            .set_many((0..3).map(|n| (key(n), val(n))))
            .unwrap();

        // Over-request pops everything without an error.
        let items = store.pop_items(10).unwrap();
        assert_eq!(items.len(), 3);
        assert!(store.is_empty().unwrap());
        for (k, v) in items {
            assert_eq!(store.contains_key(&k).unwrap(), false);
            assert!(matches!(v, Value::Int(_)));
        }

        // Empty store yields an empty batch.
        assert!(store.pop_items(5).unwrap().is_empty());
    }

    #[test]
    fn iteration_covers_all_entries() {
        let (_temp, store) = default_store();
        store
            .set_many((0..4).map(|n| (key(n), val(n))))
            .unwrap();

        let pairs: Vec<(Value, Value)> = store
            .iter()
            .unwrap()
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(pairs.len(), 4);
        for (k, v) in &pairs {
            assert_eq!(&store.get(k).unwrap(), v);
        }

        let keys: Vec<Value> = store.keys().unwrap().collect::<StoreResult<_>>().unwrap();
        let values: Vec<Value> = store.values().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(keys.len(), 4);
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn iterator_early_drop_releases_store() {
        let (_temp, store) = default_store();
        store
            .set_many((0..10).map(|n| (key(n), val(n))))
            .unwrap();

        let mut iter = store.iter().unwrap();
        assert!(iter.next().is_some());
        drop(iter);

        // The store is immediately writable again.
        store.set(&key(100), &val(100)).unwrap();
        assert_eq!(store.len().unwrap(), 11);
    }

    #[test]
    fn clear_keeps_store_usable() {
        let (_temp, store) = default_store();
        store
            .set_many((0..5).map(|n| (key(n), val(n))))
            .unwrap();

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.pending_writes(), 0);

        store.set(&key(1), &val(1)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn pending_counter_and_implicit_sync() {
        let (_temp, store) = open_store(StoreOptions::new().buffer_size(100));
        for n in 0..250 {
            store.set(&key(n), &val(n)).unwrap();
        }
        // Two implicit flushes fired at 100 and 200 mutations.
        assert_eq!(store.pending_writes(), 50);

        store.sync().unwrap();
        assert_eq!(store.pending_writes(), 0);
    }

    #[test]
    fn batch_mutations_count_toward_sync() {
        let (_temp, store) = open_store(StoreOptions::new().buffer_size(10));
        store
            .set_many((0..7).map(|n| (key(n), val(n))))
            .unwrap();
        assert_eq!(store.pending_writes(), 7);

        // Crossing the threshold resets the counter.
        store
            .set_many((7..12).map(|n| (key(n), val(n))))
            .unwrap();
        assert_eq!(store.pending_writes(), 0);
    }

    #[test]
    fn capacity_error_when_map_fills() {
        let (_temp, store) = open_store(StoreOptions::new().map_size(256 * 1024));
        let blob = Value::Bytes(vec![0x5a; 1024]);
        let mut capped = false;
        for n in 0..1024 {
            match store.set(&key(n), &blob) {
                Ok(()) => {}
                Err(StoreError::Capacity { map_size }) => {
                    assert_eq!(map_size, 256 * 1024);
                    capped = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(capped);
    }

    #[test]
    fn debug_reports_lifecycle() {
        let (_temp, mut store) = default_store();
        assert!(format!("{store:?}").contains("alive: true"));
        store.close().unwrap();
        assert!(format!("{store:?}").contains("alive: false"));
    }
}
