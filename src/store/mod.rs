//! Embedded transactional key-value environment.
//!
//! Named stores hold byte keys in sorted order, with duplicate keys allowed
//! and duplicates kept sorted by value. Readers open an immutable snapshot;
//! writers are serialized by a single environment-wide lock and publish
//! their changes atomically on commit. Keys use big-endian encodings so
//! byte order matches numeric order.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Result, TesseraError};

/// Sorted dup-key store contents. Each key maps to its sorted duplicates.
type DupMap = BTreeMap<Vec<u8>, Vec<Vec<u8>>>;

/// A collection of named stores with snapshot-isolated readers and a
/// single writer.
#[derive(Default)]
pub struct Environment {
    stores: RwLock<HashMap<String, Arc<DupMap>>>,
    write_lock: Mutex<()>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a read transaction. The snapshot observes all commits that
    /// completed before this call and none that complete after.
    pub fn begin_read(&self) -> ReadTransaction {
        ReadTransaction {
            snapshot: self.stores.read().clone(),
        }
    }

    /// Open a write transaction. Blocks until any other writer finishes.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let guard = self.write_lock.lock();
        WriteTransaction {
            env: self,
            _guard: guard,
            working: HashMap::new(),
        }
    }
}

/// An immutable snapshot of the environment. Cloning is cheap and yields
/// a handle onto the same snapshot.
#[derive(Clone)]
pub struct ReadTransaction {
    snapshot: HashMap<String, Arc<DupMap>>,
}

impl ReadTransaction {
    /// Open a store within this snapshot.
    pub fn open_store(&self, name: &str) -> Result<StoreSnapshot> {
        self.snapshot
            .get(name)
            .map(|data| StoreSnapshot {
                data: Arc::clone(data),
            })
            .ok_or_else(|| TesseraError::StoreNotFound(name.to_string()))
    }

    /// True if the store exists in this snapshot.
    pub fn store_exists(&self, name: &str) -> bool {
        self.snapshot.contains_key(name)
    }
}

/// A single store within a read snapshot.
pub struct StoreSnapshot {
    data: Arc<DupMap>,
}

impl StoreSnapshot {
    /// Total number of entries, counting every duplicate.
    pub fn count(&self) -> u64 {
        self.data.values().map(|dups| dups.len() as u64).sum()
    }

    /// First duplicate stored under `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data
            .get(key)
            .and_then(|dups| dups.first())
            .map(|v| v.as_slice())
    }

    /// Open a cursor over this store. The cursor shares the snapshot, so
    /// it remains valid for as long as it is held.
    pub fn open_cursor(&self) -> StoreCursor {
        StoreCursor {
            data: Arc::clone(&self.data),
            position: None,
        }
    }
}

/// A positioned cursor over a store snapshot. Not positioned until the
/// first seek or `first()` call.
pub struct StoreCursor {
    data: Arc<DupMap>,
    position: Option<(Vec<u8>, usize)>,
}

impl StoreCursor {
    /// Position on the first entry of the store. Returns false if the
    /// store is empty.
    pub fn first(&mut self) -> bool {
        match self.data.keys().next() {
            Some(key) => {
                self.position = Some((key.clone(), 0));
                true
            }
            None => {
                self.position = None;
                false
            }
        }
    }

    /// Advance to the next entry, crossing key boundaries. Returns false
    /// once exhausted.
    pub fn next(&mut self) -> bool {
        let Some((key, dup)) = self.position.take() else {
            return self.first();
        };
        let dups = match self.data.get(&key) {
            Some(dups) => dups,
            None => return false,
        };
        if dup + 1 < dups.len() {
            self.position = Some((key, dup + 1));
            return true;
        }
        use std::ops::Bound;
        match self
            .data
            .range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
            .next()
        {
            Some((next_key, _)) => {
                self.position = Some((next_key.clone(), 0));
                true
            }
            None => false,
        }
    }

    /// Advance to the next duplicate of the current key only. Returns
    /// false when the current key has no further duplicates.
    pub fn next_dup(&mut self) -> bool {
        let Some((key, dup)) = self.position.as_mut() else {
            return false;
        };
        match self.data.get(key.as_slice()) {
            Some(dups) if *dup + 1 < dups.len() => {
                *dup += 1;
                true
            }
            _ => false,
        }
    }

    /// Position on the first duplicate of `key`. Returns false if the key
    /// is absent, leaving the cursor unpositioned.
    pub fn search_key(&mut self, key: &[u8]) -> bool {
        if self.data.contains_key(key) {
            self.position = Some((key.to_vec(), 0));
            true
        } else {
            self.position = None;
            false
        }
    }

    /// Key at the current position.
    pub fn key(&self) -> Option<&[u8]> {
        self.position.as_ref().map(|(key, _)| key.as_slice())
    }

    /// Value at the current position.
    pub fn value(&self) -> Option<&[u8]> {
        let (key, dup) = self.position.as_ref()?;
        self.data.get(key.as_slice())?.get(*dup).map(|v| v.as_slice())
    }
}

/// A write transaction. Changes stay private to the transaction until
/// `commit()` publishes them atomically; dropping without committing
/// discards everything.
pub struct WriteTransaction<'env> {
    env: &'env Environment,
    _guard: MutexGuard<'env, ()>,
    working: HashMap<String, DupMap>,
}

impl<'env> WriteTransaction<'env> {
    /// Create the store if it does not exist yet.
    pub fn create_store(&mut self, name: &str) {
        self.touch(name);
    }

    /// Remove every entry from the store.
    pub fn truncate_store(&mut self, name: &str) -> Result<()> {
        self.require(name)?;
        self.touch(name).clear();
        Ok(())
    }

    /// Insert a `(key, value)` pair, keeping duplicates sorted by value.
    /// Inserting an already-present duplicate is a no-op.
    pub fn put(&mut self, store: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.require(store)?;
        let dups = self.touch(store).entry(key.to_vec()).or_default();
        match dups.binary_search_by(|v| v.as_slice().cmp(value)) {
            Ok(_) => {}
            Err(pos) => dups.insert(pos, value.to_vec()),
        }
        Ok(())
    }

    /// Replace all duplicates of `key` with the single `value`.
    pub fn replace(&mut self, store: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.require(store)?;
        self.touch(store).insert(key.to_vec(), vec![value.to_vec()]);
        Ok(())
    }

    /// Open a mutating cursor over the store.
    pub fn open_cursor(&mut self, store: &str) -> Result<WriteCursor<'_>> {
        self.require(store)?;
        let map = self.touch(store);
        Ok(WriteCursor {
            map,
            position: None,
        })
    }

    /// Total number of entries in the store, counting duplicates, as seen
    /// by this transaction.
    pub fn count(&self, store: &str) -> Result<u64> {
        if let Some(map) = self.working.get(store) {
            return Ok(map.values().map(|dups| dups.len() as u64).sum());
        }
        let stores = self.env.stores.read();
        stores
            .get(store)
            .map(|map| map.values().map(|dups| dups.len() as u64).sum())
            .ok_or_else(|| TesseraError::StoreNotFound(store.to_string()))
    }

    /// Publish all changes atomically.
    pub fn commit(self) {
        let mut stores = self.env.stores.write();
        for (name, map) in self.working {
            stores.insert(name, Arc::new(map));
        }
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.working.contains_key(name) || self.env.stores.read().contains_key(name) {
            Ok(())
        } else {
            Err(TesseraError::StoreNotFound(name.to_string()))
        }
    }

    /// Copy-on-touch: the first mutation of a store clones its published
    /// contents into the transaction.
    fn touch(&mut self, name: &str) -> &mut DupMap {
        let env = self.env;
        self.working.entry(name.to_string()).or_insert_with(|| {
            env.stores
                .read()
                .get(name)
                .map(|arc| (**arc).clone())
                .unwrap_or_default()
        })
    }
}

/// A positioned cursor over a store inside a write transaction. Supports
/// exact-duplicate seeks and deletion at the current position.
pub struct WriteCursor<'a> {
    map: &'a mut DupMap,
    position: Option<(Vec<u8>, usize)>,
}

impl<'a> WriteCursor<'a> {
    /// Position on the exact `(key, value)` duplicate. Returns false when
    /// that duplicate is absent, leaving the cursor unpositioned.
    pub fn search_both(&mut self, key: &[u8], value: &[u8]) -> bool {
        match self
            .map
            .get(key)
            .and_then(|dups| dups.binary_search_by(|v| v.as_slice().cmp(value)).ok())
        {
            Some(dup) => {
                self.position = Some((key.to_vec(), dup));
                true
            }
            None => {
                self.position = None;
                false
            }
        }
    }

    /// Delete the entry at the current position. Returns false when the
    /// cursor is not positioned.
    pub fn delete_current(&mut self) -> bool {
        let Some((key, dup)) = self.position.take() else {
            return false;
        };
        let Some(dups) = self.map.get_mut(&key) else {
            return false;
        };
        if dup >= dups.len() {
            return false;
        }
        dups.remove(dup);
        if dups.is_empty() {
            self.map.remove(&key);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_env() -> Environment {
        let env = Environment::new();
        let mut tx = env.begin_write();
        tx.create_store("s");
        tx.put("s", b"b", b"2").unwrap();
        tx.put("s", b"a", b"1").unwrap();
        tx.put("s", b"a", b"0").unwrap();
        tx.commit();
        env
    }

    #[test]
    fn test_put_keeps_keys_and_dups_sorted() {
        let env = seeded_env();
        let tx = env.begin_read();
        let store = tx.open_store("s").unwrap();
        let mut cursor = store.open_cursor();

        assert!(cursor.first());
        assert_eq!(cursor.key(), Some(&b"a"[..]));
        assert_eq!(cursor.value(), Some(&b"0"[..]));
        assert!(cursor.next());
        assert_eq!(cursor.value(), Some(&b"1"[..]));
        assert!(cursor.next());
        assert_eq!(cursor.key(), Some(&b"b"[..]));
        assert!(!cursor.next());
    }

    #[test]
    fn test_next_dup_stays_within_key() {
        let env = seeded_env();
        let tx = env.begin_read();
        let store = tx.open_store("s").unwrap();
        let mut cursor = store.open_cursor();

        assert!(cursor.search_key(b"a"));
        assert_eq!(cursor.value(), Some(&b"0"[..]));
        assert!(cursor.next_dup());
        assert_eq!(cursor.value(), Some(&b"1"[..]));
        assert!(!cursor.next_dup());

        assert!(!cursor.search_key(b"z"));
        assert_eq!(cursor.key(), None);
    }

    #[test]
    fn test_snapshot_isolation() {
        let env = seeded_env();
        let reader = env.begin_read();

        let mut tx = env.begin_write();
        tx.put("s", b"c", b"9").unwrap();
        tx.commit();

        // Pre-existing snapshot does not see the commit.
        assert_eq!(reader.open_store("s").unwrap().count(), 3);
        assert_eq!(env.begin_read().open_store("s").unwrap().count(), 4);
    }

    #[test]
    fn test_uncommitted_changes_discarded() {
        let env = seeded_env();
        {
            let mut tx = env.begin_write();
            tx.truncate_store("s").unwrap();
            // Dropped without commit.
        }
        assert_eq!(env.begin_read().open_store("s").unwrap().count(), 3);
    }

    #[test]
    fn test_search_both_and_delete_current() {
        let env = seeded_env();
        let mut tx = env.begin_write();
        {
            let mut cursor = tx.open_cursor("s").unwrap();
            assert!(!cursor.search_both(b"a", b"7"));
            assert!(!cursor.delete_current());
            assert!(cursor.search_both(b"a", b"1"));
            assert!(cursor.delete_current());
        }
        tx.commit();

        let tx = env.begin_read();
        let store = tx.open_store("s").unwrap();
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(b"a"), Some(&b"0"[..]));
    }

    #[test]
    fn test_missing_store_errors() {
        let env = Environment::new();
        assert!(matches!(
            env.begin_read().open_store("missing"),
            Err(TesseraError::StoreNotFound(_))
        ));
        let mut tx = env.begin_write();
        assert!(matches!(
            tx.put("missing", b"k", b"v"),
            Err(TesseraError::StoreNotFound(_))
        ));
    }
}
