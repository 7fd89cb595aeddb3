//! One partition of the field cache, holding values of a single type.
//!
//! The partition is a two-level map: reader id to a per-reader map, then
//! [`Entry`] to the computed value. The outer map only holds weak references
//! to reader keys; maps of readers whose key is gone are dropped on the next
//! request after a key was dropped (see [`FieldCache`]), when a new reader is
//! registered, or when the partition is enumerated.
//!
//! Locks are held only for map lookups and inserts, never while a value is
//! computed. A computation in progress is represented by a [`Placeholder`]
//! that concurrent callers for the same key wait on.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use amudai_common::{Result, error::Error};

use crate::{
    entry::Entry,
    field_cache::{FieldCache, TypedCaches},
    introspection::CacheEntryRecord,
    placeholder::Placeholder,
    reader::{IndexReader, ReaderKey, WeakReaderKey},
    values::{CachedValue, ValueType},
};

/// Value type specific behavior of a cache partition.
pub(crate) trait CacheKind: Sized + 'static {
    /// Element type the partition's parsers decode to.
    type Elem: 'static;
    /// Shared value handed to callers.
    type Value: Clone + Send + Sync + 'static;

    const VALUE_TYPE: ValueType;

    /// Selects this kind's partition from the current set of partitions.
    fn partition(caches: &TypedCaches) -> &TypedCache<Self>;

    /// Computes the value of `entry` for `reader`. Entries the computation
    /// depends on are resolved through `partition`, the partition `entry` is
    /// being computed in.
    fn materialize(
        partition: &TypedCache<Self>,
        owner: &FieldCache,
        reader: &dyn IndexReader,
        entry: &Entry<Self::Elem>,
    ) -> Result<Self::Value>;

    fn to_cached(value: &Self::Value) -> CachedValue;
}

enum Slot<V> {
    Pending(Arc<Placeholder<V>>),
    Ready(V),
}

type ValueMap<K> = AHashMap<Entry<<K as CacheKind>::Elem>, Slot<<K as CacheKind>::Value>>;

struct ReaderValues<K: CacheKind> {
    key: WeakReaderKey,
    values: Arc<Mutex<ValueMap<K>>>,
}

enum Lookup<V> {
    Hit(V),
    Wait(Arc<Placeholder<V>>),
    Compute(Arc<Placeholder<V>>),
}

pub(crate) struct TypedCache<K: CacheKind> {
    readers: Mutex<AHashMap<u64, ReaderValues<K>>>,
}

impl<K: CacheKind> TypedCache<K> {
    pub fn new() -> TypedCache<K> {
        TypedCache {
            readers: Mutex::new(AHashMap::new()),
        }
    }

    /// Returns the value of `entry` for `reader`, computing it on first use.
    ///
    /// Exactly one caller computes a missing value; concurrent callers for the
    /// same key block until it is done and receive the same value or the same
    /// failure. A failed computation is not remembered: the next call computes
    /// again.
    pub fn get(
        &self,
        owner: &FieldCache,
        reader: &dyn IndexReader,
        entry: Entry<K::Elem>,
    ) -> Result<K::Value> {
        let values = self.reader_values(reader.cache_key());
        let lookup = {
            let mut map = values.lock().expect("value map lock");
            match map.get(&entry) {
                Some(Slot::Ready(value)) => Lookup::Hit(value.clone()),
                Some(Slot::Pending(placeholder)) => Lookup::Wait(Arc::clone(placeholder)),
                None => {
                    let placeholder = Arc::new(Placeholder::new());
                    map.insert(entry.clone(), Slot::Pending(Arc::clone(&placeholder)));
                    Lookup::Compute(placeholder)
                }
            }
        };
        match lookup {
            Lookup::Hit(value) => Ok(value),
            Lookup::Wait(placeholder) => placeholder.wait(),
            Lookup::Compute(placeholder) => {
                let pending = PendingSlot::<K> {
                    values: &values,
                    entry: &entry,
                    placeholder: &placeholder,
                    armed: true,
                };
                let result = K::materialize(self, owner, reader, &entry);
                pending.complete(owner, reader, result)
            }
        }
    }

    /// Drops everything cached for `key`.
    pub fn purge(&self, key: &ReaderKey) {
        self.readers
            .lock()
            .expect("reader map lock")
            .remove(&key.id());
    }

    /// Number of readers with a value map, including readers that are gone
    /// but not yet expunged.
    pub fn reader_count(&self) -> usize {
        self.readers.lock().expect("reader map lock").len()
    }

    /// Drops the value maps of readers whose key is no longer referenced.
    pub fn expunge_stale(&self) {
        self.readers
            .lock()
            .expect("reader map lock")
            .retain(|_, reader| reader.key.is_alive());
    }

    /// Appends a record for every computed value of every live reader.
    /// Values still being computed are skipped.
    pub fn collect_entries(&self, out: &mut Vec<CacheEntryRecord>) {
        let readers = {
            let mut readers = self.readers.lock().expect("reader map lock");
            readers.retain(|_, reader| reader.key.is_alive());
            readers
                .values()
                .filter_map(|reader| Some((reader.key.upgrade()?, Arc::clone(&reader.values))))
                .collect::<Vec<_>>()
        };
        for (reader_key, values) in readers {
            let map = values.lock().expect("value map lock");
            for (entry, slot) in map.iter() {
                if let Slot::Ready(value) = slot {
                    out.push(CacheEntryRecord {
                        reader_key: reader_key.clone(),
                        field: Arc::clone(entry.field()),
                        value_type: K::VALUE_TYPE,
                        strategy: entry.strategy(),
                        value: K::to_cached(value),
                    });
                }
            }
        }
    }

    fn reader_values(&self, key: &ReaderKey) -> Arc<Mutex<ValueMap<K>>> {
        let mut readers = self.readers.lock().expect("reader map lock");
        if let Some(reader) = readers.get(&key.id()) {
            return Arc::clone(&reader.values);
        }
        readers.retain(|_, reader| reader.key.is_alive());
        let values = Arc::new(Mutex::new(AHashMap::new()));
        readers.insert(
            key.id(),
            ReaderValues {
                key: key.downgrade(),
                values: Arc::clone(&values),
            },
        );
        values
    }
}

impl<K: CacheKind> Default for TypedCache<K> {
    fn default() -> Self {
        TypedCache::new()
    }
}

/// The slot a caller has claimed for computing. Unless completed, dropping it
/// (during unwinding) fails the placeholder and frees the slot.
struct PendingSlot<'a, K: CacheKind> {
    values: &'a Mutex<ValueMap<K>>,
    entry: &'a Entry<K::Elem>,
    placeholder: &'a Arc<Placeholder<K::Value>>,
    armed: bool,
}

impl<K: CacheKind> PendingSlot<'_, K> {
    fn complete(
        mut self,
        owner: &FieldCache,
        reader: &dyn IndexReader,
        result: Result<K::Value>,
    ) -> Result<K::Value> {
        self.armed = false;
        match result {
            Ok(value) => {
                self.values
                    .lock()
                    .expect("value map lock")
                    .insert(self.entry.clone(), Slot::Ready(value.clone()));
                self.placeholder.fill(value.clone());

                let cached = K::to_cached(&value);
                log::debug!(
                    "computed {} for field '{}' of reader {} ({})",
                    cached,
                    self.entry.field(),
                    reader.cache_key().id(),
                    self.entry.parser().map_or("default", |p| p.name()),
                );
                // Entries without a parser delegate to one with a parser,
                // which has already been checked.
                if self.entry.parser().is_some() {
                    owner.report_new_insanity(&cached);
                }
                Ok(value)
            }
            Err(error) => {
                self.release();
                Err(Error::shared(self.placeholder.fail(error)))
            }
        }
    }

    /// Removes our placeholder from the map, if it is still there.
    fn release(&self) {
        let Ok(mut map) = self.values.lock() else {
            return;
        };
        let ours = matches!(
            map.get(self.entry),
            Some(Slot::Pending(placeholder)) if Arc::ptr_eq(placeholder, self.placeholder)
        );
        if ours {
            map.remove(self.entry);
        }
    }
}

impl<K: CacheKind> Drop for PendingSlot<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            self.release();
            self.placeholder
                .fail(Error::invalid_operation("field value computation panicked"));
        }
    }
}
