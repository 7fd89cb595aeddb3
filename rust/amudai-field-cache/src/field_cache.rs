//! The field cache facade.

use std::sync::{
    Arc, LazyLock, RwLock,
    atomic::{AtomicU64, Ordering},
};

use amudai_common::Result;

use crate::{
    entry::Entry,
    introspection::InfoSink,
    materialize::{
        ByteKind, DoubleKind, FloatKind, IntKind, LongKind, ShortKind, StringIndexKind,
        StringKind,
    },
    parsers::FieldParser,
    reader::{IndexReader, dropped_reader_count},
    sanity::{FieldCacheSanityChecker, SanityChecker},
    typed_cache::{CacheKind, TypedCache},
    values::{CachedValue, StringIndex, ValueType},
};

/// One partition per value type. Replaced as a whole by
/// [`FieldCache::purge_all`].
#[derive(Default)]
pub(crate) struct TypedCaches {
    /// Value of [`dropped_reader_count`] at the last expunge.
    expunged_at: AtomicU64,
    pub bytes: TypedCache<ByteKind>,
    pub shorts: TypedCache<ShortKind>,
    pub ints: TypedCache<IntKind>,
    pub floats: TypedCache<FloatKind>,
    pub longs: TypedCache<LongKind>,
    pub doubles: TypedCache<DoubleKind>,
    pub strings: TypedCache<StringKind>,
    pub string_index: TypedCache<StringIndexKind>,
}

impl TypedCaches {
    pub fn purge(&self, reader: &dyn IndexReader) {
        let key = reader.cache_key();
        self.bytes.purge(key);
        self.shorts.purge(key);
        self.ints.purge(key);
        self.floats.purge(key);
        self.longs.purge(key);
        self.doubles.purge(key);
        self.strings.purge(key);
        self.string_index.purge(key);
    }

    pub fn expunge_stale(&self) {
        self.bytes.expunge_stale();
        self.shorts.expunge_stale();
        self.ints.expunge_stale();
        self.floats.expunge_stale();
        self.longs.expunge_stale();
        self.doubles.expunge_stale();
        self.strings.expunge_stale();
        self.string_index.expunge_stale();
    }

    /// Expunges every partition if any reader key was dropped since the
    /// last call.
    pub fn expunge_dropped_readers(&self) {
        let dropped = dropped_reader_count();
        if self.expunged_at.swap(dropped, Ordering::AcqRel) != dropped {
            self.expunge_stale();
        }
    }

    pub fn reader_count(&self, value_type: ValueType) -> usize {
        match value_type {
            ValueType::Byte => self.bytes.reader_count(),
            ValueType::Short => self.shorts.reader_count(),
            ValueType::Int => self.ints.reader_count(),
            ValueType::Float => self.floats.reader_count(),
            ValueType::Long => self.longs.reader_count(),
            ValueType::Double => self.doubles.reader_count(),
            ValueType::String => self.strings.reader_count(),
            ValueType::StringIndex => self.string_index.reader_count(),
        }
    }
}

/// Configuration of a [`FieldCache`].
#[derive(Clone)]
pub struct FieldCacheOptions {
    info_sink: Option<Arc<dyn InfoSink>>,
    sanity_checker: Arc<dyn SanityChecker>,
}

impl FieldCacheOptions {
    pub fn new() -> FieldCacheOptions {
        FieldCacheOptions {
            info_sink: None,
            sanity_checker: Arc::new(FieldCacheSanityChecker),
        }
    }

    /// Sets the sink receiving sanity warnings. Without a sink no sanity
    /// checks are run.
    pub fn info_sink(mut self, sink: Arc<dyn InfoSink>) -> Self {
        self.info_sink = Some(sink);
        self
    }

    /// Replaces the default sanity classification rules.
    pub fn sanity_checker(mut self, checker: Arc<dyn SanityChecker>) -> Self {
        self.sanity_checker = checker;
        self
    }
}

impl Default for FieldCacheOptions {
    fn default() -> Self {
        FieldCacheOptions::new()
    }
}

/// Caches per-document field values computed from the terms of an index
/// reader.
///
/// Values are keyed by reader, field and parser, and computed at most once
/// per key while they stay cached: concurrent requests for a key that is being
/// computed wait for that computation. Values live as long as the reader's
/// [`ReaderKey`](crate::ReaderKey) does, or until purged.
///
/// The returned arrays always have one slot per document of the reader.
/// Documents without a term in the field get the default value of the type
/// (`0`, `0.0`, `None`, ordinal `0`).
///
/// Numeric getters called without a parser decode decimal term text, and fall
/// back to prefix-coded terms (see `amudai_numeric_prefix`) for the 32- and
/// 64-bit types if the field is not decimal. The result is cached both under
/// the parser that succeeded and under the parser-less key.
pub struct FieldCache {
    caches: RwLock<Arc<TypedCaches>>,
    info_sink: RwLock<Option<Arc<dyn InfoSink>>>,
    sanity_checker: Arc<dyn SanityChecker>,
}

impl FieldCache {
    pub fn new() -> FieldCache {
        FieldCache::with_options(FieldCacheOptions::default())
    }

    pub fn with_options(options: FieldCacheOptions) -> FieldCache {
        FieldCache {
            caches: RwLock::new(Arc::default()),
            info_sink: RwLock::new(options.info_sink),
            sanity_checker: options.sanity_checker,
        }
    }

    pub fn get_bytes(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<i8>>>,
    ) -> Result<Arc<[i8]>> {
        self.get_with::<ByteKind>(reader, Entry::new(field, parser))
    }

    pub fn get_shorts(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<i16>>>,
    ) -> Result<Arc<[i16]>> {
        self.get_with::<ShortKind>(reader, Entry::new(field, parser))
    }

    pub fn get_ints(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<i32>>>,
    ) -> Result<Arc<[i32]>> {
        self.get_with::<IntKind>(reader, Entry::new(field, parser))
    }

    pub fn get_floats(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<f32>>>,
    ) -> Result<Arc<[f32]>> {
        self.get_with::<FloatKind>(reader, Entry::new(field, parser))
    }

    pub fn get_longs(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<i64>>>,
    ) -> Result<Arc<[i64]>> {
        self.get_with::<LongKind>(reader, Entry::new(field, parser))
    }

    pub fn get_doubles(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        parser: Option<Arc<dyn FieldParser<f64>>>,
    ) -> Result<Arc<[f64]>> {
        self.get_with::<DoubleKind>(reader, Entry::new(field, parser))
    }

    /// Term text of every document.
    pub fn get_strings(
        &self,
        reader: &dyn IndexReader,
        field: &str,
    ) -> Result<Arc<[Option<Arc<str>>]>> {
        self.get_with::<StringKind>(reader, Entry::new(field, None))
    }

    /// Term ordinal of every document, with the ordered term table.
    pub fn get_string_index(
        &self,
        reader: &dyn IndexReader,
        field: &str,
    ) -> Result<Arc<StringIndex>> {
        self.get_with::<StringIndexKind>(reader, Entry::new(field, None))
    }

    /// Values of `field` as `value_type`, decoded with the default parser of
    /// that type.
    pub fn get(
        &self,
        reader: &dyn IndexReader,
        field: &str,
        value_type: ValueType,
    ) -> Result<CachedValue> {
        Ok(match value_type {
            ValueType::Byte => CachedValue::Bytes(self.get_bytes(reader, field, None)?),
            ValueType::Short => CachedValue::Shorts(self.get_shorts(reader, field, None)?),
            ValueType::Int => CachedValue::Ints(self.get_ints(reader, field, None)?),
            ValueType::Float => CachedValue::Floats(self.get_floats(reader, field, None)?),
            ValueType::Long => CachedValue::Longs(self.get_longs(reader, field, None)?),
            ValueType::Double => CachedValue::Doubles(self.get_doubles(reader, field, None)?),
            ValueType::String => CachedValue::Strings(self.get_strings(reader, field)?),
            ValueType::StringIndex => {
                CachedValue::StringIndex(self.get_string_index(reader, field)?)
            }
        })
    }

    /// Drops every value cached for `reader`. Meant to be called when the
    /// reader is closed; values of a reader that is simply dropped become
    /// unreachable on their own.
    pub fn purge(&self, reader: &dyn IndexReader) {
        log::debug!("purging field values of reader {}", reader.cache_key().id());
        self.current().purge(reader);
    }

    /// Replaces all partitions with empty ones. Computations already in
    /// progress complete against the partitions they started with.
    pub fn purge_all(&self) {
        log::debug!("purging all field values");
        *self.caches.write().expect("caches lock") = Arc::default();
    }

    /// Drops the maps of readers that are gone without being purged. This
    /// also happens on the next request once a reader key has been dropped.
    pub fn expunge_stale(&self) {
        self.current().expunge_stale();
    }

    /// Number of readers with values of `value_type`, including readers that
    /// are gone but not yet expunged.
    pub fn reader_count(&self, value_type: ValueType) -> usize {
        self.current().reader_count(value_type)
    }

    /// Sets or clears the sink receiving sanity warnings.
    pub fn set_info_sink(&self, sink: Option<Arc<dyn InfoSink>>) {
        *self.info_sink.write().expect("info sink lock") = sink;
    }

    pub fn info_sink(&self) -> Option<Arc<dyn InfoSink>> {
        self.info_sink.read().expect("info sink lock").clone()
    }

    pub(crate) fn sanity_checker(&self) -> &dyn SanityChecker {
        self.sanity_checker.as_ref()
    }

    pub(crate) fn current(&self) -> Arc<TypedCaches> {
        Arc::clone(&self.caches.read().expect("caches lock"))
    }

    fn get_with<K: CacheKind>(
        &self,
        reader: &dyn IndexReader,
        entry: Entry<K::Elem>,
    ) -> Result<K::Value> {
        let caches = self.current();
        caches.expunge_dropped_readers();
        K::partition(&caches).get(self, reader, entry)
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        FieldCache::new()
    }
}

/// The process-wide field cache.
///
/// Components that share readers should share this instance so that values
/// are computed once per reader. Tests and embedders that need isolation
/// create their own [`FieldCache`].
pub fn global() -> &'static FieldCache {
    static GLOBAL: LazyLock<FieldCache> = LazyLock::new(FieldCache::new);
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{FieldCache, global};
    use crate::{
        memory_reader::MemoryIndexReader,
        parsers::default_int_parser,
        values::{CachedValue, ValueType},
    };

    #[test]
    fn test_default_entry_shares_explicit_default_value() {
        let cache = FieldCache::new();
        let reader = MemoryIndexReader::builder(2)
            .add_column("n", [Some("4"), Some("-1")])
            .build();

        let implicit = cache.get_ints(&reader, "n", None).unwrap();
        let explicit = cache.get_ints(&reader, "n", Some(default_int_parser())).unwrap();
        assert!(Arc::ptr_eq(&implicit, &explicit));
        assert_eq!(&implicit[..], &[4, -1]);
        assert_eq!(cache.cache_entries().len(), 2);
    }

    #[test]
    fn test_get_dispatches_by_value_type() {
        let cache = FieldCache::new();
        let reader = MemoryIndexReader::builder(3)
            .add_column("n", [Some("1"), None, Some("3")])
            .build();
        for value_type in ValueType::ALL {
            let value = cache.get(&reader, "n", value_type).unwrap();
            assert_eq!(value.value_type(), value_type);
            assert_eq!(value.len(), 3);
        }
        match cache.get(&reader, "n", ValueType::Double).unwrap() {
            CachedValue::Doubles(values) => assert_eq!(&values[..], &[1.0, 0.0, 3.0]),
            other => panic!("unexpected value {other}"),
        }
        assert_eq!(cache.reader_count(ValueType::Short), 1);
    }

    #[test]
    fn test_purge_and_purge_all() {
        let cache = FieldCache::new();
        let reader = MemoryIndexReader::builder(1).add_value("n", 0, "7").build();

        let first = cache.get_longs(&reader, "n", None).unwrap();
        cache.purge(&reader);
        assert!(cache.cache_entries().is_empty());
        let second = cache.get_longs(&reader, "n", None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        cache.purge_all();
        assert!(cache.cache_entries().is_empty());
        assert_eq!(cache.reader_count(ValueType::Long), 0);
        cache.purge_all();
        cache.purge(&reader);
    }

    #[test]
    fn test_global_instance_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}
