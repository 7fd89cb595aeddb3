//! Diagnostic view over everything the field cache holds.

use std::{fmt, sync::Arc};

use crate::{
    field_cache::FieldCache,
    parsers::Parser,
    reader::ReaderKey,
    sanity::Insanity,
    values::{CachedValue, ValueType},
};

/// Receives free-text diagnostic warnings from the field cache.
pub trait InfoSink: Send + Sync {
    fn message(&self, text: &str);
}

/// Forwards diagnostics to the `log` facade at warning level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogInfoSink;

impl InfoSink for LogInfoSink {
    fn message(&self, text: &str) {
        log::warn!("{text}");
    }
}

/// Point-in-time description of one cached value.
///
/// A record holds a strong handle to the reader key, so keep snapshots
/// short-lived.
#[derive(Debug, Clone)]
pub struct CacheEntryRecord {
    pub reader_key: ReaderKey,
    pub field: Arc<str>,
    pub value_type: ValueType,
    /// Parser the value was requested with; `None` for the default decoding.
    pub strategy: Option<Arc<dyn Parser>>,
    pub value: CachedValue,
}

impl fmt::Display for CacheEntryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'reader {}'=>'{}',{},{}=>{}",
            self.reader_key.id(),
            self.field,
            self.value_type,
            self.strategy.as_ref().map_or("default", |s| s.name()),
            self.value
        )
    }
}

impl FieldCache {
    /// Lists every computed value of every live reader.
    ///
    /// Each partition is locked only while it is being listed, so the result
    /// is consistent per partition but not across partitions.
    pub fn cache_entries(&self) -> Vec<CacheEntryRecord> {
        let caches = self.current();
        let mut entries = Vec::new();
        caches.bytes.collect_entries(&mut entries);
        caches.shorts.collect_entries(&mut entries);
        caches.ints.collect_entries(&mut entries);
        caches.floats.collect_entries(&mut entries);
        caches.longs.collect_entries(&mut entries);
        caches.doubles.collect_entries(&mut entries);
        caches.strings.collect_entries(&mut entries);
        caches.string_index.collect_entries(&mut entries);
        entries
    }

    /// Runs the configured sanity checker over the current entries.
    pub fn check_sanity(&self) -> Vec<Insanity> {
        self.sanity_checker().check(&self.cache_entries())
    }

    /// Reports every sanity problem that involves the freshly computed
    /// `value`. Does nothing without an info sink.
    pub(crate) fn report_new_insanity(&self, value: &CachedValue) {
        let Some(sink) = self.info_sink() else {
            return;
        };
        for insanity in self.check_sanity() {
            if insanity
                .entries()
                .iter()
                .any(|record| record.value.same_value(value))
            {
                sink.message(&format!(
                    "WARNING: new FieldCache insanity created\nDetails: {insanity}"
                ));
            }
        }
    }
}
