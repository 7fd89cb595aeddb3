//! Detection of wasteful or conflicting field cache usage.
//!
//! Problems found here are advisory. They usually mean that callers ask for
//! the same field in incompatible ways, so the cache holds several arrays
//! where one would do.

use std::{collections::BTreeMap, fmt};

use ahash::AHashSet;

use crate::{introspection::CacheEntryRecord, reader::ReaderKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsanityKind {
    /// The same field of the same reader is cached as more than one distinct
    /// value, typically under different value types or parsers.
    ValueMismatch,
    /// A field is cached for a composite reader and for one of its
    /// sub-readers.
    Subreader,
}

impl fmt::Display for InsanityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InsanityKind::ValueMismatch => "VALUEMISMATCH",
            InsanityKind::Subreader => "SUBREADER",
        })
    }
}

/// A problem found in the cache, with the entries involved.
#[derive(Debug, Clone)]
pub struct Insanity {
    kind: InsanityKind,
    message: String,
    entries: Vec<CacheEntryRecord>,
}

impl Insanity {
    pub fn new(kind: InsanityKind, message: String, entries: Vec<CacheEntryRecord>) -> Insanity {
        Insanity {
            kind,
            message,
            entries,
        }
    }

    pub fn kind(&self) -> InsanityKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn entries(&self) -> &[CacheEntryRecord] {
        &self.entries
    }
}

impl fmt::Display for Insanity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.kind, self.message)?;
        for entry in &self.entries {
            writeln!(f, "\t{entry}")?;
        }
        Ok(())
    }
}

/// Classifies a snapshot of cache entries.
pub trait SanityChecker: Send + Sync {
    fn check(&self, entries: &[CacheEntryRecord]) -> Vec<Insanity>;
}

/// Default rules: [`InsanityKind::ValueMismatch`] and
/// [`InsanityKind::Subreader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldCacheSanityChecker;

type ByReaderField<'a> = BTreeMap<(u64, &'a str), Vec<&'a CacheEntryRecord>>;

impl SanityChecker for FieldCacheSanityChecker {
    fn check(&self, entries: &[CacheEntryRecord]) -> Vec<Insanity> {
        let mut by_reader_field = ByReaderField::new();
        for entry in entries {
            by_reader_field
                .entry((entry.reader_key.id(), &*entry.field))
                .or_default()
                .push(entry);
        }

        let mut insanities = value_mismatches(&by_reader_field);
        insanities.extend(subreader_duplicates(&by_reader_field));
        insanities
    }
}

fn value_mismatches(by_reader_field: &ByReaderField) -> Vec<Insanity> {
    by_reader_field
        .iter()
        .filter_map(|(&(reader, field), group)| {
            let distinct: AHashSet<usize> = group.iter().map(|e| e.value.identity()).collect();
            (distinct.len() > 1).then(|| {
                Insanity::new(
                    InsanityKind::ValueMismatch,
                    format!(
                        "{} distinct values for field '{field}' of reader {reader}",
                        distinct.len()
                    ),
                    group.iter().map(|&e| e.clone()).collect(),
                )
            })
        })
        .collect()
}

fn subreader_duplicates(by_reader_field: &ByReaderField) -> Vec<Insanity> {
    let mut insanities = Vec::new();
    for (&(reader, field), group) in by_reader_field {
        let parent_key = &group[0].reader_key;
        if parent_key.sub_readers().is_empty() {
            continue;
        }

        let mut involved: Vec<&CacheEntryRecord> = Vec::new();
        let mut pending: Vec<&ReaderKey> = parent_key.sub_readers().iter().collect();
        while let Some(sub) = pending.pop() {
            if let Some(found) = by_reader_field.get(&(sub.id(), field)) {
                involved.extend(found.iter().copied());
            }
            pending.extend(sub.sub_readers());
        }
        if involved.is_empty() {
            continue;
        }

        let entries = group.iter().chain(involved.iter()).map(|&e| e.clone()).collect();
        insanities.push(Insanity::new(
            InsanityKind::Subreader,
            format!("field '{field}' is cached for reader {reader} and its sub-readers"),
            entries,
        ));
    }
    insanities
}

#[cfg(test)]
mod tests {
    use super::{FieldCacheSanityChecker, InsanityKind, SanityChecker};
    use crate::{
        field_cache::FieldCache,
        memory_reader::MemoryIndexReader,
        parsers::{Decoded, parser_fn},
        reader::ReaderKey,
    };

    #[test]
    fn test_same_value_under_two_keys_is_sane() {
        let cache = FieldCache::new();
        let reader = MemoryIndexReader::builder(2).add_value("n", 1, "3").build();
        cache.get_ints(&reader, "n", None).unwrap();
        assert_eq!(cache.cache_entries().len(), 2);
        assert!(FieldCacheSanityChecker.check(&cache.cache_entries()).is_empty());
    }

    #[test]
    fn test_value_mismatch() {
        let cache = FieldCache::new();
        let reader = MemoryIndexReader::builder(2).add_value("n", 1, "3").build();
        let doubled = parser_fn::<i32, _>("doubled", |t: &str| {
            Ok(Decoded::Value(t.parse::<i32>().unwrap_or_default() * 2))
        });
        cache.get_ints(&reader, "n", None).unwrap();
        cache.get_ints(&reader, "n", Some(doubled)).unwrap();

        let insanities = cache.check_sanity();
        assert_eq!(insanities.len(), 1);
        assert_eq!(insanities[0].kind(), InsanityKind::ValueMismatch);
        assert_eq!(insanities[0].entries().len(), 3);
        let text = insanities[0].to_string();
        assert!(text.starts_with("VALUEMISMATCH: 2 distinct values for field 'n'"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_subreader_duplicates() {
        let cache = FieldCache::new();
        let leaf_key = ReaderKey::new();
        let other_key = ReaderKey::new();
        let leaf = MemoryIndexReader::builder(1)
            .key(leaf_key.clone())
            .add_value("s", 0, "x")
            .build();
        let other_leaf = MemoryIndexReader::builder(1)
            .key(other_key.clone())
            .add_value("s", 0, "y")
            .build();
        let top = MemoryIndexReader::builder(2)
            .key(ReaderKey::composite(vec![leaf_key, other_key]))
            .add_value("s", 0, "x")
            .add_value("s", 1, "y")
            .build();

        cache.get_strings(&top, "s").unwrap();
        assert!(cache.check_sanity().is_empty());

        cache.get_strings(&leaf, "s").unwrap();
        let insanities = cache.check_sanity();
        assert_eq!(insanities.len(), 1);
        assert_eq!(insanities[0].kind(), InsanityKind::Subreader);
        assert_eq!(insanities[0].entries().len(), 2);

        // A different field of a sub-reader is fine.
        cache.get_strings(&other_leaf, "t").unwrap();
        assert_eq!(cache.check_sanity().len(), 1);
    }
}
