//! Builds per-document value arrays from the terms of a field.
//!
//! Every algorithm walks the terms of one field in ascending order and writes
//! the decoded value of each term into the slots of the documents listed in
//! its posting list. A document listed by several terms ends up with the
//! value of the last one.

use std::sync::Arc;

use amudai_common::{Result, verify_data};

use crate::{
    entry::Entry,
    field_cache::{FieldCache, TypedCaches},
    parsers::{self, Decoded, FieldParser},
    reader::IndexReader,
    typed_cache::{CacheKind, TypedCache},
    values::{CachedValue, StringIndex, ValueType},
};

/// When the value array of a numeric field is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Allocation {
    /// Before the scan, whether or not the field has terms.
    Eager,
    /// When the first term has been decoded; an all-default array is
    /// allocated at the end if no term was.
    Lazy,
}

/// Numeric partitions share one algorithm, parameterized by these.
trait NumericKind: CacheKind<Value = Arc<[<Self as CacheKind>::Elem]>>
where
    <Self as CacheKind>::Elem: Copy + Default,
{
    const ALLOCATION: Allocation;

    fn default_parser() -> Arc<dyn FieldParser<Self::Elem>>;

    /// Parser to retry with when the default parser rejects a term.
    fn fallback_parser() -> Option<Arc<dyn FieldParser<Self::Elem>>>;
}

fn materialize_numeric<K>(
    partition: &TypedCache<K>,
    owner: &FieldCache,
    reader: &dyn IndexReader,
    entry: &Entry<K::Elem>,
) -> Result<Arc<[K::Elem]>>
where
    K: NumericKind,
    K::Elem: Copy + Default,
{
    let Some(parser) = entry.parser() else {
        // The default decoding is cached under the explicit default parser,
        // and this entry shares its value.
        let primary = partition.get(owner, reader, entry.with_parser(K::default_parser()));
        return match (primary, K::fallback_parser()) {
            (Err(e), Some(fallback)) if e.is_number_format() => {
                log::debug!(
                    "field '{}' is not decimal text ({e}), retrying with {}",
                    entry.field(),
                    fallback.name()
                );
                partition.get(owner, reader, entry.with_parser(fallback))
            }
            (result, _) => result,
        };
    };
    fill_numeric(reader, entry.field(), parser.as_ref(), K::ALLOCATION)
}

fn fill_numeric<T: Copy + Default>(
    reader: &dyn IndexReader,
    field: &str,
    parser: &dyn FieldParser<T>,
    allocation: Allocation,
) -> Result<Arc<[T]>> {
    let max_doc = reader.max_doc();
    let mut values = match allocation {
        Allocation::Eager => Some(vec![T::default(); max_doc]),
        Allocation::Lazy => None,
    };
    let mut terms = reader.terms(field)?;
    while let Some(term) = terms.next_term()? {
        let value = match parser.parse(term)? {
            Decoded::Value(value) => value,
            Decoded::StopFill => {
                log::trace!("{} stopped filling field '{field}'", parser.name());
                break;
            }
        };
        let slots = values.get_or_insert_with(|| vec![T::default(); max_doc]);
        for doc in terms.postings()? {
            verify_data!(doc, (doc as usize) < max_doc);
            slots[doc as usize] = value;
        }
    }
    Ok(values
        .unwrap_or_else(|| vec![T::default(); max_doc])
        .into())
}

fn fill_strings(reader: &dyn IndexReader, field: &str) -> Result<Arc<[Option<Arc<str>>]>> {
    let max_doc = reader.max_doc();
    let mut values: Vec<Option<Arc<str>>> = vec![None; max_doc];
    let mut terms = reader.terms(field)?;
    while let Some(term) = terms.next_term()? {
        let term: Arc<str> = Arc::from(term);
        for doc in terms.postings()? {
            verify_data!(doc, (doc as usize) < max_doc);
            values[doc as usize] = Some(Arc::clone(&term));
        }
    }
    Ok(values.into())
}

fn fill_string_index(reader: &dyn IndexReader, field: &str) -> Result<StringIndex> {
    let max_doc = reader.max_doc();
    let mut ordinals = vec![0u32; max_doc];
    let mut ordered_docs = vec![-1i32; max_doc];
    let mut next_ordered = 0;
    // Ordinal 0 is reserved for documents without a term.
    let mut lookup: Vec<Option<Arc<str>>> = vec![None];

    let mut terms = reader.terms(field)?;
    // A field cannot have more live terms than documents.
    while lookup.len() <= max_doc {
        let Some(term) = terms.next_term()? else {
            break;
        };
        let ordinal = lookup.len() as u32;
        lookup.push(Some(Arc::from(term)));
        for doc in terms.postings()? {
            verify_data!(doc, (doc as usize) < max_doc);
            let slot = &mut ordinals[doc as usize];
            if *slot == 0 {
                ordered_docs[next_ordered] = doc as i32;
                next_ordered += 1;
            }
            *slot = ordinal;
        }
    }
    Ok(StringIndex::new(ordinals, ordered_docs, lookup))
}

macro_rules! numeric_kind {
    (
        $(#[$doc:meta])*
        $kind:ident, $elem:ty, $value_type:ident, $variant:ident, $partition:ident,
        $allocation:ident, $default:path, $fallback:expr
    ) => {
        $(#[$doc])*
        pub(crate) struct $kind;

        impl CacheKind for $kind {
            type Elem = $elem;
            type Value = Arc<[$elem]>;

            const VALUE_TYPE: ValueType = ValueType::$value_type;

            fn partition(caches: &TypedCaches) -> &TypedCache<Self> {
                &caches.$partition
            }

            fn materialize(
                partition: &TypedCache<Self>,
                owner: &FieldCache,
                reader: &dyn IndexReader,
                entry: &Entry<$elem>,
            ) -> Result<Arc<[$elem]>> {
                materialize_numeric(partition, owner, reader, entry)
            }

            fn to_cached(value: &Arc<[$elem]>) -> CachedValue {
                CachedValue::$variant(Arc::clone(value))
            }
        }

        impl NumericKind for $kind {
            const ALLOCATION: Allocation = Allocation::$allocation;

            fn default_parser() -> Arc<dyn FieldParser<$elem>> {
                $default()
            }

            fn fallback_parser() -> Option<Arc<dyn FieldParser<$elem>>> {
                $fallback
            }
        }
    };
}

numeric_kind!(
    ByteKind, i8, Byte, Bytes, bytes,
    Eager, parsers::default_byte_parser, None
);
numeric_kind!(
    ShortKind, i16, Short, Shorts, shorts,
    Eager, parsers::default_short_parser, None
);
numeric_kind!(
    IntKind, i32, Int, Ints, ints,
    Lazy, parsers::default_int_parser, Some(parsers::prefix_coded_int_parser())
);
numeric_kind!(
    FloatKind, f32, Float, Floats, floats,
    Lazy, parsers::default_float_parser, Some(parsers::prefix_coded_float_parser())
);
numeric_kind!(
    LongKind, i64, Long, Longs, longs,
    Lazy, parsers::default_long_parser, Some(parsers::prefix_coded_long_parser())
);
numeric_kind!(
    DoubleKind, f64, Double, Doubles, doubles,
    Lazy, parsers::default_double_parser, Some(parsers::prefix_coded_double_parser())
);

/// Raw term text per document.
pub(crate) struct StringKind;

impl CacheKind for StringKind {
    type Elem = Arc<str>;
    type Value = Arc<[Option<Arc<str>>]>;

    const VALUE_TYPE: ValueType = ValueType::String;

    fn partition(caches: &TypedCaches) -> &TypedCache<Self> {
        &caches.strings
    }

    fn materialize(
        _partition: &TypedCache<Self>,
        _owner: &FieldCache,
        reader: &dyn IndexReader,
        entry: &Entry<Arc<str>>,
    ) -> Result<Self::Value> {
        fill_strings(reader, entry.field())
    }

    fn to_cached(value: &Self::Value) -> CachedValue {
        CachedValue::Strings(Arc::clone(value))
    }
}

/// Term ordinals per document.
pub(crate) struct StringIndexKind;

impl CacheKind for StringIndexKind {
    type Elem = Arc<str>;
    type Value = Arc<StringIndex>;

    const VALUE_TYPE: ValueType = ValueType::StringIndex;

    fn partition(caches: &TypedCaches) -> &TypedCache<Self> {
        &caches.string_index
    }

    fn materialize(
        _partition: &TypedCache<Self>,
        _owner: &FieldCache,
        reader: &dyn IndexReader,
        entry: &Entry<Arc<str>>,
    ) -> Result<Self::Value> {
        fill_string_index(reader, entry.field()).map(Arc::new)
    }

    fn to_cached(value: &Self::Value) -> CachedValue {
        CachedValue::StringIndex(Arc::clone(value))
    }
}

#[cfg(test)]
mod tests {
    use amudai_numeric_prefix as prefix;

    use super::{Allocation, fill_numeric, fill_string_index, fill_strings};
    use crate::{
        memory_reader::MemoryIndexReader,
        parsers::{Decoded, default_int_parser, parser_fn, prefix_coded_long_parser},
    };

    #[test]
    fn test_last_term_wins() {
        let reader = MemoryIndexReader::builder(3)
            .add_term("n", "1", [0, 1])
            .add_term("n", "2", [1])
            .build();
        let values = fill_numeric(&reader, "n", default_int_parser().as_ref(), Allocation::Lazy)
            .unwrap();
        assert_eq!(&values[..], &[1, 2, 0]);
    }

    #[test]
    fn test_stop_fill_keeps_filled_slots() {
        let reader = MemoryIndexReader::builder(4)
            .add_value("n", 0, "a")
            .add_value("n", 1, "b")
            .add_value("n", 2, "c")
            .build();
        let parser = parser_fn::<i32, _>("until-c", |term: &str| {
            Ok(match term {
                "c" => Decoded::StopFill,
                _ => Decoded::Value(term.as_bytes()[0] as i32),
            })
        });
        let values = fill_numeric(&reader, "n", parser.as_ref(), Allocation::Lazy).unwrap();
        assert_eq!(&values[..], &[97, 98, 0, 0]);
    }

    #[test]
    fn test_stop_fill_on_first_term_still_allocates() {
        let reader = MemoryIndexReader::builder(2).add_value("n", 0, "x").build();
        let parser = parser_fn::<i64, _>("stop", |_: &str| Ok(Decoded::StopFill));
        for allocation in [Allocation::Eager, Allocation::Lazy] {
            let values = fill_numeric(&reader, "n", parser.as_ref(), allocation).unwrap();
            assert_eq!(&values[..], &[0, 0]);
        }
    }

    #[test]
    fn test_prefix_coded_lower_precision_terms_are_skipped() {
        let mut builder = MemoryIndexReader::builder(3);
        for (doc, value) in [(0u32, -5i64), (1, 1 << 40), (2, 17)] {
            for shift in [0, 8, 16] {
                builder = builder.add_value("l", doc, prefix::long_to_prefix_coded(value, shift));
            }
        }
        let reader = builder.build();
        let values =
            fill_numeric(&reader, "l", prefix_coded_long_parser().as_ref(), Allocation::Lazy)
                .unwrap();
        assert_eq!(&values[..], &[-5, 1 << 40, 17]);
    }

    #[test]
    fn test_doc_out_of_range_fails() {
        let reader = MemoryIndexReader::builder(1).add_value("n", 1, "1").build();
        assert!(
            fill_numeric(&reader, "n", default_int_parser().as_ref(), Allocation::Eager).is_err()
        );
        assert!(fill_strings(&reader, "n").is_err());
        assert!(fill_string_index(&reader, "n").is_err());
    }

    #[test]
    fn test_strings() {
        let reader = MemoryIndexReader::builder(3)
            .add_column("s", [Some("b"), None, Some("a")])
            .build();
        let values = fill_strings(&reader, "s").unwrap();
        assert_eq!(values[0].as_deref(), Some("b"));
        assert_eq!(values[1].as_deref(), None);
        assert_eq!(values[2].as_deref(), Some("a"));
    }

    #[test]
    fn test_string_index_layout() {
        let reader = MemoryIndexReader::builder(5)
            .add_column("s", [Some("pear"), None, Some("apple"), Some("pear"), None])
            .build();
        let index = fill_string_index(&reader, "s").unwrap();
        assert_eq!(index.ordinals(), &[2, 0, 1, 2, 0]);
        assert_eq!(index.ordered_docs(), &[2, 0, 3, -1, -1]);
        let terms: Vec<_> = index.terms().iter().map(|t| t.as_deref()).collect();
        assert_eq!(terms, vec![None, Some("apple"), Some("pear")]);
    }

    #[test]
    fn test_string_index_without_terms() {
        let reader = MemoryIndexReader::builder(3).build();
        let index = fill_string_index(&reader, "s").unwrap();
        assert_eq!(index.ordinals(), &[0, 0, 0]);
        assert_eq!(index.ordered_docs(), &[-1, -1, -1]);
        assert_eq!(index.terms().len(), 1);
        assert!(index.terms()[0].is_none());
    }

    #[test]
    fn test_string_index_caps_term_table() {
        // Terms without postings can outnumber the documents.
        let reader = MemoryIndexReader::builder(2)
            .add_term("s", "a", [])
            .add_term("s", "b", [])
            .add_term("s", "c", [1])
            .build();
        let index = fill_string_index(&reader, "s").unwrap();
        assert_eq!(index.terms().len(), 3);
        assert_eq!(index.ordinals(), &[0, 0]);
    }
}
