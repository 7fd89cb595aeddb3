//! Value arrays produced by the field cache.

use std::{fmt, sync::Arc};

/// The kind of per-document value a cache partition produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
    String,
    StringIndex,
}

impl ValueType {
    pub const ALL: [ValueType; 8] = [
        ValueType::Byte,
        ValueType::Short,
        ValueType::Int,
        ValueType::Float,
        ValueType::Long,
        ValueType::Double,
        ValueType::String,
        ValueType::StringIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Byte => "i8",
            ValueType::Short => "i16",
            ValueType::Int => "i32",
            ValueType::Float => "f32",
            ValueType::Long => "i64",
            ValueType::Double => "f64",
            ValueType::String => "string",
            ValueType::StringIndex => "string-index",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-document term ordinals of a field, plus the sorted term table.
///
/// Ordinal `0` means "no term" and is not backed by a real term; real terms
/// get ordinals `1..` in term order, so comparing ordinals compares terms.
#[derive(Debug)]
pub struct StringIndex {
    ordinals: Vec<u32>,
    ordered_docs: Vec<i32>,
    terms: Vec<Option<Arc<str>>>,
}

impl StringIndex {
    pub(crate) fn new(
        ordinals: Vec<u32>,
        ordered_docs: Vec<i32>,
        terms: Vec<Option<Arc<str>>>,
    ) -> StringIndex {
        debug_assert_eq!(ordinals.len(), ordered_docs.len());
        debug_assert!(!terms.is_empty() && terms[0].is_none());
        StringIndex {
            ordinals,
            ordered_docs,
            terms,
        }
    }

    /// Number of documents covered.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Term ordinal of every document.
    pub fn ordinals(&self) -> &[u32] {
        &self.ordinals
    }

    /// Documents that have a term, in the order they were first reached while
    /// scanning the terms. Unused slots at the end hold `-1`.
    pub fn ordered_docs(&self) -> &[i32] {
        &self.ordered_docs
    }

    /// Term table indexed by ordinal. Slot `0` is always `None`.
    pub fn terms(&self) -> &[Option<Arc<str>>] {
        &self.terms
    }

    /// Term text of `doc`, or `None` if the document has no term.
    pub fn term(&self, doc: usize) -> Option<&str> {
        let ordinal = *self.ordinals.get(doc)? as usize;
        self.terms.get(ordinal)?.as_deref()
    }

    /// Looks up the ordinal of `key`. `None` maps to ordinal `0`.
    ///
    /// Returns `Err(ordinal)` with the ordinal the key would be inserted at if
    /// it is not a term of the field.
    pub fn binary_search_lookup(&self, key: Option<&str>) -> Result<usize, usize> {
        let Some(key) = key else {
            return Ok(0);
        };
        self.terms[1..]
            .binary_search_by(|term| term.as_deref().unwrap_or_default().cmp(key))
            .map(|pos| pos + 1)
            .map_err(|pos| pos + 1)
    }
}

/// A computed value array, shared by every caller that requested it.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Bytes(Arc<[i8]>),
    Shorts(Arc<[i16]>),
    Ints(Arc<[i32]>),
    Floats(Arc<[f32]>),
    Longs(Arc<[i64]>),
    Doubles(Arc<[f64]>),
    Strings(Arc<[Option<Arc<str>>]>),
    StringIndex(Arc<StringIndex>),
}

impl CachedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            CachedValue::Bytes(_) => ValueType::Byte,
            CachedValue::Shorts(_) => ValueType::Short,
            CachedValue::Ints(_) => ValueType::Int,
            CachedValue::Floats(_) => ValueType::Float,
            CachedValue::Longs(_) => ValueType::Long,
            CachedValue::Doubles(_) => ValueType::Double,
            CachedValue::Strings(_) => ValueType::String,
            CachedValue::StringIndex(_) => ValueType::StringIndex,
        }
    }

    /// Number of documents the value covers.
    pub fn len(&self) -> usize {
        match self {
            CachedValue::Bytes(v) => v.len(),
            CachedValue::Shorts(v) => v.len(),
            CachedValue::Ints(v) => v.len(),
            CachedValue::Floats(v) => v.len(),
            CachedValue::Longs(v) => v.len(),
            CachedValue::Doubles(v) => v.len(),
            CachedValue::Strings(v) => v.len(),
            CachedValue::StringIndex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the shared allocation; equal for clones of the same value.
    pub fn identity(&self) -> usize {
        match self {
            CachedValue::Bytes(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Shorts(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Ints(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Floats(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Longs(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Doubles(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::Strings(v) => Arc::as_ptr(v) as *const () as usize,
            CachedValue::StringIndex(v) => Arc::as_ptr(v) as *const () as usize,
        }
    }

    /// Whether both refer to the same computed value, as opposed to equal
    /// contents.
    pub fn same_value(&self, other: &CachedValue) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Display for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]#{:x}",
            self.value_type(),
            self.len(),
            self.identity()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CachedValue, StringIndex, ValueType};

    fn sample_index() -> StringIndex {
        StringIndex::new(
            vec![2, 0, 1, 2],
            vec![2, 0, 3, -1],
            vec![None, Some("apple".into()), Some("pear".into())],
        )
    }

    #[test]
    fn test_string_index_accessors() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.term(0), Some("pear"));
        assert_eq!(index.term(1), None);
        assert_eq!(index.term(2), Some("apple"));
        assert_eq!(index.term(9), None);
    }

    #[test]
    fn test_binary_search_lookup() {
        let index = sample_index();
        assert_eq!(index.binary_search_lookup(None), Ok(0));
        assert_eq!(index.binary_search_lookup(Some("apple")), Ok(1));
        assert_eq!(index.binary_search_lookup(Some("pear")), Ok(2));
        assert_eq!(index.binary_search_lookup(Some("banana")), Err(2));
        assert_eq!(index.binary_search_lookup(Some("zzz")), Err(3));
        assert_eq!(index.binary_search_lookup(Some("")), Err(1));
    }

    #[test]
    fn test_cached_value_identity() {
        let ints: Arc<[i32]> = vec![1, 2, 3].into();
        let a = CachedValue::Ints(Arc::clone(&ints));
        let b = CachedValue::Ints(ints);
        let c = CachedValue::Ints(vec![1, 2, 3].into());
        assert!(a.same_value(&b));
        assert!(!a.same_value(&c));
        assert_eq!(a.value_type(), ValueType::Int);
        assert_eq!(a.len(), 3);
        assert!(a.to_string().starts_with("i32[3]#"));
    }
}
