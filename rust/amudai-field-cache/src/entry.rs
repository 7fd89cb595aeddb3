//! Composite key of the per-reader cache maps.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    intern::intern,
    parsers::{FieldParser, Parser},
};

/// Field name plus the identity of the parser used to decode it.
///
/// An entry without a parser stands for "the default decoding of this value
/// type" and never matches an entry that names a parser explicitly, not even
/// the default parser itself.
pub struct Entry<T> {
    field: Arc<str>,
    parser: Option<Arc<dyn FieldParser<T>>>,
}

impl<T: 'static> Entry<T> {
    pub fn new(field: &str, parser: Option<Arc<dyn FieldParser<T>>>) -> Entry<T> {
        Entry {
            field: intern(field),
            parser,
        }
    }

    /// The same field, decoded with `parser`.
    pub fn with_parser(&self, parser: Arc<dyn FieldParser<T>>) -> Entry<T> {
        Entry {
            field: Arc::clone(&self.field),
            parser: Some(parser),
        }
    }

    pub fn field(&self) -> &Arc<str> {
        &self.field
    }

    pub fn parser(&self) -> Option<&Arc<dyn FieldParser<T>>> {
        self.parser.as_ref()
    }

    /// The parser as a type-erased strategy, for diagnostics.
    pub fn strategy(&self) -> Option<Arc<dyn Parser>> {
        self.parser
            .as_ref()
            .map(|parser| Arc::clone(parser) as Arc<dyn Parser>)
    }

    fn parser_addr(&self) -> usize {
        self.parser
            .as_ref()
            .map_or(0, |parser| Arc::as_ptr(parser) as *const () as usize)
    }
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Entry {
            field: Arc::clone(&self.field),
            parser: self.parser.clone(),
        }
    }
}

impl<T: 'static> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.field, &other.field) || self.field == other.field)
            && self.parser_addr() == other.parser_addr()
    }
}

impl<T: 'static> Eq for Entry<T> {}

impl<T: 'static> Hash for Entry<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.parser_addr().hash(state);
    }
}

impl<T: 'static> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("field", &self.field)
            .field("parser", &self.parser.as_ref().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ahash::AHashSet;

    use super::Entry;
    use crate::parsers::{Decoded, default_int_parser, parser_fn};

    #[test]
    fn test_entry_equality() {
        let plain = Entry::<i32>::new("price", None);
        let default = Entry::new("price", Some(default_int_parser()));

        assert_eq!(plain, Entry::new("price", None));
        assert_eq!(default, plain.with_parser(default_int_parser()));
        assert_ne!(plain, default);
        assert_ne!(plain, Entry::new("cost", None));

        let custom = parser_fn::<i32, _>("zero", |_: &str| Ok(Decoded::Value(0)));
        let other = parser_fn::<i32, _>("zero", |_: &str| Ok(Decoded::Value(0)));
        assert_eq!(
            Entry::new("price", Some(Arc::clone(&custom))),
            Entry::new("price", Some(custom))
        );
        assert_ne!(
            Entry::new("price", Some(other)),
            Entry::new("price", Some(default_int_parser()))
        );
    }

    #[test]
    fn test_entry_hashing() {
        let mut set = AHashSet::new();
        set.insert(Entry::<i32>::new("a", None));
        set.insert(Entry::new("a", Some(default_int_parser())));
        set.insert(Entry::new("a", None));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Entry::new("a", Some(default_int_parser()))));
    }
}
