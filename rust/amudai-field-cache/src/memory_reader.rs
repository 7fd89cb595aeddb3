//! In-memory [`IndexReader`] implementation.
//!
//! Useful for tests and for small, fully materialized indexes. Terms are kept
//! in a sorted map per field, so enumeration order is the byte order of the
//! term text, as the cache expects.

use std::collections::{BTreeMap, BTreeSet, btree_map};

use amudai_common::{Result, error::Error};

use crate::reader::{IndexReader, Postings, ReaderKey, TermsEnum};

/// Immutable in-memory inverted index.
#[derive(Debug)]
pub struct MemoryIndexReader {
    key: ReaderKey,
    max_doc: usize,
    fields: BTreeMap<String, BTreeMap<String, Vec<u32>>>,
}

impl MemoryIndexReader {
    /// Starts building a reader over `max_doc` documents.
    pub fn builder(max_doc: usize) -> MemoryIndexBuilder {
        MemoryIndexBuilder {
            key: None,
            max_doc,
            fields: BTreeMap::new(),
        }
    }

    /// Names of the indexed fields, in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of distinct terms of `field`.
    pub fn term_count(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, BTreeMap::len)
    }
}

impl IndexReader for MemoryIndexReader {
    fn cache_key(&self) -> &ReaderKey {
        &self.key
    }

    fn max_doc(&self) -> usize {
        self.max_doc
    }

    fn terms(&self, field: &str) -> Result<Box<dyn TermsEnum + '_>> {
        Ok(Box::new(MemoryTermsEnum {
            terms: self.fields.get(field).map(|terms| terms.iter()),
            current: None,
        }))
    }
}

/// Builder for [`MemoryIndexReader`].
///
/// Document ids are not validated against `max_doc`; consumers are expected to
/// reject out-of-range postings.
#[derive(Debug)]
pub struct MemoryIndexBuilder {
    key: Option<ReaderKey>,
    max_doc: usize,
    fields: BTreeMap<String, BTreeMap<String, BTreeSet<u32>>>,
}

impl MemoryIndexBuilder {
    /// Uses `key` as the reader identity instead of a fresh one. This is how
    /// composite readers are described.
    pub fn key(mut self, key: ReaderKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Adds `docs` to the posting list of `term` in `field`.
    pub fn add_term(
        mut self,
        field: &str,
        term: impl Into<String>,
        docs: impl IntoIterator<Item = u32>,
    ) -> Self {
        self.fields
            .entry(field.to_string())
            .or_default()
            .entry(term.into())
            .or_default()
            .extend(docs);
        self
    }

    /// Indexes `term` for a single document.
    pub fn add_value(self, field: &str, doc: u32, term: impl Into<String>) -> Self {
        self.add_term(field, term, [doc])
    }

    /// Indexes one term per document, taken from `values` in document order.
    /// `None` leaves the document without a term in `field`.
    pub fn add_column<S: Into<String>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        for (doc, value) in values.into_iter().enumerate() {
            if let Some(term) = value {
                self = self.add_value(field, doc as u32, term);
            }
        }
        self
    }

    pub fn build(self) -> MemoryIndexReader {
        MemoryIndexReader {
            key: self.key.unwrap_or_default(),
            max_doc: self.max_doc,
            fields: self
                .fields
                .into_iter()
                .map(|(field, terms)| {
                    let terms = terms
                        .into_iter()
                        .map(|(term, docs)| (term, docs.into_iter().collect()))
                        .collect();
                    (field, terms)
                })
                .collect(),
        }
    }
}

struct MemoryTermsEnum<'a> {
    terms: Option<btree_map::Iter<'a, String, Vec<u32>>>,
    current: Option<&'a [u32]>,
}

impl TermsEnum for MemoryTermsEnum<'_> {
    fn next_term(&mut self) -> Result<Option<&str>> {
        match self.terms.as_mut().and_then(Iterator::next) {
            Some((term, docs)) => {
                self.current = Some(docs.as_slice());
                Ok(Some(term.as_str()))
            }
            None => {
                self.current = None;
                Ok(None)
            }
        }
    }

    fn postings(&mut self) -> Result<Postings<'_>> {
        let docs = self
            .current
            .ok_or_else(|| Error::invalid_operation("postings without a current term"))?;
        Ok(Box::new(docs.iter().copied()))
    }
}
