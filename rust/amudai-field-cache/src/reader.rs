//! Index reader interfaces consumed by the field cache.
//!
//! The cache never owns a reader. It only needs a stable identity for it
//! ([`ReaderKey`]), the number of documents it exposes, and the ability to
//! enumerate the terms of a field together with their posting lists.

use std::{
    hash::{Hash, Hasher},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use amudai_common::Result;

/// Source of reader ids. Ids are never reused within a process.
static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// Number of reader keys dropped so far. Caches compare it with the value
/// they last saw to decide whether stale reader maps need expunging.
static DROPPED_READERS: AtomicU64 = AtomicU64::new(0);

pub(crate) fn dropped_reader_count() -> u64 {
    DROPPED_READERS.load(Ordering::Acquire)
}

#[derive(Debug)]
struct ReaderToken {
    id: u64,
    sub_readers: Vec<ReaderKey>,
}

impl Drop for ReaderToken {
    fn drop(&mut self) {
        // Runs after the strong count reached zero, so weak handles of this
        // token already fail to upgrade.
        DROPPED_READERS.fetch_add(1, Ordering::AcqRel);
    }
}

/// Identity of an index reader, as seen by the field cache.
///
/// A reader creates its key once and hands out references to it for its whole
/// lifetime. The cache only keeps weak references to the key, so cached values
/// become unreachable through the cache as soon as the last strong handle of
/// the key (normally the one owned by the reader) is dropped.
///
/// Two keys compare equal only if one was cloned from the other.
#[derive(Debug, Clone)]
pub struct ReaderKey(Arc<ReaderToken>);

impl ReaderKey {
    /// Creates a fresh identity for a leaf reader.
    pub fn new() -> ReaderKey {
        ReaderKey::composite(Vec::new())
    }

    /// Creates a fresh identity for a reader composed of `sub_readers`.
    ///
    /// Sub-reader keys are used by the sanity checker to detect a field that
    /// is cached both for a composite reader and for its parts.
    pub fn composite(sub_readers: Vec<ReaderKey>) -> ReaderKey {
        ReaderKey(Arc::new(ReaderToken {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            sub_readers,
        }))
    }

    /// Process-unique id of this reader.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Keys of the readers this reader is composed of.
    pub fn sub_readers(&self) -> &[ReaderKey] {
        &self.0.sub_readers
    }

    pub(crate) fn downgrade(&self) -> WeakReaderKey {
        WeakReaderKey(Arc::downgrade(&self.0))
    }
}

impl Default for ReaderKey {
    fn default() -> Self {
        ReaderKey::new()
    }
}

impl PartialEq for ReaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ReaderKey {}

impl Hash for ReaderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// Weak counterpart of [`ReaderKey`], held by the cache's outer maps.
#[derive(Debug, Clone)]
pub(crate) struct WeakReaderKey(Weak<ReaderToken>);

impl WeakReaderKey {
    pub fn upgrade(&self) -> Option<ReaderKey> {
        self.0.upgrade().map(ReaderKey)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Ascending document ids of a single term.
pub type Postings<'a> = Box<dyn Iterator<Item = u32> + 'a>;

/// Cursor over the terms of one field, in ascending lexicographic order.
pub trait TermsEnum {
    /// Advances to the next term of the field and returns its text, or `None`
    /// once the terms of the field are exhausted.
    fn next_term(&mut self) -> Result<Option<&str>>;

    /// Returns the posting list of the current term.
    fn postings(&mut self) -> Result<Postings<'_>>;
}

/// Read-only, point-in-time view over an index, owning documents
/// `0..max_doc()`.
pub trait IndexReader: Send + Sync {
    /// Identity used to key this reader's cached values.
    fn cache_key(&self) -> &ReaderKey;

    /// Number of documents, which is also the length of every value array
    /// computed for this reader.
    fn max_doc(&self) -> usize;

    /// Enumerates the terms of `field`. A field without terms yields an empty
    /// enumeration.
    fn terms(&self, field: &str) -> Result<Box<dyn TermsEnum + '_>>;
}
