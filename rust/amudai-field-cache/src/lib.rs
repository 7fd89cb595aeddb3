//! Per-document field value cache for inverted indexes.
//!
//! Sorting and scoring need random access to one value of a field per
//! document, while an inverted index stores the opposite mapping: terms to
//! documents. The [`FieldCache`] builds the per-document arrays by walking
//! all terms of a field once, and keeps them for as long as the reader they
//! were built from is alive.
//!
//! # Overview
//!
//! - Values are keyed by reader, field and [`parsers::FieldParser`]. The
//!   reader is held weakly through its [`ReaderKey`], so dropping a reader
//!   makes its values unreachable without an explicit [`FieldCache::purge`].
//! - Each key is computed at most once: concurrent callers wait for the
//!   computation started first.
//! - Supported value types are listed in [`ValueType`]. Numeric fields can be
//!   indexed as decimal text or prefix-coded (see `amudai_numeric_prefix`).
//! - [`FieldCache::cache_entries`] and [`FieldCache::check_sanity`] describe
//!   what is cached and flag wasteful usage. With an [`InfoSink`] configured,
//!   new problems are reported as they are created.
//!
//! # Quick Start
//!
//! ```rust
//! use amudai_field_cache::{FieldCache, MemoryIndexReader};
//!
//! let reader = MemoryIndexReader::builder(3)
//!     .add_column("price", [Some("10"), None, Some("30")])
//!     .build();
//!
//! let cache = FieldCache::new();
//! let prices = cache.get_ints(&reader, "price", None).unwrap();
//! assert_eq!(&prices[..], &[10, 0, 30]);
//! ```

mod entry;
mod field_cache;
mod intern;
mod introspection;
mod materialize;
mod memory_reader;
pub mod parsers;
mod placeholder;
mod reader;
mod sanity;
mod typed_cache;
mod values;

pub use field_cache::{FieldCache, FieldCacheOptions, global};
pub use introspection::{CacheEntryRecord, InfoSink, LogInfoSink};
pub use memory_reader::{MemoryIndexBuilder, MemoryIndexReader};
pub use reader::{IndexReader, Postings, ReaderKey, TermsEnum};
pub use sanity::{FieldCacheSanityChecker, Insanity, InsanityKind, SanityChecker};
pub use values::{CachedValue, StringIndex, ValueType};
