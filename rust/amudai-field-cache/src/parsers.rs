//! Decoding strategies that turn term text into typed per-document values.
//!
//! A strategy is identified by its instance: two entries of the cache share a
//! value only if they were requested with the same parser object (or both
//! without one). The shared default and prefix-coded parsers below are
//! process-wide singletons so that their identity is stable.

use std::{
    fmt,
    marker::PhantomData,
    str::FromStr,
    sync::{Arc, LazyLock},
};

use amudai_common::{Result, error::Error};
use amudai_numeric_prefix as prefix;

/// Outcome of decoding a single term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded<T> {
    /// The decoded value of the term.
    Value(T),
    /// Stop scanning the field. Values filled so far are kept, and the
    /// remaining documents keep the default value.
    StopFill,
}

/// Common, type-independent part of a decoding strategy.
pub trait Parser: fmt::Debug + Send + Sync {
    /// Short human-readable name, used in diagnostics.
    fn name(&self) -> &str;
}

/// Decodes term text into values of type `T`.
///
/// A term that cannot be decoded is reported as a number-format error
/// ([`Error::number_format`]); callers without an explicit parser rely on it
/// to fall back from plain decimal text to prefix-coded terms.
pub trait FieldParser<T>: Parser {
    fn parse(&self, term: &str) -> Result<Decoded<T>>;
}

/// Plain decimal text, decoded with the standard `FromStr` implementation of
/// the target type.
pub struct DecimalParser<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DecimalParser<T> {
    pub const fn new(name: &'static str) -> Self {
        DecimalParser {
            name,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DecimalParser<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecimalParser").field(&self.name).finish()
    }
}

impl<T> Parser for DecimalParser<T> {
    fn name(&self) -> &str {
        self.name
    }
}

impl<T: FromStr> FieldParser<T> for DecimalParser<T> {
    fn parse(&self, term: &str) -> Result<Decoded<T>> {
        term.parse::<T>()
            .map(Decoded::Value)
            .map_err(|_| Error::number_format(term, self.name))
    }
}

/// Full-precision 32-bit prefix-coded terms, decoded as `i32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixCodedIntParser;

/// Full-precision 32-bit prefix-coded terms, decoded as sortable `f32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixCodedFloatParser;

/// Full-precision 64-bit prefix-coded terms, decoded as `i64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixCodedLongParser;

/// Full-precision 64-bit prefix-coded terms, decoded as sortable `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixCodedDoubleParser;

impl Parser for PrefixCodedIntParser {
    fn name(&self) -> &str {
        "prefix-coded-i32"
    }
}

impl FieldParser<i32> for PrefixCodedIntParser {
    fn parse(&self, term: &str) -> Result<Decoded<i32>> {
        // Lower-precision terms sort after all full-precision ones.
        if prefix::int_shift(term)? > 0 {
            return Ok(Decoded::StopFill);
        }
        prefix::prefix_coded_to_int(term).map(Decoded::Value)
    }
}

impl Parser for PrefixCodedFloatParser {
    fn name(&self) -> &str {
        "prefix-coded-f32"
    }
}

impl FieldParser<f32> for PrefixCodedFloatParser {
    fn parse(&self, term: &str) -> Result<Decoded<f32>> {
        if prefix::int_shift(term)? > 0 {
            return Ok(Decoded::StopFill);
        }
        prefix::prefix_coded_to_int(term)
            .map(|bits| Decoded::Value(prefix::sortable_int_to_float(bits)))
    }
}

impl Parser for PrefixCodedLongParser {
    fn name(&self) -> &str {
        "prefix-coded-i64"
    }
}

impl FieldParser<i64> for PrefixCodedLongParser {
    fn parse(&self, term: &str) -> Result<Decoded<i64>> {
        if prefix::long_shift(term)? > 0 {
            return Ok(Decoded::StopFill);
        }
        prefix::prefix_coded_to_long(term).map(Decoded::Value)
    }
}

impl Parser for PrefixCodedDoubleParser {
    fn name(&self) -> &str {
        "prefix-coded-f64"
    }
}

impl FieldParser<f64> for PrefixCodedDoubleParser {
    fn parse(&self, term: &str) -> Result<Decoded<f64>> {
        if prefix::long_shift(term)? > 0 {
            return Ok(Decoded::StopFill);
        }
        prefix::prefix_coded_to_long(term)
            .map(|bits| Decoded::Value(prefix::sortable_long_to_double(bits)))
    }
}

/// A parser backed by a closure.
pub struct FnParser<T, F> {
    name: String,
    parse: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> fmt::Debug for FnParser<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnParser").field(&self.name).finish()
    }
}

impl<T, F> Parser for FnParser<T, F>
where
    F: Fn(&str) -> Result<Decoded<T>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }
}

impl<T, F> FieldParser<T> for FnParser<T, F>
where
    F: Fn(&str) -> Result<Decoded<T>> + Send + Sync,
{
    fn parse(&self, term: &str) -> Result<Decoded<T>> {
        (self.parse)(term)
    }
}

/// Wraps `parse` into a shareable parser. Every call creates a new strategy
/// identity; keep the returned `Arc` around to hit the same cache entry again.
pub fn parser_fn<T, F>(name: impl Into<String>, parse: F) -> Arc<dyn FieldParser<T>>
where
    T: 'static,
    F: Fn(&str) -> Result<Decoded<T>> + Send + Sync + 'static,
{
    Arc::new(FnParser {
        name: name.into(),
        parse,
        _marker: PhantomData,
    })
}

macro_rules! shared_parser {
    ($(#[$doc:meta])* $fn_name:ident, $ty:ty, $init:expr) => {
        $(#[$doc])*
        pub fn $fn_name() -> Arc<dyn FieldParser<$ty>> {
            static PARSER: LazyLock<Arc<dyn FieldParser<$ty>>> =
                LazyLock::new(|| -> Arc<dyn FieldParser<$ty>> { Arc::new($init) });
            Arc::clone(&PARSER)
        }
    };
}

shared_parser!(
    /// Decimal text as `i8`.
    default_byte_parser, i8, DecimalParser::<i8>::new("i8")
);
shared_parser!(
    /// Decimal text as `i16`.
    default_short_parser, i16, DecimalParser::<i16>::new("i16")
);
shared_parser!(
    /// Decimal text as `i32`.
    default_int_parser, i32, DecimalParser::<i32>::new("i32")
);
shared_parser!(
    /// Decimal text as `f32`.
    default_float_parser, f32, DecimalParser::<f32>::new("f32")
);
shared_parser!(
    /// Decimal text as `i64`.
    default_long_parser, i64, DecimalParser::<i64>::new("i64")
);
shared_parser!(
    /// Decimal text as `f64`.
    default_double_parser, f64, DecimalParser::<f64>::new("f64")
);
shared_parser!(prefix_coded_int_parser, i32, PrefixCodedIntParser);
shared_parser!(prefix_coded_float_parser, f32, PrefixCodedFloatParser);
shared_parser!(prefix_coded_long_parser, i64, PrefixCodedLongParser);
shared_parser!(prefix_coded_double_parser, f64, PrefixCodedDoubleParser);
