//! Prefix-coded numeric terms.
//!
//! Numeric fields that support range queries index every value several times,
//! at decreasing precision. Each indexed term is the value with its lowest
//! `shift` bits dropped, written as a shift marker character followed by
//! 7-bit digits (most significant first). The sign bit is flipped so that the
//! lexicographic order of the terms matches the numeric order of the values.
//!
//! All characters of an encoded term are in `0x00..=0x7f`, so an encoded term
//! is always a valid (ASCII) `str`.
//!
//! Full-precision terms (`shift == 0`) sort before all lower-precision terms of
//! the same field, which is what lets a decoder stop at the first term with a
//! non-zero shift.

use amudai_common::{Result, error::Error};

/// Marker added to the shift of a 64-bit encoded value.
pub const SHIFT_START_LONG: u8 = 0x20;

/// Marker added to the shift of a 32-bit encoded value.
pub const SHIFT_START_INT: u8 = 0x60;

/// Maximum length of an encoded 64-bit value.
pub const BUF_SIZE_LONG: usize = 63 / 7 + 2;

/// Maximum length of an encoded 32-bit value.
pub const BUF_SIZE_INT: usize = 31 / 7 + 2;

/// Encodes `value` with its lowest `shift` bits dropped.
///
/// # Panics
///
/// Panics if `shift > 63`.
pub fn long_to_prefix_coded(value: i64, shift: u32) -> String {
    assert!(shift <= 63, "shift must be in 0..=63, got {shift}");
    let sortable = ((value as u64) ^ 0x8000_0000_0000_0000) >> shift;
    encode(SHIFT_START_LONG + shift as u8, sortable, (63 - shift as usize) / 7 + 1)
}

/// Encodes `value` with its lowest `shift` bits dropped.
///
/// # Panics
///
/// Panics if `shift > 31`.
pub fn int_to_prefix_coded(value: i32, shift: u32) -> String {
    assert!(shift <= 31, "shift must be in 0..=31, got {shift}");
    let sortable = (((value as u32) ^ 0x8000_0000) >> shift) as u64;
    encode(SHIFT_START_INT + shift as u8, sortable, (31 - shift as usize) / 7 + 1)
}

fn encode(marker: u8, mut sortable: u64, digits: usize) -> String {
    let mut buf = vec![0u8; digits + 1];
    buf[0] = marker;
    for slot in buf[1..].iter_mut().rev() {
        *slot = (sortable & 0x7f) as u8;
        sortable >>= 7;
    }
    // Every byte is below 0x80.
    buf.into_iter().map(char::from).collect()
}

/// Returns the shift stored in a 64-bit encoded term, without validating the
/// remaining characters.
pub fn long_shift(term: &str) -> Result<u32> {
    shift_of(term, SHIFT_START_LONG, 63, "i64")
}

/// Returns the shift stored in a 32-bit encoded term, without validating the
/// remaining characters.
pub fn int_shift(term: &str) -> Result<u32> {
    shift_of(term, SHIFT_START_INT, 31, "i32")
}

fn shift_of(term: &str, marker: u8, max_shift: u32, target: &'static str) -> Result<u32> {
    let first = *term
        .as_bytes()
        .first()
        .ok_or_else(|| Error::number_format(term, target))?;
    match first.checked_sub(marker) {
        Some(shift) if u32::from(shift) <= max_shift => Ok(u32::from(shift)),
        _ => Err(Error::number_format(term, target)),
    }
}

/// Decodes a 64-bit prefix-coded term. Dropped low bits come back as zeros.
pub fn prefix_coded_to_long(term: &str) -> Result<i64> {
    let shift = long_shift(term)?;
    let bits = decode_digits(term, "i64")?;
    Ok(((bits << shift) ^ 0x8000_0000_0000_0000) as i64)
}

/// Decodes a 32-bit prefix-coded term. Dropped low bits come back as zeros.
pub fn prefix_coded_to_int(term: &str) -> Result<i32> {
    let shift = int_shift(term)?;
    let bits = decode_digits(term, "i32")? as u32;
    Ok(((bits << shift) ^ 0x8000_0000) as i32)
}

fn decode_digits(term: &str, target: &'static str) -> Result<u64> {
    let mut bits = 0u64;
    for &ch in &term.as_bytes()[1..] {
        if ch > 0x7f {
            return Err(Error::number_format(term, target));
        }
        bits = (bits << 7) | u64::from(ch);
    }
    Ok(bits)
}

/// Maps a `f64` to an `i64` whose natural order matches the order of the
/// floating point values.
pub fn double_to_sortable_long(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    if bits < 0 {
        bits ^ 0x7fff_ffff_ffff_ffff
    } else {
        bits
    }
}

/// Inverse of [`double_to_sortable_long`].
pub fn sortable_long_to_double(value: i64) -> f64 {
    let bits = if value < 0 {
        value ^ 0x7fff_ffff_ffff_ffff
    } else {
        value
    };
    f64::from_bits(bits as u64)
}

/// Maps a `f32` to an `i32` whose natural order matches the order of the
/// floating point values.
pub fn float_to_sortable_int(value: f32) -> i32 {
    let bits = value.to_bits() as i32;
    if bits < 0 { bits ^ 0x7fff_ffff } else { bits }
}

/// Inverse of [`float_to_sortable_int`].
pub fn sortable_int_to_float(value: i32) -> f32 {
    let bits = if value < 0 { value ^ 0x7fff_ffff } else { value };
    f32::from_bits(bits as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip_full_precision() {
        for value in [0, 1, -1, 10, -10, i32::MIN, i32::MAX, 123_456_789] {
            let coded = int_to_prefix_coded(value, 0);
            assert_eq!(coded.len(), BUF_SIZE_INT);
            assert_eq!(int_shift(&coded).unwrap(), 0);
            assert_eq!(prefix_coded_to_int(&coded).unwrap(), value);
        }
    }

    #[test]
    fn test_long_round_trip_full_precision() {
        for value in [0, 1, -1, i64::MIN, i64::MAX, 1 << 40, -(1 << 33)] {
            let coded = long_to_prefix_coded(value, 0);
            assert_eq!(coded.len(), BUF_SIZE_LONG);
            assert_eq!(prefix_coded_to_long(&coded).unwrap(), value);
        }
    }

    #[test]
    fn test_shifted_values_drop_low_bits() {
        let coded = int_to_prefix_coded(0x1234_5678, 8);
        assert_eq!(int_shift(&coded).unwrap(), 8);
        assert_eq!(prefix_coded_to_int(&coded).unwrap(), 0x1234_5600);

        let coded = long_to_prefix_coded(-1, 16);
        assert_eq!(prefix_coded_to_long(&coded).unwrap(), -1 << 16);
    }

    #[test]
    fn test_encoded_order_matches_numeric_order() {
        let mut values: Vec<i32> = (0..500).map(|_| fastrand::i32(..)).collect();
        values.sort_unstable();
        let coded: Vec<String> = values.iter().map(|&v| int_to_prefix_coded(v, 0)).collect();
        assert!(coded.windows(2).all(|w| w[0] <= w[1]));

        let mut values: Vec<i64> = (0..500).map(|_| fastrand::i64(..)).collect();
        values.sort_unstable();
        let coded: Vec<String> = values.iter().map(|&v| long_to_prefix_coded(v, 0)).collect();
        assert!(coded.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_full_precision_sorts_before_lower_precision() {
        let full = int_to_prefix_coded(i32::MAX, 0);
        let shifted = int_to_prefix_coded(i32::MIN, 4);
        assert!(full < shifted);
    }

    #[test]
    fn test_invalid_terms() {
        assert!(prefix_coded_to_int("").unwrap_err().is_number_format());
        assert!(prefix_coded_to_int("10").unwrap_err().is_number_format());
        assert!(prefix_coded_to_long("abc").unwrap_err().is_number_format());
        // A 64-bit term is not a valid 32-bit term.
        let coded = long_to_prefix_coded(5, 0);
        assert!(prefix_coded_to_int(&coded).is_err());
    }

    #[test]
    fn test_sortable_floats() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-300, 3.25, f64::INFINITY];
        let sortable: Vec<i64> = values.iter().map(|&v| double_to_sortable_long(v)).collect();
        assert!(sortable.windows(2).all(|w| w[0] < w[1]));
        for (&v, &s) in values.iter().zip(&sortable) {
            assert_eq!(sortable_long_to_double(s).to_bits(), v.to_bits());
        }

        let values = [f32::MIN, -1.5f32, 0.0, 7.75, f32::MAX];
        for v in values {
            assert_eq!(sortable_int_to_float(float_to_sortable_int(v)), v);
        }
        assert!(float_to_sortable_int(-1.5) < float_to_sortable_int(0.5));
    }
}
