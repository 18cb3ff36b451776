//! Fixed-width big-endian integer and bit-string conversions.
//!
//! Numeric encoders never fail on out-of-range input: malformed widths are
//! frequently the point of a test case, so values are wrapped modulo
//! `2^(8 * width)` and a warning is logged instead.

use slog::{Logger, warn};
use thiserror::Error;

/// Widest integer the codec can represent natively.
pub const MAX_NATIVE_WIDTH: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Strict encoding was requested and the value does not fit.
    #[error("value {value} does not fit in {width} byte(s)")]
    Overflow { value: u128, width: usize },

    /// Bit strings must describe whole octets.
    #[error("bit string length {0} is not a multiple of 8")]
    BitLength(usize),

    #[error("invalid character {0:?} in bit string, expected '0' or '1'")]
    InvalidBit(char),

    /// The byte slice carries significant data beyond 128 bits.
    #[error("cannot decode {0} significant bytes into a 128-bit integer")]
    TooWide(usize),
}

/// Reduces `value` modulo `2^(8 * width)`.
///
/// Returns the reduced value and whether any reduction happened.
pub fn wrap_uint(value: u128, width: usize) -> (u128, bool) {
    if width >= MAX_NATIVE_WIDTH {
        return (value, false);
    }
    let mask = (1u128 << (8 * width)) - 1;
    let wrapped = value & mask;
    (wrapped, wrapped != value)
}

/// Big-endian bytes of `value` in exactly `width` bytes, wrapping silently.
pub fn uint_to_bytes(value: u128, width: usize) -> Vec<u8> {
    let (value, _) = wrap_uint(value, width);
    let be = value.to_be_bytes();
    if width <= MAX_NATIVE_WIDTH {
        be[MAX_NATIVE_WIDTH - width..].to_vec()
    } else {
        let mut out = vec![0u8; width - MAX_NATIVE_WIDTH];
        out.extend_from_slice(&be);
        out
    }
}

/// Encodes `value` big-endian in `width` bytes, wrapping (with a warning)
/// when it does not fit.
pub fn encode_uint(value: u128, width: usize, log: &Logger) -> Vec<u8> {
    let (wrapped, overflowed) = wrap_uint(value, width);
    if overflowed {
        warn!(log, "value wrapped to field width";
            "value" => %value,
            "width" => width,
            "wrapped" => %wrapped,
        );
    }
    uint_to_bytes(wrapped, width)
}

/// Like [`encode_uint`] but refuses values that do not fit.
pub fn try_encode_uint(value: u128, width: usize) -> Result<Vec<u8>, CodecError> {
    match wrap_uint(value, width) {
        (_, true) => Err(CodecError::Overflow { value, width }),
        (wrapped, false) => Ok(uint_to_bytes(wrapped, width)),
    }
}

/// Interprets `bytes` as a big-endian unsigned integer. An empty slice is 0.
pub fn decode_uint(bytes: &[u8]) -> Result<u128, CodecError> {
    let significant = match bytes.iter().position(|b| *b != 0) {
        Some(first) => &bytes[first..],
        None => return Ok(0),
    };
    if significant.len() > MAX_NATIVE_WIDTH {
        return Err(CodecError::TooWide(significant.len()));
    }
    Ok(significant
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// Packs a list of bits, most significant first, into octets.
pub fn bits_to_bytes(bits: &[bool]) -> Result<Vec<u8>, CodecError> {
    if bits.len() % 8 != 0 {
        return Err(CodecError::BitLength(bits.len()));
    }
    Ok(pack_bits(bits))
}

/// Like [`bits_to_bytes`], zero-filling a trailing partial octet.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|octet| {
            let packed = octet
                .iter()
                .fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit));
            packed << (8 - octet.len())
        })
        .collect()
}

pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
        .collect()
}

/// Parses a string of `'0'`/`'1'` characters into a bit list.
pub fn parse_bitstring(s: &str) -> Result<Vec<bool>, CodecError> {
    s.chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(CodecError::InvalidBit(other)),
        })
        .collect()
}

pub fn bitstring_to_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    bits_to_bytes(&parse_bitstring(s)?)
}

pub fn bytes_to_bitstring(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:08b}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn logger() -> Logger {
        crate::log::discard()
    }

    #[test]
    fn encode_uint_is_big_endian_and_fixed_width() {
        assert_eq!(encode_uint(5, 2, &logger()), vec![0x00, 0x05]);
        assert_eq!(encode_uint(0x0102_0304, 4, &logger()), vec![1, 2, 3, 4]);
        assert_eq!(encode_uint(0, 0, &logger()), Vec::<u8>::new());
    }

    #[test]
    fn encode_uint_wraps_out_of_range_values() {
        assert_eq!(encode_uint(0x1_0005, 2, &logger()), vec![0x00, 0x05]);
        assert_eq!(encode_uint(256, 1, &logger()), vec![0x00]);
        assert_eq!(wrap_uint(300, 1), (44, true));
        assert_eq!(wrap_uint(u128::MAX, 16), (u128::MAX, false));
    }

    #[test]
    fn strict_encoding_rejects_overflow() {
        assert_eq!(
            try_encode_uint(70000, 2),
            Err(CodecError::Overflow {
                value: 70000,
                width: 2
            })
        );
        assert_eq!(try_encode_uint(65535, 2), Ok(vec![0xff, 0xff]));
    }

    #[test]
    fn widths_beyond_native_are_zero_padded() {
        let bytes = uint_to_bytes(1, 18);
        assert_eq!(bytes.len(), 18);
        assert_eq!(bytes[17], 1);
        assert!(bytes[..17].iter().all(|b| *b == 0));
        assert_eq!(decode_uint(&bytes), Ok(1));
    }

    #[test]
    fn decode_uint_reads_big_endian() {
        assert_eq!(decode_uint(&[0x00, 0x0a]), Ok(10));
        assert_eq!(decode_uint(&[]), Ok(0));
        assert_eq!(decode_uint(&[0xff; 17]), Err(CodecError::TooWide(17)));
    }

    #[test]
    fn bitstrings_convert_in_both_directions() {
        assert_eq!(bitstring_to_bytes("0100000010000001"), Ok(vec![0x40, 0x81]));
        assert_eq!(bytes_to_bitstring(&[0x40, 0x81]), "0100000010000001");
        assert!(bytes_to_bits(&[0x80])[0]);
        assert_eq!(pack_bits(&[true, true]), vec![0xc0]);
    }

    #[test]
    fn bitstrings_must_be_whole_octets_of_binary_digits() {
        assert_eq!(bitstring_to_bytes("0101"), Err(CodecError::BitLength(4)));
        assert_eq!(
            bitstring_to_bytes("0101010x"),
            Err(CodecError::InvalidBit('x'))
        );
    }
}
