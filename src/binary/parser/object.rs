//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use ascii::{AsciiStr, AsAsciiStrError};
use nom::{
    IResult,
    bytes::complete::take,
    combinator::{map, map_res, verify},
    multi::many_m_n,
    number::complete::{be_u16, be_f32, be_f64},
};

use std::convert::TryFrom;
use std::string::FromUtf16Error;

use crate::binary::parser::utils::{be_u64_n, be_usize_n};
use crate::format::{self, type_nibble, singleton_info, EXTENDED_LENGTH_INFO};

/// Returns a parser which consumes a marker byte whose high nibble matches
/// `expected_type`. On success, yields the low (info) nibble.
fn marker(
    expected_type: u8
) -> impl Fn(&[u8]) -> IResult<&[u8], u8> {
    move |input: &[u8]| {
        map(
            verify(take(1usize), move |b: &[u8]| -> bool {
                (b[0] >> 4) == expected_type
            }),
            move |b: &[u8]| -> u8 { b[0] & 0x0F }
        )(input)
    }
}

/// Parses a marker byte and returns both the type nibble and the info nibble.
pub fn any_marker(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
    map(take(1usize), |b: &[u8]| (b[0] >> 4, b[0] & 0x0F))(input)
}

/// Parses a `null` singleton object.
pub fn null(input: &[u8]) -> IResult<&[u8], ()> {
    map(
        verify(marker(type_nibble::SINGLETON), |info| *info == singleton_info::NULL),
        |_| ()
    )(input)
}

/// Parses a boolean singleton object.
pub fn boolean(input: &[u8]) -> IResult<&[u8], bool> {
    map(
        verify(marker(type_nibble::SINGLETON), |info| {
            *info == singleton_info::FALSE || *info == singleton_info::TRUE
        }),
        |info| info == singleton_info::TRUE
    )(input)
}

/// Parses a fill singleton object, represented as a unit type.
pub fn fill(input: &[u8]) -> IResult<&[u8], ()> {
    map(
        verify(marker(type_nibble::SINGLETON), |info| *info == singleton_info::FILL),
        |_| ()
    )(input)
}

/// Parses a complete UInt record (marker plus big-endian payload of the
/// width the info nibble's `log2` encodes) and returns the decoded value as
/// a `u64`. Values with a true magnitude too large for 64 bits (the 16-byte
/// payload form, or a sign-extended 8-byte negative) are out of scope for
/// the in-memory model and surfaced to callers as a parse failure, which the
/// caller maps to `Error::Overflow`.
pub fn uint(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, info) = marker(type_nibble::UINT)(input)?;
    let width = format::log2_to_width(info).ok_or_else(|| {
        nom::Err::Failure((input, nom::error::ErrorKind::Verify))
    })?;
    if width > 8 {
        // 16-byte UInt payloads are parsed as two 8-byte big-endian halves;
        // only the low half may be nonzero to fit in a u64.
        let (input, high) = be_u64_n(8)(input)?;
        let (input, low) = be_u64_n(8)(input)?;
        if high != 0 {
            return Err(nom::Err::Failure((input, nom::error::ErrorKind::Verify)));
        }
        Ok((input, low))
    } else {
        be_u64_n(width)(input)
    }
}

/// Parses a complete Real record and returns the decoded value as an `f64`.
pub fn real(input: &[u8]) -> IResult<&[u8], f64> {
    let (after_marker, info) = marker(type_nibble::REAL)(input)?;
    match format::log2_to_width(info) {
        Some(4) => map(be_f32, |v| v as f64)(after_marker),
        Some(8) => be_f64(after_marker),
        _ => Err(nom::Err::Failure((input, nom::error::ErrorKind::Verify))),
    }
}

/// Parses a Date record and returns the CFAbsoluteTime value as an `f64`.
pub fn date(input: &[u8]) -> IResult<&[u8], f64> {
    let (input, _) = marker(type_nibble::DATE)(input)?;
    be_f64(input)
}

/// Returns a parser for the length of a variable-length object's payload,
/// given the info nibble found in its marker byte.
fn payload_count(
    info: u8,
) -> impl Fn(&[u8]) -> IResult<&[u8], usize> {
    move |input: &[u8]| {
        if info == EXTENDED_LENGTH_INFO {
            map_res(uint, usize::try_from)(input)
        } else {
            Ok((input, info as usize))
        }
    }
}

/// Parses a variable-length data object and returns the corresponding slice of the input.
pub fn data(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, info) = marker(type_nibble::DATA)(input)?;
    let (input, length) = payload_count(info)(input)?;
    take(length)(input)
}

/// Parses a variable-length ASCII string object and returns a borrowed string slice.
pub fn ascii_string(input: &[u8]) -> IResult<&[u8], &str> {
    let (input, info) = marker(type_nibble::ASCII_STRING)(input)?;
    let (input, char_count) = payload_count(info)(input)?;
    map_res(
        take(char_count),
        |bytes| -> Result<&str, AsAsciiStrError> {
            AsciiStr::from_ascii(bytes).map(|value| value.as_str())
        }
    )(input)
}

/// Parses a variable-length UTF-16 string object and returns an owned string.
pub fn utf16_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, info) = marker(type_nibble::UTF16_STRING)(input)?;
    let (input, char_count) = payload_count(info)(input)?;
    map_res(
        many_m_n(char_count, char_count, be_u16),
        |code_points| -> Result<String, FromUtf16Error> {
            String::from_utf16(&code_points)
        }
    )(input)
}

/// Returns a parser for an array with the specified-width object references.
pub fn array(
    object_reference_size: usize
) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<usize>> {
    assert!(object_reference_size >= 1 && object_reference_size <= 8);
    move |input: &[u8]| {
        let (input, info) = marker(type_nibble::ARRAY)(input)?;
        let (input, length) = payload_count(info)(input)?;
        many_m_n(length, length, be_usize_n(object_reference_size))(input)
    }
}

/// Returns a parser for a dictionary with the specified-width key and value references.
/// Yields a list of `(key_reference, value_reference)` pairs.
pub fn dictionary(
    object_reference_size: usize
) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<(usize, usize)>> {
    assert!(object_reference_size >= 1 && object_reference_size <= 8);
    move |input: &[u8]| {
        let (input, info) = marker(type_nibble::DICTIONARY)(input)?;
        let (input, entry_count) = payload_count(info)(input)?;
        let (input, mut keys) = many_m_n(entry_count, entry_count, be_usize_n(object_reference_size))(input)?;
        let (input, mut values) = many_m_n(entry_count, entry_count, be_usize_n(object_reference_size))(input)?;
        let pairs = keys.drain(..).zip(values.drain(..)).collect();
        Ok((input, pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean() {
        let test_input = &[0b0000_1000, 0b0000_1001];
        assert_eq!(boolean(&test_input[0..1]), Ok((&test_input[1..1], false)));
        assert_eq!(boolean(&test_input[1..2]), Ok((&test_input[2..2], true)));
    }

    #[test]
    fn test_uint_widths() {
        let one_byte = &[0b0001_0000, 0xFF];
        assert_eq!(uint(one_byte), Ok((&one_byte[2..], 255u64)));

        let two_byte = &[0b0001_0001, 0xFF, 0xFF];
        assert_eq!(uint(two_byte), Ok((&two_byte[3..], 65535u64)));

        let eight_byte = &[0b0001_0011, 0, 0, 0, 0, 0, 0, 0x01, 0xFF];
        assert_eq!(uint(eight_byte), Ok((&eight_byte[9..], 511u64)));
    }

    #[test]
    fn test_real_widths() {
        let f32_bytes = &[0b0010_0010, 0xC0, 0x20, 0x00, 0x00];
        assert_eq!(real(f32_bytes), Ok((&f32_bytes[5..], -2.5f64)));

        let f64_bytes = &[0b0010_0011, 0xC0, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(real(f64_bytes), Ok((&f64_bytes[9..], -2.5f64)));
    }

    #[test]
    fn test_date() {
        let test_input = &[0b0011_0011, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(date(test_input), Ok((&test_input[9..], 0.0)));
    }

    #[test]
    fn test_data() {
        let test_input = &[0b0100_0000];
        assert_eq!(data(test_input), Ok((&test_input[1..1], &test_input[1..1])));

        let test_input = &[0b0100_1111, 0b0001_0000, 0b0000_0001, 0x0F];
        assert_eq!(data(test_input), Ok((&test_input[4..], &test_input[3..4])));
    }

    #[test]
    fn test_ascii_string() {
        let test_input = &[0b0101_0101, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        assert_eq!(ascii_string(test_input), Ok((&test_input[6..], "Hello")));
    }

    #[test]
    fn test_ascii_string_invalid() {
        let test_input = &[0b0101_0001, 0x80];
        assert!(ascii_string(test_input).is_err());
    }

    #[test]
    fn test_utf16_string() {
        let test_input = &[0b0110_0101, 0x00, 0x48, 0x00, 0x65, 0x00, 0x6c, 0x00, 0x6c, 0x00, 0x6f];
        assert_eq!(utf16_string(test_input), Ok((&test_input[11..], String::from("Hello"))));
    }

    #[test]
    fn test_array() {
        let test_input = &[0b1010_0100, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03];
        assert_eq!(array(2)(test_input), Ok((&test_input[9..], vec![0, 1, 2, 3])));
    }

    #[test]
    fn test_dictionary() {
        let test_input = &[0b1101_0010, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03];
        assert_eq!(dictionary(2)(test_input), Ok((&test_input[9..], vec![(0, 2), (1, 3)])));
    }
}
