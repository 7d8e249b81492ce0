//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use nom::{
    IResult,
    bytes::complete::{take, tag},
    combinator::map,
    multi::many_m_n,
    number::complete::be_u8,
    sequence::tuple,
};

use crate::binary::parser::utils::be_usize_n;
use crate::format::{
    Header,
    OffsetTable,
    Trailer,
    HEADER_MAGIC_NUMBER,
    TRAILER_PREAMBLE_UNUSED_SIZE,
};

/// Parses a fixed-sized 8-byte header object from the input slice.
pub fn header(input: &[u8]) -> IResult<&[u8], Header> {
    map(
        tuple((
            tag(HEADER_MAGIC_NUMBER),
            be_u8,
            be_u8,
        )), |(
            _,
            version_major,
            version_minor,
        )| Header {
            version: (version_major, version_minor)
        }
    )(input)
}

/// Returns a parser for an offset table with the specified number of entries,
/// each of the specified size. Offset table entries must be between
/// 1 and 8 bytes long each, inclusive.
pub fn offset_table(
    entries: usize,
    entry_size: usize,
) -> impl Fn(&[u8]) -> IResult<&[u8], OffsetTable> {
    move |input: &[u8]| {
        many_m_n(
            entries,
            entries,
            be_usize_n(entry_size)
        )(input)
    }
}

/// Parses a fixed-sized 32-byte trailer object from the input array.
pub fn trailer(input: &[u8]) -> IResult<&[u8], Trailer> {
    map(
        tuple((
            take(TRAILER_PREAMBLE_UNUSED_SIZE),
            be_u8,
            be_usize_n(1),
            be_usize_n(1),
            be_usize_n(8),
            be_usize_n(8),
            be_usize_n(8),
        )), |(
            _,
            sort_version,
            offset_table_entry_size,
            object_reference_size,
            number_of_objects,
            top_object_index,
            offset_table_offset,
        )| Trailer {
            sort_version,
            offset_table_entry_size,
            object_reference_size,
            number_of_objects,
            top_object_index,
            offset_table_offset,
        }
    )(input)
}
