//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std::collections::BTreeSet;
use std::ops::Range;

use crate::binary::parser;
use crate::date;
use crate::error::{Error, Result};
use crate::format::{HEADER_SIZE, HEADER_VERSION_00, TRAILER_SIZE, OffsetTable};
use crate::tree::{Document, NodeId};

#[derive(Clone, Eq, PartialEq, Debug)]
struct Metadata {
    offset_table: OffsetTable,
    object_reference_size: usize,
    top_object_index: usize,
    object_table_range: Range<usize>,
}

impl Metadata {
    fn offset_of(&self, object: usize) -> Result<usize> {
        self.offset_table.get(object).copied().ok_or(Error::MalformedInput)
    }
}

#[derive(Debug)]
struct ObjectTable<'a> {
    input: &'a [u8],
    metadata: Metadata,
}

enum Kind {
    Null,
    Boolean,
    UInt,
    Real,
    Date,
    Data,
    AsciiString,
    Utf16String,
    Array,
    Dictionary,
}

impl<'a> ObjectTable<'a> {
    fn data_for(&self, object: usize) -> Result<&'a [u8]> {
        let offset = self.metadata.offset_of(object)?;
        if !self.metadata.object_table_range.contains(&offset) {
            return Err(Error::MalformedInput);
        }
        Ok(&self.input[offset..])
    }

    fn kind_of(&self, object: usize) -> Result<Kind> {
        let data = self.data_for(object)?;
        let (_, (type_nibble, info)) =
            parser::object::any_marker(data).map_err(|_| Error::MalformedInput)?;
        use crate::format::{type_nibble as tn, singleton_info};
        match type_nibble {
            v if v == tn::SINGLETON && info == singleton_info::NULL => Ok(Kind::Null),
            v if v == tn::SINGLETON && (info == singleton_info::TRUE || info == singleton_info::FALSE) => Ok(Kind::Boolean),
            v if v == tn::UINT => Ok(Kind::UInt),
            v if v == tn::REAL => Ok(Kind::Real),
            v if v == tn::DATE => Ok(Kind::Date),
            v if v == tn::DATA => Ok(Kind::Data),
            v if v == tn::ASCII_STRING => Ok(Kind::AsciiString),
            v if v == tn::UTF16_STRING => Ok(Kind::Utf16String),
            v if v == tn::ARRAY => Ok(Kind::Array),
            v if v == tn::DICTIONARY => Ok(Kind::Dictionary),
            _ => Err(Error::MalformedInput),
        }
    }

    fn parse_boolean(&self, object: usize) -> Result<bool> {
        let data = self.data_for(object)?;
        parser::object::boolean(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_uint(&self, object: usize) -> Result<u64> {
        let data = self.data_for(object)?;
        parser::object::uint(data).map(|(_, v)| v).map_err(|_| Error::Overflow)
    }

    fn parse_real(&self, object: usize) -> Result<f64> {
        let data = self.data_for(object)?;
        parser::object::real(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_date(&self, object: usize) -> Result<f64> {
        let data = self.data_for(object)?;
        parser::object::date(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_data(&self, object: usize) -> Result<&'a [u8]> {
        let data = self.data_for(object)?;
        parser::object::data(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_ascii_string(&self, object: usize) -> Result<&'a str> {
        let data = self.data_for(object)?;
        parser::object::ascii_string(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_utf16_string(&self, object: usize) -> Result<String> {
        let data = self.data_for(object)?;
        parser::object::utf16_string(data).map(|(_, v)| v).map_err(|_| Error::MalformedInput)
    }

    fn parse_array(&self, object: usize) -> Result<Vec<usize>> {
        let data = self.data_for(object)?;
        parser::object::array(self.metadata.object_reference_size)(data)
            .map(|(_, v)| v)
            .map_err(|_| Error::MalformedInput)
    }

    fn parse_dictionary(&self, object: usize) -> Result<Vec<(usize, usize)>> {
        let data = self.data_for(object)?;
        parser::object::dictionary(self.metadata.object_reference_size)(data)
            .map(|(_, v)| v)
            .map_err(|_| Error::MalformedInput)
    }
}

fn parse_metadata(input: &[u8]) -> Result<Metadata> {
    if input.len() < HEADER_SIZE + 2 + TRAILER_SIZE {
        return Err(Error::Eof);
    }

    let header_slice = &input[0..HEADER_SIZE];
    let (_, header) = parser::document::header(header_slice).map_err(|_| Error::MalformedInput)?;
    if header.version != HEADER_VERSION_00 {
        return Err(Error::MalformedInput);
    }

    let trailer_slice = &input[input.len() - TRAILER_SIZE..];
    let (_, trailer) = parser::document::trailer(trailer_slice).map_err(|_| Error::MalformedInput)?;
    if trailer.top_object_index >= trailer.number_of_objects {
        return Err(Error::MalformedInput);
    }

    let offset_table_start = trailer.offset_table_offset;
    let offset_table_length = trailer.number_of_objects * trailer.offset_table_entry_size;
    if offset_table_start + offset_table_length > input.len() - TRAILER_SIZE {
        return Err(Error::MalformedInput);
    }

    let offset_table_slice = &input[offset_table_start..offset_table_start + offset_table_length];
    let (_, offset_table) = parser::document::offset_table(
        trailer.number_of_objects,
        trailer.offset_table_entry_size,
    )(offset_table_slice)
    .map_err(|_| Error::MalformedInput)?;

    log::trace!("decoded bplist metadata: {} objects, ref size {}", trailer.number_of_objects, trailer.object_reference_size);

    Ok(Metadata {
        offset_table,
        object_reference_size: trailer.object_reference_size,
        top_object_index: trailer.top_object_index,
        object_table_range: HEADER_SIZE..offset_table_start,
    })
}

struct Builder<'a> {
    object_table: ObjectTable<'a>,
    collection_stack: BTreeSet<usize>,
}

impl<'a> Builder<'a> {
    fn materialize(&mut self, doc: &mut Document, object: usize) -> Result<NodeId> {
        log::trace!("materializing object {}", object);
        match self.object_table.kind_of(object)? {
            // The value model has no representation for CFNull; a document
            // that references one as a live object is rejected rather than
            // silently coerced to some other type.
            Kind::Null => Err(Error::MalformedInput),
            Kind::Boolean => Ok(doc.new_boolean(self.object_table.parse_boolean(object)?)),
            Kind::UInt => Ok(doc.new_uint(self.object_table.parse_uint(object)?)),
            Kind::Real => Ok(doc.new_real(self.object_table.parse_real(object)?)),
            Kind::Date => {
                let seconds = self.object_table.parse_date(object)?;
                let value = date::from_wire_seconds(seconds)?;
                Ok(doc.new_date(value.sec, value.usec))
            }
            Kind::Data => Ok(doc.new_data(self.object_table.parse_data(object)?.to_vec())),
            Kind::AsciiString => Ok(doc.new_string(self.object_table.parse_ascii_string(object)?)),
            Kind::Utf16String => Ok(doc.new_string(self.object_table.parse_utf16_string(object)?)),
            Kind::Array => {
                if !self.collection_stack.insert(object) {
                    return Err(Error::MalformedInput);
                }
                let references = self.object_table.parse_array(object)?;
                let array = doc.new_array();
                for reference in references {
                    let child = self.materialize(doc, reference)?;
                    doc.array_append(array, child).expect("freshly built node is detached");
                }
                self.collection_stack.remove(&object);
                Ok(array)
            }
            Kind::Dictionary => {
                if !self.collection_stack.insert(object) {
                    return Err(Error::MalformedInput);
                }
                let pairs = self.object_table.parse_dictionary(object)?;
                let dict = doc.new_dict();
                for (key_ref, value_ref) in pairs {
                    if !matches!(self.object_table.kind_of(key_ref)?, Kind::AsciiString | Kind::Utf16String) {
                        self.collection_stack.remove(&object);
                        return Err(Error::MalformedInput);
                    }
                    let key = match self.object_table.kind_of(key_ref)? {
                        Kind::AsciiString => self.object_table.parse_ascii_string(key_ref)?.to_string(),
                        _ => self.object_table.parse_utf16_string(key_ref)?,
                    };
                    let value = self.materialize(doc, value_ref)?;
                    if doc.dict_insert(dict, &key, value).is_err() {
                        self.collection_stack.remove(&object);
                        return Err(Error::MalformedInput);
                    }
                }
                self.collection_stack.remove(&object);
                Ok(dict)
            }
        }
    }
}

/// Decodes a binary property list document, returning the fresh [`Document`]
/// it was materialized into along with the id of its top-level node.
///
/// On failure, no partial document is returned; the caller sees only the
/// `Err`.
pub fn from_bin(input: &[u8]) -> Result<(Document, NodeId)> {
    let metadata = parse_metadata(input)?;
    let top_object_index = metadata.top_object_index;
    let mut builder = Builder {
        object_table: ObjectTable { input, metadata },
        collection_stack: BTreeSet::new(),
    };

    let mut doc = Document::new();
    match builder.materialize(&mut doc, top_object_index) {
        Ok(root) => Ok((doc, root)),
        Err(err) => {
            log::debug!("rejecting malformed bplist document: {}", err);
            Err(err)
        }
    }
}
