//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The Apple XML property list codec.
//!
//! This is not a byte-for-byte replica of CoreFoundation's writer and does
//! not validate input against the DTD it emits; it accepts any
//! whitespace-tolerant document using the standard element vocabulary.

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::{Error as XmlError, Reader, Writer};

use crate::date;
use crate::error::{Error, Result};
use crate::tree::{Document, NodeId, Tag};

const DOCTYPE: &str =
    "plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\"";

/// Renders `doc` rooted at `root` as an Apple-style XML property list.
/// Infallible: writing to an in-memory buffer cannot fail.
pub fn to_xml(doc: &Document, root: NodeId) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("writing to an in-memory buffer cannot fail");
    writer
        .write_event(Event::DocType(BytesText::new(DOCTYPE)))
        .expect("writing to an in-memory buffer cannot fail");

    writer
        .create_element("plist")
        .with_attribute(("version", "1.0"))
        .write_inner_content(|writer| write_value(writer, doc, root))
        .expect("writing to an in-memory buffer cannot fail");

    String::from_utf8(writer.into_inner()).expect("writer only emits UTF-8 content")
}

fn write_value(writer: &mut Writer<Vec<u8>>, doc: &Document, node: NodeId) -> std::result::Result<(), XmlError> {
    match doc.tag(node) {
        Tag::Boolean => {
            let name = if doc.get_boolean(node).expect("tag checked") { "true" } else { "false" };
            writer.create_element(name).write_empty()?;
        }
        Tag::UInt => {
            let text = doc.get_uint(node).expect("tag checked").to_string();
            writer.create_element("integer").write_text_content(BytesText::new(&text))?;
        }
        Tag::Real => {
            let text = doc.get_real(node).expect("tag checked").to_string();
            writer.create_element("real").write_text_content(BytesText::new(&text))?;
        }
        Tag::String => {
            let text = doc.get_string(node).expect("tag checked");
            writer.create_element("string").write_text_content(BytesText::new(&text))?;
        }
        Tag::Data => {
            let encoded = base64::encode(&doc.get_data(node).expect("tag checked"));
            writer.create_element("data").write_text_content(BytesText::new(&encoded))?;
        }
        Tag::Date => {
            let text = date::to_iso8601(doc.get_date(node).expect("tag checked"));
            writer.create_element("date").write_text_content(BytesText::new(&text))?;
        }
        Tag::Array => {
            let size = doc.array_size(node).expect("tag checked");
            writer.create_element("array").write_inner_content(|writer| {
                for i in 0..size {
                    let child = doc.array_get(node, i).expect("index within bounds");
                    write_value(writer, doc, child)?;
                }
                Ok::<(), XmlError>(())
            })?;
        }
        Tag::Dict => {
            writer.create_element("dict").write_inner_content(|writer| {
                let mut iter = doc.dict_new_iter(node);
                while let Some((key, value)) = doc.dict_next(node, &mut iter).expect("tag checked") {
                    writer.create_element("key").write_text_content(BytesText::new(&key))?;
                    write_value(writer, doc, value)?;
                }
                Ok::<(), XmlError>(())
            })?;
        }
        Tag::Key => unreachable!("Key nodes are reachable only through their owning dict entry"),
    }
    Ok(())
}

/// Parses an Apple-style XML property list, returning the fresh [`Document`]
/// it was built into along with the id of its top-level node.
pub fn from_xml(input: &str) -> Result<(Document, NodeId)> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut doc = Document::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|_| Error::MalformedInput)? {
            Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
            Event::Start(ref e) if e.name().as_ref() == b"plist" => break,
            Event::Eof => return Err(Error::Eof),
            _ => return Err(Error::MalformedInput),
        }
        buf.clear();
    }
    buf.clear();

    let root = read_next_value_or_end(&mut reader, &mut buf, &mut doc, b"plist")?
        .ok_or(Error::MalformedInput)?;
    buf.clear();

    loop {
        match reader.read_event_into(&mut buf).map_err(|_| Error::MalformedInput)? {
            Event::End(ref e) if e.name().as_ref() == b"plist" => break,
            Event::Comment(_) | Event::PI(_) => {}
            Event::Eof => return Err(Error::Eof),
            _ => return Err(Error::MalformedInput),
        }
        buf.clear();
    }

    Ok((doc, root))
}

/// Reads the next value element, or `None` if `end_tag`'s closing tag is
/// found first (an empty container, or an empty `<plist>`/missing `<key>`
/// value, depending on the caller).
fn read_next_value_or_end(
    reader: &mut Reader<&[u8]>,
    buf: &mut Vec<u8>,
    doc: &mut Document,
    end_tag: &[u8],
) -> Result<Option<NodeId>> {
    loop {
        match reader.read_event_into(buf).map_err(|_| Error::MalformedInput)? {
            Event::Start(ref e) => {
                let name = e.name().as_ref().to_vec();
                buf.clear();
                return Ok(Some(dispatch_start(&name, reader, buf, doc)?));
            }
            Event::Empty(ref e) => {
                let name = e.name().as_ref().to_vec();
                let id = dispatch_empty(&name, doc)?;
                buf.clear();
                return Ok(Some(id));
            }
            Event::End(ref e) if e.name().as_ref() == end_tag => return Ok(None),
            Event::Comment(_) | Event::PI(_) => {}
            Event::Eof => return Err(Error::Eof),
            _ => return Err(Error::MalformedInput),
        }
        buf.clear();
    }
}

fn dispatch_start(name: &[u8], reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, doc: &mut Document) -> Result<NodeId> {
    match name {
        b"dict" => parse_dict(reader, buf, doc),
        b"array" => parse_array(reader, buf, doc),
        b"string" => Ok(doc.new_string(read_text(reader, buf, b"string")?)),
        b"integer" => {
            let text = read_text(reader, buf, b"integer")?;
            let value: u64 = text.trim().parse().map_err(|_| Error::MalformedInput)?;
            Ok(doc.new_uint(value))
        }
        b"real" => {
            let text = read_text(reader, buf, b"real")?;
            let value: f64 = text.trim().parse().map_err(|_| Error::MalformedInput)?;
            Ok(doc.new_real(value))
        }
        b"data" => {
            let text = read_text(reader, buf, b"data")?;
            let bytes = base64::decode(text.trim()).map_err(|_| Error::MalformedInput)?;
            Ok(doc.new_data(bytes))
        }
        b"date" => {
            let text = read_text(reader, buf, b"date")?;
            let value = date::from_iso8601(text.trim())?;
            Ok(doc.new_date(value.sec, value.usec))
        }
        _ => Err(Error::MalformedInput),
    }
}

fn dispatch_empty(name: &[u8], doc: &mut Document) -> Result<NodeId> {
    match name {
        b"true" => Ok(doc.new_boolean(true)),
        b"false" => Ok(doc.new_boolean(false)),
        b"string" => Ok(doc.new_string("")),
        b"data" => Ok(doc.new_data(Vec::new())),
        b"array" => Ok(doc.new_array()),
        b"dict" => Ok(doc.new_dict()),
        _ => Err(Error::MalformedInput),
    }
}

fn parse_array(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, doc: &mut Document) -> Result<NodeId> {
    let array = doc.new_array();
    while let Some(value) = read_next_value_or_end(reader, buf, doc, b"array")? {
        doc.array_append(array, value).expect("freshly built node is detached");
    }
    Ok(array)
}

fn parse_dict(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, doc: &mut Document) -> Result<NodeId> {
    let dict = doc.new_dict();
    loop {
        match reader.read_event_into(buf).map_err(|_| Error::MalformedInput)? {
            Event::Start(ref e) if e.name().as_ref() == b"key" => {
                let key = read_text(reader, buf, b"key")?;
                buf.clear();
                let value = read_next_value_or_end(reader, buf, doc, b"dict")?.ok_or(Error::MalformedInput)?;
                doc.dict_insert(dict, &key, value).map_err(|_| Error::MalformedInput)?;
            }
            Event::End(ref e) if e.name().as_ref() == b"dict" => break,
            Event::Comment(_) | Event::PI(_) => {}
            Event::Eof => return Err(Error::Eof),
            _ => return Err(Error::MalformedInput),
        }
        buf.clear();
    }
    Ok(dict)
}

fn read_text(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &[u8]) -> Result<String> {
    let mut out = String::new();
    loop {
        match reader.read_event_into(buf).map_err(|_| Error::MalformedInput)? {
            Event::Text(ref text) => {
                let decoded = text.unescape().map_err(|_| Error::MalformedInput)?.into_owned();
                out.push_str(&decoded);
            }
            Event::End(ref e) if e.name().as_ref() == tag => break,
            Event::Eof => return Err(Error::Eof),
            _ => return Err(Error::MalformedInput),
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_dict() {
        let mut doc = Document::new();
        let root = doc.new_dict();
        let name = doc.new_string("Alice");
        let age = doc.new_uint(30);
        doc.dict_insert(root, "name", name).unwrap();
        doc.dict_insert(root, "age", age).unwrap();

        let xml = to_xml(&doc, root);
        assert!(xml.contains("<key>name</key>"));
        assert!(xml.contains("<string>Alice</string>"));

        let (decoded, decoded_root) = from_xml(&xml).unwrap();
        assert_eq!(decoded.get_string(decoded.dict_get(decoded_root, "name").unwrap()).unwrap(), "Alice");
        assert_eq!(decoded.get_uint(decoded.dict_get(decoded_root, "age").unwrap()).unwrap(), 30);
    }

    #[test]
    fn empty_array_is_self_closing_and_parses_back() {
        let mut doc = Document::new();
        let root = doc.new_array();
        let xml = to_xml(&doc, root);
        let (decoded, decoded_root) = from_xml(&xml).unwrap();
        assert_eq!(decoded.tag(decoded_root), Tag::Array);
        assert_eq!(decoded.array_size(decoded_root).unwrap(), 0);
    }

    #[test]
    fn key_without_a_following_value_is_malformed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>a</key></dict></plist>"#;
        assert!(matches!(from_xml(xml), Err(Error::MalformedInput)));
    }
}
