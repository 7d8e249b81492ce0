//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use bplist::{from_bin, to_bin, Document, Error};

#[test]
fn dict_with_bool_and_integer_round_trips() {
    let mut doc = Document::new();
    let root = doc.new_dict();
    let a = doc.new_boolean(true);
    let b = doc.new_uint(42);
    doc.dict_insert(root, "a", a).unwrap();
    doc.dict_insert(root, "b", b).unwrap();

    let encoded = to_bin(&doc, root);
    let (decoded, decoded_root) = from_bin(&encoded).unwrap();

    assert_eq!(decoded.dict_size(decoded_root).unwrap(), 2);
    assert_eq!(decoded.get_boolean(decoded.dict_get(decoded_root, "a").unwrap()).unwrap(), true);
    assert_eq!(decoded.get_uint(decoded.dict_get(decoded_root, "b").unwrap()).unwrap(), 42);
}

#[test]
fn empty_array_round_trips() {
    let mut doc = Document::new();
    let root = doc.new_array();
    let encoded = to_bin(&doc, root);
    let (decoded, decoded_root) = from_bin(&encoded).unwrap();
    assert_eq!(decoded.array_size(decoded_root).unwrap(), 0);
}

#[test]
fn truncated_input_is_eof() {
    let mut doc = Document::new();
    let root = doc.new_array();
    let encoded = to_bin(&doc, root);
    let truncated = &encoded[..encoded.len() - 4];
    assert!(matches!(from_bin(truncated), Err(Error::MalformedInput) | Err(Error::Eof)));
}

#[test]
fn top_object_index_out_of_range_is_rejected() {
    let mut doc = Document::new();
    let root = doc.new_array();
    let mut encoded = to_bin(&doc, root);

    // Trailer layout: 5 unused + sort_version + offset_table_entry_size +
    // object_reference_size + number_of_objects(8) + top_object_index(8) + offset_table_offset(8).
    let trailer_start = encoded.len() - 32;
    let top_object_index_start = trailer_start + 5 + 1 + 1 + 1 + 8;
    for byte in &mut encoded[top_object_index_start..top_object_index_start + 8] {
        *byte = 0xFF;
    }

    assert!(matches!(from_bin(&encoded), Err(Error::MalformedInput)));
}

#[test]
fn dict_key_referencing_a_non_string_record_is_rejected() {
    // Hand-assembled document: one dict entry whose "key" object is actually
    // an integer. The object table holds [dict, integer-used-as-key, integer-value].
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"bplist00");
    // Object 0: dict with one entry, 1-byte refs.
    bytes.push(0b1101_0001);
    bytes.push(1); // key ref -> object 1
    bytes.push(2); // value ref -> object 2
    let dict_offset = 8;
    // Object 1: integer masquerading as a key.
    let int_as_key_offset = bytes.len();
    bytes.push(0b0001_0000);
    bytes.push(0x07);
    // Object 2: integer value.
    let value_offset = bytes.len();
    bytes.push(0b0001_0000);
    bytes.push(0x09);

    let offset_table_start = bytes.len();
    bytes.push(dict_offset as u8);
    bytes.push(int_as_key_offset as u8);
    bytes.push(value_offset as u8);

    bytes.extend_from_slice(&[0u8; 5]); // unused
    bytes.push(0); // sort version
    bytes.push(1); // offset table entry size
    bytes.push(1); // object reference size
    bytes.extend_from_slice(&3u64.to_be_bytes()); // number of objects
    bytes.extend_from_slice(&0u64.to_be_bytes()); // top object index
    bytes.extend_from_slice(&(offset_table_start as u64).to_be_bytes());

    assert!(matches!(from_bin(&bytes), Err(Error::MalformedInput)));
}

#[test]
fn copy_produces_a_disjoint_subtree() {
    let mut doc = Document::new();
    let root = doc.new_array();
    let child = doc.new_uint(7);
    doc.array_append(root, child).unwrap();

    let copy = doc.copy(root);
    assert!(doc.compare(root, copy));
    assert_ne!(copy, root);

    let replacement = doc.new_uint(99);
    doc.array_set(root, 0, replacement).unwrap();
    assert!(!doc.compare(root, copy));
}

#[test]
fn find_by_key_is_breadth_first() {
    let mut doc = Document::new();
    let root = doc.new_dict();
    let inner = doc.new_dict();
    let shallow = doc.new_uint(1);
    let deep = doc.new_uint(2);
    doc.dict_insert(inner, "target", deep).unwrap();
    doc.dict_insert(root, "nested", inner).unwrap();
    doc.dict_insert(root, "target", shallow).unwrap();

    let found = bplist::find_by_key(&doc, root, "target").expect("target exists");
    assert_eq!(doc.get_key(found).unwrap(), "target");
    assert_eq!(doc.parent(found), Some(root), "the shallower \"target\" key should be found first");
}
