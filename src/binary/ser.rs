//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Binary property list encoder.
//!
//! Leaf values (Boolean, UInt, Real, String, Data, Date) are written once
//! into the object table and referenced by every place in the tree that
//! holds an equal value, including dictionary keys, which unique against
//! strings elsewhere in the document. Arrays and dictionaries are never
//! unique against one another even when structurally equal.

use std::collections::HashMap;

use crate::date;
use crate::format::{self, type_nibble, singleton_info, HEADER_SIZE};
use crate::tree::{Document, NodeId, Tag};

#[derive(Clone, PartialEq, Eq, Hash)]
enum LeafKey {
    Boolean(bool),
    UInt(u64),
    Real(u64),
    String(String),
    Data(Vec<u8>),
    Date(i64, i32),
}

enum Planned {
    Node(NodeId),
    Key(String),
}

struct Plan {
    order: Vec<Planned>,
    node_index: HashMap<NodeId, usize>,
    leaf_index: HashMap<LeafKey, usize>,
}

impl Plan {
    fn new() -> Self {
        Plan {
            order: Vec::new(),
            node_index: HashMap::new(),
            leaf_index: HashMap::new(),
        }
    }

    fn intern_leaf(&mut self, key: LeafKey, planned: Planned) -> usize {
        if let Some(&index) = self.leaf_index.get(&key) {
            return index;
        }
        let index = self.order.len();
        self.order.push(planned);
        self.leaf_index.insert(key, index);
        index
    }

    fn intern_key(&mut self, key: &str) -> usize {
        self.intern_leaf(LeafKey::String(key.to_string()), Planned::Key(key.to_string()))
    }

    fn plan_node(&mut self, doc: &Document, node: NodeId) -> usize {
        if let Some(&index) = self.node_index.get(&node) {
            return index;
        }
        let index = match doc.tag(node) {
            Tag::Boolean => {
                let value = doc.get_boolean(node).expect("tag checked");
                self.intern_leaf(LeafKey::Boolean(value), Planned::Node(node))
            }
            Tag::UInt => {
                let value = doc.get_uint(node).expect("tag checked");
                self.intern_leaf(LeafKey::UInt(value), Planned::Node(node))
            }
            Tag::Real => {
                let value = doc.get_real(node).expect("tag checked");
                self.intern_leaf(LeafKey::Real(value.to_bits()), Planned::Node(node))
            }
            Tag::String => {
                let value = doc.get_string(node).expect("tag checked");
                self.intern_leaf(LeafKey::String(value), Planned::Node(node))
            }
            Tag::Data => {
                let value = doc.get_data(node).expect("tag checked");
                self.intern_leaf(LeafKey::Data(value), Planned::Node(node))
            }
            Tag::Date => {
                let value = doc.get_date(node).expect("tag checked");
                self.intern_leaf(LeafKey::Date(value.sec, value.usec), Planned::Node(node))
            }
            Tag::Array => {
                let index = self.order.len();
                self.order.push(Planned::Node(node));
                self.node_index.insert(node, index);
                let size = doc.array_size(node).expect("tag checked");
                for i in 0..size {
                    let child = doc.array_get(node, i).expect("index within bounds");
                    self.plan_node(doc, child);
                }
                return index;
            }
            Tag::Dict => {
                let index = self.order.len();
                self.order.push(Planned::Node(node));
                self.node_index.insert(node, index);
                let mut iter = doc.dict_new_iter(node);
                while let Some((key, value)) = doc.dict_next(node, &mut iter).expect("tag checked") {
                    self.intern_key(&key);
                    self.plan_node(doc, value);
                }
                return index;
            }
            Tag::Key => unreachable!("Key nodes are reachable only through their owning dict entry"),
        };
        self.node_index.insert(node, index);
        index
    }
}

fn be_fixed(value: u64, width: usize) -> Vec<u8> {
    value.to_be_bytes()[8 - width..].to_vec()
}

fn encode_length_prefix(type_nibble: u8, count: usize) -> Vec<u8> {
    if count <= 0x0E {
        vec![(type_nibble << 4) | (count as u8)]
    } else {
        let mut bytes = vec![(type_nibble << 4) | format::EXTENDED_LENGTH_INFO];
        bytes.extend(encode_uint(count as u64));
        bytes
    }
}

fn encode_uint(value: u64) -> Vec<u8> {
    let width = format::smallest_width_for(value);
    let log2 = format::width_to_log2(width).expect("smallest_width_for yields a supported width");
    let mut bytes = vec![(type_nibble::UINT << 4) | log2];
    bytes.extend(be_fixed(value, width));
    bytes
}

fn encode_real(value: f64) -> Vec<u8> {
    let mut bytes = vec![(type_nibble::REAL << 4) | format::width_to_log2(8).unwrap()];
    bytes.extend_from_slice(&value.to_be_bytes());
    bytes
}

fn encode_date(sec: i64, usec: i32) -> Vec<u8> {
    let seconds = date::to_wire_seconds(crate::tree::Date { sec, usec });
    let mut bytes = vec![(type_nibble::DATE << 4) | 0x3];
    bytes.extend_from_slice(&seconds.to_be_bytes());
    bytes
}

fn encode_boolean(value: bool) -> Vec<u8> {
    let info = if value { singleton_info::TRUE } else { singleton_info::FALSE };
    vec![(type_nibble::SINGLETON << 4) | info]
}

fn encode_data(value: &[u8]) -> Vec<u8> {
    let mut bytes = encode_length_prefix(type_nibble::DATA, value.len());
    bytes.extend_from_slice(value);
    bytes
}

fn encode_string(value: &str) -> Vec<u8> {
    if value.is_ascii() {
        let raw = value.as_bytes();
        let mut bytes = encode_length_prefix(type_nibble::ASCII_STRING, raw.len());
        bytes.extend_from_slice(raw);
        bytes
    } else {
        let units: Vec<u16> = value.encode_utf16().collect();
        let mut bytes = encode_length_prefix(type_nibble::UTF16_STRING, units.len());
        for unit in units {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    }
}

fn encode_array(child_indices: &[usize], object_reference_size: usize) -> Vec<u8> {
    let mut bytes = encode_length_prefix(type_nibble::ARRAY, child_indices.len());
    for &index in child_indices {
        bytes.extend(be_fixed(index as u64, object_reference_size));
    }
    bytes
}

fn encode_dict(pairs: &[(usize, usize)], object_reference_size: usize) -> Vec<u8> {
    let mut bytes = encode_length_prefix(type_nibble::DICTIONARY, pairs.len());
    for &(key_index, _) in pairs {
        bytes.extend(be_fixed(key_index as u64, object_reference_size));
    }
    for &(_, value_index) in pairs {
        bytes.extend(be_fixed(value_index as u64, object_reference_size));
    }
    bytes
}

fn encode_planned(
    doc: &Document,
    planned: &Planned,
    plan: &Plan,
    object_reference_size: usize,
) -> Vec<u8> {
    match planned {
        Planned::Key(key) => encode_string(key),
        Planned::Node(node) => match doc.tag(*node) {
            Tag::Boolean => encode_boolean(doc.get_boolean(*node).expect("tag checked")),
            Tag::UInt => encode_uint(doc.get_uint(*node).expect("tag checked")),
            Tag::Real => encode_real(doc.get_real(*node).expect("tag checked")),
            Tag::String => encode_string(&doc.get_string(*node).expect("tag checked")),
            Tag::Data => encode_data(&doc.get_data(*node).expect("tag checked")),
            Tag::Date => {
                let date = doc.get_date(*node).expect("tag checked");
                encode_date(date.sec, date.usec)
            }
            Tag::Array => {
                let size = doc.array_size(*node).expect("tag checked");
                let indices: Vec<usize> = (0..size)
                    .map(|i| {
                        let child = doc.array_get(*node, i).expect("index within bounds");
                        plan.node_index[&child]
                    })
                    .collect();
                encode_array(&indices, object_reference_size)
            }
            Tag::Dict => {
                let mut iter = doc.dict_new_iter(*node);
                let mut pairs = Vec::new();
                while let Some((key, value)) = doc.dict_next(*node, &mut iter).expect("tag checked") {
                    let key_index = plan.leaf_index[&LeafKey::String(key)];
                    let value_index = plan.node_index[&value];
                    pairs.push((key_index, value_index));
                }
                encode_dict(&pairs, object_reference_size)
            }
            Tag::Key => unreachable!("Key nodes are never planned directly"),
        },
    }
}

/// Encodes `doc` rooted at `root` into a binary property list. Infallible:
/// any tree reachable through the public `Document` API is well-formed by
/// construction.
pub fn to_bin(doc: &Document, root: NodeId) -> Vec<u8> {
    let mut plan = Plan::new();
    plan.plan_node(doc, root);

    let object_reference_size = format::smallest_width_for(plan.order.len().saturating_sub(1) as u64);
    log::trace!("encoding {} objects with reference size {}", plan.order.len(), object_reference_size);

    let mut object_table = Vec::new();
    let mut offsets = Vec::with_capacity(plan.order.len());
    for planned in &plan.order {
        offsets.push(HEADER_SIZE + object_table.len());
        object_table.extend(encode_planned(doc, planned, &plan, object_reference_size));
    }

    let offset_table_start = HEADER_SIZE + object_table.len();
    let offset_size = format::smallest_width_for(offset_table_start as u64);
    log::trace!("offset table starts at {} with entry size {}", offset_table_start, offset_size);

    let mut output = Vec::with_capacity(offset_table_start + plan.order.len() * offset_size + format::TRAILER_SIZE);
    output.extend_from_slice(format::HEADER_MAGIC_NUMBER);
    output.push(format::HEADER_VERSION_00.0);
    output.push(format::HEADER_VERSION_00.1);
    output.extend(object_table);
    for offset in &offsets {
        output.extend(be_fixed(*offset as u64, offset_size));
    }

    output.extend(vec![0u8; format::TRAILER_PREAMBLE_UNUSED_SIZE]);
    output.push(0); // sort_version
    output.push(offset_size as u8);
    output.push(object_reference_size as u8);
    output.extend(be_fixed(plan.order.len() as u64, 8));
    output.extend(be_fixed(plan.node_index[&root] as u64, 8));
    output.extend(be_fixed(offset_table_start as u64, 8));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::de::from_bin;

    #[test]
    fn empty_array_round_trips() {
        let mut doc = Document::new();
        let root = doc.new_array();
        let encoded = to_bin(&doc, root);
        let (decoded_doc, decoded_root) = from_bin(&encoded).unwrap();
        assert_eq!(decoded_doc.tag(decoded_root), Tag::Array);
        assert_eq!(decoded_doc.array_size(decoded_root).unwrap(), 0);
    }

    #[test]
    fn shared_strings_are_unique_in_the_object_table() {
        let mut doc = Document::new();
        let root = doc.new_array();
        let a = doc.new_string("same");
        let b = doc.new_string("same");
        doc.array_append(root, a).unwrap();
        doc.array_append(root, b).unwrap();

        let mut plan = Plan::new();
        plan.plan_node(&doc, root);
        // The array itself plus exactly one interned "same" string.
        assert_eq!(plan.order.len(), 2);
    }

    #[test]
    fn dict_round_trips_through_bin() {
        let mut doc = Document::new();
        let root = doc.new_dict();
        let flag = doc.new_boolean(true);
        let count = doc.new_uint(42);
        doc.dict_insert(root, "a", flag).unwrap();
        doc.dict_insert(root, "b", count).unwrap();

        let encoded = to_bin(&doc, root);
        let (decoded, decoded_root) = from_bin(&encoded).unwrap();
        assert_eq!(decoded.get_boolean(decoded.dict_get(decoded_root, "a").unwrap()).unwrap(), true);
        assert_eq!(decoded.get_uint(decoded.dict_get(decoded_root, "b").unwrap()).unwrap(), 42);
    }
}
