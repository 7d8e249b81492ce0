//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Read-only breadth-first search helpers over a [`Document`].

use std::collections::VecDeque;

use crate::tree::{Document, NodeId, Tag};

fn children_of(doc: &Document, id: NodeId) -> Vec<NodeId> {
    match doc.tag(id) {
        Tag::Array => (0..doc.array_size(id).unwrap_or(0))
            .map(|i| doc.array_get(id, i).expect("index within bounds"))
            .collect(),
        Tag::Dict => {
            let mut iter = doc.dict_new_iter(id);
            let mut out = Vec::new();
            while let Some((_, value)) = doc.dict_next(id, &mut iter).unwrap_or(None) {
                out.push(value);
            }
            out
        }
        _ => Vec::new(),
    }
}

/// Breadth-first search from `root` for the first Key node whose payload
/// equals `key`. Returns the Key node itself, not the value it is paired
/// with; use [`Document::dict_get`] to fetch the value once a dict holding
/// the key has been located some other way.
pub fn find_by_key(doc: &Document, root: NodeId, key: &str) -> Option<NodeId> {
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(root);

    while let Some(id) = queue.pop_front() {
        if doc.tag(id) == Tag::Dict {
            if let Ok(key_node) = doc.dict_key_node(id, key) {
                return Some(key_node);
            }
        }
        queue.extend(children_of(doc, id));
    }
    None
}

/// Breadth-first search from `root` for a String node equal to `needle`.
/// Returns the first match in level order, or `None` if absent.
pub fn find_by_string(doc: &Document, root: NodeId, needle: &str) -> Option<NodeId> {
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(root);

    while let Some(id) = queue.pop_front() {
        if doc.tag(id) == Tag::String {
            if doc.get_string(id).as_deref() == Ok(needle) {
                return Some(id);
            }
        }
        queue.extend(children_of(doc, id));
    }
    None
}
