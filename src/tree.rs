//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The plist value model.
//!
//! A [`Document`] owns an arena of [`Node`]s reachable from one another
//! through [`NodeId`] handles. Every node has at most one parent; containers
//! (arrays and dictionaries) exclusively own their children. There is no
//! representation for "no such node" inhabiting the arena itself -- absence
//! is `Option<NodeId>` at the API boundary, per the design note in the
//! original C interface this crate's tree replaces.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};

/// A handle to a node owned by a particular [`Document`]. Handles from one
/// document are meaningless -- and are rejected -- against another.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(usize);

/// The tag of a plist node. `Key` is only ever legal as the key slot of a
/// dictionary entry; it never appears as a freestanding value or as the
/// argument to an array operation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Tag {
    Boolean,
    UInt,
    Real,
    String,
    Key,
    Data,
    Date,
    Array,
    Dict,
}

/// An in-memory date, relative to the Core Data epoch (2001-01-01T00:00:00Z).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Date {
    pub sec: i64,
    pub usec: i32,
}

#[derive(Clone, Debug)]
enum Payload {
    Boolean(bool),
    UInt(u64),
    Real(f64),
    String(String),
    Key(String),
    Data(Vec<u8>),
    Date(Date),
    Array(Vec<NodeId>),
    Dict(IndexMap<String, DictEntry>),
}

#[derive(Clone, Copy, Debug)]
struct DictEntry {
    key_node: NodeId,
    value_node: NodeId,
}

#[derive(Clone, Debug)]
struct Slot {
    payload: Payload,
    parent: Option<NodeId>,
}

impl Slot {
    fn tag(&self) -> Tag {
        match &self.payload {
            Payload::Boolean(_) => Tag::Boolean,
            Payload::UInt(_) => Tag::UInt,
            Payload::Real(_) => Tag::Real,
            Payload::String(_) => Tag::String,
            Payload::Key(_) => Tag::Key,
            Payload::Data(_) => Tag::Data,
            Payload::Date(_) => Tag::Date,
            Payload::Array(_) => Tag::Array,
            Payload::Dict(_) => Tag::Dict,
        }
    }
}

/// An arena-backed plist document tree.
///
/// `Document` plays the role the original C API gives to `plist_t` handles
/// collectively: every [`NodeId`] returned by a constructor or mutator is
/// valid only against the `Document` that produced it. Detached nodes --
/// created but not yet placed in a container -- live in the same arena as
/// attached ones; `parent` distinguishes them.
#[derive(Clone, Debug, Default)]
pub struct Document {
    slots: Vec<Slot>,
}

impl Document {
    /// Creates an empty document with no nodes.
    pub fn new() -> Self {
        Document { slots: Vec::new() }
    }

    fn alloc(&mut self, payload: Payload) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { payload, parent: None });
        id
    }

    fn slot(&self, id: NodeId) -> &Slot {
        &self.slots[id.0]
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        &mut self.slots[id.0]
    }

    /// The tag of the given node.
    pub fn tag(&self, id: NodeId) -> Tag {
        self.slot(id).tag()
    }

    // -- Constructors --------------------------------------------------

    pub fn new_boolean(&mut self, value: bool) -> NodeId {
        self.alloc(Payload::Boolean(value))
    }

    pub fn new_uint(&mut self, value: u64) -> NodeId {
        self.alloc(Payload::UInt(value))
    }

    pub fn new_real(&mut self, value: f64) -> NodeId {
        self.alloc(Payload::Real(value))
    }

    /// Constructs a String node. Fails with `MalformedInput` only in the
    /// sense that the caller already holds a `String`, so this never fails;
    /// kept fallible-shaped (`new_string_from_utf8`) for callers building
    /// from raw bytes.
    pub fn new_string(&mut self, value: impl Into<String>) -> NodeId {
        self.alloc(Payload::String(value.into()))
    }

    /// Constructs a String node from raw bytes, validating UTF-8.
    pub fn new_string_from_utf8(&mut self, bytes: Vec<u8>) -> Result<NodeId> {
        let value = String::from_utf8(bytes).map_err(|_| Error::MalformedInput)?;
        Ok(self.alloc(Payload::String(value)))
    }

    pub fn new_data(&mut self, value: impl Into<Vec<u8>>) -> NodeId {
        self.alloc(Payload::Data(value.into()))
    }

    pub fn new_date(&mut self, sec: i64, usec: i32) -> NodeId {
        self.alloc(Payload::Date(Date { sec, usec }))
    }

    pub fn new_array(&mut self) -> NodeId {
        self.alloc(Payload::Array(Vec::new()))
    }

    pub fn new_dict(&mut self) -> NodeId {
        self.alloc(Payload::Dict(IndexMap::new()))
    }

    fn new_key(&mut self, value: impl Into<String>) -> NodeId {
        self.alloc(Payload::Key(value.into()))
    }

    // -- Typed getters ---------------------------------------------------

    pub fn get_boolean(&self, id: NodeId) -> Result<bool> {
        match &self.slot(id).payload {
            Payload::Boolean(v) => Ok(*v),
            _ => Err(Error::WrongType),
        }
    }

    pub fn get_uint(&self, id: NodeId) -> Result<u64> {
        match &self.slot(id).payload {
            Payload::UInt(v) => Ok(*v),
            _ => Err(Error::WrongType),
        }
    }

    pub fn get_real(&self, id: NodeId) -> Result<f64> {
        match &self.slot(id).payload {
            Payload::Real(v) => Ok(*v),
            _ => Err(Error::WrongType),
        }
    }

    pub fn get_string(&self, id: NodeId) -> Result<String> {
        match &self.slot(id).payload {
            Payload::String(v) => Ok(v.clone()),
            _ => Err(Error::WrongType),
        }
    }

    /// Returns the payload of a Key node. Most callers reach keys through
    /// `dict_key_of` rather than handling a `NodeId` of tag `Key` directly.
    pub fn get_key(&self, id: NodeId) -> Result<String> {
        match &self.slot(id).payload {
            Payload::Key(v) => Ok(v.clone()),
            _ => Err(Error::WrongType),
        }
    }

    pub fn get_data(&self, id: NodeId) -> Result<Vec<u8>> {
        match &self.slot(id).payload {
            Payload::Data(v) => Ok(v.clone()),
            _ => Err(Error::WrongType),
        }
    }

    pub fn get_date(&self, id: NodeId) -> Result<Date> {
        match &self.slot(id).payload {
            Payload::Date(v) => Ok(*v),
            _ => Err(Error::WrongType),
        }
    }

    // -- Typed setters (retag in place, preserving the parent link) ------

    pub fn set_boolean(&mut self, id: NodeId, value: bool) {
        self.slot_mut(id).payload = Payload::Boolean(value);
    }

    pub fn set_uint(&mut self, id: NodeId, value: u64) {
        self.slot_mut(id).payload = Payload::UInt(value);
    }

    pub fn set_real(&mut self, id: NodeId, value: f64) {
        self.slot_mut(id).payload = Payload::Real(value);
    }

    pub fn set_string(&mut self, id: NodeId, value: impl Into<String>) {
        self.slot_mut(id).payload = Payload::String(value.into());
    }

    pub fn set_data(&mut self, id: NodeId, value: impl Into<Vec<u8>>) {
        self.slot_mut(id).payload = Payload::Data(value.into());
    }

    pub fn set_date(&mut self, id: NodeId, sec: i64, usec: i32) {
        self.slot_mut(id).payload = Payload::Date(Date { sec, usec });
    }

    // -- Tree-wide operations ---------------------------------------------

    /// Returns the container which currently owns `id`, or `None` if `id` is
    /// detached (the "no such node" case of the original API).
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).parent
    }

    fn require_detached(&self, id: NodeId) -> Result<()> {
        if self.slot(id).parent.is_some() {
            Err(Error::AlreadyParented)
        } else {
            Ok(())
        }
    }

    /// Produces a detached, structurally equal, fully disjoint copy of the
    /// subtree rooted at `id`.
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        let payload = self.slot(id).payload.clone();
        match payload {
            Payload::Array(children) => {
                let new_children: Vec<NodeId> = children.iter().map(|&c| self.copy(c)).collect();
                let new_id = self.alloc(Payload::Array(new_children.clone()));
                for child in new_children {
                    self.slot_mut(child).parent = Some(new_id);
                }
                new_id
            }
            Payload::Dict(entries) => {
                let mut new_entries = IndexMap::new();
                let new_id = self.alloc(Payload::Dict(IndexMap::new()));
                for (key, entry) in entries.iter() {
                    let key_str = self.get_key(entry.key_node).unwrap_or_default();
                    let new_key_node = self.new_key(key_str);
                    self.slot_mut(new_key_node).parent = Some(new_id);
                    let new_value_node = self.copy(entry.value_node);
                    self.slot_mut(new_value_node).parent = Some(new_id);
                    new_entries.insert(key.clone(), DictEntry { key_node: new_key_node, value_node: new_value_node });
                }
                self.slot_mut(new_id).payload = Payload::Dict(new_entries);
                new_id
            }
            scalar => self.alloc(scalar),
        }
    }

    /// Structural equality: tags match and payloads are equal bytewise
    /// (String/Key/Data), numerically (UInt/Real/Boolean/Date), by ordered
    /// recursion (Array), or by key-set/value recursion with order ignored
    /// (Dict).
    pub fn compare(&self, a: NodeId, b: NodeId) -> bool {
        match (&self.slot(a).payload, &self.slot(b).payload) {
            (Payload::Boolean(x), Payload::Boolean(y)) => x == y,
            (Payload::UInt(x), Payload::UInt(y)) => x == y,
            (Payload::Real(x), Payload::Real(y)) => OrderedFloat(*x) == OrderedFloat(*y),
            (Payload::String(x), Payload::String(y)) => x == y,
            (Payload::Key(x), Payload::Key(y)) => x == y,
            (Payload::Data(x), Payload::Data(y)) => x == y,
            (Payload::Date(x), Payload::Date(y)) => x == y,
            (Payload::Array(x), Payload::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(&cx, &cy)| self.compare(cx, cy))
            }
            (Payload::Dict(x), Payload::Dict(y)) => {
                x.len() == y.len()
                    && x.iter().all(|(key, entry)| {
                        y.get(key).map_or(false, |other| self.compare(entry.value_node, other.value_node))
                    })
            }
            _ => false,
        }
    }

    /// Frees `id` and its entire subtree. If `id` is currently a child of a
    /// container, it is first detached from that container's entry list.
    pub fn free(&mut self, id: NodeId) {
        if let Some(parent) = self.slot(id).parent {
            match &mut self.slot_mut(parent).payload {
                Payload::Array(children) => {
                    children.retain(|&c| c != id);
                }
                Payload::Dict(entries) => {
                    let key = entries.iter().find(|(_, e)| e.value_node == id).map(|(k, _)| k.clone());
                    if let Some(key) = key {
                        entries.shift_remove(&key);
                    }
                }
                _ => {}
            }
        }
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let payload = self.slot(id).payload.clone();
        match payload {
            Payload::Array(children) => {
                for child in children {
                    self.free_subtree(child);
                }
            }
            Payload::Dict(entries) => {
                for (_, entry) in entries {
                    self.free_subtree(entry.key_node);
                    self.free_subtree(entry.value_node);
                }
            }
            _ => {}
        }
    }

    // -- Array operations --------------------------------------------------

    fn array_children(&self, id: NodeId) -> Result<&Vec<NodeId>> {
        match &self.slot(id).payload {
            Payload::Array(v) => Ok(v),
            _ => Err(Error::WrongType),
        }
    }

    fn array_children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        match &mut self.slot_mut(id).payload {
            Payload::Array(v) => Ok(v),
            _ => Err(Error::WrongType),
        }
    }

    pub fn array_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.array_children(id)?.len())
    }

    pub fn array_get(&self, id: NodeId, index: usize) -> Result<NodeId> {
        self.array_children(id)?.get(index).copied().ok_or(Error::IndexOutOfRange)
    }

    pub fn array_index_of(&self, id: NodeId, child: NodeId) -> Result<usize> {
        self.array_children(id)?.iter().position(|&c| c == child).ok_or(Error::IndexOutOfRange)
    }

    pub fn array_set(&mut self, id: NodeId, index: usize, item: NodeId) -> Result<()> {
        self.require_detached(item)?;
        let prior = {
            let children = self.array_children_mut(id)?;
            if index >= children.len() {
                return Err(Error::IndexOutOfRange);
            }
            let prior = children[index];
            children[index] = item;
            prior
        };
        self.slot_mut(item).parent = Some(id);
        self.slot_mut(prior).parent = None;
        self.free_subtree(prior);
        Ok(())
    }

    pub fn array_append(&mut self, id: NodeId, item: NodeId) -> Result<()> {
        self.require_detached(item)?;
        self.array_children_mut(id)?.push(item);
        self.slot_mut(item).parent = Some(id);
        Ok(())
    }

    pub fn array_insert(&mut self, id: NodeId, index: usize, item: NodeId) -> Result<()> {
        self.require_detached(item)?;
        let children = self.array_children_mut(id)?;
        if index > children.len() {
            return Err(Error::IndexOutOfRange);
        }
        children.insert(index, item);
        self.slot_mut(item).parent = Some(id);
        Ok(())
    }

    pub fn array_remove(&mut self, id: NodeId, index: usize) -> Result<()> {
        let removed = {
            let children = self.array_children_mut(id)?;
            if index >= children.len() {
                return Err(Error::IndexOutOfRange);
            }
            children.remove(index)
        };
        self.slot_mut(removed).parent = None;
        self.free_subtree(removed);
        Ok(())
    }

    // -- Dict operations ---------------------------------------------------

    fn dict_entries(&self, id: NodeId) -> Result<&IndexMap<String, DictEntry>> {
        match &self.slot(id).payload {
            Payload::Dict(m) => Ok(m),
            _ => Err(Error::WrongType),
        }
    }

    fn dict_entries_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, DictEntry>> {
        match &mut self.slot_mut(id).payload {
            Payload::Dict(m) => Ok(m),
            _ => Err(Error::WrongType),
        }
    }

    pub fn dict_get(&self, id: NodeId, key: &str) -> Result<NodeId> {
        self.dict_entries(id)?.get(key).map(|e| e.value_node).ok_or(Error::KeyNotFound)
    }

    /// Returns the Key node bound to `key` in `id`, distinct from the value
    /// it is paired with.
    pub(crate) fn dict_key_node(&self, id: NodeId, key: &str) -> Result<NodeId> {
        self.dict_entries(id)?.get(key).map(|e| e.key_node).ok_or(Error::KeyNotFound)
    }

    /// Upsert: if `key` is present, its prior value is freed and replaced;
    /// otherwise a new entry (and Key node) is created.
    pub fn dict_set(&mut self, id: NodeId, key: &str, item: NodeId) -> Result<()> {
        self.require_detached(item)?;
        if let Ok(prior) = self.dict_get(id, key) {
            let entries = self.dict_entries_mut(id)?;
            let entry = entries.get_mut(key).unwrap();
            entry.value_node = item;
            self.slot_mut(item).parent = Some(id);
            self.slot_mut(prior).parent = None;
            self.free_subtree(prior);
            Ok(())
        } else {
            self.dict_insert(id, key, item)
        }
    }

    pub fn dict_insert(&mut self, id: NodeId, key: &str, item: NodeId) -> Result<()> {
        self.require_detached(item)?;
        if self.dict_entries(id)?.contains_key(key) {
            return Err(Error::DuplicateKey);
        }
        let key_node = self.new_key(key);
        self.slot_mut(key_node).parent = Some(id);
        self.slot_mut(item).parent = Some(id);
        self.dict_entries_mut(id)?.insert(key.to_string(), DictEntry { key_node, value_node: item });
        Ok(())
    }

    pub fn dict_remove(&mut self, id: NodeId, key: &str) -> Result<()> {
        let entry = self.dict_entries_mut(id)?.shift_remove(key).ok_or(Error::KeyNotFound)?;
        self.free_subtree(entry.key_node);
        self.free_subtree(entry.value_node);
        Ok(())
    }

    pub fn dict_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.dict_entries(id)?.len())
    }

    /// Returns the string key under which `child` is currently bound in its
    /// parent dictionary. `child` must be the *value* half of a dict entry.
    pub fn dict_key_of(&self, child: NodeId) -> Result<String> {
        let parent = self.slot(child).parent.ok_or(Error::WrongType)?;
        let entries = self.dict_entries(parent)?;
        entries
            .iter()
            .find(|(_, e)| e.value_node == child)
            .map(|(k, _)| k.clone())
            .ok_or(Error::WrongType)
    }

    /// An external iterator position over a dictionary's entries, in
    /// insertion order. Mutating the dictionary invalidates any outstanding
    /// `DictIter` over it; continued use produces unspecified results, same
    /// as the C iterator contract this replaces.
    pub fn dict_new_iter(&self, _id: NodeId) -> DictIter {
        DictIter { position: 0 }
    }

    /// Advances `iter` and returns the next `(key, value)` pair, or `None`
    /// once the dictionary is exhausted.
    pub fn dict_next(&self, id: NodeId, iter: &mut DictIter) -> Result<Option<(String, NodeId)>> {
        let entries = self.dict_entries(id)?;
        if iter.position >= entries.len() {
            return Ok(None);
        }
        let (key, entry) = entries.get_index(iter.position).expect("bounds checked above");
        let result = (key.clone(), entry.value_node);
        iter.position += 1;
        Ok(Some(result))
    }
}

/// External iterator state for a [`Document::dict_new_iter`] traversal.
#[derive(Clone, Copy, Debug)]
pub struct DictIter {
    position: usize,
}
