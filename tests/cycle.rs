//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use bplist::{from_bin, Error};

/// Hand-assembled bplist whose sole array contains a reference to itself.
/// The in-memory tree has no way to represent this (every node has exactly
/// one parent), so decoding must fail rather than loop or panic.
#[test]
fn self_referential_array_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"bplist00");

    // Object 0: array of length 1, 1-byte refs, referencing itself.
    bytes.push(0b1010_0001);
    bytes.push(0);

    let offset_table_start = bytes.len();
    bytes.push(8); // offset of object 0

    bytes.extend_from_slice(&[0u8; 5]);
    bytes.push(0);
    bytes.push(1);
    bytes.push(1);
    bytes.extend_from_slice(&1u64.to_be_bytes());
    bytes.extend_from_slice(&0u64.to_be_bytes());
    bytes.extend_from_slice(&(offset_table_start as u64).to_be_bytes());

    assert!(matches!(from_bin(&bytes), Err(Error::MalformedInput)));
}

/// Two dictionaries that reference one another indirectly (object 0's value
/// is object 1, whose value is object 0).
#[test]
fn mutually_referential_dictionaries_are_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"bplist00");

    // Object 0: dict with 1 entry: key -> object 2 ("k"), value -> object 1.
    let dict0_offset = bytes.len();
    bytes.push(0b1101_0001);
    bytes.push(2);
    bytes.push(1);

    // Object 1: dict with 1 entry: key -> object 2 ("k"), value -> object 0.
    let dict1_offset = bytes.len();
    bytes.push(0b1101_0001);
    bytes.push(2);
    bytes.push(0);

    // Object 2: the ASCII string "k", shared as both dicts' key.
    let key_offset = bytes.len();
    bytes.push(0b0101_0001);
    bytes.push(b'k');

    let offset_table_start = bytes.len();
    bytes.push(dict0_offset as u8);
    bytes.push(dict1_offset as u8);
    bytes.push(key_offset as u8);

    bytes.extend_from_slice(&[0u8; 5]);
    bytes.push(0);
    bytes.push(1);
    bytes.push(1);
    bytes.extend_from_slice(&3u64.to_be_bytes());
    bytes.extend_from_slice(&0u64.to_be_bytes());
    bytes.extend_from_slice(&(offset_table_start as u64).to_be_bytes());

    assert!(matches!(from_bin(&bytes), Err(Error::MalformedInput)));
}
