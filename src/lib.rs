//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # bplist
//!
//! A native Rust implementation of Apple property lists: an in-memory
//! document tree ([`Document`]) plus a binary (`bplist00`) codec and an XML
//! codec, both operating directly on the tree rather than through `serde`.
//!
//! ```
//! use bplist::Document;
//!
//! let mut doc = Document::new();
//! let root = doc.new_dict();
//! let name = doc.new_string("Ada");
//! doc.dict_insert(root, "name", name).unwrap();
//!
//! let encoded = bplist::to_bin(&doc, root);
//! let (decoded, decoded_root) = bplist::from_bin(&encoded).unwrap();
//! assert_eq!(decoded.get_string(decoded.dict_get(decoded_root, "name").unwrap()).unwrap(), "Ada");
//! ```

mod binary;
mod date;
mod error;
mod format;
mod tree;
mod util;
mod xml;

pub use binary::{from_bin, to_bin};
pub use error::{Error, Result};
pub use tree::{Date, Document, DictIter, NodeId, Tag};
pub use util::{find_by_key, find_by_string};
pub use xml::{from_xml, to_xml};
