//! Persistent collections whose sub-trees can be shared over threads.
//!
//! Hash-Array Mapped Trie (HAMT) is a data structure popular as a map (a.k.a.
//! associative array or dictionary) or set. Its immutable variant is adopted
//! widely by functional programming languages like Scala and Clojure to
//! implement immutable and memory-efficient associative arrays and sets.
//!
//! This crate provides hash maps and sets on a compressed HAMT, ordered
//! variants remembering insertion order, and a list on a 32-way vector trie.
//! Every collection has a builder that mutates the nodes it owns alone in
//! place and freezes into a persistent snapshot in constant time.
//!
//! ```
//! use persistent_tries::PersistentHashMap;
//!
//! let map = PersistentHashMap::new().put("a", 1);
//! let other = map.put("b", 2);
//!
//! assert_eq!(map.len(), 1);
//! assert_eq!(other.get("b"), Some(&2));
//! ```

mod bitmap;
mod config;
mod error;
mod hamt;
mod key_value;
pub mod map;
mod node;
pub mod ordered_map;
pub mod ordered_set;
pub mod set;
mod utilities;
pub mod vector;

#[cfg(test)]
mod proptests;

pub use error::{Error, Result};
pub use map::{HashMapBuilder, PersistentHashMap};
pub use ordered_map::{OrderedMapBuilder, PersistentOrderedMap};
pub use ordered_set::{OrderedSetBuilder, PersistentOrderedSet};
pub use set::{HashSetBuilder, PersistentHashSet};
pub use vector::{PersistentVector, VectorBuilder};
