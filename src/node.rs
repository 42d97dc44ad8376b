//! Node types of the hash trie.

use std::sync::Arc;

use tracing::trace;

use crate::{
    bitmap::Bitmap,
    config::{BITS_PER_LEVEL, LEVEL_MASK, MAX_SHIFT},
    key_value::KeyValue,
};

/// One occupied position of a branch node.
#[derive(Clone, Debug)]
pub enum Slot<K, V> {
    /// A key-value pair stored directly, with the key's hash code.
    Entry(u32, KeyValue<K, V>),
    /// A subtree holding at least two entries.
    Node(Arc<Node<K, V>>),
}

#[derive(Clone, Debug)]
pub enum Node<K, V> {
    /// Invariant: `bitmap.size() == slots.len()`, slots ordered by fragment.
    Branch { bitmap: Bitmap, slots: Vec<Slot<K, V>> },
    /// Entries whose hash codes are identical. Only found past `MAX_SHIFT`.
    Collision {
        hash: u32,
        entries: Vec<KeyValue<K, V>>,
    },
}

/// Extracts the 5-bit hash fragment used at the given shift.
#[inline]
pub fn fragment(hash: u32, shift: u32) -> u32 {
    (hash >> shift) & LEVEL_MASK as u32
}

impl<K, V> Default for Node<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K, V> Node<K, V> {
    pub fn empty() -> Self {
        Self::branch(Bitmap::new(), Vec::new())
    }

    pub fn branch(bitmap: Bitmap, slots: Vec<Slot<K, V>>) -> Self {
        debug_assert_eq!(bitmap.size(), slots.len());

        Node::Branch { bitmap, slots }
    }

    pub fn collision(hash: u32, entries: Vec<KeyValue<K, V>>) -> Self {
        Node::Collision { hash, entries }
    }

    /// Builds the smallest subtree at `shift` telling two distinct keys apart.
    pub fn pair(
        first_hash: u32,
        first: KeyValue<K, V>,
        second_hash: u32,
        second: KeyValue<K, V>,
        shift: u32,
    ) -> Self {
        if shift > MAX_SHIFT {
            trace!(hash = first_hash, "promoting colliding keys to a collision node");

            return Self::collision(first_hash, vec![first, second]);
        }

        let first_fragment = fragment(first_hash, shift);
        let second_fragment = fragment(second_hash, shift);

        if first_fragment == second_fragment {
            let child = Self::pair(
                first_hash,
                first,
                second_hash,
                second,
                shift + BITS_PER_LEVEL,
            );

            Self::branch(
                Bitmap::new().set(first_fragment),
                vec![Slot::Node(Arc::new(child))],
            )
        } else {
            let bitmap = Bitmap::new().set(first_fragment).set(second_fragment);
            let first = Slot::Entry(first_hash, first);
            let second = Slot::Entry(second_hash, second);

            Self::branch(
                bitmap,
                if first_fragment < second_fragment {
                    vec![first, second]
                } else {
                    vec![second, first]
                },
            )
        }
    }

    /// Returns `true` if the node holds exactly one entry and should be
    /// inlined into its parent's slot.
    pub fn is_singleton(&self) -> bool {
        match self {
            Node::Branch { slots, .. } => matches!(slots.as_slice(), [Slot::Entry(..)]),
            Node::Collision { entries, .. } => entries.len() == 1,
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Branch { slots, .. } => slots.is_empty(),
            Node::Collision { entries, .. } => entries.is_empty(),
        }
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Takes the only entry out of a singleton node.
    pub fn take_singleton(node: &mut Arc<Self>) -> (u32, KeyValue<K, V>) {
        match Arc::make_mut(node) {
            Node::Branch { bitmap, slots } => match slots.pop() {
                Some(Slot::Entry(hash, entry)) => {
                    *bitmap = Bitmap::new();
                    (hash, entry)
                }
                _ => unreachable!("branch is not a singleton"),
            },
            Node::Collision { hash, entries } => match entries.pop() {
                Some(entry) => (*hash, entry),
                None => unreachable!("collision node is empty"),
            },
        }
    }
}
