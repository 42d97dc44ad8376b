//! Persistent list on a 32-way trie with a tail buffer.
//!
//! Elements live in leaves of 32 below branch nodes selecting 5 bits of the
//! index per level. The last partial leaf is kept apart as the tail, so
//! appends and removals at the end mostly touch the tail alone. The tail is
//! folded into the trie as soon as it fills up.

use crate::{
    config::{BITS_PER_LEVEL, BRANCH_FACTOR, LEVEL_MASK},
    error::{Error, Result},
};
use std::{
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    iter::FusedIterator,
    mem,
    ops::Index,
    slice,
    sync::Arc,
};
use tracing::trace;

#[derive(Clone, Debug)]
enum VectorNode<T> {
    Branch(Vec<Arc<VectorNode<T>>>),
    Leaf(Vec<T>),
}

impl<T> VectorNode<T> {
    fn is_empty_branch(&self) -> bool {
        matches!(self, VectorNode::Branch(children) if children.is_empty())
    }
}

/// Builds the spine from a node at `level` down to a leaf.
fn new_path<T>(level: u32, leaf: Vec<T>) -> Arc<VectorNode<T>> {
    if level == 0 {
        Arc::new(VectorNode::Leaf(leaf))
    } else {
        Arc::new(VectorNode::Branch(vec![new_path(
            level - BITS_PER_LEVEL,
            leaf,
        )]))
    }
}

fn slot(index: usize, level: u32) -> usize {
    (index >> level) & LEVEL_MASK
}

/// Persistent list.
///
/// Note that every method does not modify the original list but creates a
/// new one if necessary.
pub struct PersistentVector<T> {
    len: usize,
    /// Bits of the index below the root level, 5 * (depth - 1).
    shift: u32,
    root: Arc<VectorNode<T>>,
    tail: Arc<Vec<T>>,
}

impl<T> Clone for PersistentVector<T> {
    fn clone(&self) -> Self {
        Self {
            len: self.len,
            shift: self.shift,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T> Default for PersistentVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PersistentVector<T> {
    pub fn new() -> Self {
        Self {
            len: 0,
            shift: BITS_PER_LEVEL,
            root: Arc::new(VectorNode::Branch(Vec::new())),
            tail: Arc::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the first element in the tail.
    fn tail_offset(&self) -> usize {
        self.len - self.tail.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        self.chunk(index).first()
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.get(self.len.checked_sub(1)?)
    }

    /// Returns the elements from `index` to the end of the leaf or tail
    /// holding it.
    fn chunk(&self, index: usize) -> &[T] {
        if index >= self.tail_offset() {
            return &self.tail[index - self.tail_offset()..];
        }

        let mut node = &*self.root;
        let mut level = self.shift;

        loop {
            match node {
                VectorNode::Branch(children) => match children.get(slot(index, level)) {
                    Some(child) => {
                        node = child;
                        level = level.saturating_sub(BITS_PER_LEVEL);
                    }
                    None => return &[],
                },
                VectorNode::Leaf(values) => return &values[index & LEVEL_MASK..],
            }
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            vector: self,
            chunk: [].iter(),
            next_index: 0,
            remaining: self.len,
        }
    }

    /// Returns `true` if both lists share their trie and tail.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.len == other.len
            && Arc::ptr_eq(&self.root, &other.root)
            && Arc::ptr_eq(&self.tail, &other.tail)
    }
}

impl<T: Clone> PersistentVector<T> {
    fn push_mut(&mut self, value: T) {
        Arc::make_mut(&mut self.tail).push(value);
        self.len += 1;

        if self.tail.len() == BRANCH_FACTOR {
            let tail = mem::replace(&mut self.tail, Arc::new(Vec::with_capacity(BRANCH_FACTOR)));
            self.push_leaf(Arc::try_unwrap(tail).unwrap_or_else(|tail| (*tail).clone()));
        }
    }

    /// Attaches a full leaf after the last one in the trie.
    fn push_leaf(&mut self, leaf: Vec<T>) {
        let index = self.len - BRANCH_FACTOR;

        if index == 1 << (self.shift + BITS_PER_LEVEL) {
            trace!(len = self.len, shift = self.shift, "adding a vector trie level");

            let root = mem::replace(&mut self.root, Arc::new(VectorNode::Branch(Vec::new())));
            self.root = Arc::new(VectorNode::Branch(vec![root, new_path(self.shift, leaf)]));
            self.shift += BITS_PER_LEVEL;
        } else {
            attach_leaf(&mut self.root, self.shift, index, leaf);
        }
    }

    fn pop_mut(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        if self.tail.is_empty() {
            self.tail = Arc::new(self.pop_leaf());
        }

        let value = Arc::make_mut(&mut self.tail).pop();
        self.len -= 1;

        value
    }

    /// Detaches the last leaf of the trie, dropping levels left with a single
    /// child.
    fn pop_leaf(&mut self) -> Vec<T> {
        let leaf = detach_leaf(&mut self.root, self.shift);

        while self.shift > BITS_PER_LEVEL {
            let child = match &*self.root {
                VectorNode::Branch(children) if children.len() == 1 => children[0].clone(),
                _ => break,
            };

            trace!(len = self.len, shift = self.shift, "dropping a vector trie level");

            self.root = child;
            self.shift -= BITS_PER_LEVEL;
        }

        leaf
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }

        let tail_offset = self.tail_offset();

        if index >= tail_offset {
            Arc::make_mut(&mut self.tail).get_mut(index - tail_offset)
        } else {
            value_mut(&mut self.root, self.shift, index)
        }
    }

    fn set_mut(&mut self, index: usize, value: T) -> Result<T> {
        let len = self.len;

        match self.get_mut(index) {
            Some(slot) => Ok(mem::replace(slot, value)),
            None => Err(Error::IndexOutOfBounds { index, len }),
        }
    }

    /// Inserts at `index` by popping the suffix and pushing it back behind
    /// the new element.
    fn insert_mut(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.len {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }

        let suffix = self.split_off(index);
        self.push_mut(value);
        self.extend_reversed(suffix);

        Ok(())
    }

    fn remove_mut(&mut self, index: usize) -> Result<T> {
        if index >= self.len {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }

        let suffix = self.split_off(index + 1);
        let value = self.pop_mut();
        self.extend_reversed(suffix);

        value.ok_or(Error::IndexOutOfBounds {
            index,
            len: self.len,
        })
    }

    /// Pops elements down to `len`, returning them last first.
    fn split_off(&mut self, len: usize) -> Vec<T> {
        let mut suffix = Vec::with_capacity(self.len - len);

        while self.len > len {
            suffix.extend(self.pop_mut());
        }

        suffix
    }

    fn extend_reversed(&mut self, mut suffix: Vec<T>) {
        while let Some(value) = suffix.pop() {
            self.push_mut(value);
        }
    }

    /// Keeps the elements matching a predicate, returning how many went.
    fn retain_mut(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let kept = self
            .iter()
            .filter(|&value| predicate(value))
            .cloned()
            .collect::<Vec<_>>();
        let removed = self.len - kept.len();

        if removed > 0 {
            *self = kept.into_iter().collect();
        }

        removed
    }
}

fn attach_leaf<T: Clone>(node: &mut Arc<VectorNode<T>>, level: u32, index: usize, leaf: Vec<T>) {
    let VectorNode::Branch(children) = Arc::make_mut(node) else {
        unreachable!("leaf above the bottom level")
    };

    if level == BITS_PER_LEVEL {
        children.push(Arc::new(VectorNode::Leaf(leaf)));
    } else if let Some(child) = children.get_mut(slot(index, level)) {
        attach_leaf(child, level - BITS_PER_LEVEL, index, leaf);
    } else {
        children.push(new_path(level - BITS_PER_LEVEL, leaf));
    }
}

fn detach_leaf<T: Clone>(node: &mut Arc<VectorNode<T>>, level: u32) -> Vec<T> {
    let VectorNode::Branch(children) = Arc::make_mut(node) else {
        unreachable!("leaf above the bottom level")
    };

    if level == BITS_PER_LEVEL {
        return match children.pop() {
            Some(leaf) => into_values(leaf),
            None => unreachable!("popping a leaf from an empty trie"),
        };
    }

    let Some(child) = children.last_mut() else {
        unreachable!("popping a leaf from an empty trie")
    };
    let leaf = detach_leaf(child, level - BITS_PER_LEVEL);

    if child.is_empty_branch() {
        children.pop();
    }

    leaf
}

fn into_values<T: Clone>(node: Arc<VectorNode<T>>) -> Vec<T> {
    match Arc::try_unwrap(node) {
        Ok(VectorNode::Leaf(values)) => values,
        Err(node) => match &*node {
            VectorNode::Leaf(values) => values.clone(),
            VectorNode::Branch(_) => unreachable!("branch at the bottom level"),
        },
        Ok(VectorNode::Branch(_)) => unreachable!("branch at the bottom level"),
    }
}

fn value_mut<T: Clone>(node: &mut Arc<VectorNode<T>>, level: u32, index: usize) -> Option<&mut T> {
    match Arc::make_mut(node) {
        VectorNode::Branch(children) => value_mut(
            children.get_mut(slot(index, level))?,
            level.saturating_sub(BITS_PER_LEVEL),
            index,
        ),
        VectorNode::Leaf(values) => values.get_mut(index & LEVEL_MASK),
    }
}

impl<T: Clone> PersistentVector<T> {
    pub fn builder(&self) -> VectorBuilder<T> {
        VectorBuilder {
            vector: self.clone(),
        }
    }

    /// Appends an element.
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        let mut vector = self.clone();
        vector.push_mut(value);
        vector
    }

    #[must_use]
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Self {
        let mut vector = self.clone();

        for value in values {
            vector.push_mut(value);
        }

        vector
    }

    /// Inserts an element before `index`; `index == len` appends.
    pub fn add_at(&self, index: usize, value: T) -> Result<Self> {
        let mut vector = self.clone();
        vector.insert_mut(index, value)?;
        Ok(vector)
    }

    /// Replaces the element at `index`, copying only the path to it.
    pub fn set(&self, index: usize, value: T) -> Result<Self> {
        let mut vector = self.clone();
        vector.set_mut(index, value)?;
        Ok(vector)
    }

    pub fn remove_at(&self, index: usize) -> Result<Self> {
        let mut vector = self.clone();
        vector.remove_mut(index)?;
        Ok(vector)
    }

    /// Drops the last element, or returns `None` for an empty list.
    pub fn remove_last(&self) -> Option<Self> {
        let mut vector = self.clone();
        vector.pop_mut()?;
        Some(vector)
    }

    #[must_use]
    pub fn remove_if(&self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        let mut vector = self.clone();
        vector.retain_mut(|value| !predicate(value));
        vector
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PersistentVector<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.iter().position(|other| other == value)
    }

    pub fn last_index_of(&self, value: &T) -> Option<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, other)| *other == value)
            .map(|(index, _)| index)
            .last()
    }
}

impl<T: Clone + PartialEq> PersistentVector<T> {
    /// Removes the first occurrence of a value.
    #[must_use]
    pub fn remove(&self, value: &T) -> Self {
        self.index_of(value)
            .and_then(|index| self.remove_at(index).ok())
            .unwrap_or_else(|| self.clone())
    }

    /// Removes every element equal to one of the given values.
    #[must_use]
    pub fn remove_all<'a>(&self, values: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
    {
        let values = values.into_iter().collect::<Vec<_>>();

        self.remove_if(|value| values.contains(&value))
    }

    /// Keeps only elements equal to one of the given values.
    #[must_use]
    pub fn retain_all<'a>(&self, values: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
    {
        let values = values.into_iter().collect::<Vec<_>>();

        self.remove_if(|value| !values.contains(&value))
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len);

        for value in self {
            value.hash(state);
        }
    }
}

impl<T: Debug> Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

/// # Panics
///
/// Panics if the index is out of bounds.
impl<T> Index<usize> for PersistentVector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!(
                "index {} out of bounds for length {}",
                index, self.len
            ),
        }
    }
}

impl<T: Clone> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iterator: I) -> Self {
        let mut builder = VectorBuilder::new();
        builder.extend(iterator);
        builder.into()
    }
}

/// Iterator walking a list leaf by leaf.
pub struct Iter<'a, T> {
    vector: &'a PersistentVector<T>,
    chunk: slice::Iter<'a, T>,
    next_index: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.chunk.next() {
                self.remaining -= 1;
                return Some(value);
            }

            let vector = self.vector;

            if self.next_index >= vector.len {
                return None;
            }

            let chunk = vector.chunk(self.next_index);

            if chunk.is_empty() {
                return None;
            }

            self.next_index += chunk.len();
            self.chunk = chunk.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over cloned elements, one leaf at a time.
pub struct IntoIter<T> {
    vector: PersistentVector<T>,
    chunk: std::vec::IntoIter<T>,
    next_index: usize,
}

impl<T: Clone> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.chunk.next() {
                return Some(value);
            }

            if self.next_index >= self.vector.len {
                return None;
            }

            let chunk = self.vector.chunk(self.next_index).to_vec();

            if chunk.is_empty() {
                return None;
            }

            self.next_index += chunk.len();
            self.chunk = chunk.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk.len() + (self.vector.len - self.next_index);

        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for IntoIter<T> {}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            vector: self,
            chunk: Vec::new().into_iter(),
            next_index: 0,
        }
    }
}

/// Mutable view of a list.
///
/// Leaves and branches referenced by this builder alone are changed in
/// place; the ones shared with built lists are copied on first write.
pub struct VectorBuilder<T> {
    vector: PersistentVector<T>,
}

impl<T> Default for VectorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for VectorBuilder<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("VectorBuilder")
            .field("vector", &self.vector)
            .finish()
    }
}

impl<T> VectorBuilder<T> {
    pub fn new() -> Self {
        Self {
            vector: PersistentVector::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.vector.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.vector.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.vector.last()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.vector.iter()
    }

    /// Freezes the current contents into a list in constant time.
    pub fn build(&self) -> PersistentVector<T> {
        trace!(len = self.len(), "building vector");

        self.vector.clone()
    }
}

impl<T: PartialEq> VectorBuilder<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.vector.contains(value)
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.vector.index_of(value)
    }

    pub fn last_index_of(&self, value: &T) -> Option<usize> {
        self.vector.last_index_of(value)
    }
}

impl<T: Clone> VectorBuilder<T> {
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.vector.get_mut(index)
    }

    pub fn add(&mut self, value: T) {
        self.vector.push_mut(value);
    }

    pub fn add_at(&mut self, index: usize, value: T) -> Result<()> {
        self.vector.insert_mut(index, value)
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        self.vector.set_mut(index, value)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        self.vector.remove_mut(index)
    }

    pub fn remove_last(&mut self) -> Option<T> {
        self.vector.pop_mut()
    }

    pub fn retain(&mut self, predicate: impl FnMut(&T) -> bool) {
        self.vector.retain_mut(predicate);
    }

    pub fn clear(&mut self) {
        self.vector = PersistentVector::new();
    }
}

impl<T: Clone> Extend<T> for VectorBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterator: I) {
        for value in iterator {
            self.add(value);
        }
    }
}

impl<T> From<VectorBuilder<T>> for PersistentVector<T> {
    fn from(builder: VectorBuilder<T>) -> Self {
        builder.vector
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::random;
    use std::thread::spawn;

    const SIZES: [usize; 12] = [0, 1, 31, 32, 33, 63, 64, 1024, 1025, 1056, 1057, 32 * 32 * 32 + 1];

    fn vector(len: usize) -> PersistentVector<usize> {
        (0..len).collect()
    }

    /// Depth of every leaf, checking the node shapes on the way down.
    fn leaf_depths<T>(node: &VectorNode<T>, depth: usize, depths: &mut Vec<usize>) {
        match node {
            VectorNode::Branch(children) => {
                assert!(children.len() <= BRANCH_FACTOR);

                for child in children {
                    leaf_depths(child, depth + 1, depths);
                }
            }
            VectorNode::Leaf(values) => {
                assert_eq!(values.len(), BRANCH_FACTOR);
                depths.push(depth);
            }
        }
    }

    fn assert_valid<T>(vector: &PersistentVector<T>) {
        let mut depths = vec![];
        leaf_depths(&vector.root, 0, &mut depths);

        assert!(vector.tail.len() < BRANCH_FACTOR);
        assert_eq!(depths.len() * BRANCH_FACTOR, vector.tail_offset());
        assert!(depths
            .iter()
            .all(|depth| *depth as u32 * BITS_PER_LEVEL == vector.shift));
        assert!(vector.shift == BITS_PER_LEVEL || !matches!(&*vector.root, VectorNode::Branch(children) if children.len() < 2));
    }

    #[test]
    fn new() {
        PersistentVector::<usize>::new();
    }

    #[test]
    fn add_and_get() {
        for len in SIZES {
            let vector = vector(len);

            assert_eq!(vector.len(), len);
            assert_valid(&vector);

            for index in 0..len {
                assert_eq!(vector.get(index), Some(&index));
            }

            assert_eq!(vector.get(len), None);
        }
    }

    #[test]
    fn depth_grows_with_capacity() {
        // The tail holds the last 31 elements at most.
        assert_eq!(vector(32 * 32 + 31).shift, BITS_PER_LEVEL);
        assert_eq!(vector(32 * 32 + 32).shift, 2 * BITS_PER_LEVEL);
        assert_eq!(vector(32 * 32 * 32 + 31).shift, 2 * BITS_PER_LEVEL);
        assert_eq!(vector(32 * 32 * 32 + 32).shift, 3 * BITS_PER_LEVEL);
    }

    #[test]
    fn remove_last() {
        for len in SIZES {
            let mut vector = vector(len);

            for expected in (0..len).rev() {
                assert_eq!(vector.last(), Some(&expected));

                vector = vector.remove_last().unwrap();

                assert_eq!(vector.len(), expected);
            }

            assert_valid(&vector);
            assert_eq!(vector.shift, BITS_PER_LEVEL);
            assert!(vector.remove_last().is_none());
        }
    }

    #[test]
    fn remove_last_shrinks_levels() {
        let mut vector = vector(32 * 32 * 32 + 64);

        assert_eq!(vector.shift, 3 * BITS_PER_LEVEL);

        for _ in 0..64 {
            vector = vector.remove_last().unwrap();
            assert_valid(&vector);
        }

        assert_eq!(vector.shift, 2 * BITS_PER_LEVEL);
    }

    #[test]
    fn set() {
        for len in SIZES.into_iter().filter(|len| *len > 0) {
            let original = vector(len);

            for index in [0, len / 2, len - 1] {
                let vector = original.set(index, 42).unwrap();

                assert_eq!(vector[index], 42);
                assert_eq!(original[index], index);
                assert_eq!(vector.len(), len);
            }

            assert_eq!(
                original.set(len, 0).unwrap_err(),
                Error::IndexOutOfBounds { index: len, len }
            );
        }
    }

    #[test]
    fn set_copies_path_only() {
        let original = vector(32 * 32 * 4);
        let vector = original.set(5, 42).unwrap();

        let (VectorNode::Branch(old), VectorNode::Branch(new)) = (&*original.root, &*vector.root) else {
            panic!("expected branches");
        };

        assert!(!Arc::ptr_eq(&old[0], &new[0]));
        assert!(old[1..].iter().zip(&new[1..]).all(|(old, new)| Arc::ptr_eq(old, new)));
        assert!(Arc::ptr_eq(&original.tail, &vector.tail));
    }

    #[test]
    fn add_at() {
        let list = vector(40);

        assert_eq!(
            list.add_at(0, 100).unwrap().iter().copied().collect::<Vec<_>>(),
            [100].into_iter().chain(0..40).collect::<Vec<_>>()
        );
        assert_eq!(list.add_at(40, 100).unwrap().last(), Some(&100));
        assert_eq!(list.add_at(35, 100).unwrap()[35], 100);
        assert_eq!(list.add_at(35, 100).unwrap()[36], 35);
        assert_eq!(
            list.add_at(41, 0).unwrap_err(),
            Error::IndexOutOfBounds { index: 41, len: 40 }
        );
        assert_valid(&list.add_at(3, 100).unwrap());
    }

    #[test]
    fn remove_at() {
        let list = vector(40);
        let removed = list.remove_at(3).unwrap();

        assert_eq!(removed.len(), 39);
        assert_eq!(removed[2], 2);
        assert_eq!(removed[3], 4);
        assert_eq!(list[3], 3);
        assert_valid(&removed);
        assert_eq!(
            list.remove_at(40).unwrap_err(),
            Error::IndexOutOfBounds { index: 40, len: 40 }
        );
    }

    #[test]
    fn random_edits() {
        let mut list = PersistentVector::new();
        let mut reference = Vec::new();

        for _ in 0..1 << 12 {
            let value = random::<u8>();

            match random::<u8>() % 4 {
                0 | 1 => {
                    list = list.add(value);
                    reference.push(value);
                }
                2 if !reference.is_empty() => {
                    let index = random::<u64>() as usize % reference.len();
                    list = list.set(index, value).unwrap();
                    reference[index] = value;
                }
                _ => {
                    list = list.remove_last().unwrap_or_default();
                    reference.pop();
                }
            }

            assert_eq!(list.len(), reference.len());
        }

        assert_valid(&list);
        assert!(list.iter().eq(reference.iter()));
    }

    #[test]
    fn search() {
        let list = PersistentVector::new().add_all([1, 2, 3, 2, 1]);

        assert_eq!(list.index_of(&2), Some(1));
        assert_eq!(list.last_index_of(&2), Some(3));
        assert_eq!(list.index_of(&4), None);
        assert_eq!(list.last_index_of(&4), None);
        assert!(list.contains(&3));
        assert_eq!(list.first(), Some(&1));
    }

    #[test]
    fn remove_values() {
        let list = PersistentVector::new().add_all([1, 2, 3, 2, 1]);

        assert_eq!(list.remove(&2), PersistentVector::new().add_all([1, 3, 2, 1]));
        assert!(list.remove(&4).ptr_eq(&list));
        assert_eq!(list.remove_all(&[1, 3]), PersistentVector::new().add_all([2, 2]));
        assert_eq!(list.retain_all(&[1, 3]), PersistentVector::new().add_all([1, 3, 1]));
        assert_eq!(list.remove_if(|value| *value > 1), PersistentVector::new().add_all([1, 1]));
        assert!(list.remove_if(|_| false).ptr_eq(&list));
        assert!(list.clear().is_empty());
    }

    #[test]
    fn iterate() {
        for len in SIZES {
            let list = vector(len);

            assert_eq!(list.iter().len(), len);
            assert!(list.iter().copied().eq(0..len));
            assert!(list.clone().into_iter().eq(0..len));
        }
    }

    #[test]
    fn equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |list: &PersistentVector<usize>| {
            let mut hasher = DefaultHasher::new();
            list.hash(&mut hasher);
            hasher.finish()
        };

        assert_eq!(vector(100), vector(101).remove_last().unwrap());
        assert_eq!(hash(&vector(100)), hash(&vector(101).remove_last().unwrap()));
        assert_ne!(vector(100), vector(100).set(0, 1).unwrap());
    }

    #[test]
    fn debug() {
        assert_eq!(format!("{:?}", vector(3)), "[0, 1, 2]");
    }

    #[test]
    #[should_panic(expected = "index 3 out of bounds for length 3")]
    fn index_out_of_bounds() {
        let _ = vector(3)[3];
    }

    #[test]
    fn send_and_sync() {
        let list: PersistentVector<usize> = PersistentVector::new();
        spawn(move || list);
    }

    mod builder {
        use super::*;

        #[test]
        fn build() {
            let mut builder = VectorBuilder::new();

            for value in 0..2000 {
                builder.add(value);
            }

            assert_eq!(builder.set(10, 42), Ok(10));
            assert_eq!(builder.remove_at(0), Ok(0));
            assert_eq!(builder.add_at(0, 7), Ok(()));
            assert_eq!(builder.remove_last(), Some(1999));

            let list = builder.build();

            assert_eq!(list.len(), 1999);
            assert_eq!(list[0], 7);
            assert_eq!(list[10], 42);
            assert_valid(&list);
        }

        #[test]
        fn mutates_in_place_until_built() {
            let mut builder = vector(100).builder();

            builder.set(0, 1).unwrap();
            let root = Arc::as_ptr(&builder.vector.root);
            builder.set(1, 2).unwrap();
            assert_eq!(Arc::as_ptr(&builder.vector.root), root);

            let list = builder.build();
            builder.set(2, 3).unwrap();
            *builder.get_mut(90).unwrap() = 0;

            assert_ne!(Arc::as_ptr(&builder.vector.root), root);
            assert_eq!(list[2], 2);
            assert_eq!(list[90], 90);
            assert_eq!(builder.get(2), Some(&3));
            assert_eq!(builder.get(90), Some(&0));
        }

        #[test]
        fn read() {
            let mut builder = vector(40).builder();
            builder.add(3);

            assert_eq!(builder.first(), Some(&0));
            assert_eq!(builder.last(), Some(&3));
            assert!(builder.contains(&39));
            assert!(!builder.contains(&40));
            assert_eq!(builder.index_of(&3), Some(3));
            assert_eq!(builder.last_index_of(&3), Some(40));
            assert_eq!(VectorBuilder::<usize>::new().first(), None);
        }

        #[test]
        fn thawing_keeps_original() {
            let original = vector(1025);
            let mut builder = original.builder();

            builder.retain(|value| value % 2 == 0);
            builder.add(5000);

            assert_eq!(original, vector(1025));
            assert_eq!(builder.len(), 514);
            assert_eq!(builder.iter().last(), Some(&5000));

            builder.clear();
            assert!(builder.is_empty());
        }
    }
}
