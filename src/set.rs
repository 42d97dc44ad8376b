//! Persistent hash set and its builder.

use crate::{
    error::Result,
    map::{self, Cursor, HashMapBuilder, Keys, PersistentHashMap},
};
use std::{
    borrow::Borrow,
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    iter::FusedIterator,
};

/// Set data structure of HAMT.
///
/// Note that every method does not modify the original set but creates a new
/// one if necessary.
pub struct PersistentHashSet<T> {
    map: PersistentHashMap<T, ()>,
}

impl<T> Clone for PersistentHashSet<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T> Default for PersistentHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PersistentHashSet<T> {
    /// Creates a new set.
    pub fn new() -> Self {
        Self {
            map: PersistentHashMap::new(),
        }
    }

    /// Returns a size of a set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if a set is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns values in a set.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter(self.map.keys())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }
}

impl<T: Hash + Eq> PersistentHashSet<T> {
    /// Checks if a value is contained in a set.
    pub fn contains<Q: Hash + Eq + ?Sized>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.map.contains_key(value)
    }

    /// Checks if every value of a set is also in another.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|value| other.contains(value))
    }
}

impl<T: Clone + Hash + Eq> PersistentHashSet<T> {
    /// Inserts a value into a set.
    ///
    /// Adding a value already in the set returns a set sharing this one's
    /// trie.
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        Self {
            map: self.map.put(value, ()),
        }
    }

    /// Extends a set with an iterator of values.
    #[must_use]
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Self {
        Self {
            map: self.map.put_all(values.into_iter().map(|value| (value, ()))),
        }
    }

    /// Removes a value from a set if any.
    #[must_use]
    pub fn remove<Q: Hash + Eq + ?Sized>(&self, value: &Q) -> Self
    where
        T: Borrow<Q>,
    {
        Self {
            map: self.map.remove(value),
        }
    }

    #[must_use]
    pub fn remove_all<'a>(&self, values: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: 'a,
    {
        let mut builder = self.builder();

        for value in values {
            builder.remove(value);
        }

        builder.into()
    }

    #[must_use]
    pub fn remove_if(&self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        Self {
            map: self.map.remove_if(|value, _| predicate(value)),
        }
    }

    /// Keeps only the values also found in another set.
    #[must_use]
    pub fn retain_all(&self, other: &Self) -> Self {
        self.remove_if(|value| !other.contains(value))
    }

    /// Returns an empty set.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Calculates union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        let (larger, smaller) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        larger.add_all(smaller.iter().cloned())
    }

    /// Calculates intersection of two sets.
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter()
            .filter(|value| other.contains(*value))
            .cloned()
            .collect()
    }

    /// Calculates difference of two sets.
    pub fn difference(&self, other: &Self) -> Self {
        self.iter()
            .filter(|value| !other.contains(*value))
            .cloned()
            .collect()
    }

    /// Thaws a set into a builder sharing all of its nodes.
    pub fn builder(&self) -> HashSetBuilder<T> {
        HashSetBuilder {
            map: self.map.builder(),
        }
    }
}

impl<T: Hash + Eq> PartialEq for PersistentHashSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq> Eq for PersistentHashSet<T> {}

impl<T: Hash> Hash for PersistentHashSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}

impl<T: Debug> Debug for PersistentHashSet<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Clone + Hash + Eq> FromIterator<T> for PersistentHashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iterator: I) -> Self {
        let mut builder = HashSetBuilder::new();
        builder.extend(iterator);
        builder.into()
    }
}

pub struct Iter<'a, T>(Keys<'a, T, ()>);

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a PersistentHashSet<T> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct IntoIter<T>(map::IntoIter<T, ()>);

impl<T: Clone> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(value, _)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T: Clone> IntoIterator for PersistentHashSet<T> {
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.map.into_iter())
    }
}

/// Mutable view of a hash set.
#[derive(Debug)]
pub struct HashSetBuilder<T> {
    map: HashMapBuilder<T, ()>,
}

impl<T> Default for HashSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HashSetBuilder<T> {
    pub fn new() -> Self {
        Self {
            map: HashMapBuilder::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter(self.map.keys())
    }

    /// Freezes the current contents into a set in constant time.
    pub fn build(&self) -> PersistentHashSet<T> {
        PersistentHashSet {
            map: self.map.build(),
        }
    }
}

impl<T: Hash + Eq> HashSetBuilder<T> {
    pub fn contains<Q: Hash + Eq + ?Sized>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.map.contains_key(value)
    }
}

impl<T: Clone + Hash + Eq> HashSetBuilder<T> {
    /// Adds a value, returning `false` if it was already present.
    pub fn add(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }

        self.map.put(value, ());
        true
    }

    /// Removes a value, returning `true` if it was present.
    pub fn remove<Q: Hash + Eq + ?Sized>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.map.remove(value).is_some()
    }

    pub fn retain(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        self.map.retain(|value, _| predicate(value));
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Opens a fail-fast cursor over the current values.
    pub fn cursor(&self) -> SetCursor<T> {
        SetCursor(self.map.cursor())
    }
}

impl<T: Clone + Hash + Eq> Extend<T> for HashSetBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterator: I) {
        for value in iterator {
            self.add(value);
        }
    }
}

impl<T> From<HashSetBuilder<T>> for PersistentHashSet<T> {
    fn from(builder: HashSetBuilder<T>) -> Self {
        Self {
            map: builder.map.into(),
        }
    }
}

/// Cursor over the values a set builder held when it was opened.
#[derive(Debug)]
pub struct SetCursor<T>(Cursor<T, ()>);

impl<T: Clone + Hash + Eq> SetCursor<T> {
    pub fn has_next(&self, builder: &HashSetBuilder<T>) -> Result<bool> {
        self.0.has_next(&builder.map)
    }

    pub fn next(&mut self, builder: &HashSetBuilder<T>) -> Result<Option<T>> {
        Ok(self.0.next(&builder.map)?.map(|(value, _)| value))
    }

    /// Removes the value last returned by `next` from the builder.
    pub fn remove(&mut self, builder: &mut HashSetBuilder<T>) -> Result<()> {
        self.0.remove(&mut builder.map)
    }
}
