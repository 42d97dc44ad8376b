//! Persistent set iterating in insertion order.

use crate::{
    error::Result,
    ordered_map::{self, Keys, OrderedCursor, OrderedMapBuilder, PersistentOrderedMap},
    set::PersistentHashSet,
};
use std::{
    borrow::Borrow,
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
};

/// Set data structure iterating in insertion order.
pub struct PersistentOrderedSet<T> {
    map: PersistentOrderedMap<T, ()>,
}

impl<T: Clone> Clone for PersistentOrderedSet<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T> Default for PersistentOrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PersistentOrderedSet<T> {
    pub fn new() -> Self {
        Self {
            map: PersistentOrderedMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns values from the oldest to the newest.
    pub fn iter(&self) -> Keys<'_, T, ()> {
        self.map.keys()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }
}

impl<T: Hash + Eq> PersistentOrderedSet<T> {
    pub fn contains<Q: Hash + Eq + ?Sized>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.map.contains_key(value)
    }

    pub fn first(&self) -> Option<&T> {
        self.map.first().map(|(value, _)| value)
    }

    pub fn last(&self) -> Option<&T> {
        self.map.last().map(|(value, _)| value)
    }
}

impl<T: Clone + Hash + Eq> PersistentOrderedSet<T> {
    /// Appends a value unless it is already present, in which case the set
    /// is returned as is.
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        Self {
            map: self.map.put(value, ()),
        }
    }

    #[must_use]
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Self {
        Self {
            map: self.map.put_all(values.into_iter().map(|value| (value, ()))),
        }
    }

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

    /// Keeps only the values also found in another set, in this set's order.
    #[must_use]
    pub fn retain_all(&self, other: &Self) -> Self {
        self.remove_if(|value| !other.contains(value))
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    pub fn builder(&self) -> OrderedSetBuilder<T> {
        OrderedSetBuilder {
            map: self.map.builder(),
        }
    }
}

impl<T: Hash + Eq> PartialEq for PersistentOrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq> Eq for PersistentOrderedSet<T> {}

impl<T: Hash + Eq> PartialEq<PersistentHashSet<T>> for PersistentOrderedSet<T> {
    fn eq(&self, other: &PersistentHashSet<T>) -> bool {
        self.len() == other.len() && self.iter().all(|value| other.contains(value))
    }
}

impl<T: Hash + Eq> PartialEq<PersistentOrderedSet<T>> for PersistentHashSet<T> {
    fn eq(&self, other: &PersistentOrderedSet<T>) -> bool {
        other == self
    }
}

impl<T: Hash + Eq> Hash for PersistentOrderedSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}

impl<T: Debug + Hash + Eq> Debug for PersistentOrderedSet<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Clone + Hash + Eq> FromIterator<T> for PersistentOrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iterator: I) -> Self {
        let mut builder = OrderedSetBuilder::new();
        builder.extend(iterator);
        builder.into()
    }
}

impl<'a, T: Hash + Eq> IntoIterator for &'a PersistentOrderedSet<T> {
    type IntoIter = Keys<'a, T, ()>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct IntoIter<T>(ordered_map::IntoIter<T, ()>);

impl<T: Clone + Hash + Eq> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(value, _)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<T: Clone + Hash + Eq> IntoIterator for PersistentOrderedSet<T> {
    type IntoIter = IntoIter<T>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self.map.into_iter())
    }
}

/// Mutable view of an ordered set.
#[derive(Debug)]
pub struct OrderedSetBuilder<T> {
    map: OrderedMapBuilder<T, ()>,
}

impl<T> Default for OrderedSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedSetBuilder<T> {
    pub fn new() -> Self {
        Self {
            map: OrderedMapBuilder::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T: Clone> OrderedSetBuilder<T> {
    pub fn build(&self) -> PersistentOrderedSet<T> {
        PersistentOrderedSet {
            map: self.map.build(),
        }
    }
}

impl<T: Hash + Eq> OrderedSetBuilder<T> {
    pub fn contains<Q: Hash + Eq + ?Sized>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
    {
        self.map.contains_key(value)
    }

    pub fn iter(&self) -> Keys<'_, T, ()> {
        self.map.keys()
    }
}

impl<T: Clone + Hash + Eq> OrderedSetBuilder<T> {
    /// Appends a value, returning `false` if it was already present.
    pub fn add(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }

        self.map.put(value, ());
        true
    }

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

    pub fn cursor(&self) -> OrderedSetCursor<T> {
        OrderedSetCursor(self.map.cursor())
    }
}

impl<T: Clone + Hash + Eq> Extend<T> for OrderedSetBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iterator: I) {
        for value in iterator {
            self.add(value);
        }
    }
}

impl<T> From<OrderedSetBuilder<T>> for PersistentOrderedSet<T> {
    fn from(builder: OrderedSetBuilder<T>) -> Self {
        Self {
            map: builder.map.into(),
        }
    }
}

/// Cursor walking an ordered set builder in insertion order.
#[derive(Debug)]
pub struct OrderedSetCursor<T>(OrderedCursor<T, ()>);

impl<T: Clone + Hash + Eq> OrderedSetCursor<T> {
    pub fn has_next(&self, builder: &OrderedSetBuilder<T>) -> Result<bool> {
        self.0.has_next(&builder.map)
    }

    pub fn next(&mut self, builder: &OrderedSetBuilder<T>) -> Result<Option<T>> {
        Ok(self.0.next(&builder.map)?.map(|(value, _)| value))
    }

    pub fn remove(&mut self, builder: &mut OrderedSetBuilder<T>) -> Result<()> {
        self.0.remove(&mut builder.map)
    }
}
