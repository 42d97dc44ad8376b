//! Persistent hash map and its builder.

use crate::{
    error::{Error, Result},
    hamt::Hamt,
    utilities::entries_hash,
};
use std::{
    borrow::Borrow,
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    iter::FusedIterator,
    ops::Index,
};
use tracing::{debug, trace};

pub use crate::hamt::{IntoIter, Iter};

/// Map data structure of HAMT.
///
/// Note that every method does not modify the original map but creates a new
/// one if necessary. Unchanged subtrees are shared between the maps.
pub struct PersistentHashMap<K, V> {
    hamt: Hamt<K, V>,
}

impl<K, V> Clone for PersistentHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            hamt: self.hamt.clone(),
        }
    }
}

impl<K, V> Default for PersistentHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new map.
    pub fn new() -> Self {
        Self { hamt: Hamt::new() }
    }

    /// Returns a size of a map.
    pub fn len(&self) -> usize {
        self.hamt.len()
    }

    /// Returns true if a map is empty.
    pub fn is_empty(&self) -> bool {
        self.hamt.is_empty()
    }

    /// Returns key-value pairs in a map.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.hamt.iter()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// Returns `true` if both maps share one trie, which implies they are
    /// equal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.hamt.ptr_eq(&other.hamt)
    }
}

impl<K: Hash + Eq, V> PersistentHashMap<K, V> {
    /// Finds a value corresponding to a key.
    pub fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.hamt.get(key)
    }

    pub fn get_key_value<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        self.hamt.get_key_value(key)
    }

    pub fn contains_key<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.hamt.contains_key(key)
    }
}

impl<K: Hash + Eq, V: PartialEq> PersistentHashMap<K, V> {
    /// Checks if any key maps to a value. This is a linear scan.
    pub fn contains_value(&self, value: &V) -> bool {
        self.values().any(|other| other == value)
    }

    pub fn contains_entry<Q: Hash + Eq + ?Sized>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
    {
        self.get(key) == Some(value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> PersistentHashMap<K, V> {
    /// Thaws a map into a builder sharing all of its nodes.
    pub fn builder(&self) -> HashMapBuilder<K, V> {
        HashMapBuilder {
            hamt: self.hamt.clone(),
            modifications: 0,
        }
    }

    /// Removes a key from a map if any.
    ///
    /// Removing an absent key returns a map sharing this one's trie.
    #[must_use]
    pub fn remove<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
    {
        let mut map = self.clone();
        map.hamt.remove(key);
        map
    }

    /// Removes every key of an iterator.
    #[must_use]
    pub fn remove_all<'a, Q: Hash + Eq + ?Sized + 'a>(
        &self,
        keys: impl IntoIterator<Item = &'a Q>,
    ) -> Self
    where
        K: Borrow<Q>,
    {
        let mut builder = self.builder();

        for key in keys {
            builder.remove(key);
        }

        builder.into()
    }

    /// Removes every entry matching a predicate.
    #[must_use]
    pub fn remove_if(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Self {
        let mut map = self.clone();
        map.hamt.retain(|key, value| !predicate(key, value));
        map
    }

    /// Returns an empty map.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PersistentHashMap<K, V> {
    /// Inserts a key-value pair into a map.
    ///
    /// Putting a value equal to the one already stored returns a map sharing
    /// this one's trie.
    #[must_use]
    pub fn put(&self, key: K, value: V) -> Self {
        if self.get(&key) == Some(&value) {
            return self.clone();
        }

        let mut map = self.clone();
        map.hamt.insert(key, value);
        map
    }

    /// Puts every pair of an iterator, later pairs overriding earlier ones.
    #[must_use]
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut builder = self.builder();
        builder.extend(entries);
        builder.into()
    }

    /// Removes a key only while it maps to the given value.
    #[must_use]
    pub fn remove_entry<Q: Hash + Eq + ?Sized>(&self, key: &Q, value: &V) -> Self
    where
        K: Borrow<Q>,
    {
        if self.contains_entry(key, value) {
            self.remove(key)
        } else {
            self.clone()
        }
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || self.len() == other.len()
                && self
                    .iter()
                    .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentHashMap<K, V> {}

impl<K: Hash, V: Hash> Hash for PersistentHashMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        state.write_u64(entries_hash(self.iter()));
    }
}

impl<K: Debug, V: Debug> Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

/// # Panics
///
/// Panics if the key is absent.
impl<K, V, Q> Index<&Q> for PersistentHashMap<K, V>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not found in map"),
        }
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iterator: I) -> Self {
        let mut builder = HashMapBuilder::new();
        builder.extend(iterator);
        builder.into()
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentHashMap<K, V> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        self.hamt.into_iter()
    }
}

pub struct Keys<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V>(Iter<'a, K, V>);

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Mutable view of a hash map.
///
/// A builder changes the nodes it alone references in place and copies the
/// ones it shares with a map, so maps built from it never change.
#[derive(Debug)]
pub struct HashMapBuilder<K, V> {
    hamt: Hamt<K, V>,
    modifications: usize,
}

impl<K, V> Default for HashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> HashMapBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            hamt: Hamt::new(),
            modifications: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.hamt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hamt.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.hamt.iter()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    /// Freezes the current contents into a map in constant time.
    pub fn build(&self) -> PersistentHashMap<K, V> {
        trace!(
            len = self.len(),
            modifications = self.modifications,
            "building hash map"
        );

        PersistentHashMap {
            hamt: self.hamt.clone(),
        }
    }
}

impl<K: Hash + Eq, V> HashMapBuilder<K, V> {
    pub fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.hamt.get(key)
    }

    pub fn get_key_value<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        self.hamt.get_key_value(key)
    }

    pub fn contains_key<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.hamt.contains_key(key)
    }
}

impl<K: Hash + Eq, V: PartialEq> HashMapBuilder<K, V> {
    pub fn contains_value(&self, value: &V) -> bool {
        self.values().any(|other| other == value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> HashMapBuilder<K, V> {
    /// Returns a mutable reference to a value. Counts as a modification when
    /// the key is present.
    pub fn get_mut<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
    {
        let value = self.hamt.get_mut(key)?;
        self.modifications += 1;
        Some(value)
    }

    pub fn remove<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        let (_, value) = self.hamt.remove(key)?;
        self.modifications += 1;
        Some(value)
    }

    /// Removes every entry the predicate rejects.
    pub fn retain(&mut self, predicate: impl FnMut(&K, &V) -> bool) {
        self.modifications += self.hamt.retain(predicate);
    }

    pub fn clear(&mut self) {
        self.modifications += 1;
        self.hamt.clear();
    }

    /// Opens a fail-fast cursor over the current entries.
    pub fn cursor(&self) -> Cursor<K, V> {
        Cursor {
            entries: self.hamt.clone().into_iter(),
            current: None,
            expected_modifications: self.modifications,
        }
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> HashMapBuilder<K, V> {
    /// Inserts a pair, returning the value it replaced. Putting the value a
    /// key already holds is not a modification.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if self.get(&key) == Some(&value) {
            return Some(value);
        }

        self.modifications += 1;
        self.hamt.insert(key, value)
    }

    /// Removes a key only while it maps to the given value.
    pub fn remove_entry<Q: Hash + Eq + ?Sized>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
    {
        self.get(key) == Some(value) && self.remove(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> Extend<(K, V)> for HashMapBuilder<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iterator: I) {
        for (key, value) in iterator {
            self.put(key, value);
        }
    }
}

impl<K, V> From<HashMapBuilder<K, V>> for PersistentHashMap<K, V> {
    fn from(builder: HashMapBuilder<K, V>) -> Self {
        Self {
            hamt: builder.hamt,
        }
    }
}

/// Cursor over the entries a builder held when the cursor was opened.
///
/// The cursor does not borrow its builder. Every call takes the builder
/// instead and fails with [`Error::ConcurrentModification`] once the builder
/// was changed by anything but this cursor.
#[derive(Debug)]
pub struct Cursor<K, V> {
    entries: IntoIter<K, V>,
    current: Option<K>,
    expected_modifications: usize,
}

impl<K: Clone + Hash + Eq, V: Clone> Cursor<K, V> {
    fn check(&self, builder: &HashMapBuilder<K, V>) -> Result<()> {
        if builder.modifications == self.expected_modifications {
            Ok(())
        } else {
            debug!(
                expected = self.expected_modifications,
                actual = builder.modifications,
                "builder modified under an open cursor"
            );

            Err(Error::ConcurrentModification)
        }
    }

    pub fn has_next(&self, builder: &HashMapBuilder<K, V>) -> Result<bool> {
        self.check(builder)?;

        Ok(self.entries.len() > 0)
    }

    /// Advances to the next entry, or returns `None` at the end.
    pub fn next(&mut self, builder: &HashMapBuilder<K, V>) -> Result<Option<(K, V)>> {
        self.check(builder)?;

        let entry = self.entries.next();
        self.current = entry.as_ref().map(|(key, _)| key.clone());

        Ok(entry)
    }

    /// Removes the entry last returned by `next` from the builder.
    pub fn remove(&mut self, builder: &mut HashMapBuilder<K, V>) -> Result<V> {
        self.check(builder)?;

        let key = self.current.take().ok_or(Error::IllegalState)?;
        let value = builder.remove(&key).ok_or(Error::IllegalState)?;
        self.expected_modifications = builder.modifications;

        Ok(value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> Cursor<K, V> {
    /// Replaces the value of the entry last returned by `next`, returning the
    /// old value.
    pub fn set_value(&mut self, builder: &mut HashMapBuilder<K, V>, value: V) -> Result<V> {
        self.check(builder)?;

        let key = self.current.clone().ok_or(Error::IllegalState)?;
        let old = builder.put(key, value).ok_or(Error::IllegalState)?;
        self.expected_modifications = builder.modifications;

        Ok(old)
    }
}
