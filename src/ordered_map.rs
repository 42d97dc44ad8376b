//! Persistent map iterating in insertion order.
//!
//! Entries live in a hash trie whose values carry the keys of their
//! neighbours, so the trie doubles as a doubly linked list. Appending and
//! unlinking only touch the trie paths of the entry and its neighbours.

use crate::{
    error::{Error, Result},
    hamt::Hamt,
    map::PersistentHashMap,
    utilities::entries_hash,
};
use std::{
    borrow::Borrow,
    fmt::{self, Debug, Formatter},
    hash::{Hash, Hasher},
    iter::FusedIterator,
    marker::PhantomData,
    mem,
    ops::Index,
};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq)]
struct Links<K, V> {
    value: V,
    previous: Option<K>,
    next: Option<K>,
}

#[derive(Debug)]
struct Chain<K, V> {
    first: Option<K>,
    last: Option<K>,
    hamt: Hamt<K, Links<K, V>>,
}

impl<K: Clone, V> Clone for Chain<K, V> {
    fn clone(&self) -> Self {
        Self {
            first: self.first.clone(),
            last: self.last.clone(),
            hamt: self.hamt.clone(),
        }
    }
}

impl<K, V> Chain<K, V> {
    fn new() -> Self {
        Self {
            first: None,
            last: None,
            hamt: Hamt::new(),
        }
    }

    fn len(&self) -> usize {
        self.hamt.len()
    }

    fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            hamt: &self.hamt,
            front: self.first.as_ref(),
            back: self.last.as_ref(),
            remaining: self.len(),
        }
    }
}

impl<K: Hash + Eq, V> Chain<K, V> {
    fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.hamt.get(key).map(|links| &links.value)
    }

    fn endpoint<'a>(&'a self, key: Option<&'a K>) -> Option<(&'a K, &'a V)> {
        let key = key?;

        self.get(key).map(|value| (key, value))
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Chain<K, V> {
    fn links_mut(&mut self, key: &K) -> &mut Links<K, V> {
        match self.hamt.get_mut(key) {
            Some(links) => links,
            None => unreachable!("chain links to a key missing from the trie"),
        }
    }

    /// Updates the value of a present key in place or appends a new key.
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(links) = self.hamt.get_mut(&key) {
            return Some(mem::replace(&mut links.value, value));
        }

        let previous = self.last.replace(key.clone());

        match &previous {
            Some(previous) => self.links_mut(previous).next = Some(key.clone()),
            None => self.first = Some(key.clone()),
        }

        self.hamt.insert(
            key,
            Links {
                value,
                previous,
                next: None,
            },
        );

        None
    }

    fn value_mut<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
    {
        self.hamt.get_mut(key).map(|links| &mut links.value)
    }

    /// Unlinks a key, joining its neighbours.
    fn remove<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        let (_, links) = self.hamt.remove(key)?;

        match &links.previous {
            Some(previous) => self.links_mut(previous).next = links.next.clone(),
            None => self.first = links.next.clone(),
        }

        match &links.next {
            Some(next) => self.links_mut(next).previous = links.previous.clone(),
            None => self.last = links.previous.clone(),
        }

        Some(links.value)
    }

    fn retain(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
        let rejected = self
            .iter()
            .filter(|&(key, value)| !predicate(key, value))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        for key in &rejected {
            self.remove(key);
        }

        rejected.len()
    }
}

/// Map data structure iterating in insertion order.
///
/// Putting an existing key changes its value but not its position.
pub struct PersistentOrderedMap<K, V> {
    chain: Chain<K, V>,
}

impl<K: Clone, V> Clone for PersistentOrderedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
        }
    }
}

impl<K, V> Default for PersistentOrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PersistentOrderedMap<K, V> {
    pub fn new() -> Self {
        Self {
            chain: Chain::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns entries from the oldest to the newest.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.chain.iter()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.chain.hamt.ptr_eq(&other.chain.hamt)
    }
}

impl<K: Hash + Eq, V> PersistentOrderedMap<K, V> {
    pub fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.chain.get(key)
    }

    pub fn get_key_value<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        self.chain
            .hamt
            .get_key_value(key)
            .map(|(key, links)| (key, &links.value))
    }

    pub fn contains_key<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.chain.hamt.contains_key(key)
    }

    /// Returns the oldest entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.chain.endpoint(self.chain.first.as_ref())
    }

    /// Returns the newest entry.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.chain.endpoint(self.chain.last.as_ref())
    }
}

impl<K: Hash + Eq, V: PartialEq> PersistentOrderedMap<K, V> {
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

impl<K: Clone + Hash + Eq, V: Clone> PersistentOrderedMap<K, V> {
    pub fn builder(&self) -> OrderedMapBuilder<K, V> {
        OrderedMapBuilder {
            chain: self.chain.clone(),
            modifications: 0,
        }
    }

    /// Removes a key, joining its neighbours in the iteration order.
    #[must_use]
    pub fn remove<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
    {
        let mut map = self.clone();
        map.chain.remove(key);
        map
    }

    /// Removes every key of an iterator, keeping the order of the others.
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

    #[must_use]
    pub fn remove_if(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Self {
        let mut map = self.clone();
        map.chain.retain(|key, value| !predicate(key, value));
        map
    }

    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PersistentOrderedMap<K, V> {
    /// Appends a new key, or replaces the value of an existing one in place.
    #[must_use]
    pub fn put(&self, key: K, value: V) -> Self {
        if self.get(&key) == Some(&value) {
            return self.clone();
        }

        let mut map = self.clone();
        map.chain.insert(key, value);
        map
    }

    #[must_use]
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut builder = self.builder();
        builder.extend(entries);
        builder.into()
    }

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

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentOrderedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentOrderedMap<K, V> {}

impl<K: Hash + Eq, V: PartialEq> PartialEq<PersistentHashMap<K, V>> for PersistentOrderedMap<K, V> {
    fn eq(&self, other: &PersistentHashMap<K, V>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq<PersistentOrderedMap<K, V>> for PersistentHashMap<K, V> {
    fn eq(&self, other: &PersistentOrderedMap<K, V>) -> bool {
        other == self
    }
}

/// Hashes like a [`PersistentHashMap`] with the same entries.
impl<K: Hash + Eq, V: Hash> Hash for PersistentOrderedMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        state.write_u64(entries_hash(self.iter()));
    }
}

impl<K: Debug + Hash + Eq, V: Debug> Debug for PersistentOrderedMap<K, V> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

/// # Panics
///
/// Panics if the key is absent.
impl<K, V, Q> Index<&Q> for PersistentOrderedMap<K, V>
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

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentOrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iterator: I) -> Self {
        let mut builder = OrderedMapBuilder::new();
        builder.extend(iterator);
        builder.into()
    }
}

impl<'a, K: Hash + Eq, V> IntoIterator for &'a PersistentOrderedMap<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> IntoIterator for PersistentOrderedMap<K, V> {
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            next: self.chain.first.clone(),
            remaining: self.len(),
            chain: self.chain,
        }
    }
}

/// Iterator following the chain from both of its ends.
pub struct Iter<'a, K, V> {
    hamt: &'a Hamt<K, Links<K, V>>,
    front: Option<&'a K>,
    back: Option<&'a K>,
    remaining: usize,
}

impl<'a, K: Hash + Eq, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let hamt = self.hamt;
        let key = self.front?;
        let links = hamt.get(key)?;
        self.front = links.next.as_ref();
        self.remaining -= 1;

        Some((key, &links.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Hash + Eq, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let hamt = self.hamt;
        let key = self.back?;
        let links = hamt.get(key)?;
        self.back = links.previous.as_ref();
        self.remaining -= 1;

        Some((key, &links.value))
    }
}

impl<K: Hash + Eq, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K: Hash + Eq, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V>(Iter<'a, K, V>);

impl<'a, K: Hash + Eq, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K: Hash + Eq, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(key, _)| key)
    }
}

impl<K: Hash + Eq, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K: Hash + Eq, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V>(Iter<'a, K, V>);

impl<'a, K: Hash + Eq, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K: Hash + Eq, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0.next_back().map(|(_, value)| value)
    }
}

impl<K: Hash + Eq, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K: Hash + Eq, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over cloned entries in insertion order.
pub struct IntoIter<K, V> {
    chain: Chain<K, V>,
    next: Option<K>,
    remaining: usize,
}

impl<K: Clone + Hash + Eq, V: Clone> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        let links = self.chain.hamt.get(&key)?;
        self.next = links.next.clone();
        self.remaining -= 1;

        Some((key, links.value.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Clone + Hash + Eq, V: Clone> ExactSizeIterator for IntoIter<K, V> {}

/// Mutable view of an ordered map.
#[derive(Debug)]
pub struct OrderedMapBuilder<K, V> {
    chain: Chain<K, V>,
    modifications: usize,
}

impl<K, V> Default for OrderedMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OrderedMapBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            chain: Chain::new(),
            modifications: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.chain.iter()
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values(self.iter())
    }
}

impl<K: Clone, V> OrderedMapBuilder<K, V> {
    /// Freezes the current contents into a map in constant time.
    pub fn build(&self) -> PersistentOrderedMap<K, V> {
        trace!(
            len = self.len(),
            modifications = self.modifications,
            "building ordered map"
        );

        PersistentOrderedMap {
            chain: self.chain.clone(),
        }
    }
}

impl<K: Hash + Eq, V> OrderedMapBuilder<K, V> {
    pub fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.chain.get(key)
    }

    pub fn get_key_value<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        self.chain
            .hamt
            .get_key_value(key)
            .map(|(key, links)| (key, &links.value))
    }

    pub fn contains_key<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.chain.hamt.contains_key(key)
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.chain.endpoint(self.chain.first.as_ref())
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.chain.endpoint(self.chain.last.as_ref())
    }
}

impl<K: Hash + Eq, V: PartialEq> OrderedMapBuilder<K, V> {
    pub fn contains_value(&self, value: &V) -> bool {
        self.values().any(|other| other == value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> OrderedMapBuilder<K, V> {
    /// Returns a mutable reference to a value. Counts as a modification when
    /// the key is present.
    pub fn get_mut<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
    {
        let value = self.chain.value_mut(key)?;
        self.modifications += 1;
        Some(value)
    }

    pub fn remove<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
    {
        let value = self.chain.remove(key)?;
        self.modifications += 1;
        Some(value)
    }

    pub fn retain(&mut self, predicate: impl FnMut(&K, &V) -> bool) {
        self.modifications += self.chain.retain(predicate);
    }

    pub fn clear(&mut self) {
        self.modifications += 1;
        self.chain = Chain::new();
    }

    /// Opens a fail-fast cursor starting at the oldest entry.
    pub fn cursor(&self) -> OrderedCursor<K, V> {
        OrderedCursor {
            next: self.chain.first.clone(),
            current: None,
            expected_modifications: self.modifications,
            value: PhantomData,
        }
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> OrderedMapBuilder<K, V> {
    /// Appends a new key or replaces the value of an existing one, returning
    /// the replaced value. Putting the value a key already holds keeps the
    /// builder untouched.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if self.get(&key) == Some(&value) {
            return Some(value);
        }

        self.modifications += 1;
        self.chain.insert(key, value)
    }

    pub fn remove_entry<Q: Hash + Eq + ?Sized>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
    {
        self.get(key) == Some(value) && self.remove(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> Extend<(K, V)> for OrderedMapBuilder<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iterator: I) {
        for (key, value) in iterator {
            self.put(key, value);
        }
    }
}

impl<K, V> From<OrderedMapBuilder<K, V>> for PersistentOrderedMap<K, V> {
    fn from(builder: OrderedMapBuilder<K, V>) -> Self {
        Self {
            chain: builder.chain,
        }
    }
}

/// Cursor walking a builder's chain in insertion order.
///
/// Unlike the hash map cursor, this one reads the builder live, so values
/// set through it are visible to later calls. Any change to the builder not
/// made through the cursor fails further calls with
/// [`Error::ConcurrentModification`].
#[derive(Debug)]
pub struct OrderedCursor<K, V> {
    next: Option<K>,
    current: Option<K>,
    expected_modifications: usize,
    value: PhantomData<V>,
}

impl<K: Clone + Hash + Eq, V: Clone> OrderedCursor<K, V> {
    fn check(&self, builder: &OrderedMapBuilder<K, V>) -> Result<()> {
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

    pub fn has_next(&self, builder: &OrderedMapBuilder<K, V>) -> Result<bool> {
        self.check(builder)?;

        Ok(self.next.is_some())
    }

    pub fn next(&mut self, builder: &OrderedMapBuilder<K, V>) -> Result<Option<(K, V)>> {
        self.check(builder)?;

        let Some(key) = self.next.take() else {
            self.current = None;
            return Ok(None);
        };
        let links = builder
            .chain
            .hamt
            .get(&key)
            .ok_or(Error::ConcurrentModification)?;

        self.next = links.next.clone();
        self.current = Some(key.clone());

        Ok(Some((key, links.value.clone())))
    }

    /// Removes the entry last returned by `next` from the builder.
    pub fn remove(&mut self, builder: &mut OrderedMapBuilder<K, V>) -> Result<V> {
        self.check(builder)?;

        let key = self.current.take().ok_or(Error::IllegalState)?;
        let value = builder.remove(&key).ok_or(Error::IllegalState)?;
        self.expected_modifications = builder.modifications;

        Ok(value)
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> OrderedCursor<K, V> {
    /// Replaces the value of the entry last returned by `next`, keeping its
    /// position.
    pub fn set_value(&mut self, builder: &mut OrderedMapBuilder<K, V>, value: V) -> Result<V> {
        self.check(builder)?;

        let key = self.current.clone().ok_or(Error::IllegalState)?;
        let old = builder.put(key, value).ok_or(Error::IllegalState)?;
        self.expected_modifications = builder.modifications;

        Ok(old)
    }
}
