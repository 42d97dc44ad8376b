use crate::{
    config::BITS_PER_LEVEL,
    key_value::KeyValue,
    node::{fragment, Node, Slot},
    utilities::hash_key,
};
use std::{borrow::Borrow, hash::Hash, iter::FusedIterator, slice, sync::Arc};

/// Root of a hash trie plus its entry count.
///
/// Every mutating method goes through `Arc::make_mut`: a node referenced only
/// by this trie is changed in place, a node shared with another trie is
/// copied first. Cloning a trie is O(1) and makes all of its nodes shared, so
/// a clone taken before a mutation never observes it.
#[derive(Debug)]
pub struct Hamt<K, V> {
    root: Arc<Node<K, V>>,
    len: usize,
}

impl<K, V> Clone for Hamt<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<K, V> Default for Hamt<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Hamt<K, V> {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::empty()),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if both tries share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            stack: vec![Level::new(&self.root)],
            remaining: self.len,
        }
    }

    #[cfg(test)]
    pub fn root_ptr(&self) -> *const Node<K, V> {
        Arc::as_ptr(&self.root)
    }

    /// Addresses of every node reachable from the root.
    #[cfg(test)]
    pub fn node_ptrs(&self) -> std::collections::HashSet<*const Node<K, V>> {
        fn collect<K, V>(
            node: &Arc<Node<K, V>>,
            ptrs: &mut std::collections::HashSet<*const Node<K, V>>,
        ) {
            ptrs.insert(Arc::as_ptr(node));

            if let Node::Branch { slots, .. } = &**node {
                for slot in slots {
                    if let Slot::Node(child) = slot {
                        collect(child, ptrs);
                    }
                }
            }
        }

        let mut ptrs = Default::default();
        collect(&self.root, &mut ptrs);
        ptrs
    }

    /// Checks the canonical-form invariants of the whole trie.
    #[cfg(test)]
    pub fn is_normal(&self) -> bool {
        fn is_normal<K, V>(node: &Node<K, V>, shift: u32) -> bool {
            match node {
                Node::Branch { bitmap, slots } => {
                    bitmap.size() == slots.len()
                        && slots.iter().all(|slot| match slot {
                            Slot::Entry(..) => true,
                            Slot::Node(child) => {
                                !child.is_singleton()
                                    && !child.is_empty()
                                    && is_normal(child, shift + BITS_PER_LEVEL)
                            }
                        })
                }
                Node::Collision { entries, .. } => {
                    shift > crate::config::MAX_SHIFT && entries.len() >= 2
                }
            }
        }

        is_normal(&self.root, 0)
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.iter().count()
    }
}

impl<K: Hash + Eq, V> Hamt<K, V> {
    pub fn get<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    pub fn get_key_value<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
    {
        find(&self.root, hash_key(key), key).map(|entry| (entry.key(), entry.value()))
    }

    pub fn contains_key<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
    {
        self.get_key_value(key).is_some()
    }
}

fn find<'a, K, V, Q>(mut node: &'a Node<K, V>, hash: u32, key: &Q) -> Option<&'a KeyValue<K, V>>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    let mut shift = 0;

    loop {
        match node {
            Node::Branch { bitmap, slots } => {
                let fragment = fragment(hash, shift);

                if !bitmap.get(fragment) {
                    return None;
                }

                match &slots[bitmap.index(fragment)] {
                    Slot::Entry(entry_hash, entry) => {
                        return (*entry_hash == hash && key == entry.key().borrow()).then_some(entry);
                    }
                    Slot::Node(child) => {
                        node = child;
                        shift += BITS_PER_LEVEL;
                    }
                }
            }
            Node::Collision { entries, .. } => {
                return entries.iter().find(|entry| key == entry.key().borrow());
            }
        }
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Hamt<K, V> {
    /// Inserts a pair, returning the value it replaced.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = hash_key(&key);
        let old = insert(&mut self.root, hash, key, value, 0);

        if old.is_none() {
            self.len += 1;
        }

        old
    }

    /// Returns a mutable reference to a value, copying the path to it if the
    /// path is shared.
    pub fn get_mut<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
    {
        if !self.contains_key(key) {
            return None;
        }

        find_mut(&mut self.root, hash_key(key), key, 0).map(KeyValue::value_mut)
    }

    pub fn remove<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
    {
        // Looking first keeps a miss from copying a shared path.
        if !self.contains_key(key) {
            return None;
        }

        let entry = remove(&mut self.root, hash_key(key), key, 0)?;
        self.len -= 1;

        Some(entry.into_pair())
    }

    /// Removes every entry the predicate rejects, returning how many went.
    pub fn retain(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
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

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

fn insert<K: Clone + Eq, V: Clone>(
    node: &mut Arc<Node<K, V>>,
    hash: u32,
    key: K,
    value: V,
    shift: u32,
) -> Option<V> {
    match Arc::make_mut(node) {
        Node::Branch { bitmap, slots } => {
            let fragment = fragment(hash, shift);
            let index = bitmap.index(fragment);

            if !bitmap.get(fragment) {
                *bitmap = bitmap.set(fragment);
                slots.insert(index, Slot::Entry(hash, KeyValue::new(key, value)));

                return None;
            }

            match &mut slots[index] {
                Slot::Node(child) => return insert(child, hash, key, value, shift + BITS_PER_LEVEL),
                Slot::Entry(entry_hash, entry) => {
                    if *entry_hash == hash && entry.key() == &key {
                        return Some(entry.replace_value(value));
                    }
                }
            }

            let Slot::Entry(existing_hash, existing) = slots.remove(index) else {
                unreachable!("slot changed kind while splitting")
            };

            slots.insert(
                index,
                Slot::Node(Arc::new(Node::pair(
                    existing_hash,
                    existing,
                    hash,
                    KeyValue::new(key, value),
                    shift + BITS_PER_LEVEL,
                ))),
            );

            None
        }
        Node::Collision { entries, .. } => {
            if let Some(entry) = entries.iter_mut().find(|entry| entry.key() == &key) {
                return Some(entry.replace_value(value));
            }

            entries.push(KeyValue::new(key, value));

            None
        }
    }
}

fn find_mut<'a, K, V, Q>(
    node: &'a mut Arc<Node<K, V>>,
    hash: u32,
    key: &Q,
    shift: u32,
) -> Option<&'a mut KeyValue<K, V>>
where
    K: Clone + Borrow<Q>,
    V: Clone,
    Q: Eq + ?Sized,
{
    match Arc::make_mut(node) {
        Node::Branch { bitmap, slots } => {
            let fragment = fragment(hash, shift);

            if !bitmap.get(fragment) {
                return None;
            }

            match &mut slots[bitmap.index(fragment)] {
                Slot::Entry(entry_hash, entry) => {
                    (*entry_hash == hash && key == entry.key().borrow()).then_some(entry)
                }
                Slot::Node(child) => find_mut(child, hash, key, shift + BITS_PER_LEVEL),
            }
        }
        Node::Collision { entries, .. } => {
            entries.iter_mut().find(|entry| key == entry.key().borrow())
        }
    }
}

fn remove<K, V, Q>(
    node: &mut Arc<Node<K, V>>,
    hash: u32,
    key: &Q,
    shift: u32,
) -> Option<KeyValue<K, V>>
where
    K: Clone + Borrow<Q>,
    V: Clone,
    Q: Eq + ?Sized,
{
    match Arc::make_mut(node) {
        Node::Branch { bitmap, slots } => {
            let fragment = fragment(hash, shift);

            if !bitmap.get(fragment) {
                return None;
            }

            let index = bitmap.index(fragment);

            match &mut slots[index] {
                Slot::Entry(entry_hash, entry) => {
                    if *entry_hash != hash || key != entry.key().borrow() {
                        return None;
                    }
                }
                Slot::Node(child) => {
                    let removed = remove(child, hash, key, shift + BITS_PER_LEVEL)?;

                    if child.is_singleton() {
                        let (inlined_hash, inlined) = Node::take_singleton(child);
                        slots[index] = Slot::Entry(inlined_hash, inlined);
                    }

                    return Some(removed);
                }
            }

            *bitmap = bitmap.unset(fragment);

            match slots.remove(index) {
                Slot::Entry(_, entry) => Some(entry),
                Slot::Node(_) => unreachable!("slot changed kind while removing"),
            }
        }
        Node::Collision { entries, .. } => {
            let index = entries
                .iter()
                .position(|entry| key == entry.key().borrow())?;

            Some(entries.remove(index))
        }
    }
}

enum Level<'a, K, V> {
    Branch(slice::Iter<'a, Slot<K, V>>),
    Collision(slice::Iter<'a, KeyValue<K, V>>),
}

impl<'a, K, V> Level<'a, K, V> {
    fn new(node: &'a Node<K, V>) -> Self {
        match node {
            Node::Branch { slots, .. } => Level::Branch(slots.iter()),
            Node::Collision { entries, .. } => Level::Collision(entries.iter()),
        }
    }
}

/// Depth-first iterator over borrowed entries of a trie.
pub struct Iter<'a, K, V> {
    stack: Vec<Level<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.stack.last_mut()? {
                Level::Branch(slots) => match slots.next() {
                    Some(Slot::Entry(_, entry)) => entry,
                    Some(Slot::Node(node)) => {
                        self.stack.push(Level::new(node));
                        continue;
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Level::Collision(entries) => match entries.next() {
                    Some(entry) => entry,
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            };

            self.remaining -= 1;

            return Some((entry.key(), entry.value()));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over cloned entries that keeps the trie it walks alive.
#[derive(Debug)]
pub struct IntoIter<K, V> {
    stack: Vec<(Arc<Node<K, V>>, usize)>,
    remaining: usize,
}

impl<K, V> IntoIterator for Hamt<K, V>
where
    K: Clone,
    V: Clone,
{
    type IntoIter = IntoIter<K, V>;
    type Item = (K, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            stack: vec![(self.root, 0)],
            remaining: self.len,
        }
    }
}

impl<K: Clone, V: Clone> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, index) = self.stack.last_mut()?;
            let current = *index;
            *index += 1;

            let entry = match &**node {
                Node::Branch { slots, .. } => match slots.get(current) {
                    Some(Slot::Entry(_, entry)) => entry.clone(),
                    Some(Slot::Node(child)) => {
                        let child = child.clone();
                        self.stack.push((child, 0));
                        continue;
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Node::Collision { entries, .. } => match entries.get(current) {
                    Some(entry) => entry.clone(),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            };

            self.remaining -= 1;

            return Some(entry.into_pair());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for IntoIter<K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{random, rng, seq::SliceRandom};
    use std::{
        collections::HashMap,
        hash::{Hash, Hasher},
    };

    const ITERATION_COUNT: usize = 1 << 12;

    /// A key whose hash code is chosen by the test.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct CollidingKey {
        id: u32,
        forced_hash: u64,
    }

    impl CollidingKey {
        fn new(id: u32, forced_hash: u64) -> Self {
            Self { id, forced_hash }
        }
    }

    impl Hash for CollidingKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.forced_hash.hash(state);
        }
    }

    #[test]
    fn new() {
        Hamt::<usize, usize>::new();
    }

    #[test]
    fn insert() {
        let mut hamt = Hamt::new();

        assert_eq!(hamt.entry_count(), 0);
        assert_eq!(hamt.insert(0, 0), None);
        assert_eq!(hamt.entry_count(), 1);
        assert_eq!(hamt.insert(0, 1), Some(0));
        assert_eq!(hamt.len(), 1);
        assert_eq!(hamt.insert(1, 0), None);
        assert_eq!(hamt.len(), 2);
        assert_eq!(hamt.entry_count(), 2);
    }

    #[test]
    fn insert_many_in_order() {
        let mut hamt = Hamt::new();

        for index in 0..ITERATION_COUNT {
            assert_eq!(hamt.insert(index, index), None);
            assert_eq!(hamt.len(), index + 1);
        }

        assert!(hamt.is_normal());
    }

    #[test]
    fn insert_many_at_random() {
        let mut hamt: Hamt<u64, u64> = Hamt::new();
        let mut map = HashMap::new();

        for _ in 0..ITERATION_COUNT {
            let key = random();
            assert_eq!(hamt.insert(key, key), map.insert(key, key));
        }

        assert_eq!(hamt.len(), map.len());
        assert!(hamt.is_normal());
    }

    #[test]
    fn get() {
        let mut hamt = Hamt::new();
        hamt.insert(0, 0);

        assert_eq!(hamt.get(&0), Some(&0));
        assert_eq!(hamt.get(&1), None);

        hamt.insert(1, 1);

        assert_eq!(hamt.get(&0), Some(&0));
        assert_eq!(hamt.get(&1), Some(&1));
        assert_eq!(hamt.get(&2), None);
    }

    #[test]
    fn get_borrowed() {
        let mut hamt = Hamt::new();
        hamt.insert("foo".to_string(), 1);

        assert_eq!(hamt.get("foo"), Some(&1));
        assert!(hamt.contains_key("foo"));
        assert!(!hamt.contains_key("bar"));
    }

    #[test]
    fn remove() {
        let mut hamt = Hamt::new();
        hamt.insert(0, 0);

        assert_eq!(hamt.remove(&1), None);
        assert_eq!(hamt.remove(&0), Some((0, 0)));
        assert!(hamt.is_empty());
        assert_eq!(hamt.remove(&0), None);
    }

    #[test]
    fn insert_remove_many() {
        let mut hamt: Hamt<i16, i16> = Hamt::new();

        for _ in 0..ITERATION_COUNT {
            let key = random();
            let size = hamt.len();
            let found = hamt.get(&key).is_some();

            if random() {
                hamt.insert(key, key);

                assert_eq!(hamt.len(), if found { size } else { size + 1 });
                assert_eq!(hamt.get(&key), Some(&key));
            } else {
                hamt.remove(&key);

                assert_eq!(hamt.len(), if found { size - 1 } else { size });
                assert_eq!(hamt.get(&key), None);
            }

            assert_eq!(hamt.entry_count(), hamt.len());
        }

        assert!(hamt.is_normal());
    }

    #[test]
    fn remove_collapses_to_canonical_form() {
        let mut forward: Hamt<u32, u32> = Hamt::new();
        let mut backward: Hamt<u32, u32> = Hamt::new();
        let mut keys: Vec<u32> = (0..2048).collect();

        for &key in &keys {
            forward.insert(key, key);
        }

        keys.shuffle(&mut rng());

        for &key in keys.iter().skip(64) {
            forward.remove(&key);
        }

        for &key in keys.iter().take(64) {
            backward.insert(key, key);
        }

        assert!(forward.is_normal());
        assert_eq!(forward.node_ptrs().len(), backward.node_ptrs().len());
    }

    #[test]
    fn get_mut() {
        let mut hamt = Hamt::new();
        hamt.insert("a", 1);

        *hamt.get_mut("a").unwrap() += 1;

        assert_eq!(hamt.get("a"), Some(&2));
        assert_eq!(hamt.get_mut("b"), None);
    }

    #[test]
    fn colliding_keys() {
        let keys: Vec<CollidingKey> = (0..5).map(|id| CollidingKey::new(id, 0xCAFE)).collect();
        let mut hamt = Hamt::new();

        for (value, key) in keys.iter().enumerate() {
            assert_eq!(hamt.insert(key.clone(), value), None);
        }

        assert_eq!(hamt.len(), 5);
        assert!(hamt.is_normal());

        for (value, key) in keys.iter().enumerate() {
            assert_eq!(hamt.get(key), Some(&value));
        }

        assert_eq!(hamt.insert(keys[2].clone(), 42), Some(2));
        assert_eq!(hamt.get(&keys[2]), Some(&42));
        assert_eq!(hamt.get(&CollidingKey::new(9, 0xCAFE)), None);
    }

    #[test]
    fn remove_colliding_keys() {
        let first = CollidingKey::new(1, 0xAAAA);
        let second = CollidingKey::new(2, 0xAAAA);
        let third = CollidingKey::new(3, 0xAAAA);
        let mut hamt = Hamt::new();

        hamt.insert(first.clone(), 1);
        hamt.insert(second.clone(), 2);
        hamt.insert(third.clone(), 3);

        assert_eq!(hamt.remove(&second), Some((second.clone(), 2)));
        assert!(hamt.is_normal());
        assert_eq!(hamt.remove(&first), Some((first.clone(), 1)));
        assert!(hamt.is_normal());
        assert_eq!(hamt.get(&third), Some(&3));
        assert_eq!(hamt.node_ptrs().len(), 1);
        assert_eq!(hamt.remove(&third), Some((third, 3)));
        assert!(hamt.is_empty());
    }

    #[test]
    fn mixed_collisions_and_normal_keys() {
        let first = CollidingKey::new(1, 0xDDDD);
        let second = CollidingKey::new(2, 0xDDDD);
        let normal = CollidingKey::new(3, 0xEEEE);
        let mut hamt = Hamt::new();

        hamt.insert(first.clone(), "a");
        hamt.insert(second.clone(), "b");
        hamt.insert(normal.clone(), "c");

        assert_eq!(hamt.len(), 3);
        assert_eq!(hamt.get(&first), Some(&"a"));
        assert_eq!(hamt.get(&second), Some(&"b"));
        assert_eq!(hamt.get(&normal), Some(&"c"));
        assert_eq!(hamt.entry_count(), 3);
    }

    #[test]
    fn path_copying() {
        let mut hamt: Hamt<u32, u32> = Hamt::new();

        for key in 0..10_000 {
            hamt.insert(key, key);
        }

        let original = hamt.clone();
        let old_nodes = original.node_ptrs();
        hamt.insert(10_000, 10_000);
        let new_nodes = hamt.node_ptrs();

        // 32-bit hashes give at most 8 levels including a collision node.
        assert!(new_nodes.difference(&old_nodes).count() <= 8);
        assert_eq!(original.len(), 10_000);
        assert_eq!(original.get(&10_000), None);
    }

    #[test]
    fn mutates_exclusive_nodes_in_place() {
        let mut hamt = Hamt::new();
        hamt.insert(1, 1);

        let root = hamt.root_ptr();
        hamt.insert(2, 2);
        assert_eq!(hamt.root_ptr(), root);

        let snapshot = hamt.clone();
        hamt.insert(3, 3);
        assert_ne!(hamt.root_ptr(), root);
        assert_eq!(snapshot.root_ptr(), root);
        assert_eq!(snapshot.get(&3), None);
    }

    #[test]
    fn retain() {
        let mut hamt = Hamt::new();

        for key in 0..100 {
            hamt.insert(key, key);
        }

        assert_eq!(hamt.retain(|key, _| key % 2 == 0), 50);
        assert_eq!(hamt.len(), 50);
        assert!(hamt.iter().all(|(key, _)| key % 2 == 0));
        assert!(hamt.is_normal());
    }

    #[test]
    fn iterate() {
        let sizes = (0..42)
            .chain((0..100).map(|_| random::<u64>() % 1024))
            .collect::<Vec<_>>();

        for size in &sizes {
            let mut hamt: Hamt<i16, i16> = Hamt::new();
            let mut map: HashMap<i16, i16> = HashMap::new();

            for _ in 0..*size {
                let key = random();
                let value = random();

                hamt.insert(key, value);
                map.insert(key, value);
            }

            let mut size = 0;

            for (key, value) in hamt.iter() {
                size += 1;

                assert_eq!(map[key], *value);
            }

            assert_eq!(size, map.len());
            assert_eq!(hamt.iter().len(), map.len());
            assert_eq!(hamt.clone().into_iter().collect::<HashMap<_, _>>(), map);
        }
    }
}
