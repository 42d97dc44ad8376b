use crate::{
    HashMapBuilder, PersistentHashMap, PersistentHashSet, PersistentOrderedMap, PersistentVector,
};

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
enum Op {
    Put(u16, u32),
    Remove(u16),
    Get(u16),
    Snapshot,
}

#[derive(Clone, Debug)]
enum ListOp {
    Add(u32),
    Set(usize, u32),
    AddAt(usize, u32),
    RemoveAt(usize),
    RemoveLast,
}

fn key_strategy() -> impl Strategy<Value = u16> + Clone {
    // A narrow key range makes removals of present keys common.
    0u16..512
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        30 => key.clone().prop_map(Op::Remove),
        18 => key.clone().prop_map(Op::Get),
        2 => Just(Op::Snapshot),
    ];
    prop::collection::vec(op, 0..=2000)
}

fn list_ops_strategy() -> impl Strategy<Value = Vec<ListOp>> {
    let op = prop_oneof![
        60 => any::<u32>().prop_map(ListOp::Add),
        10 => (any::<usize>(), any::<u32>()).prop_map(|(i, v)| ListOp::Set(i, v)),
        10 => (any::<usize>(), any::<u32>()).prop_map(|(i, v)| ListOp::AddAt(i, v)),
        10 => any::<usize>().prop_map(ListOp::RemoveAt),
        10 => Just(ListOp::RemoveLast),
    ];
    prop::collection::vec(op, 0..=3000)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_hash_map_equivalence(ops in ops_strategy()) {
        let mut map = PersistentHashMap::new();
        let mut reference = HashMap::new();
        let mut snapshots = vec![];

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    map = map.put(key, value);
                    reference.insert(key, value);
                }
                Op::Remove(key) => {
                    map = map.remove(&key);
                    reference.remove(&key);
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(&key), reference.get(&key));
                }
                Op::Snapshot => snapshots.push((map.clone(), reference.clone())),
            }

            prop_assert_eq!(map.len(), reference.len());
        }

        prop_assert_eq!(map.clone().into_iter().collect::<HashMap<_, _>>(), reference);

        for (snapshot, expected) in snapshots {
            prop_assert_eq!(snapshot.into_iter().collect::<HashMap<_, _>>(), expected);
        }
    }

    #[test]
    fn prop_builder_matches_persistent_updates(ops in ops_strategy()) {
        let mut map = PersistentHashMap::new();
        let mut builder = HashMapBuilder::new();
        let mut built = vec![];

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    map = map.put(key, value);
                    builder.put(key, value);
                }
                Op::Remove(key) => {
                    map = map.remove(&key);
                    builder.remove(&key);
                }
                Op::Get(key) => {
                    prop_assert_eq!(builder.get(&key), map.get(&key));
                }
                Op::Snapshot => built.push((builder.build(), map.clone())),
            }
        }

        prop_assert_eq!(builder.build(), map);

        for (snapshot, expected) in built {
            prop_assert_eq!(snapshot, expected);
        }
    }

    #[test]
    fn prop_ordered_map_keeps_insertion_order(ops in ops_strategy()) {
        let mut map = PersistentOrderedMap::new();
        let mut reference: Vec<(u16, u32)> = vec![];

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    map = map.put(key, value);

                    match reference.iter_mut().find(|(other, _)| *other == key) {
                        Some(entry) => entry.1 = value,
                        None => reference.push((key, value)),
                    }
                }
                Op::Remove(key) => {
                    map = map.remove(&key);
                    reference.retain(|(other, _)| *other != key);
                }
                Op::Get(key) => {
                    let expected = reference.iter().find(|(other, _)| *other == key).map(|(_, value)| value);
                    prop_assert_eq!(map.get(&key), expected);
                }
                Op::Snapshot => {
                    let backward = map.iter().rev().map(|(k, v)| (*k, *v)).collect::<Vec<_>>();
                    prop_assert!(backward.into_iter().rev().eq(reference.iter().copied()));
                }
            }
        }

        prop_assert_eq!(map.into_iter().collect::<Vec<_>>(), reference);
    }

    #[test]
    fn prop_hash_set_equivalence(values in prop::collection::vec(key_strategy(), 0..=1000)) {
        let (added, removed) = values.split_at(values.len() / 2);
        let set = added.iter().copied().collect::<PersistentHashSet<_>>().remove_all(removed);
        let mut reference = added.iter().copied().collect::<HashSet<_>>();

        for value in removed {
            reference.remove(value);
        }

        prop_assert_eq!(set.len(), reference.len());
        prop_assert!(set.iter().all(|value| reference.contains(value)));
    }

    #[test]
    fn prop_vector_equivalence(ops in list_ops_strategy()) {
        let mut list = PersistentVector::new();
        let mut reference = vec![];

        for op in ops {
            match op {
                ListOp::Add(value) => {
                    list = list.add(value);
                    reference.push(value);
                }
                ListOp::Set(index, value) => {
                    if reference.is_empty() {
                        prop_assert!(list.set(index, value).is_err());
                    } else {
                        let index = index % reference.len();
                        list = list.set(index, value).unwrap();
                        reference[index] = value;
                    }
                }
                ListOp::AddAt(index, value) => {
                    let index = index % (reference.len() + 1);
                    list = list.add_at(index, value).unwrap();
                    reference.insert(index, value);
                }
                ListOp::RemoveAt(index) => {
                    if reference.is_empty() {
                        prop_assert!(list.remove_at(index).is_err());
                    } else {
                        let index = index % reference.len();
                        list = list.remove_at(index).unwrap();
                        reference.remove(index);
                    }
                }
                ListOp::RemoveLast => {
                    list = list.remove_last().unwrap_or_default();
                    reference.pop();
                }
            }

            prop_assert_eq!(list.len(), reference.len());
            prop_assert_eq!(list.last(), reference.last());
        }

        prop_assert!(list.iter().eq(reference.iter()));
        prop_assert!(list.into_iter().eq(reference));
    }
}
