use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// First mixing seed (golden ratio constant).
const SEED_1: u64 = 0x9E37_79B9_7F4A_7C15;

/// Second mixing seed (large prime).
const SEED_2: u64 = 0x517C_C1B7_2722_0A95;

/// Hash code a key is placed by in the hash trie.
pub fn hash_key(key: &(impl Hash + ?Sized)) -> u32 {
    hash_one(key) as u32
}

pub fn hash_one(value: &(impl Hash + ?Sized)) -> u64 {
    let mut hasher = DefaultHasher::new();

    value.hash(&mut hasher);

    hasher.finish()
}

/// Contribution of one entry to an order-independent collection hash.
///
/// Collections sum these with wrapping arithmetic, so two collections with the
/// same contents hash equally whatever their insertion order or trie shape.
pub fn entry_hash(key: &(impl Hash + ?Sized), value: &(impl Hash + ?Sized)) -> u64 {
    hash_one(key).wrapping_mul(SEED_1) ^ hash_one(value).wrapping_mul(SEED_2)
}

/// Order-independent hash of a collection's entries.
pub fn entries_hash<'a, K, V>(entries: impl IntoIterator<Item = (&'a K, &'a V)>) -> u64
where
    K: Hash + 'a,
    V: Hash + 'a,
{
    entries
        .into_iter()
        .fold(0, |sum, (key, value)| sum.wrapping_add(entry_hash(key, value)))
}
