//! Trie geometry shared by the hash and vector tries.

/// Bits of hash or index consumed per trie level.
pub const BITS_PER_LEVEL: u32 = 5;

/// Children per branch node.
pub const BRANCH_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Mask selecting one level's worth of bits.
pub const LEVEL_MASK: usize = BRANCH_FACTOR - 1;

/// Width of the hash codes the hash trie is keyed on.
pub const HASH_BITS: u32 = 32;

/// Shift of the deepest hash level. Its fragment only has the top two bits
/// left; keys still colliding past it share their whole hash code.
pub const MAX_SHIFT: u32 = (HASH_BITS - 1) / BITS_PER_LEVEL * BITS_PER_LEVEL;
