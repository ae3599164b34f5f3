//! Feature hashing: terms map to a fixed number of buckets.
//!
//! The mapping must be identical at build and query time, so it is a pure function
//! of the term bytes and the dimension. Collisions are expected and simply sum.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// Default vector dimension.
pub const DEFAULT_HASH_DIM: usize = 2048;
/// Largest accepted dimension. Dense vectors are allocated at this size.
pub const MAX_HASH_DIM: usize = 1 << 24;

/// Bucket for `term` in `[0, dim)`. `dim` must be non-zero.
pub fn bucket(term: &str, dim: usize) -> usize {
    debug_assert!(dim > 0, "hash dimension must be non-zero");
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(term.as_bytes());
    (hasher.finish() % dim as u64) as usize
}
