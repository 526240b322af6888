//! Pseudo-random picks without a dedicated RNG dependency.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static DRAWS: AtomicU64 = AtomicU64::new(0);

/// Pseudo-random index in `0..len`, or `None` for an empty range.
///
/// Not suitable for anything security related; it only needs to spread
/// "random page" picks across an archive.
pub fn index(len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(DRAWS.fetch_add(1, Ordering::Relaxed));
    let draw = hasher.finish();
    usize::try_from(draw % len as u64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_range_has_no_index() {
        assert_eq!(index(0), None);
    }

    #[test]
    fn index_stays_in_range() {
        for len in 1..50 {
            let picked = index(len).unwrap();
            assert!(picked < len);
        }
    }
}
