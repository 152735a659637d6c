//! Fixed-capacity open-addressing maps.
//!
//! The maps are built once from a known set of `(key, value)` pairs and never
//! change afterwards: no insert after construction, no removal, no resize.
//! Keys are expected to already be well-distributed hashes, so the home slot
//! is simply `key & mask`. Collisions probe linearly.
//!
//! A key of zero marks an empty slot, so the zero key itself is kept in a
//! reserved slot after the table proper.

use std::fmt;

use crate::{Error, Result};

/// Target maximum ratio of entries to table slots.
pub const LOAD_FACTOR: f64 = 0.75;

/// A primitive word usable as both key and value of an [`OpenAddressingMap`].
pub trait MapWord: Copy + Eq + Default + fmt::Debug + Send + Sync + 'static {
    /// Home slot of this key for a table with the given mask.
    fn home_slot(self, mask: usize) -> usize;

    /// Whether this is the zero word, which doubles as the empty-slot marker.
    fn is_zero(self) -> bool;
}

impl MapWord for i32 {
    #[inline]
    fn home_slot(self, mask: usize) -> usize {
        (self as u32 as usize) & mask
    }

    #[inline]
    fn is_zero(self) -> bool {
        self == 0
    }
}

impl MapWord for i64 {
    #[inline]
    fn home_slot(self, mask: usize) -> usize {
        (self as u64 as usize) & mask
    }

    #[inline]
    fn is_zero(self) -> bool {
        self == 0
    }
}

/// `int -> int` map.
pub type IntIntMap = OpenAddressingMap<i32>;

/// `long -> long` map.
pub type LongLongMap = OpenAddressingMap<i64>;

/// Smallest power-of-two table length keeping `expected` entries at or below
/// [`LOAD_FACTOR`]. Never less than 2.
pub fn table_size(expected: usize) -> usize {
    let needed = (expected as f64 / LOAD_FACTOR).ceil() as usize;
    needed.max(2).next_power_of_two()
}

/// Immutable open-addressing hash map over primitive words.
///
/// Backing arrays hold `capacity + 1` slots; the last one belongs to the zero
/// key. Lookups are lock-free and safe from any number of threads.
pub struct OpenAddressingMap<W: MapWord> {
    keys: Box<[W]>,
    values: Box<[W]>,
    mask: usize,
    has_zero_key: bool,
    len: usize,
}

impl<W: MapWord> OpenAddressingMap<W> {
    fn with_expected(expected: usize) -> Self {
        let capacity = table_size(expected);
        Self {
            keys: vec![W::default(); capacity + 1].into_boxed_slice(),
            values: vec![W::default(); capacity + 1].into_boxed_slice(),
            mask: capacity - 1,
            has_zero_key: false,
            len: 0,
        }
    }

    /// Build from separate key and value arrays of equal length.
    pub fn from_parallel(keys: &[W], values: &[W]) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(Error::MismatchedPairs {
                keys: keys.len(),
                values: values.len(),
            });
        }

        let mut map = Self::with_expected(keys.len());
        for (&key, &value) in keys.iter().zip(values) {
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Build from a flat array of interleaved `key, value` words.
    pub fn from_pairs(pairs: &[W]) -> Result<Self> {
        if pairs.len() % 2 != 0 {
            return Err(Error::MismatchedPairs {
                keys: pairs.len() / 2 + 1,
                values: pairs.len() / 2,
            });
        }

        let mut map = Self::with_expected(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            map.insert(pair[0], pair[1]);
        }
        Ok(map)
    }

    /// Insert unless the key is already present; the first value wins.
    fn insert(&mut self, key: W, value: W) {
        if key.is_zero() {
            if !self.has_zero_key {
                let slot = self.zero_slot();
                self.values[slot] = value;
                self.has_zero_key = true;
                self.len += 1;
            }
            return;
        }

        let mut slot = key.home_slot(self.mask);
        loop {
            let current = self.keys[slot];
            if current.is_zero() {
                self.keys[slot] = key;
                self.values[slot] = value;
                self.len += 1;
                return;
            }
            if current == key {
                return;
            }
            slot = (slot + 1) & self.mask;
        }
    }

    #[inline]
    fn zero_slot(&self) -> usize {
        self.mask + 1
    }

    /// Look up a key.
    #[inline]
    pub fn get(&self, key: W) -> Option<W> {
        if key.is_zero() {
            return self.has_zero_key.then(|| self.values[self.zero_slot()]);
        }

        let mut slot = key.home_slot(self.mask);
        loop {
            let current = self.keys[slot];
            if current == key {
                return Some(self.values[slot]);
            }
            if current.is_zero() {
                return None;
            }
            slot = (slot + 1) & self.mask;
        }
    }

    /// Check whether a key is present.
    #[inline]
    pub fn contains_key(&self, key: W) -> bool {
        self.get(key).is_some()
    }

    /// Number of distinct keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Table length, excluding the reserved zero-key slot.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Iterate over all `(key, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (W, W)> + '_ {
        let zero = self
            .has_zero_key
            .then(|| (W::default(), self.values[self.zero_slot()]));
        self.keys[..self.capacity()]
            .iter()
            .zip(self.values.iter())
            .filter(|(k, _)| !k.is_zero())
            .map(|(&k, &v)| (k, v))
            .chain(zero)
    }
}

impl<W: MapWord> fmt::Debug for OpenAddressingMap<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAddressingMap")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("has_zero_key", &self.has_zero_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_table_size() {
        assert_eq!(table_size(0), 2);
        assert_eq!(table_size(1), 2);
        assert_eq!(table_size(3), 4);
        assert_eq!(table_size(12), 16);
        assert_eq!(table_size(13), 32);
    }

    #[test]
    fn test_zero_key_uses_reserved_slot() {
        let map = LongLongMap::from_pairs(&[0, 99, 5, 7]).unwrap();
        assert_eq!(map.get(0), Some(99));
        assert_eq!(map.get(5), Some(7));
        assert_eq!(map.len(), 2);

        let without = LongLongMap::from_pairs(&[5, 7]).unwrap();
        assert_eq!(without.get(0), None);
    }

    #[test]
    fn test_first_write_wins() {
        let map = IntIntMap::from_parallel(&[3, 3, 0, 0], &[1, 2, 10, 20]).unwrap();
        assert_eq!(map.get(3), Some(1));
        assert_eq!(map.get(0), Some(10));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_colliding_keys_probe_linearly() {
        // All share home slot 1 in a 16-slot table.
        let keys: Vec<i64> = (0..8).map(|i| 1 + i * 16).collect();
        let values: Vec<i64> = (0..8).map(|i| i * 100).collect();
        let map = LongLongMap::from_parallel(&keys, &values).unwrap();

        assert_eq!(map.capacity(), 16);
        for (k, v) in keys.iter().zip(&values) {
            assert_eq!(map.get(*k), Some(*v));
        }
        assert_eq!(map.get(1 + 8 * 16), None);
    }

    #[test]
    fn test_negative_keys() {
        let map = IntIntMap::from_pairs(&[-1, 4, i32::MIN, 5]).unwrap();
        assert_eq!(map.get(-1), Some(4));
        assert_eq!(map.get(i32::MIN), Some(5));
        assert_eq!(map.get(-2), None);
    }

    #[test]
    fn test_mismatched_input() {
        assert!(IntIntMap::from_parallel(&[1, 2], &[1]).is_err());
        assert!(LongLongMap::from_pairs(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_iter_yields_every_pair() {
        let map = LongLongMap::from_pairs(&[0, 1, 8, 2, -8, 3]).unwrap();
        let mut pairs: Vec<_> = map.iter().collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(-8, 3), (0, 1), (8, 2)]);
    }

    fn boundary_sizes() -> impl Strategy<Value = usize> {
        // Sizes straddling the 0.75 load boundary of 16, 64 and 1024 slots.
        prop_oneof![
            prop::sample::select(vec![0usize, 1, 11, 12, 13, 47, 48, 49, 767, 768, 769]),
            0usize..300,
        ]
    }

    proptest! {
        #[test]
        fn long_map_finds_inserted_and_misses_others(
            size in boundary_sizes(),
            seed in any::<u64>(),
            with_zero in any::<bool>(),
            probes in prop::collection::vec(any::<i64>(), 32),
        ) {
            let mut expected: HashMap<i64, i64> = HashMap::new();
            let mut x = seed | 1;
            while expected.len() < size {
                // xorshift keeps keys spread over the whole 64-bit range
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                expected.entry(x as i64).or_insert((x >> 3) as i64);
            }
            if with_zero {
                expected.insert(0, -42);
            }

            let keys: Vec<i64> = expected.keys().copied().collect();
            let values: Vec<i64> = keys.iter().map(|k| expected[k]).collect();
            let map = LongLongMap::from_parallel(&keys, &values).unwrap();

            prop_assert_eq!(map.len(), expected.len());
            for (k, v) in &expected {
                prop_assert_eq!(map.get(*k), Some(*v));
            }
            for probe in probes {
                prop_assert_eq!(map.get(probe), expected.get(&probe).copied());
            }
            if !with_zero {
                prop_assert_eq!(map.get(0), None);
            }
        }

        #[test]
        fn int_map_matches_std_hashmap(pairs in prop::collection::vec((any::<i32>(), any::<i32>()), 0..200)) {
            let mut expected: HashMap<i32, i32> = HashMap::new();
            let mut flat = Vec::with_capacity(pairs.len() * 2);
            for (k, v) in &pairs {
                expected.entry(*k).or_insert(*v);
                flat.push(*k);
                flat.push(*v);
            }

            let map = IntIntMap::from_pairs(&flat).unwrap();
            prop_assert_eq!(map.len(), expected.len());
            prop_assert!(map.len() as f64 <= map.capacity() as f64 * LOAD_FACTOR);
            for (k, v) in &expected {
                prop_assert_eq!(map.get(*k), Some(*v));
            }
        }
    }
}
