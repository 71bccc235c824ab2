use std::fmt::{Debug, Display};

use bitvec::{bitvec, vec::BitVec};

use super::IndexId;

// A set of candidate ids. The capacity is the size of the pool at the time the
// owning snapshot was taken, so two configurations are only comparable if they
// come from the same snapshot generation. Use restrict_to_capacity to move a
// configuration between generations.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Configuration {
    bits: BitVec,
}

impl Configuration {
    pub fn empty(capacity: usize) -> Configuration {
        Configuration { bits: bitvec![0; capacity] }
    }

    pub fn full(capacity: usize) -> Configuration {
        Configuration { bits: bitvec![1; capacity] }
    }

    pub fn from_ids<I: IntoIterator<Item = IndexId>>(capacity: usize, ids: I) -> Configuration {
        let mut config = Configuration::empty(capacity);
        for id in ids {
            config.bits.set(id, true);
        }
        config
    }

    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn contains(&self, id: IndexId) -> bool {
        id < self.bits.len() && self.bits[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = IndexId> + '_ {
        self.bits.iter_ones()
    }

    pub fn is_subset_of(&self, other: &Configuration) -> bool {
        debug_assert_eq!(self.capacity(), other.capacity(), "configurations from different snapshot generations");
        self.bits.iter_ones().all(|id| other.contains(id))
    }

    pub fn is_superset_of(&self, other: &Configuration) -> bool {
        other.is_subset_of(self)
    }

    pub fn with(&self, id: IndexId) -> Configuration {
        let mut config = self.clone();
        config.bits.set(id, true);
        config
    }

    pub fn without(&self, id: IndexId) -> Configuration {
        let mut config = self.clone();
        if id < config.bits.len() {
            config.bits.set(id, false);
        }
        config
    }

    pub fn union(&self, other: &Configuration) -> Configuration {
        debug_assert_eq!(self.capacity(), other.capacity(), "configurations from different snapshot generations");
        let mut config = self.clone();
        for id in other.bits.iter_ones() {
            config.bits.set(id, true);
        }
        config
    }

    pub fn intersection(&self, other: &Configuration) -> Configuration {
        debug_assert_eq!(self.capacity(), other.capacity(), "configurations from different snapshot generations");
        Configuration::from_ids(self.capacity(), self.bits.iter_ones().filter(|&id| other.contains(id)))
    }

    pub fn difference(&self, other: &Configuration) -> Configuration {
        debug_assert_eq!(self.capacity(), other.capacity(), "configurations from different snapshot generations");
        Configuration::from_ids(self.capacity(), self.bits.iter_ones().filter(|&id| !other.contains(id)))
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    pub fn restrict_to_capacity(&self, capacity: usize) -> Configuration {
        Configuration::from_ids(capacity, self.bits.iter_ones().filter(|&id| id < capacity))
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration{}/{}", self, self.capacity())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_operations_test() {
        let a = Configuration::from_ids(6, [0, 2, 4]);
        let b = Configuration::from_ids(6, [2, 3]);
        assert_eq!(a.union(&b), Configuration::from_ids(6, [0, 2, 3, 4]));
        assert_eq!(a.intersection(&b), Configuration::from_ids(6, [2]));
        assert_eq!(a.difference(&b), Configuration::from_ids(6, [0, 4]));
        assert_eq!(a.len(), 3);
        assert!(a.contains(4));
        assert!(!a.contains(5));
        assert!(!a.contains(100));
    }

    #[test]
    fn subset_test() {
        let small = Configuration::from_ids(4, [1]);
        let big = Configuration::from_ids(4, [1, 3]);
        assert!(small.is_subset_of(&big));
        assert!(big.is_superset_of(&small));
        assert!(!big.is_subset_of(&small));
        assert!(Configuration::empty(4).is_subset_of(&small));
        assert!(big.is_subset_of(&big));
    }

    #[test]
    fn with_without_clear_test() {
        let mut config = Configuration::full(3);
        assert_eq!(config.without(1), Configuration::from_ids(3, [0, 2]));
        assert_eq!(config.without(1).with(1), config);
        config.clear();
        assert!(config.is_empty());
        assert_eq!(config.capacity(), 3);
    }

    #[test]
    fn generations_are_distinct_test() {
        let old = Configuration::from_ids(3, [0, 2]);
        let new = old.restrict_to_capacity(5);
        assert_ne!(old, new);
        assert_eq!(new.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(new.restrict_to_capacity(1), Configuration::from_ids(1, [0]));
    }

    #[test]
    fn display_test() {
        assert_eq!(Configuration::from_ids(8, [1, 5, 7]).to_string(), "{1, 5, 7}");
        assert_eq!(Configuration::empty(2).to_string(), "{}");
    }
}
