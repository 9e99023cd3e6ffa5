//! Roaring bitmap-based subject sets.
//!
//! Every stage of the cohort algorithm is a union, intersection, or
//! difference over subject sets, so subjects are held in a compressed
//! `RoaringTreemap` (native `u64` keys, no id registry needed).
//!
//! # Example
//!
//! ```rust
//! use pheno_cohort::SubjectSet;
//!
//! let universe: SubjectSet = [1, 2, 3, 4].into_iter().collect();
//! let matched: SubjectSet = [2, 4, 9].into_iter().collect();
//!
//! let cases = universe.intersection(&matched);   // AND
//! let controls = universe.difference(&cases);    // MINUS
//!
//! assert_eq!(cases.to_vec(), vec![2, 4]);
//! assert_eq!(controls.to_vec(), vec![1, 3]);
//! ```

use std::fmt;

use pheno_model::SubjectId;
use roaring::RoaringTreemap;

/// A set of subjects stored as a Roaring bitmap. Iterates in ascending order.
#[derive(Clone, PartialEq)]
pub struct SubjectSet {
    bitmap: RoaringTreemap,
}

impl SubjectSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bitmap: RoaringTreemap::new(),
        }
    }

    /// Inserts a subject. Returns `true` if it was newly inserted.
    pub fn insert(&mut self, subject: SubjectId) -> bool {
        self.bitmap.insert(subject)
    }

    /// Removes a subject. Returns `true` if it was present.
    pub fn remove(&mut self, subject: SubjectId) -> bool {
        self.bitmap.remove(subject)
    }

    /// Checks if a subject is in the set.
    #[inline]
    pub fn contains(&self, subject: SubjectId) -> bool {
        self.bitmap.contains(subject)
    }

    /// Returns the number of subjects in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.bitmap.len() as usize
    }

    /// Returns true if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_empty()
    }

    /// Computes intersection (AND) - returns a new set.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            bitmap: &self.bitmap & &other.bitmap,
        }
    }

    /// Computes union (OR) - returns a new set.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            bitmap: &self.bitmap | &other.bitmap,
        }
    }

    /// Computes difference (MINUS) - returns a new set.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            bitmap: &self.bitmap - &other.bitmap,
        }
    }

    /// Computes intersection in-place.
    pub fn and_inplace(&mut self, other: &Self) {
        self.bitmap &= &other.bitmap;
    }

    /// Computes union in-place.
    pub fn or_inplace(&mut self, other: &Self) {
        self.bitmap |= &other.bitmap;
    }

    /// Computes difference in-place.
    pub fn minus_inplace(&mut self, other: &Self) {
        self.bitmap -= &other.bitmap;
    }

    /// Returns true if every subject of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        (&self.bitmap - &other.bitmap).is_empty()
    }

    /// Returns true if the two sets share no subject.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        (&self.bitmap & &other.bitmap).is_empty()
    }

    /// Keeps only the subjects matching `predicate`.
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(SubjectId) -> bool,
    {
        self.iter().filter(|&subject| predicate(subject)).collect()
    }

    /// Iterates over subjects in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.bitmap.iter()
    }

    /// Collects subjects into an ascending vector.
    pub fn to_vec(&self) -> Vec<SubjectId> {
        self.iter().collect()
    }
}

impl Default for SubjectSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<SubjectId> for SubjectSet {
    fn from_iter<I: IntoIterator<Item = SubjectId>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<SubjectId> for SubjectSet {
    fn extend<I: IntoIterator<Item = SubjectId>>(&mut self, iter: I) {
        for subject in iter {
            self.bitmap.insert(subject);
        }
    }
}

impl fmt::Debug for SubjectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() <= 16 {
            f.debug_set().entries(self.iter()).finish()
        } else {
            f.debug_struct("SubjectSet")
                .field("len", &self.len())
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[SubjectId]) -> SubjectSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut subjects = SubjectSet::new();
        assert!(subjects.insert(5));
        assert!(!subjects.insert(5));
        assert!(subjects.contains(5));
        assert!(subjects.remove(5));
        assert!(subjects.is_empty());
    }

    #[test]
    fn test_large_ids() {
        let big = u64::from(u32::MAX) + 10;
        let subjects = set(&[1, big]);
        assert!(subjects.contains(big));
        assert_eq!(subjects.to_vec(), vec![1, big]);
    }

    #[test]
    fn test_set_operations() {
        let a = set(&[1, 2, 3]);
        let b = set(&[2, 3, 4]);

        assert_eq!(a.intersection(&b).to_vec(), vec![2, 3]);
        assert_eq!(a.union(&b).to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(a.difference(&b).to_vec(), vec![1]);
    }

    #[test]
    fn test_inplace_operations() {
        let mut a = set(&[1, 2, 3]);
        a.and_inplace(&set(&[2, 3, 4]));
        assert_eq!(a.to_vec(), vec![2, 3]);

        a.or_inplace(&set(&[7]));
        assert_eq!(a.to_vec(), vec![2, 3, 7]);

        a.minus_inplace(&set(&[3]));
        assert_eq!(a.to_vec(), vec![2, 7]);
    }

    #[test]
    fn test_subset_and_disjoint() {
        let a = set(&[1, 2]);
        let b = set(&[1, 2, 3]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(SubjectSet::new().is_subset(&a));
        assert!(a.is_disjoint(&set(&[5, 6])));
        assert!(!a.is_disjoint(&b));
    }

    #[test]
    fn test_filter_preserves_order() {
        let subjects = set(&[9, 1, 4, 6]);
        let even = subjects.filter(|s| s % 2 == 0);
        assert_eq!(even.to_vec(), vec![4, 6]);
    }

    #[test]
    fn test_debug_small_and_large() {
        assert_eq!(format!("{:?}", set(&[1, 2])), "{1, 2}");

        let large: SubjectSet = (0..100).collect();
        assert!(format!("{:?}", large).contains("len: 100"));
    }
}
