//! Lineup representation shared by the kernel and the optimizer.

use serde::{Deserialize, Serialize};

use crate::constraint::ConstraintSpec;

/// Number of drivers in a DraftKings NASCAR lineup.
pub const LINEUP_SIZE: usize = 6;

/// Contest salary cap.
pub const SALARY_CAP: u32 = 50_000;

/// A set of drivers identified by their canonical spec indices.
///
/// Indices are kept sorted, so two lineups with the same drivers compare
/// equal and overlap computation is a linear merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lineup {
    driver_indices: Vec<usize>,
}

impl Lineup {
    pub fn new(mut driver_indices: Vec<usize>) -> Self {
        driver_indices.sort_unstable();
        Self { driver_indices }
    }

    pub fn driver_indices(&self) -> &[usize] {
        &self.driver_indices
    }

    pub fn len(&self) -> usize {
        self.driver_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.driver_indices.is_empty()
    }

    pub fn contains(&self, driver_index: usize) -> bool {
        self.driver_indices.binary_search(&driver_index).is_ok()
    }

    /// Driver ids in canonical (sorted) order.
    pub fn driver_ids<'a>(&self, spec: &'a ConstraintSpec) -> Vec<&'a str> {
        self.driver_indices
            .iter()
            .map(|&i| spec.driver(i).driver_id.as_str())
            .collect()
    }

    pub fn total_salary(&self, spec: &ConstraintSpec) -> u32 {
        self.driver_indices
            .iter()
            .map(|&i| spec.driver(i).salary)
            .sum()
    }

    /// Number of drivers shared with another lineup.
    pub fn overlap(&self, other: &Lineup) -> usize {
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < self.driver_indices.len() && j < other.driver_indices.len() {
            match self.driver_indices[i].cmp(&other.driver_indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_normalized_to_sorted_order() {
        let a = Lineup::new(vec![5, 1, 3]);
        let b = Lineup::new(vec![1, 3, 5]);
        assert_eq!(a, b);
        assert!(a.contains(3));
        assert!(!a.contains(2));
    }

    #[test]
    fn overlap_counts_shared_drivers() {
        let a = Lineup::new(vec![0, 1, 2, 3, 4, 5]);
        let b = Lineup::new(vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(a.overlap(&b), 3);
        assert_eq!(a.overlap(&a), 6);
        assert_eq!(b.overlap(&a), 3);
    }
}
