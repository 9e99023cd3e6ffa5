//! Descendant traversal over the concept hierarchy.
//!
//! This module provides the `HierarchyTraverser` struct for closing concept
//! sets under descendants using BFS (Breadth-First Search).

use std::collections::{HashSet, VecDeque};

use pheno_model::{Category, ConceptId};

use crate::traits::ConceptHierarchy;

/// Traverses a category-scoped concept hierarchy using BFS.
///
/// Cycles in the hierarchy are tolerated: every concept is visited once.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{AncestorTable, HierarchyTraverser};
/// use pheno_model::Category;
///
/// let table: AncestorTable = [
///     (Category::Condition, 1, 2),
///     (Category::Condition, 2, 3),
/// ]
/// .into_iter()
/// .collect();
///
/// let traverser = HierarchyTraverser::new(&table);
/// let closure = traverser.descendants_or_self(Category::Condition, 1);
/// assert_eq!(closure.len(), 3);
/// ```
pub struct HierarchyTraverser<'a> {
    hierarchy: &'a dyn ConceptHierarchy,
}

impl<'a> HierarchyTraverser<'a> {
    /// Creates a new traverser over the given hierarchy.
    pub fn new(hierarchy: &'a dyn ConceptHierarchy) -> Self {
        Self { hierarchy }
    }

    /// Gets all descendants of a concept, excluding the concept itself.
    pub fn descendants(&self, category: Category, concept: ConceptId) -> HashSet<ConceptId> {
        let mut visited = HashSet::with_capacity(64);
        let mut queue = VecDeque::with_capacity(32);

        for child in self.hierarchy.children(category, concept) {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }

        while let Some(current) = queue.pop_front() {
            for child in self.hierarchy.children(category, current) {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        // A cycle through the root would otherwise report it as its own descendant.
        visited.remove(&concept);
        visited
    }

    /// Gets all descendants of a concept, including the concept itself.
    pub fn descendants_or_self(
        &self,
        category: Category,
        concept: ConceptId,
    ) -> HashSet<ConceptId> {
        let mut result = self.descendants(category, concept);
        result.insert(concept);
        result
    }

    /// Closes a set of seed concepts under descendants.
    pub fn close<I>(&self, category: Category, seeds: I) -> HashSet<ConceptId>
    where
        I: IntoIterator<Item = ConceptId>,
    {
        let mut result = HashSet::new();
        for seed in seeds {
            if result.contains(&seed) {
                continue;
            }
            result.extend(self.descendants_or_self(category, seed));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::AncestorTable;

    /// 1 ─┬─ 2 ── 4
    ///    └─ 3 ── 4   (diamond)
    fn diamond() -> AncestorTable {
        [
            (Category::Condition, 1, 2),
            (Category::Condition, 1, 3),
            (Category::Condition, 2, 4),
            (Category::Condition, 3, 4),
            (Category::Procedure, 1, 99),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_descendants_excludes_self() {
        let table = diamond();
        let traverser = HierarchyTraverser::new(&table);

        let result = traverser.descendants(Category::Condition, 1);
        assert_eq!(result, [2, 3, 4].into_iter().collect());
    }

    #[test]
    fn test_descendants_or_self_of_leaf() {
        let table = diamond();
        let traverser = HierarchyTraverser::new(&table);

        let result = traverser.descendants_or_self(Category::Condition, 4);
        assert_eq!(result, [4].into_iter().collect());
    }

    #[test]
    fn test_traversal_is_category_scoped() {
        let table = diamond();
        let traverser = HierarchyTraverser::new(&table);

        let result = traverser.descendants(Category::Procedure, 1);
        assert_eq!(result, [99].into_iter().collect());
    }

    #[test]
    fn test_cycle_terminates() {
        let table: AncestorTable = [
            (Category::Condition, 1, 2),
            (Category::Condition, 2, 3),
            (Category::Condition, 3, 1),
        ]
        .into_iter()
        .collect();
        let traverser = HierarchyTraverser::new(&table);

        let result = traverser.descendants(Category::Condition, 1);
        assert_eq!(result, [2, 3].into_iter().collect());
    }

    #[test]
    fn test_close_unions_seeds() {
        let table = diamond();
        let traverser = HierarchyTraverser::new(&table);

        let result = traverser.close(Category::Condition, [2, 3, 50]);
        assert_eq!(result, [2, 3, 4, 50].into_iter().collect());
    }
}
