//! Collaborator traits for concept resolution.
//!
//! The resolver needs two lookups it does not own: an ICD9/10 → OMOP mapping
//! and, optionally, the OMOP concept hierarchy. Both are read-only and must be
//! `Send + Sync` so phenotypes can be classified concurrently.
//!
//! # Implementing a hierarchy
//!
//! ```rust
//! use pheno_cohort::ConceptHierarchy;
//! use pheno_model::{Category, ConceptId};
//! use std::collections::HashMap;
//!
//! struct ConditionTree {
//!     children: HashMap<ConceptId, Vec<ConceptId>>,
//! }
//!
//! impl ConceptHierarchy for ConditionTree {
//!     fn children(&self, category: Category, concept: ConceptId) -> Vec<ConceptId> {
//!         if category != Category::Condition {
//!             return Vec::new();
//!         }
//!         self.children.get(&concept).cloned().unwrap_or_default()
//!     }
//! }
//! ```

use std::collections::HashMap;

use pheno_model::{Category, ConceptId};

/// ICD9/10 code to OMOP standard concept lookup.
pub trait IcdMapping: Send + Sync {
    /// Returns the OMOP concepts an ICD code maps to.
    ///
    /// An empty vector means the code is unmapped.
    fn map_code(&self, code: &str) -> Vec<ConceptId>;
}

/// OMOP concept hierarchy, scoped by category.
pub trait ConceptHierarchy: Send + Sync {
    /// Returns the concepts directly below `concept`.
    ///
    /// Implementations backed by a transitive `concept_ancestor` table may
    /// return every descendant; traversal tolerates both.
    fn children(&self, category: Category, concept: ConceptId) -> Vec<ConceptId>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// In-memory ICD mapping table.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{IcdMapping, IcdMappingTable};
///
/// let mut table = IcdMappingTable::new();
/// table.insert("E11.9", 201826);
/// table.insert("E11.9", 443238);
///
/// assert_eq!(table.map_code(" E11.9 "), vec![201826, 443238]);
/// assert!(table.map_code("I10").is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct IcdMappingTable {
    codes: HashMap<String, Vec<ConceptId>>,
}

impl IcdMappingTable {
    /// Creates an empty mapping table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one code → concept row. Repeated rows are ignored.
    pub fn insert(&mut self, code: impl AsRef<str>, concept: ConceptId) {
        let targets = self
            .codes
            .entry(code.as_ref().trim().to_string())
            .or_default();
        if !targets.contains(&concept) {
            targets.push(concept);
        }
    }

    /// Number of distinct mapped codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if no codes are mapped.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl IcdMapping for IcdMappingTable {
    fn map_code(&self, code: &str) -> Vec<ConceptId> {
        self.codes.get(code.trim()).cloned().unwrap_or_default()
    }
}

impl<S: AsRef<str>> FromIterator<(S, ConceptId)> for IcdMappingTable {
    fn from_iter<I: IntoIterator<Item = (S, ConceptId)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (code, concept) in iter {
            table.insert(code, concept);
        }
        table
    }
}

/// In-memory concept hierarchy built from ancestor → descendant rows.
///
/// Self rows (ancestor equal to descendant, as found at level zero of an OMOP
/// `concept_ancestor` table) are dropped.
#[derive(Debug, Clone, Default)]
pub struct AncestorTable {
    edges: HashMap<(Category, ConceptId), Vec<ConceptId>>,
    edge_count: usize,
}

impl AncestorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one ancestor → descendant row within a category.
    pub fn insert(&mut self, category: Category, ancestor: ConceptId, descendant: ConceptId) {
        if ancestor == descendant {
            return;
        }
        let children = self.edges.entry((category, ancestor)).or_default();
        if !children.contains(&descendant) {
            children.push(descendant);
            self.edge_count += 1;
        }
    }

    /// Number of stored edges.
    pub fn len(&self) -> usize {
        self.edge_count
    }

    /// Returns true if the table has no edges.
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

impl ConceptHierarchy for AncestorTable {
    fn children(&self, category: Category, concept: ConceptId) -> Vec<ConceptId> {
        self.edges
            .get(&(category, concept))
            .cloned()
            .unwrap_or_default()
    }
}

impl FromIterator<(Category, ConceptId, ConceptId)> for AncestorTable {
    fn from_iter<I: IntoIterator<Item = (Category, ConceptId, ConceptId)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (category, ancestor, descendant) in iter {
            table.insert(category, ancestor, descendant);
        }
        table
    }
}
