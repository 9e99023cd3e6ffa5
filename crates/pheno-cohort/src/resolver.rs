//! Concept set resolution.
//!
//! Turns the declared concept lists of a [`PhenotypeDefinition`] into closed
//! sets of OMOP concept IDs, one per [`ConceptRole`]:
//!
//! 1. start from the declared concept IDs;
//! 2. for condition roles, add the OMOP concepts each ICD code maps to;
//! 3. when a hierarchy is configured and expansion is enabled, close the set
//!    under descendants within the role's category.
//!
//! Each resolved set carries the [`EmptySetPolicy`] of its role, so an empty
//! set is never ambiguous downstream.

use std::collections::HashSet;

use pheno_model::{Category, ConceptId, ConceptRole, EmptySetPolicy, PhenotypeDefinition, RoleGroup};
use tracing::{debug, warn};

use crate::cache::{CacheStats, ClosureCache};
use crate::config::{EngineConfig, UnmappedCodePolicy};
use crate::error::{CohortError, CohortResult};
use crate::traits::{ConceptHierarchy, IcdMapping};
use crate::traverser::HierarchyTraverser;

/// A closed concept set for one role of one phenotype.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConceptSet {
    role: ConceptRole,
    concepts: HashSet<ConceptId>,
    unmapped: Vec<String>,
}

impl ResolvedConceptSet {
    /// Creates a resolved set directly from concept IDs.
    pub fn new<I>(role: ConceptRole, concepts: I) -> Self
    where
        I: IntoIterator<Item = ConceptId>,
    {
        Self {
            role,
            concepts: concepts.into_iter().collect(),
            unmapped: Vec::new(),
        }
    }

    /// Role this set was resolved for.
    pub fn role(&self) -> ConceptRole {
        self.role
    }

    /// Category the set matches against.
    pub fn category(&self) -> Category {
        self.role.category()
    }

    /// Interpretation of this set when empty.
    pub fn empty_policy(&self) -> EmptySetPolicy {
        self.role.empty_policy()
    }

    /// The resolved concept IDs.
    pub fn concepts(&self) -> &HashSet<ConceptId> {
        &self.concepts
    }

    /// Checks if a concept is in the set.
    pub fn contains(&self, concept: ConceptId) -> bool {
        self.concepts.contains(&concept)
    }

    /// Number of resolved concepts.
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Returns true if no concept was resolved.
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// ICD codes that were skipped because they had no mapping.
    pub fn unmapped_codes(&self) -> &[String] {
        &self.unmapped
    }
}

/// All ten resolved concept sets of one phenotype, indexed by role.
#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
    sets: Vec<ResolvedConceptSet>,
}

impl ResolvedDefinition {
    /// Returns the resolved set for a role.
    pub fn get(&self, role: ConceptRole) -> &ResolvedConceptSet {
        // Built from `ConceptRole::ALL`, so the discriminant is the position.
        &self.sets[role as usize]
    }

    /// Returns the condition and procedure sets of a group.
    pub fn group(&self, group: RoleGroup) -> [&ResolvedConceptSet; 2] {
        let [condition, procedure] = group.roles();
        [self.get(condition), self.get(procedure)]
    }

    /// Returns true if both sets of a group are empty.
    pub fn is_group_empty(&self, group: RoleGroup) -> bool {
        self.group(group).iter().all(|set| set.is_empty())
    }

    /// Iterates over every resolved set in role order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedConceptSet> {
        self.sets.iter()
    }
}

/// Resolves declared concept lists into closed concept sets.
///
/// Read-only apart from the internal closure cache, so one resolver can be
/// shared across concurrently classified phenotypes.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{AncestorTable, ConceptSetResolver, EngineConfig, IcdMappingTable};
/// use pheno_model::{Category, ConceptRole, PhenotypeDefinition};
///
/// let icd: IcdMappingTable = [("E11", 201826)].into_iter().collect();
/// let hierarchy: AncestorTable = [(Category::Condition, 201826, 443238)].into_iter().collect();
///
/// let resolver = ConceptSetResolver::new(&EngineConfig::default())
///     .with_icd_mapping(&icd)
///     .with_hierarchy(&hierarchy);
///
/// let definition = PhenotypeDefinition::builder("T2D", "Type 2 diabetes")
///     .icd_codes(ConceptRole::CaseCondition, ["E11"])
///     .build();
///
/// let set = resolver.resolve(&definition, ConceptRole::CaseCondition).unwrap();
/// assert!(set.contains(201826));
/// assert!(set.contains(443238));
/// ```
pub struct ConceptSetResolver<'a> {
    icd_mapping: Option<&'a dyn IcdMapping>,
    hierarchy: Option<&'a dyn ConceptHierarchy>,
    unmapped_codes: UnmappedCodePolicy,
    expand_descendants: bool,
    cache: Option<ClosureCache>,
}

impl<'a> ConceptSetResolver<'a> {
    /// Creates a resolver without collaborators.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            icd_mapping: None,
            hierarchy: None,
            unmapped_codes: config.unmapped_codes,
            expand_descendants: config.expand_descendants,
            cache: config.cache.map(ClosureCache::new),
        }
    }

    /// Sets the ICD mapping collaborator.
    pub fn with_icd_mapping(mut self, mapping: &'a dyn IcdMapping) -> Self {
        self.icd_mapping = Some(mapping);
        self
    }

    /// Sets the concept hierarchy used for descendant expansion.
    pub fn with_hierarchy(mut self, hierarchy: &'a dyn ConceptHierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Resolves one role of a definition.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::UnmappedCode`] for an unmapped ICD code when the
    /// policy is [`UnmappedCodePolicy::Abort`].
    pub fn resolve(
        &self,
        definition: &PhenotypeDefinition,
        role: ConceptRole,
    ) -> CohortResult<ResolvedConceptSet> {
        let mut seeds: HashSet<ConceptId> = definition.concept_ids(role).iter().copied().collect();
        let mut unmapped = Vec::new();

        for code in definition.icd_codes(role) {
            let mapped = self
                .icd_mapping
                .map(|mapping| mapping.map_code(code))
                .unwrap_or_default();
            if !mapped.is_empty() {
                seeds.extend(mapped);
                continue;
            }
            match self.unmapped_codes {
                UnmappedCodePolicy::Abort => {
                    return Err(CohortError::UnmappedCode {
                        role,
                        code: code.clone(),
                    })
                }
                UnmappedCodePolicy::Skip => {
                    warn!(phenotype = definition.id(), %role, code = %code, "skipping unmapped ICD code");
                    unmapped.push(code.clone());
                }
            }
        }

        let concepts = self.expand(role.category(), seeds);
        Ok(ResolvedConceptSet {
            role,
            concepts,
            unmapped,
        })
    }

    /// Resolves all ten roles of a definition.
    pub fn resolve_all(&self, definition: &PhenotypeDefinition) -> CohortResult<ResolvedDefinition> {
        let sets = ConceptRole::ALL
            .into_iter()
            .map(|role| self.resolve(definition, role))
            .collect::<CohortResult<Vec<_>>>()?;
        debug!(
            phenotype = definition.id(),
            concepts = sets.iter().map(ResolvedConceptSet::len).sum::<usize>(),
            "resolved concept sets"
        );
        Ok(ResolvedDefinition { sets })
    }

    /// Statistics of the closure cache, if enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ClosureCache::stats)
    }

    fn expand(&self, category: Category, seeds: HashSet<ConceptId>) -> HashSet<ConceptId> {
        let hierarchy = match self.hierarchy {
            Some(hierarchy) if self.expand_descendants && !seeds.is_empty() => hierarchy,
            _ => return seeds,
        };
        let traverser = HierarchyTraverser::new(hierarchy);

        let Some(cache) = &self.cache else {
            return traverser.close(category, seeds);
        };
        let mut closed = HashSet::with_capacity(seeds.len());
        for seed in seeds {
            let closure = cache.get_or_insert_with(category, seed, || {
                traverser.descendants_or_self(category, seed)
            });
            closed.extend(closure.iter().copied());
        }
        closed
    }
}

impl std::fmt::Debug for ConceptSetResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConceptSetResolver")
            .field("icd_mapping", &self.icd_mapping.is_some())
            .field("hierarchy", &self.hierarchy.is_some())
            .field("unmapped_codes", &self.unmapped_codes)
            .field("expand_descendants", &self.expand_descendants)
            .field("cache", &self.cache)
            .finish()
    }
}
