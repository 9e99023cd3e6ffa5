//! Cohort engine: universe, case, and control sets for one phenotype.
//!
//! The classification follows a fixed order:
//!
//! 1. universe: roster ∩ inclusion − exclusion, then the universe age window
//!    (anchored on the earliest inclusion-concept occurrence);
//! 2. case candidates: universe ∩ case concepts (empty case sets match nothing);
//! 3. control candidates: universe − case candidates;
//! 4. case age window on the earliest case-concept occurrence;
//! 5. case exclusion;
//! 6. control exclusion.
//!
//! Candidates dropped in steps 4 and 5 never return to the control pool.

use std::collections::HashMap;
use std::time::Instant;

use pheno_model::{Age, AgeBounds, EmptySetPolicy, PhenotypeDefinition, RoleGroup, SubjectId};
use tracing::{debug, info, instrument, warn};

use crate::error::CohortResult;
use crate::index::OccurrenceIndex;
use crate::resolver::{ConceptSetResolver, ResolvedConceptSet, ResolvedDefinition};
use crate::result::{Annotation, ClassificationResult, ClassificationStats};
use crate::subjects::SubjectSet;

/// Classifies subjects for one phenotype definition at a time.
///
/// The index and resolver are borrowed read-only, so one engine can serve
/// many phenotypes, including concurrently.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{
///     CohortEngine, ConceptSetResolver, EngineConfig, Occurrence, OccurrenceIndex, Status,
///     SubjectSet,
/// };
/// use pheno_model::{Category, ConceptRole, PhenotypeDefinition};
///
/// let index = OccurrenceIndex::build([
///     Occurrence::new(1, 100, Category::Condition, 45.0),
///     Occurrence::new(2, 100, Category::Condition, 12.0),
/// ])
/// .unwrap();
/// let resolver = ConceptSetResolver::new(&EngineConfig::default());
/// let engine = CohortEngine::new(&index, &resolver);
///
/// let definition = PhenotypeDefinition::builder("ph1", "Adult onset")
///     .concepts(ConceptRole::CaseCondition, [100])
///     .case_age(Some(18.0), None)
///     .build();
/// let roster: SubjectSet = [1, 2, 3].into_iter().collect();
///
/// let result = engine.classify(&definition, &roster).unwrap();
/// assert_eq!(result.status(1), Status::Case);
/// assert_eq!(result.status(2), Status::Excluded);
/// assert_eq!(result.status(3), Status::Control);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CohortEngine<'a> {
    index: &'a OccurrenceIndex,
    resolver: &'a ConceptSetResolver<'a>,
}

impl<'a> CohortEngine<'a> {
    /// Creates an engine over a built index and a resolver.
    pub fn new(index: &'a OccurrenceIndex, resolver: &'a ConceptSetResolver<'a>) -> Self {
        Self { index, resolver }
    }

    /// The occurrence index in use.
    pub fn index(&self) -> &'a OccurrenceIndex {
        self.index
    }

    /// The concept set resolver in use.
    pub fn resolver(&self) -> &'a ConceptSetResolver<'a> {
        self.resolver
    }

    /// Classifies the roster for one phenotype.
    ///
    /// # Errors
    ///
    /// - [`CohortError::InvalidDefinition`](crate::CohortError::InvalidDefinition)
    ///   before any set is computed, for a missing id or invalid age bounds.
    /// - [`CohortError::UnmappedCode`](crate::CohortError::UnmappedCode) when
    ///   unmapped ICD codes abort resolution.
    #[instrument(skip_all, fields(phenotype = %definition.id()))]
    pub fn classify(
        &self,
        definition: &PhenotypeDefinition,
        roster: &SubjectSet,
    ) -> CohortResult<ClassificationResult> {
        let started = Instant::now();
        definition.validate()?;
        let resolved = self.resolver.resolve_all(definition)?;

        let mut annotations: Vec<Annotation> = resolved
            .iter()
            .filter(|set| !set.unmapped_codes().is_empty())
            .map(|set| Annotation::UnmappedCodes {
                role: set.role(),
                codes: set.unmapped_codes().to_vec(),
            })
            .collect();
        let mut stats = ClassificationStats {
            roster: roster.len(),
            resolved_concepts: resolved.iter().map(ResolvedConceptSet::len).sum(),
            ..Default::default()
        };

        // Step 1: universe.
        let inclusion = resolved.group(RoleGroup::UniverseInclusion);
        let mut universe = self.restrict(roster, &resolved, RoleGroup::UniverseInclusion);
        stats.after_inclusion = universe.len();

        universe.minus_inplace(&self.matching(&resolved, RoleGroup::UniverseExclusion));
        stats.after_exclusion = universe.len();

        let universe_age = definition.universe_age();
        if !universe_age.is_unbounded() {
            if resolved.is_group_empty(RoleGroup::UniverseInclusion) {
                debug!("universe age bounds set without inclusion concepts; not applied");
                annotations.push(Annotation::UniverseAgeUnanchored {
                    min: universe_age.min,
                    max: universe_age.max,
                });
            } else {
                universe = self.within_age(&universe, &inclusion, universe_age);
            }
        }
        stats.universe = universe.len();
        debug!(
            inclusion = stats.after_inclusion,
            exclusion = stats.after_exclusion,
            universe = stats.universe,
            "universe resolved"
        );
        if universe.is_empty() {
            warn!("universe is empty");
            annotations.push(Annotation::EmptyUniverse);
        }

        // Step 2: case candidates.
        let case_sets = resolved.group(RoleGroup::CaseDefinition);
        let case_candidates = self.restrict(&universe, &resolved, RoleGroup::CaseDefinition);
        stats.case_candidates = case_candidates.len();

        // Step 3: control candidates, before any case filter.
        let mut controls = universe.difference(&case_candidates);
        stats.control_candidates = controls.len();

        // Step 4: case age window.
        let case_age = definition.case_age();
        let mut cases = if case_age.is_unbounded() {
            case_candidates
        } else {
            self.within_age(&case_candidates, &case_sets, case_age)
        };
        stats.cases_in_age_window = cases.len();

        // Step 5: case exclusion.
        cases.minus_inplace(&self.matching(&resolved, RoleGroup::CaseExclusion));

        // Step 6: control exclusion.
        controls.minus_inplace(&self.matching(&resolved, RoleGroup::ControlExclusion));

        stats.elapsed = started.elapsed();
        debug!(
            case_candidates = stats.case_candidates,
            control_candidates = stats.control_candidates,
            in_age_window = stats.cases_in_age_window,
            "case and control candidates filtered"
        );
        info!(
            universe = stats.universe,
            cases = cases.len(),
            controls = controls.len(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "classified phenotype"
        );

        Ok(ClassificationResult::new(
            definition.id().to_string(),
            universe,
            cases,
            controls,
            stats,
            annotations,
        ))
    }

    /// Members of `base` matching either set of a group.
    ///
    /// When both sets are empty the outcome follows their empty-set policy:
    /// `Unconstrained` keeps `base`, `MatchesNothing` keeps no one.
    fn restrict(
        &self,
        base: &SubjectSet,
        resolved: &ResolvedDefinition,
        group: RoleGroup,
    ) -> SubjectSet {
        let sets = resolved.group(group);
        if sets.iter().all(|set| set.is_empty()) {
            return match sets[0].empty_policy() {
                EmptySetPolicy::Unconstrained => base.clone(),
                EmptySetPolicy::MatchesNothing => SubjectSet::new(),
            };
        }
        base.intersection(&self.index.matching_subjects(&sets))
    }

    /// Subjects matching either set of a group (empty when both are empty).
    fn matching(&self, resolved: &ResolvedDefinition, group: RoleGroup) -> SubjectSet {
        self.index.matching_subjects(&resolved.group(group))
    }

    /// Keeps subjects whose earliest occurrence over `sets` lies in `bounds`.
    fn within_age(
        &self,
        subjects: &SubjectSet,
        sets: &[&ResolvedConceptSet],
        bounds: AgeBounds,
    ) -> SubjectSet {
        let ages: HashMap<SubjectId, Age> = self.index.earliest_ages(sets);
        subjects.filter(|subject| {
            ages.get(&subject)
                .is_some_and(|&age| bounds.contains(age))
        })
    }
}
