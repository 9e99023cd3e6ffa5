//! Occurrence index: earliest occurrence age per (subject, concept).
//!
//! Built once from the occurrence table and shared read-only across every
//! phenotype. Repeated occurrences of a concept for a subject collapse to the
//! minimum age. Two views are kept:
//!
//! - forward: subject → (category, concept) → earliest age, for point queries;
//! - inverted: (category, concept) → [(subject, earliest age)], so population
//!   queries touch only the postings of the queried concepts.
//!
//! # Example
//!
//! ```rust
//! use pheno_cohort::{Occurrence, OccurrenceIndex, ResolvedConceptSet};
//! use pheno_model::{Category, ConceptRole};
//!
//! let index = OccurrenceIndex::build([
//!     Occurrence::new(1, 100, Category::Condition, 50.0),
//!     Occurrence::new(1, 100, Category::Condition, 30.0),
//!     Occurrence::new(2, 100, Category::Procedure, 40.0),
//! ])
//! .unwrap();
//!
//! let case_cond = ResolvedConceptSet::new(ConceptRole::CaseCondition, [100]);
//! assert_eq!(index.earliest_age(1, &[&case_cond]), Some(30.0));
//! // Concepts match within their own category only.
//! assert!(!index.has_any(2, &[&case_cond]));
//! ```

use std::collections::HashMap;

use pheno_model::{Age, Category, ConceptId, SubjectId};
use tracing::debug;

use crate::error::{CohortError, CohortResult};
use crate::resolver::ResolvedConceptSet;
use crate::subjects::SubjectSet;

type FactKey = (Category, ConceptId);

/// One condition or procedure occurrence of a subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occurrence {
    /// Subject the fact belongs to.
    pub subject: SubjectId,
    /// OMOP concept recorded.
    pub concept: ConceptId,
    /// Condition or procedure.
    pub category: Category,
    /// Age in years at the occurrence.
    pub age: Age,
}

impl Occurrence {
    /// Creates a new occurrence fact.
    pub fn new(subject: SubjectId, concept: ConceptId, category: Category, age: Age) -> Self {
        Self {
            subject,
            concept,
            category,
            age,
        }
    }
}

/// In-memory index over occurrence facts.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceIndex {
    by_subject: HashMap<SubjectId, HashMap<FactKey, Age>>,
    postings: HashMap<FactKey, Vec<(SubjectId, Age)>>,
    fact_count: usize,
}

impl OccurrenceIndex {
    /// Builds the index from occurrence facts.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::InvalidOccurrence`] for the first fact with a
    /// negative or non-finite age.
    pub fn build<I>(occurrences: I) -> CohortResult<Self>
    where
        I: IntoIterator<Item = Occurrence>,
    {
        let mut by_subject: HashMap<SubjectId, HashMap<FactKey, Age>> = HashMap::new();
        let mut fact_count = 0;

        for occurrence in occurrences {
            if !occurrence.age.is_finite() || occurrence.age < 0.0 {
                return Err(CohortError::InvalidOccurrence {
                    subject: occurrence.subject,
                    concept: occurrence.concept,
                    age: occurrence.age,
                });
            }
            fact_count += 1;
            by_subject
                .entry(occurrence.subject)
                .or_default()
                .entry((occurrence.category, occurrence.concept))
                .and_modify(|age| *age = age.min(occurrence.age))
                .or_insert(occurrence.age);
        }

        let mut postings: HashMap<FactKey, Vec<(SubjectId, Age)>> = HashMap::new();
        for (&subject, facts) in &by_subject {
            for (&key, &age) in facts {
                postings.entry(key).or_default().push((subject, age));
            }
        }
        for list in postings.values_mut() {
            list.sort_unstable_by_key(|(subject, _)| *subject);
        }

        let index = Self {
            by_subject,
            postings,
            fact_count,
        };
        debug!(
            facts = index.fact_count,
            subjects = index.subject_count(),
            concepts = index.concept_count(),
            "built occurrence index"
        );
        Ok(index)
    }

    /// Returns true if the subject has any fact matching any of the sets.
    pub fn has_any(&self, subject: SubjectId, sets: &[&ResolvedConceptSet]) -> bool {
        let Some(facts) = self.by_subject.get(&subject) else {
            return false;
        };
        sets.iter()
            .any(|set| Self::subject_matches(facts, set).next().is_some())
    }

    /// Earliest age at which the subject has a fact matching any of the sets.
    pub fn earliest_age(&self, subject: SubjectId, sets: &[&ResolvedConceptSet]) -> Option<Age> {
        let facts = self.by_subject.get(&subject)?;
        sets.iter()
            .flat_map(|set| Self::subject_matches(facts, set))
            .reduce(Age::min)
    }

    /// All subjects with a fact matching any of the sets.
    pub fn matching_subjects(&self, sets: &[&ResolvedConceptSet]) -> SubjectSet {
        self.postings_for(sets).map(|(subject, _)| subject).collect()
    }

    /// Earliest matching age for every subject with a fact matching any of the sets.
    pub fn earliest_ages(&self, sets: &[&ResolvedConceptSet]) -> HashMap<SubjectId, Age> {
        let mut ages: HashMap<SubjectId, Age> = HashMap::new();
        for (subject, age) in self.postings_for(sets) {
            ages.entry(subject)
                .and_modify(|earliest| *earliest = earliest.min(age))
                .or_insert(age);
        }
        ages
    }

    /// Subjects with at least one fact.
    pub fn subjects(&self) -> SubjectSet {
        self.by_subject.keys().copied().collect()
    }

    /// Number of subjects with at least one fact.
    pub fn subject_count(&self) -> usize {
        self.by_subject.len()
    }

    /// Number of distinct (category, concept) pairs.
    pub fn concept_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of facts folded into the index.
    pub fn fact_count(&self) -> usize {
        self.fact_count
    }

    /// Ages of a subject's facts matching one set.
    ///
    /// Walks whichever side is smaller: the subject's facts or the set.
    fn subject_matches<'s>(
        facts: &'s HashMap<FactKey, Age>,
        set: &'s ResolvedConceptSet,
    ) -> Box<dyn Iterator<Item = Age> + 's> {
        let category = set.category();
        if facts.len() < set.len() {
            Box::new(
                facts
                    .iter()
                    .filter(move |((fact_category, concept), _)| {
                        *fact_category == category && set.contains(*concept)
                    })
                    .map(|(_, &age)| age),
            )
        } else {
            Box::new(
                set.concepts()
                    .iter()
                    .filter_map(move |&concept| facts.get(&(category, concept)).copied()),
            )
        }
    }

    fn postings_for<'s>(
        &'s self,
        sets: &'s [&'s ResolvedConceptSet],
    ) -> impl Iterator<Item = (SubjectId, Age)> + 's {
        sets.iter().flat_map(move |set| {
            let category = set.category();
            set.concepts()
                .iter()
                .filter_map(move |&concept| self.postings.get(&(category, concept)))
                .flatten()
                .copied()
        })
    }
}
