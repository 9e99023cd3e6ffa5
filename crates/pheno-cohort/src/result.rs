//! Classification result types.

use std::fmt;
use std::time::Duration;

use pheno_model::{Age, ConceptRole, SubjectId};

use crate::subjects::SubjectSet;

/// Status of a subject for one phenotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Subject is a case.
    Case,
    /// Subject is a control.
    Control,
    /// Subject is neither (outside the universe, or removed by an age or
    /// exclusion filter).
    Excluded,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Case => f.write_str("case"),
            Self::Control => f.write_str("control"),
            Self::Excluded => f.write_str("excluded"),
        }
    }
}

/// Non-fatal observation recorded while classifying a phenotype.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// No roster subject survived the universe filters.
    EmptyUniverse,
    /// ICD codes of a role were skipped because they had no mapping.
    UnmappedCodes {
        /// Role the codes were declared under.
        role: ConceptRole,
        /// The skipped codes.
        codes: Vec<String>,
    },
    /// Universe age bounds were set without inclusion concepts to anchor them,
    /// so they were not applied.
    UniverseAgeUnanchored {
        /// Declared minimum age.
        min: Option<Age>,
        /// Declared maximum age.
        max: Option<Age>,
    },
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUniverse => f.write_str("universe is empty"),
            Self::UnmappedCodes { role, codes } => {
                write!(f, "unmapped ICD codes in {role}: {}", codes.join(", "))
            }
            Self::UniverseAgeUnanchored { min, max } => {
                let bound = |value: &Option<Age>| value.map_or("-".to_string(), |v| v.to_string());
                write!(
                    f,
                    "universe age bounds [{}, {}] not applied: no universe inclusion concepts",
                    bound(min),
                    bound(max)
                )
            }
        }
    }
}

/// Subject counts of one classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortCounts {
    /// Subjects in the universe.
    pub universe: usize,
    /// Final cases.
    pub cases: usize,
    /// Final controls.
    pub controls: usize,
    /// Universe subjects that are neither case nor control.
    pub excluded: usize,
}

/// Per-step statistics of one classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationStats {
    /// Roster size.
    pub roster: usize,
    /// Subjects left after universe inclusion.
    pub after_inclusion: usize,
    /// Subjects left after universe exclusion.
    pub after_exclusion: usize,
    /// Final universe size (after the universe age filter).
    pub universe: usize,
    /// Case candidates (step 2).
    pub case_candidates: usize,
    /// Control candidates (step 3).
    pub control_candidates: usize,
    /// Cases left after the case age filter (step 4).
    pub cases_in_age_window: usize,
    /// Total resolved concepts over all roles.
    pub resolved_concepts: usize,
    /// Wall-clock time of the classification.
    pub elapsed: Duration,
}

impl fmt::Display for ClassificationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roster={} inclusion={} exclusion={} universe={} case_candidates={} \
             control_candidates={} in_age_window={} concepts={} elapsed={:?}",
            self.roster,
            self.after_inclusion,
            self.after_exclusion,
            self.universe,
            self.case_candidates,
            self.control_candidates,
            self.cases_in_age_window,
            self.resolved_concepts,
            self.elapsed
        )
    }
}

/// Result of classifying one phenotype.
///
/// Cases, controls, and excluded subjects are disjoint and together make up
/// the universe.
///
/// # Example
///
/// ```ignore
/// let result = engine.classify(&definition, &roster)?;
///
/// println!("{} cases, {} controls", result.cases().len(), result.controls().len());
///
/// match result.status(subject) {
///     Status::Case => println!("case"),
///     Status::Control => println!("control"),
///     Status::Excluded => println!("excluded"),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    phenotype_id: String,
    universe: SubjectSet,
    cases: SubjectSet,
    controls: SubjectSet,
    excluded: SubjectSet,
    stats: ClassificationStats,
    annotations: Vec<Annotation>,
}

impl ClassificationResult {
    /// Assembles a result; `excluded` is derived from the other three sets.
    pub(crate) fn new(
        phenotype_id: String,
        universe: SubjectSet,
        cases: SubjectSet,
        controls: SubjectSet,
        stats: ClassificationStats,
        annotations: Vec<Annotation>,
    ) -> Self {
        let excluded = universe.difference(&cases).difference(&controls);
        Self {
            phenotype_id,
            universe,
            cases,
            controls,
            excluded,
            stats,
            annotations,
        }
    }

    /// Phenotype this result belongs to.
    pub fn phenotype_id(&self) -> &str {
        &self.phenotype_id
    }

    /// Universe of the phenotype.
    pub fn universe(&self) -> &SubjectSet {
        &self.universe
    }

    /// Final cases.
    pub fn cases(&self) -> &SubjectSet {
        &self.cases
    }

    /// Final controls.
    pub fn controls(&self) -> &SubjectSet {
        &self.controls
    }

    /// Universe subjects that are neither case nor control.
    pub fn excluded(&self) -> &SubjectSet {
        &self.excluded
    }

    /// Status of a subject. Subjects outside the universe are `Excluded`.
    pub fn status(&self, subject: SubjectId) -> Status {
        if self.cases.contains(subject) {
            Status::Case
        } else if self.controls.contains(subject) {
            Status::Control
        } else {
            Status::Excluded
        }
    }

    /// Subject counts.
    pub fn counts(&self) -> CohortCounts {
        CohortCounts {
            universe: self.universe.len(),
            cases: self.cases.len(),
            controls: self.controls.len(),
            excluded: self.excluded.len(),
        }
    }

    /// Per-step statistics.
    pub fn stats(&self) -> &ClassificationStats {
        &self.stats
    }

    /// Non-fatal observations.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Results are equal when every set, annotation and step count matches;
/// wall-clock time is ignored.
impl PartialEq for ClassificationResult {
    fn eq(&self, other: &Self) -> bool {
        let Self {
            phenotype_id,
            universe,
            cases,
            controls,
            excluded,
            stats,
            annotations,
        } = self;
        let untimed = |stats: &ClassificationStats| ClassificationStats {
            elapsed: Duration::ZERO,
            ..stats.clone()
        };

        *phenotype_id == other.phenotype_id
            && *universe == other.universe
            && *cases == other.cases
            && *controls == other.controls
            && *excluded == other.excluded
            && untimed(stats) == untimed(&other.stats)
            && *annotations == other.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[SubjectId]) -> SubjectSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_excluded_is_derived() {
        let result = ClassificationResult::new(
            "ph1".to_string(),
            set(&[1, 2, 3, 4, 5]),
            set(&[1]),
            set(&[3, 4]),
            ClassificationStats::default(),
            Vec::new(),
        );

        assert_eq!(result.excluded().to_vec(), vec![2, 5]);
        assert_eq!(
            result.counts(),
            CohortCounts {
                universe: 5,
                cases: 1,
                controls: 2,
                excluded: 2,
            }
        );
    }

    #[test]
    fn test_equality_ignores_elapsed() {
        let result = |cases: &[SubjectId], elapsed: Duration| {
            ClassificationResult::new(
                "ph1".to_string(),
                set(&[1, 2, 3]),
                set(cases),
                set(&[3]),
                ClassificationStats {
                    universe: 3,
                    elapsed,
                    ..Default::default()
                },
                vec![Annotation::EmptyUniverse],
            )
        };

        assert_eq!(
            result(&[1], Duration::from_millis(1)),
            result(&[1], Duration::from_millis(9))
        );
        assert_ne!(
            result(&[1], Duration::ZERO),
            result(&[1, 2], Duration::ZERO)
        );
    }

    #[test]
    fn test_status_lookup() {
        let result = ClassificationResult::new(
            "ph1".to_string(),
            set(&[1, 2, 3]),
            set(&[1]),
            set(&[2]),
            ClassificationStats::default(),
            Vec::new(),
        );

        assert_eq!(result.status(1), Status::Case);
        assert_eq!(result.status(2), Status::Control);
        assert_eq!(result.status(3), Status::Excluded);
        assert_eq!(result.status(99), Status::Excluded);
    }

    #[test]
    fn test_annotation_display() {
        let unmapped = Annotation::UnmappedCodes {
            role: ConceptRole::CaseCondition,
            codes: vec!["A01".into(), "B02".into()],
        };
        assert_eq!(unmapped.to_string(), "unmapped ICD codes in case.cond: A01, B02");

        let unanchored = Annotation::UniverseAgeUnanchored {
            min: Some(18.0),
            max: None,
        };
        assert_eq!(
            unanchored.to_string(),
            "universe age bounds [18, -] not applied: no universe inclusion concepts"
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Case.to_string(), "case");
        assert_eq!(Status::Excluded.to_string(), "excluded");
    }
}
