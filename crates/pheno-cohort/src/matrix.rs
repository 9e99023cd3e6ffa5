//! Phenotype matrix: every roster subject × every phenotype.
//!
//! Each definition is classified independently; a failing phenotype is
//! recorded against its id and the rest still run. Columns always follow
//! definition order, also when classified in parallel.

use std::collections::HashSet;

use pheno_model::{DefinitionError, PhenotypeDefinition, SubjectId};
use tracing::{debug, info, warn};

use crate::engine::CohortEngine;
use crate::error::{CohortError, CohortResult};
use crate::result::{ClassificationResult, CohortCounts, Status};
use crate::subjects::SubjectSet;

/// Outcome of one phenotype in the matrix.
#[derive(Debug, Clone)]
pub struct PhenotypeColumn {
    phenotype_id: String,
    outcome: CohortResult<ClassificationResult>,
}

impl PhenotypeColumn {
    /// Phenotype id (column header).
    pub fn phenotype_id(&self) -> &str {
        &self.phenotype_id
    }

    /// The classification, or `None` if the phenotype failed.
    pub fn result(&self) -> Option<&ClassificationResult> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&CohortError> {
        self.outcome.as_ref().err()
    }

    /// Returns true if the phenotype was classified.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Status of a subject, or `None` if the phenotype failed.
    pub fn status(&self, subject: SubjectId) -> Option<Status> {
        self.result().map(|result| result.status(subject))
    }

    /// Counts, or `None` if the phenotype failed.
    pub fn counts(&self) -> Option<CohortCounts> {
        self.result().map(ClassificationResult::counts)
    }
}

/// Subject × phenotype status matrix.
#[derive(Debug, Clone)]
pub struct PhenotypeMatrix {
    subjects: Vec<SubjectId>,
    columns: Vec<PhenotypeColumn>,
}

impl PhenotypeMatrix {
    /// Roster subjects in ascending order (matrix rows).
    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    /// Phenotype columns in definition order.
    pub fn columns(&self) -> &[PhenotypeColumn] {
        &self.columns
    }

    /// Looks a column up by phenotype id (first occurrence).
    pub fn column(&self, phenotype_id: &str) -> Option<&PhenotypeColumn> {
        self.columns
            .iter()
            .find(|column| column.phenotype_id == phenotype_id)
    }

    /// Status of a subject for a phenotype.
    ///
    /// `None` if the phenotype is unknown or failed, or the subject is not on
    /// the roster.
    pub fn status(&self, subject: SubjectId, phenotype_id: &str) -> Option<Status> {
        if self.subjects.binary_search(&subject).is_err() {
            return None;
        }
        self.column(phenotype_id)?.status(subject)
    }

    /// One row: the subject's status in every column (`None` for failures).
    pub fn row(&self, subject: SubjectId) -> impl Iterator<Item = Option<Status>> + '_ {
        self.columns.iter().map(move |column| column.status(subject))
    }

    /// Failed phenotypes with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &CohortError)> {
        self.columns
            .iter()
            .filter_map(|column| column.error().map(|err| (column.phenotype_id(), err)))
    }

    /// Number of phenotypes that were classified.
    pub fn succeeded(&self) -> usize {
        self.columns.iter().filter(|column| column.is_ok()).count()
    }
}

/// Runs the cohort engine over many phenotype definitions.
///
/// # Example
///
/// ```rust
/// use pheno_cohort::{
///     CohortEngine, ConceptSetResolver, EngineConfig, MatrixBuilder, Occurrence,
///     OccurrenceIndex, Status, SubjectSet,
/// };
/// use pheno_model::{Category, ConceptRole, PhenotypeDefinition};
///
/// let index = OccurrenceIndex::build([Occurrence::new(1, 100, Category::Condition, 40.0)]).unwrap();
/// let resolver = ConceptSetResolver::new(&EngineConfig::default());
/// let builder = MatrixBuilder::new(CohortEngine::new(&index, &resolver));
///
/// let definitions = vec![
///     PhenotypeDefinition::builder("ph1", "First")
///         .concepts(ConceptRole::CaseCondition, [100])
///         .build(),
///     PhenotypeDefinition::builder("", "Broken").build(),
/// ];
/// let roster: SubjectSet = [1, 2].into_iter().collect();
///
/// let matrix = builder.build(&definitions, &roster);
/// assert_eq!(matrix.status(1, "ph1"), Some(Status::Case));
/// assert_eq!(matrix.status(2, "ph1"), Some(Status::Control));
/// assert_eq!(matrix.failures().count(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MatrixBuilder<'a> {
    engine: CohortEngine<'a>,
    parallel: bool,
}

impl<'a> MatrixBuilder<'a> {
    /// Creates a sequential matrix builder.
    pub fn new(engine: CohortEngine<'a>) -> Self {
        Self {
            engine,
            parallel: false,
        }
    }

    /// Enables or disables parallel classification (requires `parallel` feature).
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Classifies every definition against the roster.
    pub fn build(&self, definitions: &[PhenotypeDefinition], roster: &SubjectSet) -> PhenotypeMatrix {
        let duplicates = duplicate_positions(definitions);
        let classify = |(position, definition): (usize, &PhenotypeDefinition)| {
            let outcome = if duplicates.contains(&position) {
                Err(CohortError::InvalidDefinition(DefinitionError::DuplicateId(
                    definition.id().to_string(),
                )))
            } else {
                self.engine.classify(definition, roster)
            };
            if let Err(err) = &outcome {
                warn!(phenotype = definition.id(), error = %err, "phenotype failed");
            }
            PhenotypeColumn {
                phenotype_id: definition.id().to_string(),
                outcome,
            }
        };

        let columns = self.run(definitions, classify);
        let matrix = PhenotypeMatrix {
            subjects: roster.to_vec(),
            columns,
        };
        info!(
            subjects = matrix.subjects.len(),
            phenotypes = matrix.columns.len(),
            failed = matrix.columns.len() - matrix.succeeded(),
            "built phenotype matrix"
        );
        matrix
    }

    #[cfg(feature = "parallel")]
    fn run<F>(&self, definitions: &[PhenotypeDefinition], classify: F) -> Vec<PhenotypeColumn>
    where
        F: Fn((usize, &PhenotypeDefinition)) -> PhenotypeColumn + Sync + Send,
    {
        use rayon::prelude::*;

        if self.parallel {
            debug!(phenotypes = definitions.len(), "classifying in parallel");
            definitions.par_iter().enumerate().map(classify).collect()
        } else {
            definitions.iter().enumerate().map(classify).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run<F>(&self, definitions: &[PhenotypeDefinition], classify: F) -> Vec<PhenotypeColumn>
    where
        F: Fn((usize, &PhenotypeDefinition)) -> PhenotypeColumn,
    {
        if self.parallel {
            debug!("parallel classification requested without the `parallel` feature");
        }
        definitions.iter().enumerate().map(classify).collect()
    }
}

/// Positions of definitions whose id already appeared earlier.
fn duplicate_positions(definitions: &[PhenotypeDefinition]) -> HashSet<usize> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut duplicates = HashSet::new();
    for (position, definition) in definitions.iter().enumerate() {
        // Blank ids fail validation on their own.
        if !definition.id().trim().is_empty() && !seen.insert(definition.id()) {
            duplicates.insert(position);
        }
    }
    duplicates
}
