//! Error types for cohort classification.

use pheno_model::{ConceptId, ConceptRole, DefinitionError, SubjectId};
use thiserror::Error;

/// Errors that can occur while resolving, indexing, or classifying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CohortError {
    /// The phenotype definition is malformed; fatal for that phenotype only.
    #[error("invalid phenotype definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    /// An ICD code had no OMOP mapping and unmapped codes abort resolution.
    #[error("ICD code '{code}' in {role} has no OMOP concept mapping")]
    UnmappedCode {
        /// Role the code was declared under.
        role: ConceptRole,
        /// The unmapped code.
        code: String,
    },

    /// An occurrence fact carried a negative or non-finite age.
    #[error("invalid occurrence: subject {subject}, concept {concept} has age {age}")]
    InvalidOccurrence {
        /// Subject of the fact.
        subject: SubjectId,
        /// Concept of the fact.
        concept: ConceptId,
        /// The rejected age.
        age: f64,
    },
}

/// Result type for cohort operations.
pub type CohortResult<T> = std::result::Result<T, CohortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unmapped_code() {
        let err = CohortError::UnmappedCode {
            role: ConceptRole::CaseCondition,
            code: "E11.9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ICD code 'E11.9' in case.cond has no OMOP concept mapping"
        );
    }

    #[test]
    fn test_error_display_invalid_occurrence() {
        let err = CohortError::InvalidOccurrence {
            subject: 7,
            concept: 201826,
            age: -1.0,
        };
        assert_eq!(
            err.to_string(),
            "invalid occurrence: subject 7, concept 201826 has age -1"
        );
    }

    #[test]
    fn test_error_from_definition_error() {
        let err: CohortError = DefinitionError::MissingId.into();
        assert!(matches!(err, CohortError::InvalidDefinition(_)));
        assert_eq!(
            err.to_string(),
            "invalid phenotype definition: phenotype definition has no phenotype_id"
        );
    }
}
