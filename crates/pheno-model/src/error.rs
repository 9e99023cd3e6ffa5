//! Error types for phenotype definitions.

use thiserror::Error;

/// Errors that can occur while parsing definition fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A concept list contained a non-numeric entry.
    #[error("Invalid concept id '{0}'. Only numeric OMOP concept IDs are supported.")]
    InvalidConceptId(String),

    /// A list cell could not be split into entries.
    #[error("Invalid list value '{0}'")]
    InvalidList(String),

    /// An age cell could not be read as a number.
    #[error("Invalid age value '{0}'")]
    InvalidAge(String),

    /// A required field is missing or blank.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// A tabular definition source lacks required columns.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// A phenotype definition that is malformed or self-contradictory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    /// The phenotype has no identifier.
    #[error("phenotype definition has no phenotype_id")]
    MissingId,

    /// An age bound is negative or not finite.
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidAge {
        /// Field holding the bad bound (e.g. `case.min.age`).
        field: &'static str,
        /// The offending value.
        value: f64,
    },

    /// The minimum age bound exceeds the maximum.
    #[error("{scope}.min.age ({min}) is greater than {scope}.max.age ({max})")]
    InvertedAgeBounds {
        /// `universe` or `case`.
        scope: &'static str,
        /// Declared minimum.
        min: f64,
        /// Declared maximum.
        max: f64,
    },

    /// Another definition with the same identifier came first.
    #[error("duplicate phenotype_id '{0}'")]
    DuplicateId(String),

    /// ICD codes were attached to a role that has no ICD variant.
    #[error("{field} does not accept ICD codes")]
    IcdNotSupported {
        /// Field the codes were attached to.
        field: &'static str,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
