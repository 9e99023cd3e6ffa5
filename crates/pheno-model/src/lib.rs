//! # pheno-model
//!
//! Phenotype definition model for OMOP-based case/control classification.
//!
//! This crate provides:
//! - **Identifiers**: [`ConceptId`] and [`SubjectId`] plus the [`Category`] of an occurrence
//! - **Definitions**: [`PhenotypeDefinition`] with its ten concept-list roles and two age windows
//! - **Field parser**: parse spreadsheet cells (concept lists, ICD lists, ages)
//!
//! ## Usage
//!
//! ```rust
//! use pheno_model::{parse_concept_list, ConceptRole, PhenotypeDefinition};
//!
//! let case_cond = parse_concept_list("201826, 443238").unwrap();
//!
//! let definition = PhenotypeDefinition::builder("T2D", "Type 2 diabetes")
//!     .concepts(ConceptRole::CaseCondition, case_cond)
//!     .icd_codes(ConceptRole::CaseCondition, ["E11"])
//!     .case_age(Some(18.0), None)
//!     .build();
//!
//! assert!(definition.validate().is_ok());
//! assert_eq!(definition.concept_ids(ConceptRole::CaseCondition), &[201826, 443238]);
//! ```
//!
//! ## Definition Fields
//!
//! | Field | Role | Empty means |
//! |-------|------|-------------|
//! | `universe.cond` / `universe.proc` | Universe inclusion | No inclusion filter |
//! | `universe.excl.cond` / `universe.excl.proc` | Universe exclusion | Nothing excluded |
//! | `case.cond` / `case.proc` | Case definition | No cases |
//! | `case.excl.cond` / `case.excl.proc` | Case exclusion | Nothing excluded |
//! | `ctrl.excl.cond` / `ctrl.excl.proc` | Control exclusion | Nothing excluded |
//!
//! Condition roles additionally accept a `.icd` list of ICD9/10 codes.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod definition;
mod error;
mod parser;
#[cfg(feature = "serde")]
mod record;

pub use definition::{
    AgeBounds, Category, ConceptRole, EmptySetPolicy, PhenotypeDefinition,
    PhenotypeDefinitionBuilder, RoleGroup,
};
pub use error::{DefinitionError, ModelError, ModelResult};
pub use parser::{normalize_cell, parse_age, parse_concept_list, parse_icd_list};
#[cfg(feature = "serde")]
pub use record::{PhenotypeRecord, REQUIRED_COLUMNS};

/// OMOP concept identifier.
///
/// Concept IDs are compared by equality only; no ordering semantics are implied.
pub type ConceptId = u64;

/// Subject identifier (OMOP `person_id`).
pub type SubjectId = u64;

/// Age in years at an occurrence.
pub type Age = f64;
