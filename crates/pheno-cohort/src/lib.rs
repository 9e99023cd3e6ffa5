//! # pheno-cohort
//!
//! Case/control cohort engine for OMOP phenotype definitions.
//!
//! Given a roster of subjects, an index of condition and procedure
//! occurrences, and declarative [`PhenotypeDefinition`](pheno_model::PhenotypeDefinition)s,
//! this crate computes the universe, case, and control sets of every phenotype
//! and assembles them into a subject × phenotype matrix.
//!
//! ## Key Features
//!
//! - **Concept resolution** - ICD codes mapped to OMOP concepts, optional
//!   descendant expansion with an LRU closure cache
//! - **Occurrence index** - earliest age per (subject, concept), built once
//! - **Roaring subject sets** - every algorithm step is a bitmap set operation
//! - **Failure isolation** - a bad phenotype never stops the others
//! - **Optional parallelism** - enable the `parallel` feature to classify
//!   phenotypes with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use pheno_cohort::{
//!     CohortEngine, ConceptSetResolver, EngineConfig, MatrixBuilder, Occurrence,
//!     OccurrenceIndex, Status, SubjectSet,
//! };
//! use pheno_model::{Category, ConceptRole, PhenotypeDefinition};
//!
//! let index = OccurrenceIndex::build([
//!     Occurrence::new(1, 201826, Category::Condition, 52.0),
//!     Occurrence::new(2, 201826, Category::Condition, 9.0),
//! ])
//! .unwrap();
//!
//! let config = EngineConfig::default();
//! let resolver = ConceptSetResolver::new(&config);
//! let engine = CohortEngine::new(&index, &resolver);
//!
//! let t2d = PhenotypeDefinition::builder("T2D", "Type 2 diabetes")
//!     .concepts(ConceptRole::CaseCondition, [201826])
//!     .case_age(Some(18.0), None)
//!     .build();
//! let roster: SubjectSet = [1, 2, 3].into_iter().collect();
//!
//! let matrix = MatrixBuilder::new(engine)
//!     .with_parallel(config.parallel)
//!     .build(&[t2d], &roster);
//!
//! assert_eq!(matrix.status(1, "T2D"), Some(Status::Case));
//! assert_eq!(matrix.status(2, "T2D"), Some(Status::Excluded));
//! assert_eq!(matrix.status(3, "T2D"), Some(Status::Control));
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` - Enables parallel phenotype classification using rayon
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        pheno-cohort                          │
//! │                                                              │
//! │  MatrixBuilder                                               │
//! │  └── CohortEngine (one phenotype at a time)                  │
//! │      ├── ConceptSetResolver                                  │
//! │      │   ├── IcdMapping        (ICD9/10 → OMOP)              │
//! │      │   ├── ConceptHierarchy  (descendant closure, BFS)     │
//! │      │   └── ClosureCache      (LRU)                         │
//! │      └── OccurrenceIndex       (earliest age per concept)    │
//! │                                                              │
//! │  SubjectSet (roaring) carries every intermediate set         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod config;
mod engine;
mod error;
mod index;
mod matrix;
mod resolver;
mod result;
mod subjects;
mod traits;
mod traverser;

// Public re-exports
pub use cache::{CacheStats, ClosureCache};
pub use config::{CacheConfig, EngineConfig, EngineConfigBuilder, UnmappedCodePolicy};
pub use engine::CohortEngine;
pub use error::{CohortError, CohortResult};
pub use index::{Occurrence, OccurrenceIndex};
pub use matrix::{MatrixBuilder, PhenotypeColumn, PhenotypeMatrix};
pub use resolver::{ConceptSetResolver, ResolvedConceptSet, ResolvedDefinition};
pub use result::{Annotation, ClassificationResult, ClassificationStats, CohortCounts, Status};
pub use subjects::SubjectSet;
pub use traits::{AncestorTable, ConceptHierarchy, IcdMapping, IcdMappingTable};
pub use traverser::HierarchyTraverser;
