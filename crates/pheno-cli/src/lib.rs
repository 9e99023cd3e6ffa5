//! # pheno-cli
//!
//! Library side of the `pheno-cc` binary: input loaders, output writers,
//! the run manifest and logging setup. The binary itself only parses
//! arguments and reports.
//!
//! ## Pipeline
//!
//! ```text
//! definitions (JSONL/TSV) ─┐
//! demographics TSV ────────┼─► roster + OccurrenceIndex ─► MatrixBuilder
//! occurrences TSV ─────────┤                                   │
//! ICD map / ancestors ─────┘                                   ▼
//!                                      matrix TSV, counts TSV, manifest JSON
//! ```

#![warn(missing_docs)]

pub mod loaders;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod pipeline;
