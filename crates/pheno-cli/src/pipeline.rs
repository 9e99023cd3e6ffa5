//! End-to-end runs: load inputs, classify, write outputs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use pheno_cohort::{
    CohortEngine, ConceptSetResolver, EngineConfig, MatrixBuilder, PhenotypeMatrix,
};

use crate::loaders::{
    load_ancestors, load_definitions, load_icd_map, load_occurrences, load_roster, read_records,
};
use crate::manifest::{RunManifest, RunSettings};
use crate::output::{
    ancestry_counts, write_counts_file, write_matrix_file, OutputPaths, DEFAULT_MIN_CELL_COUNT,
};

/// Inputs and settings of a classification run.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Phenotype definitions (JSONL or TSV).
    pub phenotypes: PathBuf,
    /// Demographics TSV.
    pub demographics: PathBuf,
    /// Occurrences TSV.
    pub occurrences: PathBuf,
    /// Optional ICD → OMOP mapping TSV.
    pub icd_map: Option<PathBuf>,
    /// Optional concept ancestor TSV.
    pub ancestors: Option<PathBuf>,
    /// Output locations.
    pub outputs: OutputPaths,
    /// Minimum published cell size.
    pub min_cell_count: usize,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl ClassifyOptions {
    /// Options with default output paths and engine settings.
    pub fn new(
        phenotypes: impl Into<PathBuf>,
        demographics: impl Into<PathBuf>,
        occurrences: impl Into<PathBuf>,
    ) -> Self {
        let phenotypes = phenotypes.into();
        let outputs = OutputPaths::defaults_for(&phenotypes);
        Self {
            phenotypes,
            demographics: demographics.into(),
            occurrences: occurrences.into(),
            icd_map: None,
            ancestors: None,
            outputs,
            min_cell_count: DEFAULT_MIN_CELL_COUNT,
            engine: EngineConfig::default(),
        }
    }

    /// Sets the ICD mapping file.
    #[must_use]
    pub fn with_icd_map(mut self, path: Option<PathBuf>) -> Self {
        self.icd_map = path;
        self
    }

    /// Sets the concept ancestor file.
    #[must_use]
    pub fn with_ancestors(mut self, path: Option<PathBuf>) -> Self {
        self.ancestors = path;
        self
    }

    /// Overrides the matrix path.
    #[must_use]
    pub fn with_matrix_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.outputs.matrix = path;
        }
        self
    }

    /// Overrides the counts path.
    #[must_use]
    pub fn with_counts_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.outputs.counts = path;
        }
        self
    }

    /// Overrides the manifest path.
    #[must_use]
    pub fn with_manifest_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.outputs.manifest = path;
        }
        self
    }

    /// Disables the manifest.
    #[must_use]
    pub fn without_manifest(mut self) -> Self {
        self.outputs.manifest = None;
        self
    }

    /// Sets the minimum published cell size.
    #[must_use]
    pub fn with_min_cell_count(mut self, min_cell_count: usize) -> Self {
        self.min_cell_count = min_cell_count;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// What a classification run produced.
#[derive(Debug)]
pub struct ClassifyOutcome {
    /// The matrix.
    pub matrix: PhenotypeMatrix,
    /// The manifest (also written to disk when a path was configured).
    pub manifest: RunManifest,
    /// Where outputs were written.
    pub outputs: OutputPaths,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl ClassifyOutcome {
    /// Returns true if any phenotype failed.
    pub fn has_failures(&self) -> bool {
        self.matrix.failures().next().is_some()
    }
}

/// Runs a full classification and writes matrix, counts and manifest.
///
/// Per-phenotype failures do not fail the run; they are logged, written as
/// `NA` columns and recorded in the manifest.
pub fn run_classify(options: &ClassifyOptions) -> Result<ClassifyOutcome> {
    let started = Instant::now();
    let _span = info_span!("classify", phenotypes = %options.phenotypes.display()).entered();

    let definitions = load_definitions(&options.phenotypes)?;
    let roster = load_roster(&options.demographics)?;
    if roster.is_empty() {
        warn!(path = %options.demographics.display(), "no eligible subjects in roster");
    }
    let index = load_occurrences(&options.occurrences)?;
    let icd_map = options.icd_map.as_deref().map(load_icd_map).transpose()?;
    let ancestors = options.ancestors.as_deref().map(load_ancestors).transpose()?;

    let mut resolver = ConceptSetResolver::new(&options.engine);
    if let Some(mapping) = &icd_map {
        resolver = resolver.with_icd_mapping(mapping);
    }
    if let Some(hierarchy) = &ancestors {
        resolver = resolver.with_hierarchy(hierarchy);
    }
    let engine = CohortEngine::new(&index, &resolver);

    let matrix = MatrixBuilder::new(engine)
        .with_parallel(options.engine.parallel)
        .build(&definitions, roster.subjects());
    info!(
        phenotypes = matrix.columns().len(),
        succeeded = matrix.succeeded(),
        cache = ?resolver.cache_stats(),
        "classification complete"
    );

    write_matrix_file(&matrix, &options.outputs.matrix)?;
    let counts = ancestry_counts(&matrix, &roster, options.min_cell_count);
    write_counts_file(&counts, &options.outputs.counts)?;

    let mut manifest = RunManifest::new(
        RunSettings::new(&options.engine, options.min_cell_count),
        roster.len(),
    );
    manifest.add_input("phenotypes", &options.phenotypes)?;
    manifest.add_input("demographics", &options.demographics)?;
    manifest.add_input("occurrences", &options.occurrences)?;
    if let Some(path) = &options.icd_map {
        manifest.add_input("icd_map", path)?;
    }
    if let Some(path) = &options.ancestors {
        manifest.add_input("ancestors", path)?;
    }
    manifest.record_matrix(&matrix);
    if let Some(path) = &options.outputs.manifest {
        manifest.save(path)?;
        info!(path = %path.display(), "wrote manifest");
    }

    Ok(ClassifyOutcome {
        matrix,
        manifest,
        outputs: options.outputs.clone(),
        elapsed: started.elapsed(),
    })
}

/// Default JSONL path for a converted definition sheet.
pub fn default_jsonl_path(input: &Path) -> PathBuf {
    input.with_extension("jsonl")
}

/// Converts a definitions file (typically the TSV sheet) to JSONL.
///
/// Returns the number of records written.
pub fn convert_definitions(input: &Path, output: &Path) -> Result<usize> {
    let records = read_records(input)?;

    let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    for record in &records {
        serde_json::to_writer(&mut writer, record)
            .with_context(|| format!("serialize phenotype {}", record.phenotype_id))?;
        writeln!(writer).with_context(|| format!("write {}", output.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        records = records.len(),
        "converted definitions"
    );
    Ok(records.len())
}
