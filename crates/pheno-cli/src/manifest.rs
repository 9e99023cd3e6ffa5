//! Run manifest: provenance and per-phenotype outcomes of one run.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pheno_cohort::{CohortCounts, EngineConfig, PhenotypeMatrix, UnmappedCodePolicy};

/// Provenance and outcome record written next to the matrix.
///
/// Every phenotype appears here, including failed ones with their error
/// message, so no per-phenotype failure is lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Version of the tool that produced the outputs.
    pub tool_version: String,
    /// Timestamp when the run finished.
    pub generated_at: DateTime<Utc>,
    /// Digests of every input file.
    pub inputs: Vec<InputDigest>,
    /// Engine and output settings.
    pub settings: RunSettings,
    /// Eligible roster size.
    pub roster_size: usize,
    /// Per-phenotype outcomes in definition order.
    pub phenotypes: Vec<PhenotypeEntry>,
}

/// SHA-256 digest of an input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDigest {
    /// What the file was used for (e.g. `occurrences`).
    pub role: String,
    /// Path as given on the command line.
    pub path: String,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Settings that influence the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Declared concepts were expanded with their descendants.
    pub expand_descendants: bool,
    /// Unmapped ICD codes aborted the phenotype instead of being skipped.
    pub abort_on_unmapped: bool,
    /// Phenotypes were classified in parallel.
    pub parallel: bool,
    /// Minimum published cell size of the counts file.
    pub min_cell_count: usize,
}

impl RunSettings {
    /// Captures the settings of an engine configuration.
    pub fn new(config: &EngineConfig, min_cell_count: usize) -> Self {
        Self {
            expand_descendants: config.expand_descendants,
            abort_on_unmapped: config.unmapped_codes == UnmappedCodePolicy::Abort,
            parallel: config.parallel,
            min_cell_count,
        }
    }
}

/// Outcome of one phenotype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenotypeEntry {
    /// Phenotype id.
    pub phenotype_id: String,
    /// Counts, absent for failed phenotypes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<CountsEntry>,
    /// Non-fatal observations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Unsuppressed subject counts of a phenotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsEntry {
    /// Universe size.
    pub universe: usize,
    /// Cases.
    pub cases: usize,
    /// Controls.
    pub controls: usize,
    /// Universe subjects that are neither.
    pub excluded: usize,
}

impl From<CohortCounts> for CountsEntry {
    fn from(counts: CohortCounts) -> Self {
        Self {
            universe: counts.universe,
            cases: counts.cases,
            controls: counts.controls,
            excluded: counts.excluded,
        }
    }
}

impl RunManifest {
    /// Creates a manifest with no inputs or phenotypes.
    pub fn new(settings: RunSettings, roster_size: usize) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            inputs: Vec::new(),
            settings,
            roster_size,
            phenotypes: Vec::new(),
        }
    }

    /// Hashes an input file and records it.
    pub fn add_input(&mut self, role: &str, path: &Path) -> Result<()> {
        let (sha256, size_bytes) =
            sha256_file(path).with_context(|| format!("hash input: {}", path.display()))?;
        self.inputs.push(InputDigest {
            role: role.to_string(),
            path: path.display().to_string(),
            sha256,
            size_bytes,
        });
        Ok(())
    }

    /// Records the outcome of every phenotype in the matrix.
    pub fn record_matrix(&mut self, matrix: &PhenotypeMatrix) {
        self.phenotypes
            .extend(matrix.columns().iter().map(|column| PhenotypeEntry {
                phenotype_id: column.phenotype_id().to_string(),
                counts: column.counts().map(CountsEntry::from),
                annotations: column
                    .result()
                    .map(|result| result.annotations().iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
                error: column.error().map(ToString::to_string),
            }));
    }

    /// Number of failed phenotypes.
    pub fn failed_count(&self) -> usize {
        self.phenotypes.iter().filter(|entry| entry.error.is_some()).count()
    }

    /// Finds a phenotype entry by id.
    pub fn get_entry(&self, phenotype_id: &str) -> Option<&PhenotypeEntry> {
        self.phenotypes
            .iter()
            .find(|entry| entry.phenotype_id == phenotype_id)
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("write manifest: {}", path.display()))
    }

    /// Loads a manifest from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("read manifest: {}", path.display()))
    }
}

impl fmt::Display for RunManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run Manifest")?;
        writeln!(f, "  Tool Version:  {}", self.tool_version)?;
        writeln!(f, "  Generated:     {}", self.generated_at)?;
        writeln!(f, "  Inputs:        {}", self.inputs.len())?;
        writeln!(f, "  Roster:        {}", self.roster_size)?;
        writeln!(f, "  Phenotypes:    {}", self.phenotypes.len())?;
        writeln!(f, "  Failed:        {}", self.failed_count())?;
        Ok(())
    }
}

/// Streams a file through SHA-256, returning the hex digest and byte count.
fn sha256_file(path: &Path) -> io::Result<(String, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let size = io::copy(&mut reader, &mut hasher)?;
    Ok((format!("{:x}", hasher.finalize()), size))
}
