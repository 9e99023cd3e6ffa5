//! Matrix and per-ancestry count writers.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;
use tracing::info;

use pheno_cohort::{PhenotypeMatrix, Status};

use crate::loaders::Roster;

/// Cell value for subjects that are neither case nor control.
pub const MISSING_VALUE: &str = "NA";

/// Default minimum cell size for published counts.
pub const DEFAULT_MIN_CELL_COUNT: usize = 20;

/// Matrix cell for a status: `1` case, `0` control, `NA` otherwise.
pub fn status_cell(status: Option<Status>) -> &'static str {
    match status {
        Some(Status::Case) => "1",
        Some(Status::Control) => "0",
        Some(Status::Excluded) | None => MISSING_VALUE,
    }
}

// ============================================================================
// Output paths
// ============================================================================

/// Where a run writes its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Matrix TSV.
    pub matrix: PathBuf,
    /// Per-ancestry counts TSV.
    pub counts: PathBuf,
    /// Run manifest JSON, if written.
    pub manifest: Option<PathBuf>,
}

impl OutputPaths {
    /// Default paths next to the definitions file: `<stem>.tsv`,
    /// `<stem>_counts.tsv` and `<stem>_manifest.json`.
    ///
    /// A `.tsv` definitions file would be overwritten by `<stem>.tsv`, so the
    /// matrix becomes `<stem>_matrix.tsv` in that case.
    pub fn defaults_for(definitions: &Path) -> Self {
        let stem = definitions
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "phenotypes".to_string());

        let mut matrix = definitions.with_extension("tsv");
        if matrix == definitions {
            matrix = definitions.with_file_name(format!("{stem}_matrix.tsv"));
        }

        Self {
            matrix,
            counts: definitions.with_file_name(format!("{stem}_counts.tsv")),
            manifest: Some(definitions.with_file_name(format!("{stem}_manifest.json"))),
        }
    }
}

// ============================================================================
// Matrix
// ============================================================================

/// Writes the matrix as TSV: `person_id` then one column per phenotype.
///
/// Failed phenotypes are written as all `NA`.
pub fn write_matrix<W: Write>(matrix: &PhenotypeMatrix, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    let header: Vec<&str> = std::iter::once("person_id")
        .chain(matrix.columns().iter().map(|column| column.phenotype_id()))
        .collect();
    writer.write_record(&header).context("write matrix header")?;

    let mut row = Vec::with_capacity(header.len());
    for &subject in matrix.subjects() {
        row.clear();
        row.push(subject.to_string());
        row.extend(matrix.row(subject).map(|status| status_cell(status).to_string()));
        writer
            .write_record(&row)
            .with_context(|| format!("write matrix row for subject {subject}"))?;
    }

    writer.flush().context("flush matrix")?;
    Ok(())
}

/// Writes the matrix TSV to `path`.
pub fn write_matrix_file(matrix: &PhenotypeMatrix, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_matrix(matrix, BufWriter::new(file))
        .with_context(|| format!("write matrix: {}", path.display()))?;
    info!(
        path = %path.display(),
        subjects = matrix.subjects().len(),
        phenotypes = matrix.columns().len(),
        "wrote matrix"
    );
    Ok(())
}

// ============================================================================
// Counts
// ============================================================================

/// A count that may be suppressed below the minimum cell size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellCount {
    /// Published count.
    Exact(usize),
    /// Count below the threshold.
    Suppressed {
        /// Minimum cell size.
        threshold: usize,
    },
}

impl CellCount {
    /// Applies the minimum cell size to a raw count.
    pub fn new(count: usize, min_cell_count: usize) -> Self {
        if count < min_cell_count {
            Self::Suppressed {
                threshold: min_cell_count,
            }
        } else {
            Self::Exact(count)
        }
    }
}

impl fmt::Display for CellCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(count) => write!(f, "{count}"),
            Self::Suppressed { threshold } => write!(f, "<{threshold}"),
        }
    }
}

/// Case and control counts of one phenotype within one ancestry group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRow {
    /// Phenotype id.
    pub phenotype_id: String,
    /// Ancestry label.
    pub ancestry: String,
    /// Cases in this group.
    pub ncases: CellCount,
    /// Controls in this group.
    pub ncontrols: CellCount,
}

/// Per-ancestry case/control counts for every classified phenotype.
///
/// Rows follow phenotype order, then ancestry in lexical order. Only
/// ancestries with at least one case or control appear. Failed phenotypes
/// produce no rows.
pub fn ancestry_counts(
    matrix: &PhenotypeMatrix,
    roster: &Roster,
    min_cell_count: usize,
) -> Vec<CountRow> {
    let mut rows = Vec::new();

    for column in matrix.columns() {
        let Some(result) = column.result() else {
            continue;
        };

        let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for subject in result.cases().iter() {
            groups.entry(roster.ancestry(subject)).or_default().0 += 1;
        }
        for subject in result.controls().iter() {
            groups.entry(roster.ancestry(subject)).or_default().1 += 1;
        }

        rows.extend(groups.into_iter().map(|(ancestry, (cases, controls))| CountRow {
            phenotype_id: column.phenotype_id().to_string(),
            ancestry: ancestry.to_string(),
            ncases: CellCount::new(cases, min_cell_count),
            ncontrols: CellCount::new(controls, min_cell_count),
        }));
    }

    rows
}

/// Writes count rows as TSV with a header.
pub fn write_counts<W: Write>(rows: &[CountRow], writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);

    writer
        .write_record(["phenotype_id", "ancestry", "ncases", "ncontrols"])
        .context("write counts header")?;
    for row in rows {
        let ncases = row.ncases.to_string();
        let ncontrols = row.ncontrols.to_string();
        writer
            .write_record([
                row.phenotype_id.as_str(),
                row.ancestry.as_str(),
                ncases.as_str(),
                ncontrols.as_str(),
            ])
            .with_context(|| format!("write counts for {}", row.phenotype_id))?;
    }

    writer.flush().context("flush counts")?;
    Ok(())
}

/// Writes the counts TSV to `path`.
pub fn write_counts_file(rows: &[CountRow], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_counts(rows, BufWriter::new(file))
        .with_context(|| format!("write counts: {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "wrote counts");
    Ok(())
}
