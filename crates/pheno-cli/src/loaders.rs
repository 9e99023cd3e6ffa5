//! Tab-separated input loaders.
//!
//! Every input is a TSV file with a header row. Columns are looked up by
//! name, so extra columns are ignored and order does not matter.
//!
//! | Input        | Required columns                                               |
//! |--------------|----------------------------------------------------------------|
//! | demographics | `person_id sex_at_birth has_srwgs has_ehr_data ancestry_pred` |
//! | occurrences  | `person_id concept_id category age`                            |
//! | ICD map      | `icd_code concept_id`                                          |
//! | ancestors    | `category ancestor_concept_id descendant_concept_id`           |
//!
//! Phenotype definitions are read either as JSONL records or as a TSV export
//! of the definition sheet (see [`DefinitionFormat`]).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use pheno_cohort::{AncestorTable, IcdMappingTable, Occurrence, OccurrenceIndex, SubjectSet};
use pheno_model::{Category, ConceptId, PhenotypeDefinition, PhenotypeRecord, SubjectId};

/// Ancestry label used when a subject has none.
pub const UNKNOWN_ANCESTRY: &str = "NA";

const DEMOGRAPHICS_COLUMNS: [&str; 5] = [
    "person_id",
    "sex_at_birth",
    "has_srwgs",
    "has_ehr_data",
    "ancestry_pred",
];
const OCCURRENCE_COLUMNS: [&str; 4] = ["person_id", "concept_id", "category", "age"];
const ICD_MAP_COLUMNS: [&str; 2] = ["icd_code", "concept_id"];
const ANCESTOR_COLUMNS: [&str; 3] = ["category", "ancestor_concept_id", "descendant_concept_id"];

// ============================================================================
// Roster
// ============================================================================

/// Eligible subjects and their predicted ancestry.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    subjects: SubjectSet,
    ancestry: HashMap<SubjectId, String>,
    rejected: usize,
}

impl Roster {
    /// Eligible subjects.
    pub fn subjects(&self) -> &SubjectSet {
        &self.subjects
    }

    /// Ancestry of a subject, [`UNKNOWN_ANCESTRY`] if none was recorded.
    pub fn ancestry(&self, subject: SubjectId) -> &str {
        self.ancestry
            .get(&subject)
            .map_or(UNKNOWN_ANCESTRY, String::as_str)
    }

    /// Number of eligible subjects.
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Returns true if no subject is eligible.
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Number of demographics rows that failed eligibility.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

/// Demographics row eligibility: recorded sex at birth, short-read WGS,
/// EHR data and an ancestry prediction.
pub fn is_eligible(sex_at_birth: &str, has_srwgs: &str, has_ehr_data: &str, ancestry: &str) -> bool {
    matches!(sex_at_birth, "Male" | "Female")
        && is_flag_set(has_srwgs)
        && is_flag_set(has_ehr_data)
        && !is_missing(ancestry)
}

fn is_flag_set(value: &str) -> bool {
    matches!(value, "1" | "1.0" | "true" | "TRUE" | "True")
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == UNKNOWN_ANCESTRY
}

/// Loads the roster from a demographics TSV, keeping eligible rows only.
pub fn load_roster(path: &Path) -> Result<Roster> {
    let mut table = TsvTable::open(path, &DEMOGRAPHICS_COLUMNS)?;
    let mut roster = Roster::default();

    while let Some(row) = table.next_row()? {
        let [person, sex, srwgs, ehr, ancestry] = row.fields(&DEMOGRAPHICS_COLUMNS);
        let subject: SubjectId = row.parse("person_id", person)?;
        if !is_eligible(sex, srwgs, ehr, ancestry) {
            roster.rejected += 1;
            continue;
        }
        roster.subjects.insert(subject);
        roster.ancestry.insert(subject, ancestry.to_string());
    }

    info!(
        path = %path.display(),
        eligible = roster.len(),
        rejected = roster.rejected,
        "loaded roster"
    );
    Ok(roster)
}

// ============================================================================
// Occurrences and vocabulary tables
// ============================================================================

/// Loads condition and procedure occurrences into an index.
pub fn load_occurrences(path: &Path) -> Result<OccurrenceIndex> {
    let mut table = TsvTable::open(path, &OCCURRENCE_COLUMNS)?;
    let mut occurrences = Vec::new();

    while let Some(row) = table.next_row()? {
        let [person, concept, category, age] = row.fields(&OCCURRENCE_COLUMNS);
        occurrences.push(Occurrence::new(
            row.parse("person_id", person)?,
            row.parse("concept_id", concept)?,
            row.category(category)?,
            row.parse("age", age)?,
        ));
    }

    let index = OccurrenceIndex::build(occurrences)
        .with_context(|| format!("index occurrences: {}", path.display()))?;
    info!(
        path = %path.display(),
        facts = index.fact_count(),
        subjects = index.subject_count(),
        concepts = index.concept_count(),
        "loaded occurrences"
    );
    Ok(index)
}

/// Loads an ICD9/10 → OMOP concept mapping.
pub fn load_icd_map(path: &Path) -> Result<IcdMappingTable> {
    let mut table = TsvTable::open(path, &ICD_MAP_COLUMNS)?;
    let mut mapping = IcdMappingTable::new();

    while let Some(row) = table.next_row()? {
        let [code, concept] = row.fields(&ICD_MAP_COLUMNS);
        if code.is_empty() {
            continue;
        }
        let concept: ConceptId = row.parse("concept_id", concept)?;
        mapping.insert(code, concept);
    }

    info!(path = %path.display(), codes = mapping.len(), "loaded ICD mapping");
    Ok(mapping)
}

/// Loads a `concept_ancestor`-style descendant table.
pub fn load_ancestors(path: &Path) -> Result<AncestorTable> {
    let mut table = TsvTable::open(path, &ANCESTOR_COLUMNS)?;
    let mut ancestors = AncestorTable::new();

    while let Some(row) = table.next_row()? {
        let [category, ancestor, descendant] = row.fields(&ANCESTOR_COLUMNS);
        ancestors.insert(
            row.category(category)?,
            row.parse("ancestor_concept_id", ancestor)?,
            row.parse("descendant_concept_id", descendant)?,
        );
    }

    info!(path = %path.display(), edges = ancestors.len(), "loaded concept ancestors");
    Ok(ancestors)
}

// ============================================================================
// Phenotype definitions
// ============================================================================

/// On-disk format of a definitions file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    /// One JSON record per line.
    Jsonl,
    /// Tab-separated export of the definition sheet.
    Tsv,
}

impl DefinitionFormat {
    /// Picks the format from the file extension; anything but `.tsv` and
    /// `.txt` is read as JSONL.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => {
                Self::Tsv
            }
            _ => Self::Jsonl,
        }
    }
}

/// Reads definition records in file order.
pub fn read_records(path: &Path) -> Result<Vec<PhenotypeRecord>> {
    let records = match DefinitionFormat::from_path(path) {
        DefinitionFormat::Jsonl => read_jsonl_records(path)?,
        DefinitionFormat::Tsv => read_tsv_records(path)?,
    };
    debug!(path = %path.display(), records = records.len(), "read definition records");
    Ok(records)
}

/// Loads phenotype definitions in file order.
///
/// Definitions are not validated here; invalid ones fail individually when
/// classified.
pub fn load_definitions(path: &Path) -> Result<Vec<PhenotypeDefinition>> {
    let definitions: Vec<PhenotypeDefinition> = read_records(path)?
        .into_iter()
        .map(PhenotypeDefinition::from)
        .collect();
    if definitions.is_empty() {
        bail!("no phenotypes found in {}", path.display());
    }
    info!(path = %path.display(), phenotypes = definitions.len(), "loaded definitions");
    Ok(definitions)
}

fn read_jsonl_records(path: &Path) -> Result<Vec<PhenotypeRecord>> {
    let file = File::open(path).with_context(|| format!("open definitions: {}", path.display()))?;
    let mut records = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read definitions: {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PhenotypeRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid phenotype record", path.display(), index + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn read_tsv_records(path: &Path) -> Result<Vec<PhenotypeRecord>> {
    let mut reader = tsv_reader(path)?;
    let headers = clean_headers(
        reader
            .headers()
            .with_context(|| format!("read headers: {}", path.display()))?,
    );

    let missing = PhenotypeRecord::missing_columns(headers.iter().map(String::as_str));
    if !missing.is_empty() {
        bail!(
            "{}: missing required columns: {}",
            path.display(),
            missing.join(", ")
        );
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("read record: {}", path.display()))?;
        let line = line_of(&row);
        let cell = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .and_then(|index| row.get(index))
        };
        if let Some(record) = PhenotypeRecord::from_cells(cell)
            .with_context(|| format!("{}:{}: invalid phenotype row", path.display(), line))?
        {
            records.push(record);
        }
    }
    Ok(records)
}

// ============================================================================
// TSV plumbing
// ============================================================================

fn tsv_reader(path: &Path) -> Result<csv::Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("read tsv: {}", path.display()))
}

fn clean_headers(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect()
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |position| position.line())
}

/// A TSV file with a fixed set of required columns.
struct TsvTable<'p> {
    path: &'p Path,
    reader: csv::Reader<File>,
    indices: Vec<usize>,
    record: StringRecord,
}

impl<'p> TsvTable<'p> {
    fn open(path: &'p Path, required: &[&str]) -> Result<Self> {
        let mut reader = tsv_reader(path)?;
        let headers = clean_headers(
            reader
                .headers()
                .with_context(|| format!("read headers: {}", path.display()))?,
        );

        let mut indices = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for column in required {
            match headers.iter().position(|header| header == column) {
                Some(index) => indices.push(index),
                None => missing.push(*column),
            }
        }
        if !missing.is_empty() {
            bail!(
                "{}: missing required columns: {}",
                path.display(),
                missing.join(", ")
            );
        }

        Ok(Self {
            path,
            reader,
            indices,
            record: StringRecord::new(),
        })
    }

    fn next_row(&mut self) -> Result<Option<Row<'_>>> {
        let path = self.path;
        let more = self
            .reader
            .read_record(&mut self.record)
            .with_context(|| format!("read record: {}", path.display()))?;
        if !more {
            return Ok(None);
        }
        Ok(Some(Row {
            path,
            indices: &self.indices,
            record: &self.record,
        }))
    }
}

struct Row<'r> {
    path: &'r Path,
    indices: &'r [usize],
    record: &'r StringRecord,
}

impl<'r> Row<'r> {
    /// Required column values in declaration order.
    fn fields<const N: usize>(&self, _columns: &[&str; N]) -> [&'r str; N] {
        std::array::from_fn(|i| {
            self.indices
                .get(i)
                .and_then(|&index| self.record.get(index))
                .unwrap_or_default()
        })
    }

    fn parse<T>(&self, column: &str, value: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        value.parse().map_err(|error| {
            anyhow!(
                "{}:{}: invalid {column} '{value}': {error}",
                self.path.display(),
                line_of(self.record)
            )
        })
    }

    fn category(&self, value: &str) -> Result<Category> {
        Category::from_label(value).ok_or_else(|| {
            anyhow!(
                "{}:{}: invalid category '{value}' (expected condition or procedure)",
                self.path.display(),
                line_of(self.record)
            )
        })
    }
}
