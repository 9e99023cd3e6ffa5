//! Field parser for phenotype definition cells using nom.
//!
//! Definition sources (spreadsheet exports, JSONL records) carry concept
//! lists and ICD lists as comma-separated text and ages as free text. Blank
//! cells are treated as absent.

use nom::{
    bytes::complete::take_while,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res},
    multi::separated_list0,
    number::complete::double,
    IResult,
};

use crate::error::{ModelError, ModelResult};
use crate::{Age, ConceptId};

/// Trims a raw cell, returning `None` when it is absent or blank.
///
/// # Examples
///
/// ```rust
/// use pheno_model::normalize_cell;
///
/// assert_eq!(normalize_cell(Some("  100 ")), Some("100"));
/// assert_eq!(normalize_cell(Some("   ")), None);
/// assert_eq!(normalize_cell(None), None);
/// ```
pub fn normalize_cell(cell: Option<&str>) -> Option<&str> {
    let text = cell?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses a comma-separated list of OMOP concept IDs.
///
/// Whitespace around entries and empty entries are ignored. Every remaining
/// entry must be a non-negative integer.
///
/// # Examples
///
/// ```rust
/// use pheno_model::parse_concept_list;
///
/// assert_eq!(parse_concept_list("100, 200,,300").unwrap(), vec![100, 200, 300]);
/// assert!(parse_concept_list("").unwrap().is_empty());
/// assert!(parse_concept_list("100, E11").is_err());
/// ```
pub fn parse_concept_list(input: &str) -> ModelResult<Vec<ConceptId>> {
    list_entries(input)?
        .into_iter()
        .map(|entry| {
            concept_id(entry)
                .map(|(_, id)| id)
                .map_err(|_| ModelError::InvalidConceptId(entry.to_string()))
        })
        .collect()
}

/// Parses a comma-separated list of ICD9/10 codes.
///
/// Codes are kept verbatim apart from surrounding whitespace.
///
/// # Examples
///
/// ```rust
/// use pheno_model::parse_icd_list;
///
/// assert_eq!(parse_icd_list("A01, B02").unwrap(), vec!["A01", "B02"]);
/// ```
pub fn parse_icd_list(input: &str) -> ModelResult<Vec<String>> {
    Ok(list_entries(input)?
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Parses an age cell. Blank cells are unconstrained (`None`).
///
/// # Examples
///
/// ```rust
/// use pheno_model::parse_age;
///
/// assert_eq!(parse_age("30").unwrap(), Some(30.0));
/// assert_eq!(parse_age(" 17.5 ").unwrap(), Some(17.5));
/// assert_eq!(parse_age("").unwrap(), None);
/// assert!(parse_age("thirty").is_err());
/// ```
pub fn parse_age(input: &str) -> ModelResult<Option<Age>> {
    let Some(text) = normalize_cell(Some(input)) else {
        return Ok(None);
    };
    all_consuming(double)(text)
        .map(|(_, age)| Some(age))
        .map_err(|_: nom::Err<nom::error::Error<&str>>| ModelError::InvalidAge(text.to_string()))
}

// ============================================================================
// Grammar
// ============================================================================

/// Splits a cell into trimmed, non-empty entries.
fn list_entries(input: &str) -> ModelResult<Vec<&str>> {
    let Some(text) = normalize_cell(Some(input)) else {
        return Ok(Vec::new());
    };
    all_consuming(entries)(text)
        .map(|(_, parts)| parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>())
        .map_err(|_: nom::Err<nom::error::Error<&str>>| ModelError::InvalidList(text.to_string()))
}

fn entries(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list0(char(','), map(take_while(|c: char| c != ','), str::trim))(input)
}

fn concept_id(input: &str) -> IResult<&str, ConceptId> {
    all_consuming(map_res(digit1, str::parse::<ConceptId>))(input)
}
