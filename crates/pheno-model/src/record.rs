//! Flat phenotype records as exchanged with definition sources.
//!
//! A [`PhenotypeRecord`] mirrors one spreadsheet row or one JSONL line, keyed
//! by the dotted field names (`case.cond`, `case.cond.icd`, `case.min.age`,
//! ...). List fields accept either JSON arrays or comma-separated strings so
//! that both converted and hand-written records load.

use serde::{Deserialize, Deserializer, Serialize};

use crate::definition::{ConceptRole, PhenotypeDefinition};
use crate::error::{ModelError, ModelResult};
use crate::parser::{normalize_cell, parse_age, parse_concept_list, parse_icd_list};
use crate::{Age, ConceptId};

/// Columns every tabular definition source must provide.
pub const REQUIRED_COLUMNS: [&str; 14] = [
    "phenotype_id",
    "phenotype_name",
    "universe.cond",
    "universe.proc",
    "universe.excl.cond",
    "universe.excl.proc",
    "case.cond",
    "case.proc",
    "case.excl.cond",
    "case.excl.proc",
    "case.min.age",
    "case.max.age",
    "ctrl.excl.cond",
    "ctrl.excl.proc",
];

/// A phenotype definition in its flat exchange form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeRecord {
    /// Phenotype identifier.
    #[serde(deserialize_with = "text_or_number")]
    pub phenotype_id: String,
    /// Human-readable name.
    #[serde(default, deserialize_with = "text_or_number")]
    pub phenotype_name: String,

    /// `universe.cond`
    #[serde(rename = "universe.cond", default, deserialize_with = "concept_list")]
    pub universe_cond: Vec<ConceptId>,
    /// `universe.cond.icd`
    #[serde(rename = "universe.cond.icd", default, deserialize_with = "icd_list")]
    pub universe_cond_icd: Vec<String>,
    /// `universe.proc`
    #[serde(rename = "universe.proc", default, deserialize_with = "concept_list")]
    pub universe_proc: Vec<ConceptId>,
    /// `universe.excl.cond`
    #[serde(rename = "universe.excl.cond", default, deserialize_with = "concept_list")]
    pub universe_excl_cond: Vec<ConceptId>,
    /// `universe.excl.cond.icd`
    #[serde(rename = "universe.excl.cond.icd", default, deserialize_with = "icd_list")]
    pub universe_excl_cond_icd: Vec<String>,
    /// `universe.excl.proc`
    #[serde(rename = "universe.excl.proc", default, deserialize_with = "concept_list")]
    pub universe_excl_proc: Vec<ConceptId>,
    /// `universe.min.age`
    #[serde(rename = "universe.min.age", default, deserialize_with = "age")]
    pub universe_min_age: Option<Age>,
    /// `universe.max.age`
    #[serde(rename = "universe.max.age", default, deserialize_with = "age")]
    pub universe_max_age: Option<Age>,

    /// `case.cond`
    #[serde(rename = "case.cond", default, deserialize_with = "concept_list")]
    pub case_cond: Vec<ConceptId>,
    /// `case.cond.icd`
    #[serde(rename = "case.cond.icd", default, deserialize_with = "icd_list")]
    pub case_cond_icd: Vec<String>,
    /// `case.proc`
    #[serde(rename = "case.proc", default, deserialize_with = "concept_list")]
    pub case_proc: Vec<ConceptId>,
    /// `case.excl.cond`
    #[serde(rename = "case.excl.cond", default, deserialize_with = "concept_list")]
    pub case_excl_cond: Vec<ConceptId>,
    /// `case.excl.cond.icd`
    #[serde(rename = "case.excl.cond.icd", default, deserialize_with = "icd_list")]
    pub case_excl_cond_icd: Vec<String>,
    /// `case.excl.proc`
    #[serde(rename = "case.excl.proc", default, deserialize_with = "concept_list")]
    pub case_excl_proc: Vec<ConceptId>,
    /// `case.min.age`
    #[serde(rename = "case.min.age", default, deserialize_with = "age")]
    pub case_min_age: Option<Age>,
    /// `case.max.age`
    #[serde(rename = "case.max.age", default, deserialize_with = "age")]
    pub case_max_age: Option<Age>,

    /// `ctrl.excl.cond`
    #[serde(rename = "ctrl.excl.cond", default, deserialize_with = "concept_list")]
    pub ctrl_excl_cond: Vec<ConceptId>,
    /// `ctrl.excl.cond.icd`
    #[serde(rename = "ctrl.excl.cond.icd", default, deserialize_with = "icd_list")]
    pub ctrl_excl_cond_icd: Vec<String>,
    /// `ctrl.excl.proc`
    #[serde(rename = "ctrl.excl.proc", default, deserialize_with = "concept_list")]
    pub ctrl_excl_proc: Vec<ConceptId>,
}

impl PhenotypeRecord {
    /// Builds a record from a tabular row.
    ///
    /// `cell` returns the raw text of a column, or `None` if the column is
    /// absent. Returns `Ok(None)` for rows with neither an id nor a name.
    ///
    /// # Errors
    ///
    /// Fails on malformed concept lists or ages, and when exactly one of
    /// `phenotype_id` / `phenotype_name` is blank.
    pub fn from_cells<'a, F>(cell: F) -> ModelResult<Option<Self>>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let id = normalize_cell(cell("phenotype_id"));
        let name = normalize_cell(cell("phenotype_name"));
        let (id, name) = match (id, name) {
            (None, None) => return Ok(None),
            (None, Some(_)) => {
                return Err(ModelError::MissingField {
                    field: "phenotype_id".to_string(),
                })
            }
            (Some(id), None) => {
                return Err(ModelError::MissingField {
                    field: format!("phenotype_name for {id}"),
                })
            }
            (Some(id), Some(name)) => (id, name),
        };

        let concepts = |field: &str| parse_concept_list(cell(field).unwrap_or_default());
        let icd = |field: &str| parse_icd_list(cell(field).unwrap_or_default());
        let age = |field: &str| parse_age(cell(field).unwrap_or_default());

        Ok(Some(Self {
            phenotype_id: id.to_string(),
            phenotype_name: name.to_string(),
            universe_cond: concepts("universe.cond")?,
            universe_cond_icd: icd("universe.cond.icd")?,
            universe_proc: concepts("universe.proc")?,
            universe_excl_cond: concepts("universe.excl.cond")?,
            universe_excl_cond_icd: icd("universe.excl.cond.icd")?,
            universe_excl_proc: concepts("universe.excl.proc")?,
            universe_min_age: age("universe.min.age")?,
            universe_max_age: age("universe.max.age")?,
            case_cond: concepts("case.cond")?,
            case_cond_icd: icd("case.cond.icd")?,
            case_proc: concepts("case.proc")?,
            case_excl_cond: concepts("case.excl.cond")?,
            case_excl_cond_icd: icd("case.excl.cond.icd")?,
            case_excl_proc: concepts("case.excl.proc")?,
            case_min_age: age("case.min.age")?,
            case_max_age: age("case.max.age")?,
            ctrl_excl_cond: concepts("ctrl.excl.cond")?,
            ctrl_excl_cond_icd: icd("ctrl.excl.cond.icd")?,
            ctrl_excl_proc: concepts("ctrl.excl.proc")?,
        }))
    }

    /// Returns the required columns missing from a header row.
    pub fn missing_columns<'h, I>(headers: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let present: Vec<&str> = headers.into_iter().map(str::trim).collect();
        REQUIRED_COLUMNS
            .iter()
            .filter(|column| !present.contains(column))
            .map(|column| column.to_string())
            .collect()
    }

    /// Converts the record into an (unvalidated) definition.
    pub fn into_definition(self) -> PhenotypeDefinition {
        use ConceptRole::*;

        PhenotypeDefinition::builder(self.phenotype_id, self.phenotype_name)
            .concepts(UniverseCondition, self.universe_cond)
            .icd_codes(UniverseCondition, self.universe_cond_icd)
            .concepts(UniverseProcedure, self.universe_proc)
            .concepts(UniverseExclusionCondition, self.universe_excl_cond)
            .icd_codes(UniverseExclusionCondition, self.universe_excl_cond_icd)
            .concepts(UniverseExclusionProcedure, self.universe_excl_proc)
            .concepts(CaseCondition, self.case_cond)
            .icd_codes(CaseCondition, self.case_cond_icd)
            .concepts(CaseProcedure, self.case_proc)
            .concepts(CaseExclusionCondition, self.case_excl_cond)
            .icd_codes(CaseExclusionCondition, self.case_excl_cond_icd)
            .concepts(CaseExclusionProcedure, self.case_excl_proc)
            .concepts(ControlExclusionCondition, self.ctrl_excl_cond)
            .icd_codes(ControlExclusionCondition, self.ctrl_excl_cond_icd)
            .concepts(ControlExclusionProcedure, self.ctrl_excl_proc)
            .universe_age(self.universe_min_age, self.universe_max_age)
            .case_age(self.case_min_age, self.case_max_age)
            .build()
    }
}

impl From<PhenotypeRecord> for PhenotypeDefinition {
    fn from(record: PhenotypeRecord) -> Self {
        record.into_definition()
    }
}

// ============================================================================
// Lenient field deserializers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum ListField<T> {
    Items(Vec<T>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarField {
    Number(f64),
    Text(String),
}

fn concept_list<'de, D>(deserializer: D) -> Result<Vec<ConceptId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ListField<ConceptId>>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(ListField::Items(ids)) => Ok(ids),
        Some(ListField::Text(text)) => parse_concept_list(&text).map_err(serde::de::Error::custom),
    }
}

fn icd_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ListField<String>>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(ListField::Items(codes)) => Ok(codes
            .into_iter()
            .filter_map(|code| normalize_cell(Some(&code)).map(str::to_string))
            .collect()),
        Some(ListField::Text(text)) => parse_icd_list(&text).map_err(serde::de::Error::custom),
    }
}

fn age<'de, D>(deserializer: D) -> Result<Option<Age>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ScalarField>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ScalarField::Number(value)) => Ok(Some(value)),
        Some(ScalarField::Text(text)) => parse_age(&text).map_err(serde::de::Error::custom),
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ScalarField>::deserialize(deserializer)? {
        None => Ok(String::new()),
        Some(ScalarField::Number(value)) if value.fract() == 0.0 => Ok(format!("{value:.0}")),
        Some(ScalarField::Number(value)) => Ok(value.to_string()),
        Some(ScalarField::Text(text)) => Ok(text.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_deserialize_array_record() {
        let line = r#"{"phenotype_id":"ph1","phenotype_name":"Phenotype 1",
            "case.cond":[100,200],"case.cond.icd":["A01","B02"],
            "case.min.age":30,"case.max.age":40.0,"universe.cond":[]}"#;
        let record: PhenotypeRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.phenotype_id, "ph1");
        assert_eq!(record.case_cond, vec![100, 200]);
        assert_eq!(record.case_cond_icd, vec!["A01", "B02"]);
        assert_eq!(record.case_min_age, Some(30.0));
        assert_eq!(record.case_max_age, Some(40.0));
        assert!(record.universe_cond.is_empty());
        assert!(record.ctrl_excl_proc.is_empty());
    }

    #[test]
    fn test_deserialize_text_fields() {
        let line = r#"{"phenotype_id":12,"phenotype_name":"Numeric id",
            "case.cond":"100, 200","case.cond.icd":"A01, B02",
            "case.min.age":"18","case.max.age":null,"ctrl.excl.proc":""}"#;
        let record: PhenotypeRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.phenotype_id, "12");
        assert_eq!(record.case_cond, vec![100, 200]);
        assert_eq!(record.case_cond_icd, vec!["A01", "B02"]);
        assert_eq!(record.case_min_age, Some(18.0));
        assert_eq!(record.case_max_age, None);
        assert!(record.ctrl_excl_proc.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_bad_concept_text() {
        let line = r#"{"phenotype_id":"ph1","case.cond":"100, abc"}"#;
        let err = serde_json::from_str::<PhenotypeRecord>(line).unwrap_err();
        assert!(err.to_string().contains("Invalid concept id 'abc'"));
    }

    #[test]
    fn test_serialize_uses_dotted_names() {
        let record = PhenotypeRecord {
            phenotype_id: "ph1".into(),
            phenotype_name: "Test".into(),
            case_cond: vec![100],
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["case.cond"], serde_json::json!([100]));
        assert_eq!(json["case.min.age"], serde_json::Value::Null);
        assert_eq!(json["universe.cond.icd"], serde_json::json!([]));
    }

    #[test]
    fn test_from_cells_parses_row() {
        let row: HashMap<&str, &str> = [
            ("phenotype_id", "ph1"),
            ("phenotype_name", "Phenotype 1"),
            ("universe.cond", ""),
            ("case.cond", "100, 200"),
            ("case.cond.icd", "A01, B02"),
            ("case.min.age", "30"),
            ("case.max.age", "40"),
        ]
        .into_iter()
        .collect();

        let record = PhenotypeRecord::from_cells(|field| row.get(field).copied())
            .unwrap()
            .unwrap();

        assert_eq!(record.case_cond, vec![100, 200]);
        assert_eq!(record.case_cond_icd, vec!["A01", "B02"]);
        assert_eq!(record.case_min_age, Some(30.0));
        assert_eq!(record.case_max_age, Some(40.0));
        assert!(record.universe_cond.is_empty());
        assert!(record.universe_cond_icd.is_empty());
        assert!(record.case_proc.is_empty());
    }

    #[test]
    fn test_from_cells_skips_blank_rows() {
        let record = PhenotypeRecord::from_cells(|_| Some("  ")).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_from_cells_requires_name() {
        let err = PhenotypeRecord::from_cells(|field| match field {
            "phenotype_id" => Some("ph1"),
            _ => None,
        })
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField {
                field: "phenotype_name for ph1".to_string()
            }
        );
    }

    #[test]
    fn test_missing_columns_lists_all() {
        let missing = PhenotypeRecord::missing_columns(["phenotype_id", "phenotype_name"]);
        assert_eq!(missing.len(), 12);
        assert!(missing.contains(&"case.cond".to_string()));

        let none = PhenotypeRecord::missing_columns(REQUIRED_COLUMNS);
        assert!(none.is_empty());
    }

    #[test]
    fn test_into_definition_maps_roles() {
        let record = PhenotypeRecord {
            phenotype_id: "ph1".into(),
            phenotype_name: "Test".into(),
            universe_proc: vec![7],
            case_excl_cond_icd: vec!["Z99".into()],
            ctrl_excl_proc: vec![9],
            universe_min_age: Some(18.0),
            ..Default::default()
        };
        let definition = record.into_definition();

        assert_eq!(definition.concept_ids(ConceptRole::UniverseProcedure), &[7]);
        assert_eq!(
            definition.icd_codes(ConceptRole::CaseExclusionCondition),
            &["Z99".to_string()]
        );
        assert_eq!(
            definition.concept_ids(ConceptRole::ControlExclusionProcedure),
            &[9]
        );
        assert_eq!(definition.universe_age().min, Some(18.0));
        assert!(definition.validate().is_ok());
    }
}
