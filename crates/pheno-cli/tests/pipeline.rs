//! End-to-end tests for the classification pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pheno_cli::loaders::load_definitions;
use pheno_cli::manifest::RunManifest;
use pheno_cli::pipeline::{convert_definitions, run_classify, ClassifyOptions};
use pheno_cohort::{CohortError, EngineConfig, Status, UnmappedCodePolicy};
use pheno_model::REQUIRED_COLUMNS;
use tempfile::{tempdir, TempDir};

const DEMOGRAPHICS: &str = "\
person_id\tsex_at_birth\thas_srwgs\thas_ehr_data\tancestry_pred
1\tMale\t1\t1\teur
2\tFemale\t1\t1\teur
3\tMale\t1\t1\tafr
4\tFemale\t1\t1\tafr
5\tMale\t1\t1\teur
6\tUnknown\t1\t1\teur
";

const OCCURRENCES: &str = "\
person_id\tconcept_id\tcategory\tage
1\t201826\tcondition\t52
2\t201826\tcondition\t9
3\t4000\tprocedure\t40
5\t300\tcondition\t60
6\t201826\tcondition\t45
";

const ICD_MAP: &str = "icd_code\tconcept_id\nE11\t201826\n";

const ANCESTORS: &str = "\
category\tancestor_concept_id\tdescendant_concept_id
condition\t201826\t300
";

const DEFINITIONS: &str = r#"{"phenotype_id":"T2D","phenotype_name":"Type 2 diabetes","case.cond":[201826],"case.min.age":18}
{"phenotype_id":"ICDP","phenotype_name":"Diabetes by ICD","case.cond.icd":"E11, Z99"}
{"phenotype_id":"BAD","phenotype_name":"Inverted ages","case.cond":[201826],"case.min.age":50,"case.max.age":10}
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        for (name, content) in [
            ("demographics.tsv", DEMOGRAPHICS),
            ("occurrences.tsv", OCCURRENCES),
            ("icd_map.tsv", ICD_MAP),
            ("ancestors.tsv", ANCESTORS),
            ("phenos.jsonl", DEFINITIONS),
        ] {
            fs::write(dir.path().join(name), content).unwrap();
        }
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn options(&self, definitions: &str) -> ClassifyOptions {
        ClassifyOptions::new(
            self.path(definitions),
            self.path("demographics.tsv"),
            self.path("occurrences.tsv"),
        )
        .with_icd_map(Some(self.path("icd_map.tsv")))
        .with_ancestors(Some(self.path("ancestors.tsv")))
        .with_min_cell_count(2)
    }
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_classify_writes_matrix() {
    let fixture = Fixture::new();
    let outcome = run_classify(&fixture.options("phenos.jsonl")).unwrap();

    assert_eq!(outcome.outputs.matrix, fixture.path("phenos.tsv"));
    assert_eq!(
        lines(&outcome.outputs.matrix),
        vec![
            "person_id\tT2D\tICDP\tBAD",
            "1\t1\t1\tNA",
            "2\tNA\t1\tNA",
            "3\t0\t0\tNA",
            "4\t0\t0\tNA",
            "5\t1\t1\tNA",
        ]
    );
}

#[test]
fn test_ineligible_subjects_are_not_rows() {
    let fixture = Fixture::new();
    let outcome = run_classify(&fixture.options("phenos.jsonl")).unwrap();

    assert_eq!(outcome.matrix.subjects(), &[1, 2, 3, 4, 5]);
    assert_eq!(outcome.matrix.status(6, "T2D"), None);
    assert_eq!(outcome.matrix.status(1, "T2D"), Some(Status::Case));
}

#[test]
fn test_failed_phenotype_is_isolated() {
    let fixture = Fixture::new();
    let outcome = run_classify(&fixture.options("phenos.jsonl")).unwrap();

    assert!(outcome.has_failures());
    assert_eq!(outcome.matrix.succeeded(), 2);
    let failures: Vec<(&str, &CohortError)> = outcome.matrix.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "BAD");
    assert!(matches!(failures[0].1, CohortError::InvalidDefinition(_)));
}

#[test]
fn test_counts_by_ancestry() {
    let fixture = Fixture::new();
    let outcome = run_classify(&fixture.options("phenos.jsonl")).unwrap();

    assert_eq!(outcome.outputs.counts, fixture.path("phenos_counts.tsv"));
    assert_eq!(
        lines(&outcome.outputs.counts),
        vec![
            "phenotype_id\tancestry\tncases\tncontrols",
            "T2D\tafr\t<2\t2",
            "T2D\teur\t2\t<2",
            "ICDP\tafr\t<2\t2",
            "ICDP\teur\t3\t<2",
        ]
    );
}

#[test]
fn test_manifest_records_every_phenotype() {
    let fixture = Fixture::new();
    let outcome = run_classify(&fixture.options("phenos.jsonl")).unwrap();

    let path = outcome.outputs.manifest.clone().unwrap();
    assert_eq!(path, fixture.path("phenos_manifest.json"));
    let manifest = RunManifest::load(&path).unwrap();

    assert_eq!(manifest.roster_size, 5);
    assert_eq!(manifest.inputs.len(), 5);
    assert_eq!(manifest.phenotypes.len(), 3);
    assert_eq!(manifest.failed_count(), 1);

    let t2d = manifest.get_entry("T2D").unwrap();
    let counts = t2d.counts.unwrap();
    assert_eq!((counts.universe, counts.cases, counts.controls, counts.excluded), (5, 2, 2, 1));

    let icd = manifest.get_entry("ICDP").unwrap();
    assert_eq!(icd.annotations, vec!["unmapped ICD codes in case.cond: Z99"]);

    let bad = manifest.get_entry("BAD").unwrap();
    assert!(bad.counts.is_none());
    assert!(bad.error.as_deref().unwrap().contains("invalid phenotype definition"));
}

#[test]
fn test_without_descendants() {
    let fixture = Fixture::new();
    let engine = EngineConfig::builder().with_descendant_expansion(false).build();
    let outcome = run_classify(&fixture.options("phenos.jsonl").with_engine(engine)).unwrap();

    assert_eq!(outcome.matrix.status(1, "T2D"), Some(Status::Case));
    assert_eq!(outcome.matrix.status(5, "T2D"), Some(Status::Control));
}

#[test]
fn test_abort_on_unmapped_codes() {
    let fixture = Fixture::new();
    let engine = EngineConfig::builder()
        .with_unmapped_codes(UnmappedCodePolicy::Abort)
        .build();
    let outcome = run_classify(&fixture.options("phenos.jsonl").with_engine(engine)).unwrap();

    let icd = outcome.matrix.column("ICDP").unwrap();
    assert!(matches!(icd.error(), Some(CohortError::UnmappedCode { .. })));
    assert!(outcome.matrix.column("T2D").unwrap().is_ok());
}

#[test]
fn test_explicit_output_paths_and_no_manifest() {
    let fixture = Fixture::new();
    let options = fixture
        .options("phenos.jsonl")
        .with_matrix_path(Some(fixture.path("out/matrix.tsv")))
        .with_counts_path(Some(fixture.path("counts.tsv")))
        .without_manifest();
    fs::create_dir_all(fixture.path("out")).unwrap();

    let outcome = run_classify(&options).unwrap();

    assert!(fixture.path("out/matrix.tsv").exists());
    assert!(fixture.path("counts.tsv").exists());
    assert!(outcome.outputs.manifest.is_none());
    assert!(!fixture.path("phenos_manifest.json").exists());
}

#[test]
fn test_missing_input_is_an_error() {
    let fixture = Fixture::new();
    let options = ClassifyOptions::new(
        fixture.path("phenos.jsonl"),
        fixture.path("missing.tsv"),
        fixture.path("occurrences.tsv"),
    );

    let error = format!("{:#}", run_classify(&options).unwrap_err());
    assert!(error.contains("missing.tsv"), "{error}");
}

fn definition_sheet() -> String {
    let mut columns: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    columns.push("case.cond.icd");

    let rows: [HashMap<&str, &str>; 3] = [
        HashMap::from([
            ("phenotype_id", "T2D"),
            ("phenotype_name", "Type 2 diabetes"),
            ("case.cond", "201826"),
            ("case.min.age", "18"),
        ]),
        HashMap::new(),
        HashMap::from([
            ("phenotype_id", "ICDP"),
            ("phenotype_name", "Diabetes by ICD"),
            ("case.cond.icd", "E11,Z99"),
        ]),
    ];

    let mut sheet = columns.join("\t");
    sheet.push('\n');
    for row in &rows {
        let cells: Vec<&str> = columns
            .iter()
            .map(|column| row.get(column).copied().unwrap_or(""))
            .collect();
        sheet.push_str(&cells.join("\t"));
        sheet.push('\n');
    }
    sheet
}

#[test]
fn test_convert_sheet_to_jsonl() {
    let fixture = Fixture::new();
    let sheet = fixture.path("sheet.tsv");
    fs::write(&sheet, definition_sheet()).unwrap();
    let output = fixture.path("sheet.jsonl");

    let written = convert_definitions(&sheet, &output).unwrap();
    assert_eq!(written, 2);

    let definitions = load_definitions(&output).unwrap();
    let ids: Vec<&str> = definitions.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec!["T2D", "ICDP"]);
}

#[test]
fn test_classify_from_tsv_sheet() {
    let fixture = Fixture::new();
    fs::write(fixture.path("sheet.tsv"), definition_sheet()).unwrap();

    let outcome = run_classify(&fixture.options("sheet.tsv")).unwrap();

    assert_eq!(outcome.outputs.matrix, fixture.path("sheet_matrix.tsv"));
    assert!(!outcome.has_failures());
    assert_eq!(outcome.matrix.status(2, "T2D"), Some(Status::Excluded));
    assert_eq!(outcome.matrix.status(2, "ICDP"), Some(Status::Case));
}
