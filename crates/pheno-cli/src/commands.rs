use anyhow::Result;
use pheno_cli::pipeline::{
    convert_definitions, default_jsonl_path, run_classify, ClassifyOptions, ClassifyOutcome,
};
use pheno_cohort::{CacheConfig, EngineConfig, UnmappedCodePolicy};

use crate::cli::{ClassifyArgs, ConvertArgs};

pub fn run_classify_command(args: &ClassifyArgs) -> Result<ClassifyOutcome> {
    let options = classify_options(args);
    run_classify(&options)
}

pub fn run_convert_command(args: &ConvertArgs) -> Result<usize> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_jsonl_path(&args.input));
    convert_definitions(&args.input, &output)
}

fn classify_options(args: &ClassifyArgs) -> ClassifyOptions {
    let mut engine = EngineConfig::builder()
        .with_parallel(args.parallel)
        .with_descendant_expansion(!args.no_descendants)
        .with_unmapped_codes(if args.abort_on_unmapped {
            UnmappedCodePolicy::Abort
        } else {
            UnmappedCodePolicy::Skip
        });
    engine = if args.cache_size == 0 {
        engine.without_cache()
    } else {
        engine.with_cache(CacheConfig {
            max_entries: args.cache_size,
        })
    };

    let options = ClassifyOptions::new(&args.phenotypes, &args.demographics, &args.occurrences)
        .with_icd_map(args.icd_map.clone())
        .with_ancestors(args.ancestors.clone())
        .with_matrix_path(args.output.clone())
        .with_counts_path(args.counts.clone())
        .with_manifest_path(args.manifest.clone())
        .with_min_cell_count(args.min_cell_count)
        .with_engine(engine.build());

    if args.no_manifest {
        options.without_manifest()
    } else {
        options
    }
}
