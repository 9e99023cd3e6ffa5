use pheno_cli::pipeline::ClassifyOutcome;

pub fn print_summary(outcome: &ClassifyOutcome) {
    let manifest = &outcome.manifest;
    println!(
        "{} phenotypes, {} eligible subjects ({:.2?})",
        manifest.phenotypes.len(),
        manifest.roster_size,
        outcome.elapsed
    );
    println!(
        "{:<24} {:>10} {:>10} {:>10} {:>10}",
        "phenotype", "universe", "cases", "controls", "excluded"
    );
    for entry in &manifest.phenotypes {
        match (&entry.counts, &entry.error) {
            (Some(counts), _) => println!(
                "{:<24} {:>10} {:>10} {:>10} {:>10}",
                entry.phenotype_id, counts.universe, counts.cases, counts.controls, counts.excluded
            ),
            (None, Some(error)) => println!("{:<24} FAILED: {error}", entry.phenotype_id),
            (None, None) => println!("{:<24} -", entry.phenotype_id),
        }
        for annotation in &entry.annotations {
            println!("{:<24}   note: {annotation}", "");
        }
    }

    println!("matrix:   {}", outcome.outputs.matrix.display());
    println!("counts:   {}", outcome.outputs.counts.display());
    if let Some(path) = &outcome.outputs.manifest {
        println!("manifest: {}", path.display());
    }
    let failed = manifest.failed_count();
    if failed > 0 {
        println!("{failed} phenotype(s) failed; their columns are NA");
    }
}
