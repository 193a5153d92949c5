use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::PathBuf;

use mdcheck::pipeline::{run, RunConfig};

fn main() -> Result<()> {
    let matches = Command::new("mdcheck")
        .version("0.1.0")
        .about("Reconstructs read/reference mismatches from CIGAR strings and MD tags")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("INPUT")
                .help("SAM/BAM/CRAM file, or TSV of seq, md, cigar[, qual[, ref]] lines")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("reference")
                .short('r')
                .long("reference")
                .value_name("FASTA")
                .help("Reference FASTA for the direct comparison of SAM/BAM/CRAM records")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT")
                .help("Report path (default: stdout)")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("Reconstruction mode: auto, md, md-lazy, direct")
                .takes_value(true)
                .default_value("auto"),
        )
        .arg(
            Arg::new("error-mode")
                .short('e')
                .long("error-mode")
                .value_name("MODE")
                .help("Per-record error handling: skip, abort")
                .takes_value(true)
                .default_value("skip"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Number of worker threads")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase logging verbosity (repeatable)")
                .multiple_occurrences(true),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = RunConfig {
        input: PathBuf::from(matches.value_of("input").context("Missing input path")?),
        reference: matches.value_of("reference").map(PathBuf::from),
        output: matches.value_of("output").map(PathBuf::from),
        mode: matches.value_of("mode").unwrap_or("auto").parse()?,
        error_mode: matches.value_of("error-mode").unwrap_or("skip").parse()?,
        threads: matches
            .value_of("threads")
            .unwrap_or("1")
            .parse()
            .context("Failed to parse thread count")?,
    };

    let summary = run(&config).context("Failed to reconstruct mismatches")?;

    if summary.error_count() > 0 {
        eprintln!(
            "Completed with {} failed records out of {}",
            summary.error_count(),
            summary.records + summary.error_count()
        );
        std::process::exit(1);
    }
    Ok(())
}
