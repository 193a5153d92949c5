//! Per-read mode dispatch and batch processing of whole input files.

use crate::cigar_parser::{parse_cigar, read_len};
use crate::comparator::cigar_to_mismatches;
use crate::errors::MismatchError;
use crate::mismatch::{md_to_mismatches, md_to_mismatches_lazy, MismatchRecord};
use crate::record::{open_records, AlignmentRecord};
use anyhow::{Context, Result};
use log::{debug, info, log_enabled, warn, Level};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

const BATCH_SIZE: usize = 10_000;

/// How the mismatches of a read are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// MD mismatches plus CIGAR indels and clips; falls back to the direct comparison without MD
    Auto,
    /// MD tag only, eager walk
    Md,
    /// MD tag only, lazy walk
    MdLazy,
    /// Read against reference, no MD tag
    Direct,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Mode::Auto),
            "md" => Ok(Mode::Md),
            "md-lazy" => Ok(Mode::MdLazy),
            "direct" => Ok(Mode::Direct),
            _ => anyhow::bail!("Unknown mode: {} (expected auto, md, md-lazy or direct)", s),
        }
    }
}

/// What to do when a single record fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    Skip,
    Abort,
}

impl FromStr for ErrorMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(ErrorMode::Skip),
            "abort" => Ok(ErrorMode::Abort),
            _ => anyhow::bail!("Unknown error mode: {} (expected skip or abort)", s),
        }
    }
}

/// Reconstructs the mismatch records of one read.
pub fn compute_mismatches(
    record: &AlignmentRecord,
    mode: Mode,
) -> Result<Vec<MismatchRecord>, MismatchError> {
    let ops = parse_cigar(&record.cigar)?;
    let expected = read_len(&ops);
    if !record.seq.is_empty() && expected != record.seq.len() {
        debug!(
            "Record {}: CIGAR implies {} read bases, sequence has {}",
            record.name,
            expected,
            record.seq.len()
        );
    }
    let qual = record.qual.as_deref();
    let seq = (!record.seq.is_empty()).then_some(record.seq.as_slice());
    let md = record.md.as_deref();

    match mode {
        Mode::Md => md_to_mismatches(
            md.ok_or(MismatchError::MissingInput { what: "MD tag" })?,
            &ops,
            &record.seq,
            qual,
        ),
        Mode::MdLazy => md_to_mismatches_lazy(
            md.ok_or(MismatchError::MissingInput { what: "MD tag" })?,
            &ops,
            &record.seq,
            qual,
        ),
        Mode::Direct => {
            let reference = record
                .reference
                .as_deref()
                .ok_or(MismatchError::MissingInput { what: "reference sequence" })?;
            cigar_to_mismatches(&ops, seq, Some(reference), qual)
        }
        Mode::Auto => match md {
            Some(md) => {
                let mut records: Vec<MismatchRecord> = cigar_to_mismatches(&ops, seq, None, qual)?
                    .into_iter()
                    .filter(|r| !r.kind.is_mismatch())
                    .collect();
                records.extend(md_to_mismatches(md, &ops, &record.seq, qual)?);
                records.sort_by_key(|r| r.start);
                Ok(records)
            }
            None => cigar_to_mismatches(&ops, seq, record.reference.as_deref(), qual),
        },
    }
}

pub fn write_header<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "read\tstart\ttype\tbase\taltbase\tlength\tqual")
}

/// Writes one report line per mismatch; starts are shifted by the alignment start.
pub fn write_records<W: Write>(
    output: &mut W,
    record: &AlignmentRecord,
    mismatches: &[MismatchRecord],
) -> std::io::Result<()> {
    for mismatch in mismatches {
        let altbase = mismatch
            .altbase()
            .map_or_else(|| ".".to_string(), |b| (b as char).to_string());
        let qual = mismatch
            .qual()
            .map_or_else(|| ".".to_string(), |q| q.to_string());
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.name,
            record.pos.saturating_add(mismatch.start as u64),
            mismatch.kind.name(),
            mismatch.base(),
            altbase,
            mismatch.length,
            qual
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub reference: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub mode: Mode,
    pub error_mode: ErrorMode,
    pub threads: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records that produced a report
    pub records: usize,
    pub mismatches: usize,
    /// Failed records, keyed by error kind
    pub errors: HashMap<String, usize>,
}

impl RunSummary {
    pub fn error_count(&self) -> usize {
        self.errors.values().sum()
    }
}

fn process_batch<W: Write>(
    pool: &rayon::ThreadPool,
    batch: &[AlignmentRecord],
    config: &RunConfig,
    output: &mut W,
    summary: &mut RunSummary,
) -> Result<()> {
    let results: Vec<Result<Vec<MismatchRecord>, MismatchError>> = pool.install(|| {
        batch
            .par_iter()
            .map(|record| compute_mismatches(record, config.mode))
            .collect()
    });

    for (record, result) in batch.iter().zip(results) {
        match result {
            Ok(mismatches) => {
                if log_enabled!(Level::Debug) {
                    let rendered: Vec<String> = mismatches.iter().map(|m| m.to_string()).collect();
                    debug!("Record {}: {}", record.name, rendered.join(","));
                }
                write_records(output, record, &mismatches)?;
                summary.records += 1;
                summary.mismatches += mismatches.len();
            }
            Err(e) => {
                if config.error_mode == ErrorMode::Abort {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to process record {}", record.name)));
                }
                warn!("Error in record {}: {}", record.name, e);
                *summary.errors.entry(e.kind_name().to_string()).or_insert(0) += 1;
            }
        }
    }
    Ok(())
}

/// Reconstructs mismatches for every record of `config.input` and writes the report.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()
        .context("Failed to build thread pool")?;

    if let Some(path) = &config.reference {
        info!("Using reference FASTA: {:?}", path);
    }

    let sink: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut output = BufWriter::new(sink);
    write_header(&mut output)?;

    info!("Reading records from {:?} in {:?} mode", config.input, config.mode);
    let mut summary = RunSummary::default();
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    for record in open_records(&config.input, config.reference.as_deref())? {
        match record {
            Ok(record) => batch.push(record),
            Err(e) => {
                if config.error_mode == ErrorMode::Abort {
                    return Err(e);
                }
                warn!("{:#}", e);
                *summary.errors.entry("InvalidRecord".to_string()).or_insert(0) += 1;
            }
        }
        if batch.len() >= BATCH_SIZE {
            process_batch(&pool, &batch, config, &mut output, &mut summary)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        process_batch(&pool, &batch, config, &mut output, &mut summary)?;
    }
    output.flush().context("Failed to flush report")?;

    info!(
        "Processed {} records, {} mismatch records",
        summary.records, summary.mismatches
    );
    if summary.error_count() > 0 {
        warn!("Mismatch reconstruction completed with errors:");
        for (error_type, count) in summary.errors.iter() {
            warn!("  - {}: {} errors", error_type, count);
        }
        warn!("Total errors: {}", summary.error_count());
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tsv(line: &str) -> AlignmentRecord {
        AlignmentRecord::from_line(line, 1).unwrap()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("md-lazy".parse::<Mode>().unwrap(), Mode::MdLazy);
        assert!("generator".parse::<Mode>().is_err());
        assert_eq!("abort".parse::<ErrorMode>().unwrap(), ErrorMode::Abort);
    }

    #[test]
    fn test_auto_merges_structure_and_md() {
        let record = tsv("AACCGGTTAC\t3^GG1T3\t2S4M2D4M");
        let mismatches = compute_mismatches(&record, Mode::Auto).unwrap();
        let summary: Vec<(usize, &str)> =
            mismatches.iter().map(|r| (r.start, r.kind.name())).collect();
        assert_eq!(
            summary,
            vec![(0, "softclip"), (2, "mismatch"), (4, "deletion")]
        );
    }

    #[test]
    fn test_auto_without_md_uses_reference() {
        let record = tsv("ACGT\t*\t4M\t*\tACCT");
        let mismatches = compute_mismatches(&record, Mode::Auto).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].start, 2);
    }

    #[test]
    fn test_missing_inputs() {
        let record = tsv("ACGT\t*\t4M");
        assert_eq!(
            compute_mismatches(&record, Mode::Md),
            Err(MismatchError::MissingInput { what: "MD tag" })
        );
        assert_eq!(
            compute_mismatches(&record, Mode::Direct),
            Err(MismatchError::MissingInput { what: "reference sequence" })
        );
    }

    #[test]
    fn test_write_records() {
        let mut record = tsv("ACGT\t1A2\t4M");
        record.pos = 100;
        let mismatches = compute_mismatches(&record, Mode::Md).unwrap();
        let mut output = Vec::new();
        write_records(&mut output, &record, &mismatches).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "1\t101\tmismatch\tC\tA\t1\t.\n");
    }

    #[test]
    fn test_report_start_saturates() {
        let mut record = tsv("ACGT\t1A2\t4M");
        record.pos = u64::MAX;
        let mismatches = compute_mismatches(&record, Mode::Md).unwrap();
        let mut output = Vec::new();
        write_records(&mut output, &record, &mismatches).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with(&format!("1\t{}\t", u64::MAX)));
    }

    #[test]
    fn test_oversized_cigar_is_a_record_error() {
        let record = tsv("A\t*\t18446744073709551615M1M");
        let err = compute_mismatches(&record, Mode::Auto).unwrap_err();
        assert_eq!(err.kind_name(), "InvalidCigar");
    }
}
