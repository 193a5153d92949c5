use anyhow::Result;
use mdcheck::fasta_reader::ReferenceReader;
use mdcheck::pipeline::{run, ErrorMode, Mode, RunConfig};
use rust_htslib::bam::{self, Read};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn create_temp_file(suffix: &str, lines: &[&str]) -> Result<NamedTempFile> {
    let mut temp_file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    for line in lines {
        writeln!(temp_file, "{}", line)?;
    }
    temp_file.flush()?;
    Ok(temp_file)
}

fn create_temp_fasta(sequences: &[(&str, &str)]) -> Result<NamedTempFile> {
    let mut temp_file = tempfile::Builder::new().suffix(".fa").tempfile()?;
    for (name, seq) in sequences {
        writeln!(temp_file, ">{}", name)?;
        writeln!(temp_file, "{}", seq)?;
    }
    temp_file.flush()?;
    Ok(temp_file)
}

fn config(input: &Path, output: &Path, mode: Mode, error_mode: ErrorMode) -> RunConfig {
    RunConfig {
        input: input.to_path_buf(),
        reference: None,
        output: Some(output.to_path_buf()),
        mode,
        error_mode,
        threads: 2,
    }
}

fn report_lines(output: &Path) -> Result<Vec<String>> {
    Ok(std::fs::read_to_string(output)?
        .lines()
        .map(str::to_string)
        .collect())
}

const TSV_LINES: &[&str] = &[
    "CCCCCGCCCC\t5A4\t10M",
    "ACGT\t*\t4M",
    "",
    "ACGT\t2A1\t2S2M",
    "ACGT\t9A\t4M",
    "ACGT\t4",
];

#[test]
fn test_tsv_report_skips_failed_records() -> Result<()> {
    let input = create_temp_file(".tsv", TSV_LINES)?;
    let output = NamedTempFile::new()?;

    let summary = run(&config(input.path(), output.path(), Mode::Auto, ErrorMode::Skip))?;
    assert_eq!(summary.records, 3);
    assert_eq!(summary.mismatches, 3);
    assert_eq!(summary.errors.get("InconsistentAlignment"), Some(&1));
    assert_eq!(summary.errors.get("InvalidRecord"), Some(&1));
    assert_eq!(summary.error_count(), 2);

    let lines = report_lines(output.path())?;
    assert_eq!(
        lines,
        vec![
            "read\tstart\ttype\tbase\taltbase\tlength\tqual",
            "1\t5\tmismatch\tG\tA\t1\t.",
            "4\t0\tsoftclip\tS2\t.\t1\t.",
            "4\t0\tmismatch\tG\tA\t1\t.",
        ]
    );
    Ok(())
}

#[test]
fn test_tsv_abort_mode_fails() -> Result<()> {
    let input = create_temp_file(".tsv", &TSV_LINES[..2])?;
    let output = NamedTempFile::new()?;

    let result = run(&config(input.path(), output.path(), Mode::Md, ErrorMode::Abort));
    let err = result.expect_err("Expected the missing MD tag on line 2 to abort the run");
    assert!(
        format!("{:#}", err).contains("Missing input: MD tag"),
        "Unexpected error message: {:#}",
        err
    );
    Ok(())
}

#[test]
fn test_md_modes_produce_identical_reports() -> Result<()> {
    let input = create_temp_file(
        ".tsv",
        &[
            "AAGTCGTTACGT\t0G3T2^X0C3A0\t12M\t!!!!!!!!!!!!",
            "ACGTACGT\t1T2^GG0A3\t4M2D4M",
            "ACGTAACGTA\t2A4T2\t5M100N5M",
        ],
    )?;
    let eager_out = NamedTempFile::new()?;
    let lazy_out = NamedTempFile::new()?;

    let eager = run(&config(input.path(), eager_out.path(), Mode::Md, ErrorMode::Abort))?;
    let lazy = run(&config(input.path(), lazy_out.path(), Mode::MdLazy, ErrorMode::Abort))?;
    assert_eq!(eager, lazy);
    assert_eq!(eager.mismatches, 8);
    assert_eq!(report_lines(eager_out.path())?, report_lines(lazy_out.path())?);
    Ok(())
}

#[test]
fn test_direct_mode_on_tsv_reference_column() -> Result<()> {
    let input = create_temp_file(".tsv", &["ACGTTACGA\t*\t4M1I4M\tIIIIIIIII\tACCTACGT"])?;
    let output = NamedTempFile::new()?;

    let summary = run(&config(input.path(), output.path(), Mode::Direct, ErrorMode::Abort))?;
    assert_eq!(summary.records, 1);
    let lines = report_lines(output.path())?;
    assert_eq!(
        &lines[1..],
        &[
            "1\t2\tmismatch\tG\tC\t1\t40".to_string(),
            "1\t4\tinsertion\t1\t.\t0\t.".to_string(),
            "1\t7\tmismatch\tA\tT\t1\t40".to_string(),
        ]
    );
    Ok(())
}

const SAM_LINES: &[&str] = &[
    "@HD\tVN:1.6\tSO:unsorted",
    "@SQ\tSN:chr1\tLN:20",
    "r1\t0\tchr1\t3\t60\t6M\t*\t0\t0\tGTAAGT\tIIIIII\tMD:Z:3C2",
    "r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII",
    "r3\t0\tchr1\t5\t60\t2M1D2M\t*\t0\t0\tACTA\t*",
];

const SAM_REPORT: &[&str] = &[
    "r1\t5\tmismatch\tA\tC\t1\t40",
    "r3\t6\tdeletion\t*\t.\t1\t.",
];

/// Rewrites the SAM fixture as BAM or CRAM next to a reference FASTA.
fn convert_alignments(
    sam: &Path,
    format: bam::Format,
    suffix: &str,
    fasta: &Path,
) -> Result<NamedTempFile> {
    let converted = tempfile::Builder::new().suffix(suffix).tempfile()?;
    let mut reader = bam::Reader::from_path(sam)?;
    let header = bam::Header::from_template(reader.header());
    let mut writer = bam::Writer::from_path(converted.path(), &header, format)?;
    if matches!(format, bam::Format::Cram) {
        writer.set_reference(fasta)?;
    }
    for record in reader.records() {
        writer.write(&record?)?;
    }
    drop(writer);
    Ok(converted)
}

fn run_with_reference(input: &Path, fasta: &Path) -> Result<Vec<String>> {
    let output = NamedTempFile::new()?;
    let mut run_config = config(input, output.path(), Mode::Auto, ErrorMode::Abort);
    run_config.reference = Some(fasta.to_path_buf());
    let summary = run(&run_config)?;
    assert_eq!(summary.records, 2);
    assert_eq!(summary.error_count(), 0);
    Ok(report_lines(output.path())?[1..].to_vec())
}

#[test]
fn test_sam_input_with_reference() -> Result<()> {
    let reference = create_temp_fasta(&[("chr1", "ACGTACGTACGTACGTACGT")])?;
    let sam = create_temp_file(".sam", SAM_LINES)?;

    assert_eq!(run_with_reference(sam.path(), reference.path())?, SAM_REPORT);
    Ok(())
}

#[test]
fn test_bam_and_cram_inputs_match_sam() -> Result<()> {
    let reference = create_temp_fasta(&[("chr1", "ACGTACGTACGTACGTACGT")])?;
    // builds the .fai the CRAM codec looks up
    ReferenceReader::new(reference.path())?;
    let sam = create_temp_file(".sam", SAM_LINES)?;

    let bam = convert_alignments(sam.path(), bam::Format::Bam, ".bam", reference.path())?;
    assert_eq!(run_with_reference(bam.path(), reference.path())?, SAM_REPORT);

    let cram = convert_alignments(sam.path(), bam::Format::Cram, ".cram", reference.path())?;
    assert_eq!(run_with_reference(cram.path(), reference.path())?, SAM_REPORT);
    Ok(())
}

#[test]
fn test_unknown_extension_is_read_as_tsv() -> Result<()> {
    let input = create_temp_file(".sam.txt", &["ACGT\t1A2\t4M"])?;
    let output = NamedTempFile::new()?;

    let summary = run(&config(input.path(), output.path(), Mode::Md, ErrorMode::Abort))?;
    assert_eq!(summary.records, 1);
    assert_eq!(report_lines(output.path())?[1], "1\t1\tmismatch\tC\tA\t1\t.");
    Ok(())
}
