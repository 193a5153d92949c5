use crate::cigar_parser::{ref_span, CigarOp};
use crate::fasta_reader::ReferenceReader;
use anyhow::{Context, Result};
use rust_htslib::bam::{self, record::Aux, HeaderView, Read};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub type RecordIter = Box<dyn Iterator<Item = Result<AlignmentRecord>>>;

/// One aligned read with everything needed to reconstruct its mismatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub name: String,
    pub contig: Option<String>,
    /// 0-based alignment start; 0 for TSV input
    pub pos: u64,
    pub cigar: String,
    pub md: Option<String>,
    pub seq: Vec<u8>,
    /// Raw phred values, one per read base
    pub qual: Option<Vec<u8>>,
    /// Reference bases from the alignment start over the CIGAR's span
    pub reference: Option<Vec<u8>>,
}

fn optional_field<'a>(fields: &[&'a str], idx: usize) -> Option<&'a str> {
    fields
        .get(idx)
        .copied()
        .filter(|field| !field.is_empty() && *field != "*")
}

impl AlignmentRecord {
    /// Parses `seq<TAB>md<TAB>cigar[<TAB>qual[<TAB>ref]]`, with `*` for absent fields.
    pub fn from_line(line: &str, line_number: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            anyhow::bail!("TSV line does not have enough fields");
        }

        let qual = optional_field(&fields, 3).map(|qual| {
            qual.bytes()
                .map(|q| q.saturating_sub(33))
                .collect::<Vec<u8>>()
        });

        Ok(AlignmentRecord {
            name: line_number.to_string(),
            contig: None,
            pos: 0,
            cigar: fields[2].to_string(),
            md: optional_field(&fields, 1).map(str::to_string),
            seq: optional_field(&fields, 0)
                .map(|seq| seq.as_bytes().to_vec())
                .unwrap_or_default(),
            qual,
            reference: optional_field(&fields, 4).map(|r| r.as_bytes().to_vec()),
        })
    }

    pub fn from_bam(
        record: &bam::Record,
        header: &HeaderView,
        reference: Option<&ReferenceReader>,
    ) -> Result<Self> {
        let name = String::from_utf8_lossy(record.qname()).into_owned();
        let contig = u32::try_from(record.tid())
            .ok()
            .map(|tid| String::from_utf8_lossy(header.tid2name(tid)).into_owned());
        let pos = u64::try_from(record.pos())
            .with_context(|| format!("Negative alignment position for read {}", name))?;

        let ops: Vec<CigarOp> = record.cigar().iter().map(CigarOp::from).collect();
        let cigar: String = ops.iter().map(|op| op.to_string()).collect();

        let md = match record.aux(b"MD") {
            Ok(Aux::String(md)) => Some(md.to_string()),
            _ => None,
        };

        // 0xff in the first slot marks a record without qualities
        let qual = record.qual();
        let qual = match qual.first() {
            Some(&q) if q != 0xff => Some(qual.to_vec()),
            _ => None,
        };

        let span = ref_span(&ops) as u64;
        let reference = match (reference, &contig) {
            (Some(reader), Some(contig)) if span > 0 => Some(
                reader
                    .fetch(contig, pos, pos.saturating_add(span))
                    .with_context(|| format!("Failed to fetch reference for read {}", name))?,
            ),
            _ => None,
        };

        Ok(AlignmentRecord {
            name,
            contig,
            pos,
            cigar,
            md,
            seq: record.seq().as_bytes(),
            qual,
            reference,
        })
    }
}

pub fn tsv_records<P: AsRef<Path>>(path: P) -> Result<RecordIter> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open TSV file: {:?}", path.as_ref()))?;
    let reader = BufReader::new(file);

    Ok(Box::new(reader.lines().enumerate().filter_map(
        |(line_idx, line)| match line {
            Err(e) => Some(Err(anyhow::Error::new(e).context("Failed to read TSV line"))),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                AlignmentRecord::from_line(&line, line_idx + 1)
                    .with_context(|| format!("Failed to parse record at line {}", line_idx + 1)),
            ),
        },
    )))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| extensions.contains(&ext))
}

fn is_alignment_file(path: &Path) -> bool {
    has_extension(path, &["sam", "bam", "cram"])
}

/// Mapped records of a SAM/BAM/CRAM file; unmapped records are skipped.
///
/// With a reference FASTA, each record carries its reference bases, and a
/// CRAM file is decoded against that FASTA.
pub fn bam_records<P: AsRef<Path>>(path: P, reference: Option<&Path>) -> Result<RecordIter> {
    let path = path.as_ref();
    let mut reader = bam::Reader::from_path(path)
        .with_context(|| format!("Failed to open alignment file: {:?}", path))?;
    if let Some(fasta) = reference {
        if has_extension(path, &["cram"]) {
            reader
                .set_reference(fasta)
                .with_context(|| format!("Failed to set CRAM reference: {:?}", fasta))?;
        }
    }
    let reference = reference.map(ReferenceReader::new).transpose()?;
    let header = reader.header().clone();
    let mut record = bam::Record::new();

    Ok(Box::new(std::iter::from_fn(move || loop {
        match reader.read(&mut record)? {
            Err(e) => {
                return Some(Err(
                    anyhow::Error::new(e).context("Failed to read alignment record")
                ))
            }
            Ok(()) if record.is_unmapped() => continue,
            Ok(()) => {
                return Some(AlignmentRecord::from_bam(
                    &record,
                    &header,
                    reference.as_ref(),
                ))
            }
        }
    })))
}

/// Opens `path` as SAM/BAM/CRAM by extension, otherwise as TSV.
pub fn open_records(path: &Path, reference: Option<&Path>) -> Result<RecordIter> {
    if is_alignment_file(path) {
        bam_records(path, reference)
    } else {
        if reference.is_some() {
            log::warn!("Reference FASTA is ignored for TSV input; use the fifth column instead");
        }
        tsv_records(path)
    }
}
