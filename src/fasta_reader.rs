use anyhow::{Context, Result};
use rust_htslib::faidx;
use std::path::Path;

/// Indexed reference FASTA. The `.fai` index is built if it is missing.
pub struct ReferenceReader {
    reader: faidx::Reader,
}

impl ReferenceReader {
    pub fn new<P: AsRef<Path>>(fasta: P) -> Result<Self> {
        let reader = faidx::Reader::from_path(&fasta)
            .with_context(|| format!("Failed to open reference FASTA file: {:?}", fasta.as_ref()))?;
        Ok(ReferenceReader { reader })
    }

    /// Bases of `seq_name` over the 0-based half-open interval `[start, end)`.
    pub fn fetch(&self, seq_name: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let seq = self
            .reader
            .fetch_seq_string(seq_name, start as usize, end as usize - 1) // faidx end is inclusive
            .with_context(|| format!("Failed to fetch sequence: {}:{}-{}", seq_name, start, end))?;
        Ok(seq.into_bytes())
    }
}
