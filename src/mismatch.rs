//! Mismatch records and their reconstruction from an MD tag.

use crate::cigar_parser::{parse_cigar, CigarOp};
use crate::errors::MismatchError;
use crate::md_parser::MdMismatches;
use crate::walker::{walk, RefPos, RefPosWalker};
use std::fmt;

/// What kind of difference a [`MismatchRecord`] describes, with the fields
/// that only make sense for that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    Mismatch {
        /// Read base
        base: u8,
        /// Reference base, when known
        altbase: Option<u8>,
        qual: Option<u8>,
    },
    Insertion { len: usize },
    Deletion { len: usize },
    Skip { len: usize },
    SoftClip { len: usize },
    HardClip { len: usize },
}

impl MismatchKind {
    pub fn name(&self) -> &'static str {
        match self {
            MismatchKind::Mismatch { .. } => "mismatch",
            MismatchKind::Insertion { .. } => "insertion",
            MismatchKind::Deletion { .. } => "deletion",
            MismatchKind::Skip { .. } => "skip",
            MismatchKind::SoftClip { .. } => "softclip",
            MismatchKind::HardClip { .. } => "hardclip",
        }
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, MismatchKind::Mismatch { .. })
    }
}

/// One difference between a read and the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchRecord {
    /// 0-based offset from the alignment start on the reference
    pub start: usize,
    /// Reference bases covered; 0 for insertions
    pub length: usize,
    pub kind: MismatchKind,
}

impl MismatchRecord {
    /// Read-side symbol, or the descriptive code for non-substitution kinds.
    pub fn base(&self) -> String {
        match self.kind {
            MismatchKind::Mismatch { base, .. } => (base as char).to_string(),
            MismatchKind::Insertion { len } => len.to_string(),
            MismatchKind::Deletion { .. } => "*".to_string(),
            MismatchKind::Skip { .. } => "N".to_string(),
            MismatchKind::SoftClip { len } => format!("S{}", len),
            MismatchKind::HardClip { len } => format!("H{}", len),
        }
    }

    pub fn altbase(&self) -> Option<u8> {
        match self.kind {
            MismatchKind::Mismatch { altbase, .. } => altbase,
            _ => None,
        }
    }

    pub fn qual(&self) -> Option<u8> {
        match self.kind {
            MismatchKind::Mismatch { qual, .. } => qual,
            _ => None,
        }
    }
}

impl fmt::Display for MismatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.kind.name(), self.base())?;
        if let Some(alt) = self.altbase() {
            write!(f, ">{}", alt as char)?;
        }
        Ok(())
    }
}

fn assemble(
    pos: RefPos,
    bases: &[u8],
    seq: &[u8],
    qual: Option<&[u8]>,
) -> Result<MismatchRecord, MismatchError> {
    let base = *seq.get(pos.read_pos).ok_or(MismatchError::SequenceOutOfRange {
        sequence: "read",
        offset: pos.read_pos,
        len: seq.len(),
    })?;
    Ok(MismatchRecord {
        start: pos.ref_pos,
        length: 1,
        kind: MismatchKind::Mismatch {
            base,
            altbase: bases.get(pos.idx).copied(),
            qual: qual.and_then(|q| q.get(pos.read_pos).copied()),
        },
    })
}

impl MdMismatches {
    /// Lazily assembles mismatch records for these MD mismatches.
    ///
    /// If the CIGAR cannot place every MD mismatch on an aligned base, the
    /// last item is an [`MismatchError::InconsistentAlignment`].
    pub fn records<'a>(
        &'a self,
        ops: &'a [CigarOp],
        seq: &'a [u8],
        qual: Option<&'a [u8]>,
    ) -> MismatchIter<'a> {
        MismatchIter {
            walker: walk(ops, &self.positions),
            bases: &self.bases,
            seq,
            qual,
            mapped: 0,
            done: false,
        }
    }

    /// Eager form of [`MdMismatches::records`]: maps every position first,
    /// then builds the records.
    pub fn collect_records(
        &self,
        ops: &[CigarOp],
        seq: &[u8],
        qual: Option<&[u8]>,
    ) -> Result<Vec<MismatchRecord>, MismatchError> {
        let mapped: Vec<RefPos> = walk(ops, &self.positions).collect();
        if mapped.len() != self.len() {
            return Err(MismatchError::InconsistentAlignment {
                expected: self.len(),
                found: mapped.len(),
            });
        }
        mapped
            .into_iter()
            .map(|pos| assemble(pos, &self.bases, seq, qual))
            .collect()
    }
}

/// Lazy producer of MD-derived mismatch records.
#[derive(Debug, Clone)]
pub struct MismatchIter<'a> {
    walker: RefPosWalker<'a>,
    bases: &'a [u8],
    seq: &'a [u8],
    qual: Option<&'a [u8]>,
    mapped: usize,
    done: bool,
}

impl<'a> Iterator for MismatchIter<'a> {
    type Item = Result<MismatchRecord, MismatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.walker.next() {
            Some(pos) => {
                self.mapped += 1;
                Some(assemble(pos, self.bases, self.seq, self.qual))
            }
            None => {
                self.done = true;
                if self.mapped != self.bases.len() {
                    Some(Err(MismatchError::InconsistentAlignment {
                        expected: self.bases.len(),
                        found: self.mapped,
                    }))
                } else {
                    None
                }
            }
        }
    }
}

/// Reconstructs the substitutions of a read from its MD tag and CIGAR.
pub fn md_to_mismatches(
    md: &str,
    ops: &[CigarOp],
    seq: &[u8],
    qual: Option<&[u8]>,
) -> Result<Vec<MismatchRecord>, MismatchError> {
    MdMismatches::decode(md)?.collect_records(ops, seq, qual)
}

/// Same as [`md_to_mismatches`], driven by the lazy walker.
pub fn md_to_mismatches_lazy(
    md: &str,
    ops: &[CigarOp],
    seq: &[u8],
    qual: Option<&[u8]>,
) -> Result<Vec<MismatchRecord>, MismatchError> {
    let decoded = MdMismatches::decode(md)?;
    let records = decoded.records(ops, seq, qual).collect();
    records
}

/// Convenience entry point taking the CIGAR as a string.
pub fn md_cigar_to_mismatches(
    md: &str,
    cigar: &str,
    seq: &[u8],
    qual: Option<&[u8]>,
) -> Result<Vec<MismatchRecord>, MismatchError> {
    let ops = parse_cigar(cigar)?;
    md_to_mismatches(md, &ops, seq, qual)
}
