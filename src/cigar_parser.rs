use crate::errors::ParseError;
use std::fmt;

/// A single CIGAR operation with its run length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    /// `M`: aligned, base may match or mismatch
    AlignMatch(usize),
    /// `I`
    Insertion(usize),
    /// `D`
    Deletion(usize),
    /// `N`: reference skip, e.g. an intron
    Skip(usize),
    /// `S`
    SoftClip(usize),
    /// `H`
    HardClip(usize),
    /// `P`
    Padding(usize),
    /// `=`
    SeqMatch(usize),
    /// `X`
    SeqMismatch(usize),
}

impl CigarOp {
    pub fn from_code(code: char, len: usize) -> Option<Self> {
        let op = match code {
            'M' => CigarOp::AlignMatch(len),
            'I' => CigarOp::Insertion(len),
            'D' => CigarOp::Deletion(len),
            'N' => CigarOp::Skip(len),
            'S' => CigarOp::SoftClip(len),
            'H' => CigarOp::HardClip(len),
            'P' => CigarOp::Padding(len),
            '=' => CigarOp::SeqMatch(len),
            'X' => CigarOp::SeqMismatch(len),
            _ => return None,
        };
        Some(op)
    }

    pub fn code(&self) -> char {
        match self {
            CigarOp::AlignMatch(_) => 'M',
            CigarOp::Insertion(_) => 'I',
            CigarOp::Deletion(_) => 'D',
            CigarOp::Skip(_) => 'N',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
            CigarOp::Padding(_) => 'P',
            CigarOp::SeqMatch(_) => '=',
            CigarOp::SeqMismatch(_) => 'X',
        }
    }

    pub fn len(&self) -> usize {
        match *self {
            CigarOp::AlignMatch(len)
            | CigarOp::Insertion(len)
            | CigarOp::Deletion(len)
            | CigarOp::Skip(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len)
            | CigarOp::Padding(len)
            | CigarOp::SeqMatch(len)
            | CigarOp::SeqMismatch(len) => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for ops whose bases are present in the stored read sequence.
    pub fn consumes_read(&self) -> bool {
        matches!(
            self,
            CigarOp::AlignMatch(_)
                | CigarOp::Insertion(_)
                | CigarOp::SoftClip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    pub fn consumes_ref(&self) -> bool {
        matches!(
            self,
            CigarOp::AlignMatch(_)
                | CigarOp::Deletion(_)
                | CigarOp::Skip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len(), self.code())
    }
}

impl From<&rust_htslib::bam::record::Cigar> for CigarOp {
    fn from(op: &rust_htslib::bam::record::Cigar) -> Self {
        use rust_htslib::bam::record::Cigar;
        match *op {
            Cigar::Match(len) => CigarOp::AlignMatch(len as usize),
            Cigar::Ins(len) => CigarOp::Insertion(len as usize),
            Cigar::Del(len) => CigarOp::Deletion(len as usize),
            Cigar::RefSkip(len) => CigarOp::Skip(len as usize),
            Cigar::SoftClip(len) => CigarOp::SoftClip(len as usize),
            Cigar::HardClip(len) => CigarOp::HardClip(len as usize),
            Cigar::Pad(len) => CigarOp::Padding(len as usize),
            Cigar::Equal(len) => CigarOp::SeqMatch(len as usize),
            Cigar::Diff(len) => CigarOp::SeqMismatch(len as usize),
        }
    }
}

/// Longest single operation the BAM encoding can hold (28 bits).
pub const MAX_OP_LEN: usize = (1 << 28) - 1;

/// Splits a CIGAR string into its operations. An empty string yields no ops.
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, ParseError> {
    let invalid = |reason: String| ParseError::InvalidCigar {
        cigar: cigar.to_string(),
        reason,
    };

    let mut ops = Vec::new();
    let mut num = String::new();

    for c in cigar.chars() {
        if c.is_ascii_digit() {
            num.push(c);
        } else {
            if num.is_empty() {
                return Err(invalid(format!("operation '{}' has no length", c)));
            }
            let count = num
                .parse::<usize>()
                .map_err(|e| invalid(format!("bad length '{}': {}", num, e)))?;
            if count > MAX_OP_LEN {
                return Err(invalid(format!(
                    "operation length {} exceeds {}",
                    count, MAX_OP_LEN
                )));
            }
            let op = CigarOp::from_code(c, count)
                .ok_or_else(|| invalid(format!("unknown operation '{}'", c)))?;
            ops.push(op);
            num.clear();
        }
    }
    if !num.is_empty() {
        return Err(invalid(format!("trailing length '{}' without operation", num)));
    }
    Ok(ops)
}

/// Number of read bases the CIGAR describes (excludes hard clips).
pub fn read_len(ops: &[CigarOp]) -> usize {
    ops.iter().filter(|op| op.consumes_read()).map(CigarOp::len).sum()
}

/// Number of reference bases the alignment spans.
pub fn ref_span(ops: &[CigarOp]) -> usize {
    ops.iter().filter(|op| op.consumes_ref()).map(CigarOp::len).sum()
}
