//! Error types for CIGAR/MD decoding and mismatch reconstruction.

use thiserror::Error;

/// Errors raised while tokenizing a CIGAR string or an MD tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// CIGAR string does not follow the `(\d+[MIDNSHPX=])*` grammar
    #[error("Invalid CIGAR '{cigar}': {reason}")]
    InvalidCigar {
        /// The offending CIGAR string
        cigar: String,
        /// What went wrong
        reason: String,
    },

    /// MD tag contains content outside `(\d+)|(\^[A-Za-z]+)|([A-Za-z])`
    #[error("Invalid MD tag '{md}' at offset {offset}: {reason}")]
    InvalidMdTag {
        /// The offending MD tag
        md: String,
        /// Byte offset of the first unparsable character
        offset: usize,
        /// What went wrong
        reason: String,
    },
}

/// Errors raised while reconstructing the mismatches of a single read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MismatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The MD tag lists a different number of mismatches than the CIGAR can place
    #[error("Inconsistent alignment: MD tag has {expected} mismatches, CIGAR maps {found}")]
    InconsistentAlignment {
        /// Mismatches decoded from the MD tag
        expected: usize,
        /// Mismatches mapped onto aligned CIGAR positions
        found: usize,
    },

    /// A sequence is shorter than the CIGAR requires
    #[error("{sequence} sequence out of range: offset {offset}, length {len}")]
    SequenceOutOfRange {
        /// Which sequence was indexed ("read" or "reference")
        sequence: &'static str,
        /// The offset that was requested
        offset: usize,
        /// The actual sequence length
        len: usize,
    },

    /// Summed CIGAR lengths no longer fit in an offset
    #[error("Offset overflow at CIGAR operation {op}")]
    OffsetOverflow {
        /// The operation that overflowed, e.g. `1M`
        op: String,
    },

    /// An input required by the selected mode was not supplied
    #[error("Missing input: {what}")]
    MissingInput {
        /// Name of the missing input
        what: &'static str,
    },
}

impl MismatchError {
    /// Short, stable name used when tallying failures by kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MismatchError::Parse(ParseError::InvalidCigar { .. }) => "InvalidCigar",
            MismatchError::Parse(ParseError::InvalidMdTag { .. }) => "InvalidMdTag",
            MismatchError::InconsistentAlignment { .. } => "InconsistentAlignment",
            MismatchError::SequenceOutOfRange { .. } => "SequenceOutOfRange",
            MismatchError::OffsetOverflow { .. } => "OffsetOverflow",
            MismatchError::MissingInput { .. } => "MissingInput",
        }
    }
}
