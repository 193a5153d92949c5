//! Decoding of the SAM `MD` tag.
//!
//! The tag interleaves match-run lengths with mismatching reference bases and
//! `^`-prefixed deleted reference segments, e.g. `10A5^AC6`.

use crate::errors::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdToken {
    /// Run of bases identical between read and reference
    MatchRun(usize),
    /// Reference base at a position where the read differs
    Mismatch(u8),
    /// Reference bases deleted from the read; carried by a CIGAR `D` as well
    Deletion(usize),
}

/// Tokenizes an MD tag, left to right. An empty tag yields no tokens.
pub fn parse_md(md: &str) -> Result<Vec<MdToken>, ParseError> {
    Ok(tokenize(md)?.into_iter().map(|(_, token)| token).collect())
}

fn invalid_md(md: &str, offset: usize, reason: String) -> ParseError {
    ParseError::InvalidMdTag {
        md: md.to_string(),
        offset,
        reason,
    }
}

/// Tokens paired with the byte offset they start at.
fn tokenize(md: &str) -> Result<Vec<(usize, MdToken)>, ParseError> {
    let bytes = md.as_bytes();
    let invalid = |offset: usize, reason: String| invalid_md(md, offset, reason);

    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let run = md[start..i]
                .parse::<usize>()
                .map_err(|e| invalid(start, format!("bad match length: {}", e)))?;
            tokens.push((start, MdToken::MatchRun(run)));
        } else if c == b'^' {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            if i == start + 1 {
                return Err(invalid(start, "deletion without bases".to_string()));
            }
            tokens.push((start, MdToken::Deletion(i - start - 1)));
        } else if c.is_ascii_alphabetic() {
            tokens.push((i, MdToken::Mismatch(c)));
            i += 1;
        } else {
            return Err(invalid(i, format!("unexpected character '{}'", c as char)));
        }
    }
    Ok(tokens)
}

/// Read-relative mismatch offsets and the reference base at each, in parallel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdMismatches {
    /// Strictly ascending read-relative offsets
    pub positions: Vec<usize>,
    /// Reference base for each entry of `positions`
    pub bases: Vec<u8>,
}

impl MdMismatches {
    /// Decodes an MD tag into read-relative mismatch offsets. Fails if the
    /// offsets do not fit in `usize`.
    pub fn decode(md: &str) -> Result<Self, ParseError> {
        let mut mismatches = MdMismatches::default();
        let mut cursor: usize = 0;
        for (offset, token) in tokenize(md)? {
            let step = match token {
                MdToken::MatchRun(run) => run,
                MdToken::Mismatch(base) => {
                    mismatches.positions.push(cursor);
                    mismatches.bases.push(base);
                    1
                }
                // the read has no bases here, so the read cursor stays put
                MdToken::Deletion(_) => 0,
            };
            cursor = cursor
                .checked_add(step)
                .ok_or_else(|| invalid_md(md, offset, "read offset overflow".to_string()))?;
        }
        Ok(mismatches)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
