use crate::cigar_parser::CigarOp;
use crate::errors::MismatchError;
use crate::mismatch::{MismatchKind, MismatchRecord};

fn slice<'a>(
    seq: &'a [u8],
    sequence: &'static str,
    start: usize,
    len: usize,
) -> Result<&'a [u8], MismatchError> {
    start
        .checked_add(len)
        .and_then(|end| seq.get(start..end))
        .ok_or(MismatchError::SequenceOutOfRange {
            sequence,
            offset: start.saturating_add(len),
            len: seq.len(),
        })
}

/// Derives mismatch, indel, skip and clip records by walking the CIGAR against
/// the read and the reference directly, without an MD tag.
///
/// `reference` starts at the alignment start. `M`/`=` bases are compared
/// case-insensitively only when both `seq` and `reference` are given; `X`
/// bases are always reported as mismatches without comparing.
pub fn cigar_to_mismatches(
    ops: &[CigarOp],
    seq: Option<&[u8]>,
    reference: Option<&[u8]>,
    qual: Option<&[u8]>,
) -> Result<Vec<MismatchRecord>, MismatchError> {
    let mut r_idx: usize = 0;
    let mut s_idx: usize = 0;
    let mut records = Vec::new();
    let qual_at = |i: usize| qual.and_then(|q| q.get(i).copied());

    for op in ops {
        let len = op.len();
        // padding advances the reference here too
        let advances_ref = !matches!(
            op,
            CigarOp::Insertion(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_)
        );
        let next_s = if op.consumes_read() { s_idx.checked_add(len) } else { Some(s_idx) };
        let next_r = if advances_ref { r_idx.checked_add(len) } else { Some(r_idx) };
        let (next_s, next_r) = match (next_s, next_r) {
            (Some(s), Some(r)) => (s, r),
            _ => return Err(MismatchError::OffsetOverflow { op: op.to_string() }),
        };

        match op {
            CigarOp::AlignMatch(_) | CigarOp::SeqMatch(_) => {
                if let (Some(seq), Some(reference)) = (seq, reference) {
                    let s_slice = slice(seq, "read", s_idx, len)?;
                    let r_slice = slice(reference, "reference", r_idx, len)?;
                    for (i, (&s, &r)) in s_slice.iter().zip(r_slice).enumerate() {
                        if !s.eq_ignore_ascii_case(&r) {
                            records.push(MismatchRecord {
                                start: r_idx + i,
                                length: 1,
                                kind: MismatchKind::Mismatch {
                                    base: s,
                                    altbase: Some(r),
                                    qual: qual_at(s_idx + i),
                                },
                            });
                        }
                    }
                }
            }
            CigarOp::SeqMismatch(_) => {
                let s_slice = match seq {
                    Some(seq) => Some(slice(seq, "read", s_idx, len)?),
                    None => None,
                };
                for i in 0..len {
                    records.push(MismatchRecord {
                        start: r_idx + i,
                        length: 1,
                        kind: MismatchKind::Mismatch {
                            base: s_slice.map_or(b'X', |s| s[i]),
                            altbase: None,
                            qual: qual_at(s_idx + i),
                        },
                    });
                }
            }
            CigarOp::Insertion(_) => records.push(MismatchRecord {
                start: r_idx,
                length: 0,
                kind: MismatchKind::Insertion { len },
            }),
            CigarOp::Deletion(_) => records.push(MismatchRecord {
                start: r_idx,
                length: len,
                kind: MismatchKind::Deletion { len },
            }),
            CigarOp::Skip(_) => records.push(MismatchRecord {
                start: r_idx,
                length: len,
                kind: MismatchKind::Skip { len },
            }),
            CigarOp::SoftClip(_) => records.push(MismatchRecord {
                start: r_idx,
                length: 1,
                kind: MismatchKind::SoftClip { len },
            }),
            CigarOp::HardClip(_) => records.push(MismatchRecord {
                start: r_idx,
                length: 1,
                kind: MismatchKind::HardClip { len },
            }),
            CigarOp::Padding(_) => {}
        }

        s_idx = next_s;
        r_idx = next_r;
    }
    Ok(records)
}
