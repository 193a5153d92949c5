//! Translation of read-relative offsets into reference-relative offsets by
//! walking a CIGAR once, front to back.

use crate::cigar_parser::CigarOp;

/// A requested read offset and where it lands on the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefPos {
    pub read_pos: usize,
    pub ref_pos: usize,
    /// Index of this offset in the requested position list
    pub idx: usize,
}

/// Cursor state of a walk. Owned by a single walker; never shared between reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WalkerState {
    /// Index of the CIGAR op being walked
    op_idx: usize,
    /// Offsets of the current op below this one are already visited
    unit: usize,
    /// Read offset at the start of the current op
    read_pos: usize,
    /// Reference offset at the start of the current op
    ref_pos: usize,
    /// Next entry of the requested position list
    cursor: usize,
}

impl WalkerState {
    /// Moves past `op`. Returns false if either coordinate would overflow.
    fn finish_op(&mut self, op: &CigarOp) -> bool {
        let read_pos = if op.consumes_read() {
            self.read_pos.checked_add(op.len())
        } else {
            Some(self.read_pos)
        };
        let ref_pos = if op.consumes_ref() {
            self.ref_pos.checked_add(op.len())
        } else {
            Some(self.ref_pos)
        };
        match (read_pos, ref_pos) {
            (Some(read_pos), Some(ref_pos)) => {
                self.read_pos = read_pos;
                self.ref_pos = ref_pos;
                self.op_idx += 1;
                self.unit = 0;
                true
            }
            _ => false,
        }
    }
}

/// Lazily maps ascending read offsets onto the reference.
///
/// Offsets that fall inside soft clips or insertions are consumed without
/// producing an item. `positions` must be strictly ascending; the walk never
/// backtracks, so unsorted input silently loses offsets. A walk whose
/// coordinates no longer fit in `usize` ends early.
#[derive(Debug, Clone)]
pub struct RefPosWalker<'a> {
    ops: &'a [CigarOp],
    positions: &'a [usize],
    state: WalkerState,
}

impl<'a> RefPosWalker<'a> {
    pub fn new(ops: &'a [CigarOp], positions: &'a [usize]) -> Self {
        RefPosWalker {
            ops,
            positions,
            state: WalkerState::default(),
        }
    }

    fn stop(&mut self) {
        self.state.op_idx = self.ops.len();
    }
}

impl<'a> Iterator for RefPosWalker<'a> {
    type Item = RefPos;

    fn next(&mut self) -> Option<RefPos> {
        while let Some(&target) = self.positions.get(self.state.cursor) {
            let op = *self.ops.get(self.state.op_idx)?;
            let st = &mut self.state;
            if op.consumes_read() && target >= st.read_pos {
                let offset = target - st.read_pos;
                if offset >= st.unit && offset < op.len() {
                    st.unit = offset + 1;
                    st.cursor += 1;
                    if !op.consumes_ref() {
                        continue;
                    }
                    match st.ref_pos.checked_add(offset) {
                        Some(ref_pos) => {
                            return Some(RefPos {
                                read_pos: target,
                                ref_pos,
                                idx: st.cursor - 1,
                            })
                        }
                        None => {
                            self.stop();
                            return None;
                        }
                    }
                }
            }
            // target lies past this op (or behind the walk): D/N move the
            // reference only, H/P move nothing
            if !st.finish_op(&op) {
                self.stop();
                return None;
            }
        }
        None
    }
}

/// Starts a lazy walk over `ops` for the given ascending read offsets.
pub fn walk<'a>(ops: &'a [CigarOp], positions: &'a [usize]) -> RefPosWalker<'a> {
    RefPosWalker::new(ops, positions)
}

/// Eager form of [`walk`].
pub fn map_positions(ops: &[CigarOp], positions: &[usize]) -> Vec<RefPos> {
    walk(ops, positions).collect()
}
