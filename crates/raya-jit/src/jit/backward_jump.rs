//! Backward-jump preemption bookkeeping (spec.md §4.5): every backward
//! branch the opcode visitors emit gets a watchdog-preemption thunk.

use crate::assembler::{Assembler, AssemblerError, LabelId};
use crate::jit::cipmap::CipMapBuilder;
use crate::runtime::LoopEdge;

/// Intermediate form recorded while compiling, before the loop-edge array
/// is finalized (§3 "Backward-jump record").
struct BackwardJumpRecord {
    branch_pc: u32,
    cip: u32,
}

/// Append-only list of backward-jump records, owned solely by the active
/// compile (§5).
#[derive(Default)]
pub struct BackwardJumpList {
    records: Vec<BackwardJumpRecord>,
}

impl BackwardJumpList {
    pub fn new() -> Self {
        BackwardJumpList::default()
    }

    /// Record a backward branch at `branch_pc` originating from `cip`.
    pub fn record(&mut self, branch_pc: u32, cip: u32) {
        self.records.push(BackwardJumpRecord { branch_pc, cip });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Emit one preemption thunk per record (§4.1 step 5): a call to the
    /// shared timeout path, then a cip-map entry at that site. Returns the
    /// finalized `LoopEdge` array — `edges[i] = { offset, disp32 }` where
    /// `disp32` is the displacement from the branch to its thunk (§4.1 step
    /// 9, §8 property 3).
    pub fn emit_thunks(
        &self,
        asm: &mut Assembler,
        timeout_thunk: LabelId,
        cip_map: &mut CipMapBuilder,
    ) -> Result<Vec<LoopEdge>, AssemblerError> {
        let mut edges = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let timeout_offset = asm.pc();
            asm.call(timeout_thunk)?;
            cip_map.record(asm.pc(), record.cip);
            edges.push(LoopEdge {
                offset: record.branch_pc,
                disp32: timeout_offset as i32 - record.branch_pc as i32,
            });
        }
        Ok(edges)
    }
}
