//! Compiled function: the immutable artifact a successful compile produces
//! (spec.md §3 "Compiled function").

use super::code_chunk::CodeChunk;

/// A (native pc offset, p-code cip) pair. Strictly monotonic in native pc
/// order across a `CompiledFunction`'s whole array (§3, §8 property 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipMapEntry {
    pub native_pc: u32,
    pub cip: u32,
}

/// A backward branch's native pc and the displacement to its preemption
/// thunk (§3 "Loop edge").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopEdge {
    pub offset: u32,
    pub disp32: i32,
}

/// An owned handle over a compiled function's executable code and the
/// bookkeeping tables the runtime needs to interpret traps against it.
///
/// Immutable after construction (§3): the three array fields never change
/// size or contents once `compile()` returns. `chunk` may still be *patched*
/// in place by the thunk patcher and the watchdog, per the invariant on
/// `CodeChunk` itself.
pub struct CompiledFunction {
    chunk: CodeChunk,
    pcode_offset: u32,
    loop_edges: Vec<LoopEdge>,
    cip_map: Vec<CipMapEntry>,
}

impl CompiledFunction {
    pub fn new(
        chunk: CodeChunk,
        pcode_offset: u32,
        loop_edges: Vec<LoopEdge>,
        cip_map: Vec<CipMapEntry>,
    ) -> Self {
        assert!(
            cip_map.windows(2).all(|w| w[0].native_pc < w[1].native_pc),
            "cip map must be strictly monotonic in native pc"
        );
        CompiledFunction { chunk, pcode_offset, loop_edges, cip_map }
    }

    /// Native entry address of this compiled function.
    pub fn entry(&self) -> usize {
        self.chunk.base()
    }

    pub fn chunk(&self) -> &CodeChunk {
        &self.chunk
    }

    pub fn pcode_offset(&self) -> u32 {
        self.pcode_offset
    }

    pub fn loop_edges(&self) -> &[LoopEdge] {
        &self.loop_edges
    }

    pub fn cip_map(&self) -> &[CipMapEntry] {
        &self.cip_map
    }

    /// Recover the p-code cip for a trap at `native_pc`, via the last
    /// cip-map entry at or before it. Used by `report_error`'s diagnostics.
    pub fn cip_for_native_pc(&self, native_pc: u32) -> Option<u32> {
        self.cip_map
            .iter()
            .rev()
            .find(|e| e.native_pc <= native_pc)
            .map(|e| e.cip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::code_chunk::BoxedAllocator;
    use crate::runtime::code_chunk::ExecutableMemoryAllocator;

    fn chunk() -> CodeChunk {
        BoxedAllocator.publish(&[0u8; 16]).unwrap()
    }

    #[test]
    fn cip_lookup_finds_nearest_preceding_entry() {
        let cf = CompiledFunction::new(
            chunk(),
            0,
            vec![],
            vec![CipMapEntry { native_pc: 4, cip: 1 }, CipMapEntry { native_pc: 10, cip: 3 }],
        );
        assert_eq!(cf.cip_for_native_pc(4), Some(1));
        assert_eq!(cf.cip_for_native_pc(9), Some(1));
        assert_eq!(cf.cip_for_native_pc(10), Some(3));
        assert_eq!(cf.cip_for_native_pc(0), None);
    }

    #[test]
    #[should_panic(expected = "monotonic")]
    fn non_monotonic_cip_map_is_rejected() {
        CompiledFunction::new(
            chunk(),
            0,
            vec![],
            vec![CipMapEntry { native_pc: 10, cip: 1 }, CipMapEntry { native_pc: 4, cip: 2 }],
        );
    }
}
