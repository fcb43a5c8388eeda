//! Cip map builder (spec.md §3 "Cip map entry", §7): accumulates
//! (native pc -> p-code cip) entries at every site that can trap or invoke
//! a helper, during a single compile.

use crate::runtime::CipMapEntry;

/// Builds the strictly-monotonic cip map a `CompiledFunction` carries.
/// Owned solely by the active compile (§5 "Shared resources").
#[derive(Default)]
pub struct CipMapBuilder {
    entries: Vec<CipMapEntry>,
}

impl CipMapBuilder {
    pub fn new() -> Self {
        CipMapBuilder::default()
    }

    /// Record an entry. Callers always record at the assembler's current
    /// (strictly increasing) pc, so the builder does not need to sort —
    /// only assert the monotonicity invariant holds (§8 property 2). A hard
    /// `assert!` since this invariant is load-bearing for the runtime's trap
    /// lookups, not a debug-only sanity check.
    pub fn record(&mut self, native_pc: u32, cip: u32) {
        assert!(
            self.entries.last().is_none_or(|e| e.native_pc < native_pc),
            "cip map entries must be strictly monotonic in native pc order"
        );
        self.entries.push(CipMapEntry { native_pc, cip });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<CipMapEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_preserves_recorded_order() {
        let mut builder = CipMapBuilder::new();
        builder.record(4, 1);
        builder.record(10, 3);
        let entries = builder.finish();
        assert_eq!(entries, vec![CipMapEntry { native_pc: 4, cip: 1 }, CipMapEntry { native_pc: 10, cip: 3 }]);
    }

    #[test]
    #[should_panic(expected = "monotonic")]
    fn rejects_non_increasing_native_pc() {
        let mut builder = CipMapBuilder::new();
        builder.record(10, 1);
        builder.record(10, 2);
    }
}
