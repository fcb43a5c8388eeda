//! Driver-wide configuration knobs (SPEC_FULL.md §D).

use crate::jit::jump_map::JumpMapSizing;

/// Configuration for a single `compile()` invocation.
#[derive(Debug, Clone)]
pub struct JitDriverConfig {
    /// Sanity cap on instructions decoded per function before a compile is
    /// abandoned as malformed. Not named explicitly in spec.md, but implied
    /// by "an assembler overflow during any phase sets the error field" —
    /// a PROC/ENDPROC pair that never closes would otherwise decode
    /// unboundedly.
    pub max_function_instructions: usize,
    /// Resolves spec.md §9's jump-map sizing Open Question explicitly; see
    /// DESIGN.md.
    pub jump_map_sizing: JumpMapSizing,
}

impl Default for JitDriverConfig {
    fn default() -> Self {
        JitDriverConfig {
            max_function_instructions: 1 << 20,
            jump_map_sizing: JumpMapSizing::WholeSegment,
        }
    }
}
