//! Out-of-line path registry (spec.md §4.3): deferred native code emissions
//! whose bodies are written after the main function body.

use crate::assembler::{Assembler, AssemblerError, LabelId};
use crate::error::RuntimeErrorCode;
use crate::jit::cipmap::CipMapBuilder;
use crate::jit::errors::ErrorPathTable;

/// The two concrete OOL variants the excerpt names (§3): a generic error
/// path keyed by error code, and an out-of-bounds check failure. Modeled as
/// a tagged variant per the Design Notes (§9), since the set is small and
/// closed for this core.
enum OolKind {
    Error { code: RuntimeErrorCode, cip: u32 },
    OutOfBounds { cip: u32 },
}

struct OolPath {
    label: LabelId,
    kind: OolKind,
}

/// Append-only list of OOL paths. New paths may be registered during the
/// main decode loop but not during OOL emission itself (§4.3): `emit_all`
/// takes `&self` and iterates a snapshot, so there is no way to register
/// while iterating.
#[derive(Default)]
pub struct OolRegistry {
    paths: Vec<OolPath>,
}

impl OolRegistry {
    pub fn new() -> Self {
        OolRegistry::default()
    }

    /// Register a path that raises a known error code, returning the label
    /// the in-line check should jump to.
    pub fn register_error(&mut self, asm: &mut Assembler, code: RuntimeErrorCode, cip: u32) -> LabelId {
        let label = asm.new_label();
        self.paths.push(OolPath { label, kind: OolKind::Error { code, cip } });
        label
    }

    /// Register an out-of-bounds check failure path, returning the label
    /// the bounds check should jump to.
    pub fn register_out_of_bounds(&mut self, asm: &mut Assembler, cip: u32) -> LabelId {
        let label = asm.new_label();
        self.paths.push(OolPath { label, kind: OolKind::OutOfBounds { cip } });
        label
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Emit every registered path's body, in registration order (§4.1 step
    /// 4: "Emit all registered out-of-line paths in registration order,
    /// binding each path's label first").
    pub fn emit_all(
        &self,
        asm: &mut Assembler,
        errors: &mut ErrorPathTable,
        cip_map: &mut CipMapBuilder,
    ) -> Result<(), AssemblerError> {
        for path in &self.paths {
            asm.bind(path.label);
            asm.align_stack()?;
            let code = match path.kind {
                OolKind::Error { code, .. } => code,
                OolKind::OutOfBounds { .. } => RuntimeErrorCode::ArrayBounds,
            };
            let cip = match path.kind {
                OolKind::Error { cip, .. } | OolKind::OutOfBounds { cip } => cip,
            };
            let handler = errors.reference(code);
            asm.call(handler)?;
            cip_map.record(asm.pc(), cip);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_order_is_emission_order() {
        let mut asm = Assembler::new();
        let mut errors = ErrorPathTable::new(&mut asm);
        let mut registry = OolRegistry::new();
        registry.register_error(&mut asm, RuntimeErrorCode::DivideByZero, 4);
        registry.register_out_of_bounds(&mut asm, 8);
        assert_eq!(registry.len(), 2);

        let mut cip_map = CipMapBuilder::new();
        registry.emit_all(&mut asm, &mut errors, &mut cip_map).unwrap();
        assert!(errors.is_used(RuntimeErrorCode::DivideByZero));
        assert!(errors.is_used(RuntimeErrorCode::ArrayBounds));
        assert_eq!(cip_map.len(), 2);
    }

    #[test]
    fn each_path_label_is_bound_by_emission() {
        let mut asm = Assembler::new();
        let mut errors = ErrorPathTable::new(&mut asm);
        let mut registry = OolRegistry::new();
        let label = registry.register_error(&mut asm, RuntimeErrorCode::ArrayBounds, 1);
        assert!(!asm.is_bound(label));

        let mut cip_map = CipMapBuilder::new();
        registry.emit_all(&mut asm, &mut errors, &mut cip_map).unwrap();
        assert!(asm.is_bound(label));
    }
}
