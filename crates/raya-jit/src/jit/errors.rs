//! Error-path machinery (spec.md §4.4): one shared label per runtime error
//! code, emitted at most once and only if at least one in-line site jumped
//! to it.

use crate::assembler::{Assembler, AssemblerError, LabelId};
use crate::error::RuntimeErrorCode;

/// Fixed-size table, one slot per `RuntimeErrorCode` variant (§3
/// "Error-path table"). A slot is "used" iff `reference` was called for it
/// during the decode loop or OOL emission.
pub struct ErrorPathTable {
    slots: [LabelId; RuntimeErrorCode::ALL.len()],
    used: [bool; RuntimeErrorCode::ALL.len()],
}

impl ErrorPathTable {
    pub fn new(asm: &mut Assembler) -> Self {
        ErrorPathTable {
            slots: std::array::from_fn(|_| asm.new_label()),
            used: [false; RuntimeErrorCode::ALL.len()],
        }
    }

    /// Obtain the label for `code`'s shared path, marking it used. Call
    /// sites jump or call through this label instead of emitting the error
    /// logic inline (§4.4: "emit align-stack; call throw_error_code[err]").
    pub fn reference(&mut self, code: RuntimeErrorCode) -> LabelId {
        self.used[code.index()] = true;
        self.slots[code.index()]
    }

    pub fn is_used(&self, code: RuntimeErrorCode) -> bool {
        self.used[code.index()]
    }

    /// Emit every used slot's shared body (§4.1 step 6): bind the slot,
    /// materialize the error code, jump to the generic `report_error` tail.
    /// Must run after every caller of `reference` has already run, so the
    /// "used" bits are final (§4.1 Rationale).
    pub fn emit_used(
        &self,
        asm: &mut Assembler,
        report_error: LabelId,
    ) -> Result<(), AssemblerError> {
        for code in RuntimeErrorCode::ALL {
            if self.is_used(code) {
                asm.bind(self.slots[code.index()]);
                asm.emit_raw(&[code.index() as u8])?; // move-immediate <err>, error-code-register
                asm.jump(report_error)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_slot_is_not_reported_used() {
        let mut asm = Assembler::new();
        let table = ErrorPathTable::new(&mut asm);
        assert!(!table.is_used(RuntimeErrorCode::DivideByZero));
    }

    #[test]
    fn referencing_marks_used_and_returns_stable_label() {
        let mut asm = Assembler::new();
        let mut table = ErrorPathTable::new(&mut asm);
        let l1 = table.reference(RuntimeErrorCode::ArrayBounds);
        let l2 = table.reference(RuntimeErrorCode::ArrayBounds);
        assert_eq!(l1, l2);
        assert!(table.is_used(RuntimeErrorCode::ArrayBounds));
        assert!(!table.is_used(RuntimeErrorCode::DivideByZero));
    }

    #[test]
    fn emit_used_only_emits_referenced_slots() {
        let mut asm = Assembler::new();
        let mut table = ErrorPathTable::new(&mut asm);
        table.reference(RuntimeErrorCode::DivideByZero);
        let report_error = asm.new_label();
        asm.bind(report_error);
        let before = asm.pc();
        table.emit_used(&mut asm, report_error).unwrap();
        assert!(asm.pc() > before);
    }
}
