//! Method info: the per-function record the thunk patcher and compile
//! driver share (spec.md §3 "Method info", §4.6, §9 Open Question 2).

use super::compiled_function::CompiledFunction;
use parking_lot::Mutex;

/// Validation status recorded on a `MethodInfo`. The validator itself is an
/// external collaborator (spec.md §1); this crate only needs to know
/// whether validation has happened and whether it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Unvalidated,
    Valid,
    Invalid,
}

/// A record per plugin function, identified by its p-code byte offset.
///
/// Spec.md §9 Open Question 2 resolves to explicit method-info-level mutual
/// exclusion: `compile_lock` is the single-writer gate `compile_from_thunk`
/// (§4.6 "Concurrency") takes before compiling, so at most one compile runs
/// per method at a time. The `compiled` slot is itself set at most once
/// (§3: "Mutated by the compile driver exactly once per method").
pub struct MethodInfo {
    pcode_offset: u32,
    validation: Mutex<ValidationStatus>,
    compiled: Mutex<Option<CompiledFunction>>,
    /// Held across the whole compile-or-wait sequence in `compile_from_thunk`,
    /// not just the write to `compiled` — this is what makes a second,
    /// concurrent call for the same method block rather than race.
    compile_lock: Mutex<()>,
}

impl MethodInfo {
    pub fn new(pcode_offset: u32) -> Self {
        MethodInfo {
            pcode_offset,
            validation: Mutex::new(ValidationStatus::Unvalidated),
            compiled: Mutex::new(None),
            compile_lock: Mutex::new(()),
        }
    }

    pub fn pcode_offset(&self) -> u32 {
        self.pcode_offset
    }

    pub fn validation_status(&self) -> ValidationStatus {
        *self.validation.lock()
    }

    pub fn set_validation_status(&self, status: ValidationStatus) {
        *self.validation.lock() = status;
    }

    /// Entry address of the compiled function, if one exists yet.
    pub fn entry(&self) -> Option<usize> {
        self.compiled.lock().as_ref().map(|cf| cf.entry())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.lock().is_some()
    }

    /// Run `f` (the actual `compile()` call) while holding this method's
    /// single-writer compile lock, then install the result if it wasn't
    /// already installed by a racing caller that got there first.
    ///
    /// Matches §4.6 step 4/§8 property 6: a second thunk call for an
    /// already-compiled method must not recompile, and must yield the same
    /// entry address.
    pub fn compile_once_with<F>(&self, f: F) -> Result<usize, crate::error::CompileError>
    where
        F: FnOnce() -> Result<CompiledFunction, crate::error::CompileError>,
    {
        let _guard = self.compile_lock.lock();
        if let Some(entry) = self.entry() {
            return Ok(entry);
        }
        let cf = f()?;
        let entry = cf.entry();
        *self.compiled.lock() = Some(cf);
        Ok(entry)
    }

    /// Borrow the compiled function, if present, for cip-map lookups (e.g.
    /// from `report_error`).
    pub fn with_compiled<R>(&self, f: impl FnOnce(&CompiledFunction) -> R) -> Option<R> {
        self.compiled.lock().as_ref().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::code_chunk::{BoxedAllocator, ExecutableMemoryAllocator};

    fn fake_compiled() -> CompiledFunction {
        let chunk = BoxedAllocator.publish(&[0u8; 4]).unwrap();
        CompiledFunction::new(chunk, 0, vec![], vec![])
    }

    #[test]
    fn compile_once_installs_result() {
        let mi = MethodInfo::new(0);
        assert!(!mi.is_compiled());
        let entry = mi.compile_once_with(|| Ok(fake_compiled())).unwrap();
        assert!(mi.is_compiled());
        assert_eq!(mi.entry(), Some(entry));
    }

    #[test]
    fn second_call_does_not_recompile() {
        let mi = MethodInfo::new(0);
        let first = mi.compile_once_with(|| Ok(fake_compiled())).unwrap();
        let second = mi
            .compile_once_with(|| panic!("must not be called twice"))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_compile_leaves_method_uncompiled() {
        let mi = MethodInfo::new(0);
        let err = mi.compile_once_with(|| Err(crate::error::CompileError::OutOfMemory));
        assert!(err.is_err());
        assert!(!mi.is_compiled());
    }
}
