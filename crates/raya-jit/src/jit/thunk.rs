//! Thunk patcher (spec.md §4.6): resolves or triggers compilation of an
//! uncompiled call target, then rewrites the call site to bypass the
//! patcher on subsequent calls.

use crate::config::JitDriverConfig;
use crate::environment::Environment;
use crate::error::CompileError;
use crate::jit::driver::compile;
use crate::runtime::{CodeChunk, ExecutableMemoryAllocator, PluginRuntime, ValidationStatus};

/// Whether this call to `compile_from_thunk` actually ran the compile
/// driver, or found the method already compiled (§8 property 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThunkOutcome {
    Compiled,
    AlreadyCompiled,
}

/// A call site awaiting rewrite: the offset of its target displacement
/// inside the *caller's* own compiled chunk. Abstracts §4.6's "an inline
/// stub that ends with call <patcher>; ...patch site...".
pub struct PatchSite<'a> {
    pub chunk: &'a CodeChunk,
    pub offset: usize,
}

impl PatchSite<'_> {
    /// `PatchCallThunk(patch_site, entry)` (§6): atomic-enough rewrite of
    /// the call site's target. The abstract `CodeChunk::patch_i32_at` is
    /// this crate's stand-in for the platform cache-invalidating
    /// `publish_patch` primitive the Design Notes call for (§9).
    fn rewrite_to(&self, entry: usize) {
        self.chunk.patch_i32_at(self.offset, entry as i32);
    }
}

/// `compile_from_thunk(context, pcode_offset, out_entry, patch_site) ->
/// status` (§4.6). Returns the entry address and whether a compile
/// actually ran.
///
/// No partial patching (§7): the entry address is always resolved and
/// returned to the caller before `patch_site` is rewritten, and rewriting
/// only happens once `method.compile_once_with` has returned successfully.
pub fn compile_from_thunk(
    runtime: &PluginRuntime,
    pcode_offset: u32,
    patch_site: Option<&PatchSite>,
    config: &JitDriverConfig,
    env: &impl Environment,
    allocator: &impl ExecutableMemoryAllocator,
) -> Result<(usize, ThunkOutcome), CompileError> {
    // Step 1: a pending preemption blocks compilation outright — the
    // would-be-compiled code would lack preemption patches coherent with
    // current watchdog state (§4.6 step 1).
    if !env.watchdog().handle_interrupt() {
        return Err(CompileError::Timeout);
    }

    // Step 2: resolve the method.
    let method = runtime.method(pcode_offset).ok_or(CompileError::InvalidAddress)?;

    // Step 3: validate, propagating rejection.
    match method.validation_status() {
        ValidationStatus::Invalid => {
            return Err(CompileError::Validation(format!(
                "method at p-code offset {pcode_offset} is invalid"
            )));
        }
        ValidationStatus::Unvalidated => {
            // The plugin loader/validator (§1, out of scope) is assumed to
            // have already gated whether this runtime was ever exposed to
            // the host; first contact here just records that.
            method.set_validation_status(ValidationStatus::Valid);
        }
        ValidationStatus::Valid => {}
    }

    let was_already_compiled = method.is_compiled();

    // Steps 4-5: compile (single-writer per method via `compile_once_with`)
    // and capture the entry address.
    let entry =
        method.compile_once_with(|| compile(runtime, pcode_offset, config, env, allocator))?;

    // Step 6: patch the call site.
    if let Some(site) = patch_site {
        site.rewrite_to(entry);
    }

    let outcome =
        if was_already_compiled { ThunkOutcome::AlreadyCompiled } else { ThunkOutcome::Compiled };
    Ok((entry, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::watchdog::TestWatchdog;
    use crate::environment::{HostEnvironment, StdDebugger};
    use crate::pcode::CodeImage;
    use crate::runtime::{BoxedAllocator, ExecutableMemoryAllocator as _};

    fn env() -> HostEnvironment<TestWatchdog, StdDebugger> {
        HostEnvironment::new(TestWatchdog::new(), StdDebugger)
    }

    fn minimal_runtime() -> PluginRuntime {
        let bytes = vec![0xF0, 0x00, 0x00, 0x33, 0xF1]; // PROC; RETURN_VOID; ENDPROC
        let mut runtime = PluginRuntime::new(CodeImage::new(bytes));
        runtime.register_method(0);
        runtime
    }

    #[test]
    fn first_call_compiles_and_patches_second_call_does_not_recompile() {
        let runtime = minimal_runtime();
        let caller_chunk = BoxedAllocator.publish(&[0u8; 8]).unwrap();
        let site = PatchSite { chunk: &caller_chunk, offset: 0 };

        let (entry1, outcome1) = compile_from_thunk(
            &runtime,
            0,
            Some(&site),
            &JitDriverConfig::default(),
            &env(),
            &BoxedAllocator,
        )
        .unwrap();
        assert_eq!(outcome1, ThunkOutcome::Compiled);
        assert_eq!(&caller_chunk.as_slice()[0..4], &(entry1 as i32).to_le_bytes());

        let (entry2, outcome2) = compile_from_thunk(
            &runtime,
            0,
            Some(&site),
            &JitDriverConfig::default(),
            &env(),
            &BoxedAllocator,
        )
        .unwrap();
        assert_eq!(outcome2, ThunkOutcome::AlreadyCompiled);
        assert_eq!(entry1, entry2);
    }

    #[test]
    fn preemption_pending_blocks_compile_and_leaves_method_uncompiled() {
        let runtime = minimal_runtime();
        let watchdog = TestWatchdog::new();
        watchdog.request_preemption();
        let env = HostEnvironment::new(watchdog, StdDebugger);

        let err =
            compile_from_thunk(&runtime, 0, None, &JitDriverConfig::default(), &env, &BoxedAllocator)
                .unwrap_err();
        assert_eq!(err, CompileError::Timeout);
        assert!(!runtime.method(0).unwrap().is_compiled());
    }

    #[test]
    fn unknown_offset_returns_invalid_address() {
        let runtime = minimal_runtime();
        let err =
            compile_from_thunk(&runtime, 99, None, &JitDriverConfig::default(), &env(), &BoxedAllocator)
                .unwrap_err();
        assert_eq!(err, CompileError::InvalidAddress);
    }
}
