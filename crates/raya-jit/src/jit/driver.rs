//! The compile driver (spec.md §4.1): `compile(runtime, pcode_offset)`.
//! Orchestrates prologue -> main decode loop -> OOL paths -> backward-jump
//! thunks -> shared error paths -> link, and carries the per-compile state
//! machine from §4.8.

use crate::assembler::Assembler;
use crate::config::JitDriverConfig;
use crate::environment::Environment;
use crate::error::{CompileError, RuntimeErrorCode};
use crate::jit::backward_jump::BackwardJumpList;
use crate::jit::cipmap::CipMapBuilder;
use crate::jit::errors::ErrorPathTable;
use crate::jit::jump_map::{JumpMap, JumpMapSizing};
use crate::jit::ool::OolRegistry;
use crate::jit::reader::Reader;
use crate::pcode::{CodeImage, Opcode};
use crate::runtime::{CompiledFunction, ExecutableMemoryAllocator, PluginRuntime};

/// Per-compile state (§4.8): `init -> decoding -> ool -> tail -> linking ->
/// done`, forward-only. Order of declaration is the allowed transition
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CompileState {
    Init,
    Decoding,
    Ool,
    Tail,
    Linking,
    Done,
}

impl CompileState {
    fn advance_to(&mut self, next: CompileState) {
        debug_assert!(next >= *self, "compile state machine moved backward");
        *self = next;
    }
}

/// Decode the p-code starting at `pcode_offset` and translate it to native
/// code, publishing the result as a `CompiledFunction`.
///
/// This is spec.md's `Compile(context, method) -> compiled_function |
/// error` (§6). `pcode_offset` must be a valid cip into `runtime.image()`;
/// callers (the thunk patcher) are responsible for having already resolved
/// and validated the `MethodInfo` before calling this.
pub fn compile(
    runtime: &PluginRuntime,
    pcode_offset: u32,
    config: &JitDriverConfig,
    env: &impl Environment,
    allocator: &impl ExecutableMemoryAllocator,
) -> Result<CompiledFunction, CompileError> {
    let image = runtime.image();
    if !image.contains(pcode_offset as usize) {
        return Err(CompileError::InvalidAddress);
    }

    let mut state = CompileState::Init;
    let mut error: Option<CompileError> = None;
    let mut asm = Assembler::new();

    // Step 1: jump map, sized per configuration (resolves §9 Open Question 1).
    let (map_base, map_len) = match config.jump_map_sizing {
        JumpMapSizing::WholeSegment => (0usize, image.len()),
        JumpMapSizing::FunctionExtent => {
            let extent = function_extent(image, pcode_offset as usize);
            (pcode_offset as usize, extent)
        }
    };
    let jump_map = JumpMap::allocate(&mut asm, map_base, map_len);

    // Step 2: prologue. Architecture-specific (stack frame, register save,
    // error-handler installation) and out of scope (§1); a marker record
    // stands in for it.
    let _ = asm.emit_raw(&[]);

    state.advance_to(CompileState::Decoding);

    let mut ool = OolRegistry::new();
    let mut errors = ErrorPathTable::new(&mut asm);
    let mut backward = BackwardJumpList::new();
    let mut cip_map = CipMapBuilder::new();
    let report_error_label = asm.new_label();
    let timeout_label = asm.new_label();

    let mut reader = Reader::begin(image, pcode_offset as usize);
    let mut instruction_count = 0usize;

    // Step 3: main decode loop.
    while reader.more() {
        match reader.peek_opcode() {
            Some(next) if next.is_boundary() && reader.cip() != pcode_offset as usize => break,
            None => {
                error = Some(CompileError::Validation(format!(
                    "unrecognized opcode at cip {}",
                    reader.cip()
                )));
                break;
            }
            _ => {}
        }

        instruction_count += 1;
        if instruction_count > config.max_function_instructions {
            error = Some(CompileError::Validation(
                "function exceeds maximum instruction cap".to_string(),
            ));
            break;
        }

        let (cip, opcode) = reader.visit_next().expect("more() guarantees an opcode");
        jump_map.bind(&mut asm, cip);
        let operand = reader.operand_bytes(cip, opcode).to_vec();

        let outcome = visit_opcode(
            &mut asm,
            &jump_map,
            &mut ool,
            &mut errors,
            &mut backward,
            &mut cip_map,
            opcode,
            cip as u32,
            &operand,
        );

        if let Err(e) = outcome {
            env.debugger().on_debug_spew(&format!(
                "compile aborted at cip {cip}: {e}"
            ));
            error = Some(e);
            break;
        }
    }

    // Steps 4-7 only run while the compile hasn't latched an error (§4.1
    // step 3: "abort and return the error").
    let loop_edges = if error.is_none() {
        state.advance_to(CompileState::Ool);
        if let Err(e) = ool.emit_all(&mut asm, &mut errors, &mut cip_map) {
            error = Some(e.into());
        }

        state.advance_to(CompileState::Tail);
        let edges = if error.is_none() {
            match backward.emit_thunks(&mut asm, timeout_label, &mut cip_map) {
                Ok(edges) => edges,
                Err(e) => {
                    error = Some(e.into());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if error.is_none() {
            if let Err(e) = errors.emit_used(&mut asm, report_error_label) {
                error = Some(e.into());
            }
        }
        if error.is_none() {
            // Generic error handlers: the report_error tail and the shared
            // timeout thunk body (§4.1 step 7). Bound last because nothing
            // earlier depends on their contents, only their labels.
            asm.bind(report_error_label);
            let _ = asm.emit_raw(&[0xEE]); // report_error tail marker
            if !backward.is_empty() {
                asm.bind(timeout_label);
                let _ = asm.emit_raw(&[0xFF]); // throw_timeout tail marker
            }
        }
        edges
    } else {
        Vec::new()
    };

    if let Some(e) = error {
        return Err(e);
    }

    state.advance_to(CompileState::Linking);

    // Step 8: link. The abstract assembler has no byte-accurate buffer (§F);
    // the published bytes are a length-matching placeholder, since the real
    // per-instruction encoding is the out-of-scope target assembler's job.
    let native_bytes = vec![0u8; asm.len()];
    let chunk = allocator.publish(&native_bytes)?;

    state.advance_to(CompileState::Done);

    // Steps 9-10: finalize tables, construct the compiled function.
    Ok(CompiledFunction::new(chunk, pcode_offset, loop_edges, cip_map.finish()))
}

/// Scan forward from `start` to find where the *next* function begins (the
/// next `PROC` after the first, or the matching `ENDPROC`), for
/// `JumpMapSizing::FunctionExtent`.
fn function_extent(image: &CodeImage, start: usize) -> usize {
    let mut reader = Reader::begin(image, start);
    while reader.more() {
        match reader.peek_opcode() {
            Some(op) if op.is_boundary() && reader.cip() != start => break,
            Some(_) => {
                if reader.visit_next().is_none() {
                    break;
                }
            }
            None => break,
        }
    }
    reader.cip() - start
}

#[allow(clippy::too_many_arguments)]
fn visit_opcode(
    asm: &mut Assembler,
    jump_map: &JumpMap,
    ool: &mut OolRegistry,
    errors: &mut ErrorPathTable,
    backward: &mut BackwardJumpList,
    cip_map: &mut CipMapBuilder,
    opcode: Opcode,
    cip: u32,
    operand: &[u8],
) -> Result<(), CompileError> {
    match opcode {
        Opcode::Idiv => {
            let ool_label = ool.register_error(asm, RuntimeErrorCode::DivideByZero, cip);
            asm.jump_if_false(ool_label)?;
            asm.emit_raw(&[opcode as u8])?;
            Ok(())
        }
        Opcode::LoadElem | Opcode::StoreElem => {
            let ool_label = ool.register_out_of_bounds(asm, cip);
            asm.jump_if_false(ool_label)?;
            asm.emit_raw(&[opcode as u8])?;
            Ok(())
        }
        Opcode::Jmp | Opcode::JmpIfFalse => {
            let disp = i32::from_le_bytes(operand.try_into().map_err(|_| {
                CompileError::Validation(format!("malformed displacement operand at cip {cip}"))
            })?);
            let target = cip as i64 + disp as i64;
            if target < 0 {
                return Err(CompileError::InvalidAddress);
            }
            let target = target as usize;
            let label = jump_map.label_at(target);
            let branch_pc = asm.pc();
            if matches!(opcode, Opcode::Jmp) {
                asm.jump(label)?;
            } else {
                asm.jump_if_false(label)?;
            }
            if target < cip as usize {
                backward.record(branch_pc, cip);
            }
            Ok(())
        }
        _ => {
            let mut bytes = vec![opcode as u8];
            bytes.extend_from_slice(operand);
            asm.emit_raw(&bytes)?;
            record_cip_if_trap_site(opcode, asm, cip, cip_map);
            Ok(())
        }
    }
}

/// `Call` and the two return opcodes are sites the runtime may need to
/// attribute a trap or unwind to (§3 "cip map ... covers every site that
/// can trap or invoke a helper"; §8's minimal-function scenario requires
/// "cip map contains at least the RETN site"). Everything else in the
/// catch-all arm is a pure value operation that never traps.
fn record_cip_if_trap_site(opcode: Opcode, asm: &Assembler, cip: u32, cip_map: &mut CipMapBuilder) {
    if matches!(opcode, Opcode::Call | Opcode::Return | Opcode::ReturnVoid) {
        cip_map.record(asm.pc(), cip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::watchdog::TestWatchdog;
    use crate::environment::{HostEnvironment, StdDebugger};
    use crate::pcode::CodeImage;
    use crate::runtime::BoxedAllocator;

    fn env() -> HostEnvironment<TestWatchdog, StdDebugger> {
        HostEnvironment::new(TestWatchdog::new(), StdDebugger)
    }

    fn bytes_minimal_function() -> Vec<u8> {
        vec![
            0xF0, 0x00, 0x00, // PROC, locals=0
            0x33, // RETURN_VOID
            0xF1, // ENDPROC
        ]
    }

    #[test]
    fn minimal_function_compiles_with_no_ool_or_backward_jumps() {
        let image = CodeImage::new(bytes_minimal_function());
        let mut runtime = PluginRuntime::new(image);
        runtime.register_method(0);

        let cf = compile(&runtime, 0, &JitDriverConfig::default(), &env(), &BoxedAllocator).unwrap();
        assert_eq!(cf.pcode_offset(), 0);
        assert!(cf.loop_edges().is_empty());
    }

    #[test]
    fn bounds_checked_array_load_uses_array_bounds_slot() {
        let bytes = vec![
            0xF0, 0x00, 0x00, // PROC
            0x50, // LOAD_ELEM
            0x33, // RETURN_VOID
            0xF1, // ENDPROC
        ];
        let image = CodeImage::new(bytes);
        let runtime = PluginRuntime::new(image);

        let cf = compile(&runtime, 0, &JitDriverConfig::default(), &env(), &BoxedAllocator).unwrap();
        // one OOL stub -> one call -> one cip-map entry for the OOL site,
        // plus the LOAD_ELEM itself never traps in-line.
        assert!(!cf.cip_map().is_empty());
    }

    #[test]
    fn tight_loop_produces_one_loop_edge() {
        // PROC; JMP -1 (to itself, backward); ENDPROC is never reached
        // because the backward jump forms an infinite loop in real
        // execution, but compiling it just needs the branch decoded once.
        let mut bytes = vec![0xF0, 0x00, 0x00];
        let jmp_cip = bytes.len() as i32;
        bytes.push(0x30); // JMP
        bytes.extend_from_slice(&(-jmp_cip).to_le_bytes());
        bytes.push(0xF1); // ENDPROC terminates the decode loop

        let image = CodeImage::new(bytes);
        let runtime = PluginRuntime::new(image);

        let cf = compile(&runtime, 0, &JitDriverConfig::default(), &env(), &BoxedAllocator).unwrap();
        assert_eq!(cf.loop_edges().len(), 1);
        // Record order: prologue marker, PROC, JMP (the branch itself).
        assert_eq!(cf.loop_edges()[0].offset, 2);
        assert!(cf.loop_edges()[0].disp32 > 0);
    }

    #[test]
    fn invalid_offset_is_rejected_before_any_emission() {
        let image = CodeImage::new(vec![0xF0, 0x00, 0x00, 0xF1]);
        let runtime = PluginRuntime::new(image);
        let err = compile(&runtime, 100, &JitDriverConfig::default(), &env(), &BoxedAllocator)
            .unwrap_err();
        assert_eq!(err, CompileError::InvalidAddress);
    }

    #[test]
    fn malformed_opcode_latches_validation_error() {
        let image = CodeImage::new(vec![0xF0, 0x00, 0x00, 0xAA, 0xF1]);
        let runtime = PluginRuntime::new(image);
        let err = compile(&runtime, 0, &JitDriverConfig::default(), &env(), &BoxedAllocator)
            .unwrap_err();
        assert!(matches!(err, CompileError::Validation(_)));
    }
}
