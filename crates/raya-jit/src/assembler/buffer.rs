//! The assembler buffer: an append-only instruction stream with symbolic
//! labels and backpatch support (spec.md §6's "Assembler" collaborator).
//!
//! The target-architecture instruction encoder is out of scope (spec.md §1);
//! this buffer records an architecture-neutral stream of tagged records
//! (plain bytes, or a call/jump through a label) instead of real machine
//! code. It is enough to prove out label binding, patch-site resolution, and
//! emission ordering — the properties spec.md §8 actually tests — without
//! depending on a real instruction encoder.

use super::label::{Label, LabelId};
use thiserror::Error;

/// Assembler-level failure. Latches the compile driver's error field (§7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    /// The buffer grew past its configured capacity.
    #[error("assembler buffer overflow at pc {at}")]
    Overflow { at: u32 },
}

/// One unit of the abstract instruction stream. Each record occupies one
/// "pc" unit regardless of its real size — the point is ordering and
/// monotonicity, not byte-accurate layout, since real encoding is out of
/// scope here.
#[derive(Debug, Clone)]
enum Record {
    Raw(Vec<u8>),
    AlignStack,
    Call(i32),
    Jump(i32),
    JumpIfFalse(i32),
}

/// The append-only native-code builder the compile driver emits into.
///
/// Mirrors the contract spec.md §6 lists for the external assembler:
/// `bind`, `call`, `alignStack`, `pc`, and byte buffer access — plus `jump`
/// and `jump_if_false`, which the spec's opcode visitors need to reach
/// labels conditionally and which the Design Notes treat as part of the
/// same label machinery.
pub struct Assembler {
    records: Vec<Record>,
    labels: Vec<Label>,
    capacity_limit: Option<u32>,
}

impl Assembler {
    /// Create an assembler with no capacity limit.
    pub fn new() -> Self {
        Assembler { records: Vec::new(), labels: Vec::new(), capacity_limit: None }
    }

    /// Create an assembler that fails with `Overflow` once its record count
    /// would exceed `limit`. Used to exercise spec.md §8 property 8
    /// (assembler overflow aborts the compile without mutating method state).
    pub fn with_capacity_limit(limit: u32) -> Self {
        Assembler { records: Vec::new(), labels: Vec::new(), capacity_limit: Some(limit) }
    }

    /// Allocate a new, initially unbound label.
    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(Label::new());
        id
    }

    /// Current position in the instruction stream.
    pub fn pc(&self) -> u32 {
        self.records.len() as u32
    }

    /// Whether `label` has been bound yet.
    pub fn is_bound(&self, label: LabelId) -> bool {
        self.labels[label.0 as usize].is_bound()
    }

    /// The resolved pc of `label`, if bound.
    pub fn label_pc(&self, label: LabelId) -> Option<u32> {
        self.labels[label.0 as usize].bound_pc()
    }

    /// Bind `label` to the current pc, resolving any patch sites that were
    /// recorded against it while it was unbound.
    ///
    /// Spec.md §3 invariant: each label binds exactly once.
    pub fn bind(&mut self, label: LabelId) {
        let pc = self.pc();
        let sites = self.labels[label.0 as usize].bind(pc);
        for site in sites {
            self.patch_relative(site, pc);
        }
    }

    fn patch_relative(&mut self, site: u32, target: u32) {
        let disp = target as i64 - site as i64;
        let disp = disp as i32;
        match &mut self.records[site as usize] {
            Record::Call(d) | Record::Jump(d) | Record::JumpIfFalse(d) => *d = disp,
            Record::Raw(_) | Record::AlignStack => unreachable!("patch site is not a branch record"),
        }
    }

    fn push(&mut self, record: Record) -> Result<u32, AssemblerError> {
        let at = self.pc();
        if let Some(limit) = self.capacity_limit {
            if at >= limit {
                return Err(AssemblerError::Overflow { at });
            }
        }
        self.records.push(record);
        Ok(at)
    }

    /// Emit a call through `label`. If the label is already bound the
    /// displacement is resolved immediately; otherwise a patch site is
    /// queued and resolved when `bind` is later called.
    pub fn call(&mut self, label: LabelId) -> Result<(), AssemblerError> {
        self.emit_branch(label, Record::Call(0))
    }

    /// Emit an unconditional jump through `label`.
    pub fn jump(&mut self, label: LabelId) -> Result<(), AssemblerError> {
        self.emit_branch(label, Record::Jump(0))
    }

    /// Emit a conditional jump (taken when the top-of-stack check fails)
    /// through `label`.
    pub fn jump_if_false(&mut self, label: LabelId) -> Result<(), AssemblerError> {
        self.emit_branch(label, Record::JumpIfFalse(0))
    }

    fn emit_branch(&mut self, label: LabelId, placeholder: Record) -> Result<(), AssemblerError> {
        let site = self.push(placeholder)?;
        if self.labels[label.0 as usize].is_bound() {
            let target = self.labels[label.0 as usize].bound_pc().unwrap();
            self.patch_relative(site, target);
        } else {
            self.labels[label.0 as usize].add_patch_site(site);
        }
        Ok(())
    }

    /// Emit a stack-alignment marker ahead of a runtime helper call, as the
    /// error paths do (spec.md §4.4).
    pub fn align_stack(&mut self) -> Result<(), AssemblerError> {
        self.push(Record::AlignStack)?;
        Ok(())
    }

    /// Emit an opaque raw record (e.g. an arithmetic op or constant load).
    /// The actual per-opcode encoders are out of scope (spec.md §2); this is
    /// the hook they would emit through.
    pub fn emit_raw(&mut self, bytes: &[u8]) -> Result<(), AssemblerError> {
        self.push(Record::Raw(bytes.to_vec()))?;
        Ok(())
    }

    /// Number of instruction-stream records emitted so far. Stands in for
    /// "byte buffer access" from spec.md §6 — real byte-accurate sizing is
    /// the out-of-scope encoder's job.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any records have been emitted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
