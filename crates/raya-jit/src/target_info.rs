//! Host instruction-set detection.
//!
//! The real target-architecture assembler is out of scope (spec.md §1); what
//! this crate still needs to know, even with an abstract instruction
//! stream, is which architecture it would be targeting (so a host can
//! reject running a plugin on an unsupported ISA before it ever reaches the
//! compile driver). Detection goes through the same `cranelift-native` /
//! `cranelift-codegen` / `target-lexicon` stack `raya-jit`'s Cranelift
//! backend used for the same purpose.

use cranelift_codegen::settings::{self, Configurable};
use once_cell::sync::Lazy;
use target_lexicon::Architecture;

/// Host architecture and pointer width, resolved once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub architecture: Architecture,
    pub pointer_width_bits: u8,
}

impl TargetInfo {
    fn detect() -> Self {
        let mut flag_builder = settings::builder();
        // Matches spec.md §5's relaxed-W^X assumption: no PIC requirement
        // for the abstract stream, but keep flags consistent with a real
        // backend in case one is ever substituted in.
        let _ = flag_builder.set("is_pic", "true");
        let flags = settings::Flags::new(flag_builder);

        let triple = cranelift_native::builder()
            .map(|b| b.triple().clone())
            .unwrap_or_else(|_| target_lexicon::HOST);
        let _ = flags; // only used to mirror the reference backend's setup

        let pointer_width_bits = match triple.pointer_width() {
            Ok(w) => w.bits(),
            Err(_) => 64,
        };

        TargetInfo { architecture: triple.architecture, pointer_width_bits }
    }
}

static HOST_TARGET: Lazy<TargetInfo> = Lazy::new(TargetInfo::detect);

/// The detected host target, cached for the process lifetime.
pub fn host_target() -> TargetInfo {
    *HOST_TARGET
}
