//! An architecture-neutral stand-in for the target assembler (spec.md §1, §6:
//! the real instruction encoder is an external collaborator and out of scope
//! here). Provides the label/patch-site machinery the compile driver depends
//! on, without committing to any particular machine-code encoding.

mod buffer;
mod label;

pub use buffer::{Assembler, AssemblerError};
pub use label::LabelId;
