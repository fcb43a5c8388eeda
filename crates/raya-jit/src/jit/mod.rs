//! The JIT translation pipeline from spec.md §2: the p-code reader, the
//! jump map, the out-of-line path registry, the error-path machinery, the
//! backward-jump/loop-edge bookkeeping, the cip map, the compile driver,
//! and the thunk patcher.

pub mod backward_jump;
pub mod cipmap;
pub mod driver;
pub mod errors;
pub mod jump_map;
pub mod ool;
pub mod reader;
pub mod thunk;

pub use driver::compile;
pub use jump_map::JumpMapSizing;
pub use thunk::{compile_from_thunk, PatchSite, ThunkOutcome};
