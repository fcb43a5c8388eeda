//! The runtime side of the driver: the plugin image owner, per-method
//! records, the compiled-function artifact, the executable-memory
//! allocator, and entry-frame discovery. Corresponds to spec.md §3's data
//! model and §4.7.

pub mod code_chunk;
pub mod compiled_function;
pub mod frame;
pub mod method_info;
pub mod plugin;

pub use code_chunk::{BoxedAllocator, CodeChunk, ExecutableMemoryAllocator, LinkError};
pub use compiled_function::{CipMapEntry, CompiledFunction, LoopEdge};
pub use frame::{find_entry_fp, Frame, FrameType, JitFrameIterator};
pub use method_info::{MethodInfo, ValidationStatus};
pub use plugin::PluginRuntime;

#[cfg(unix)]
pub use code_chunk::MmapAllocator;
