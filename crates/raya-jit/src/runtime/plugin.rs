//! Plugin runtime: the owner of a code image and its per-function
//! `MethodInfo` table (spec.md §3 "Plugin runtime").

use super::method_info::MethodInfo;
use crate::pcode::CodeImage;
use rustc_hash::FxHashMap;

/// The owner of a validated plugin's code image and the method records
/// compiled against it. All `CompiledFunction`s the runtime produces borrow
/// their originating offsets from this image and are destroyed with it
/// (§3, §9 "Raw pointers into the code segment").
pub struct PluginRuntime {
    image: CodeImage,
    methods: FxHashMap<u32, MethodInfo>,
    /// Function name lookup by p-code offset, for diagnostics only (§6
    /// "Runtime image ... function-name lookup by p-code offset").
    names: FxHashMap<u32, String>,
}

impl PluginRuntime {
    pub fn new(image: CodeImage) -> Self {
        PluginRuntime { image, methods: FxHashMap::default(), names: FxHashMap::default() }
    }

    /// Convenience for tests: build a runtime with a single method already
    /// registered at `pcode_offset`.
    pub fn new_with_method(image: CodeImage, pcode_offset: u32) -> Self {
        let mut runtime = PluginRuntime::new(image);
        runtime.register_method(pcode_offset);
        runtime
    }

    pub fn image(&self) -> &CodeImage {
        &self.image
    }

    /// Register a function's `MethodInfo`. The plugin loader (out of scope,
    /// §1) is responsible for discovering `PROC` offsets during validation
    /// and calling this once per function before the runtime is exposed to
    /// the host.
    pub fn register_method(&mut self, pcode_offset: u32) {
        self.methods.entry(pcode_offset).or_insert_with(|| MethodInfo::new(pcode_offset));
    }

    pub fn method(&self, pcode_offset: u32) -> Option<&MethodInfo> {
        self.methods.get(&pcode_offset)
    }

    pub fn set_function_name(&mut self, pcode_offset: u32, name: String) {
        self.names.insert(pcode_offset, name);
    }

    /// Diagnostics-only name lookup (§6).
    pub fn function_name(&self, pcode_offset: u32) -> Option<&str> {
        self.names.get(&pcode_offset).map(String::as_str)
    }
}
