//! JIT translation from Raya p-code to native code.
//!
//! A host application embeds this crate to run plugins distributed as
//! pre-verified p-code images. When the host invokes a plugin function for
//! the first time, [`jit::compile_from_thunk`] resolves or compiles that
//! function's native entry point and patches the call site to reach it
//! directly from then on.
//!
//! Module map:
//! - [`pcode`]: the bytecode format (opcodes, code image).
//! - [`assembler`]: the architecture-neutral instruction-stream builder and
//!   its label/patch-site machinery.
//! - [`runtime`]: plugin/method bookkeeping, the compiled-function artifact,
//!   the executable-memory allocator, and entry-frame discovery.
//! - [`environment`]: the host collaborator contract (watchdog, debugger,
//!   error reporting).
//! - [`jit`]: the compile driver itself — reader, jump map, OOL registry,
//!   error-path machinery, backward-jump/loop-edge bookkeeping, cip map, and
//!   the thunk patcher.
//!
//! # Example
//!
//! ```
//! use raya_jit::config::JitDriverConfig;
//! use raya_jit::environment::watchdog::TestWatchdog;
//! use raya_jit::environment::{HostEnvironment, StdDebugger};
//! use raya_jit::jit::compile;
//! use raya_jit::pcode::CodeImage;
//! use raya_jit::runtime::{BoxedAllocator, PluginRuntime};
//!
//! let bytes = vec![0xF0, 0x00, 0x00, 0x33, 0xF1]; // PROC; RETURN_VOID; ENDPROC
//! let mut runtime = PluginRuntime::new(CodeImage::new(bytes));
//! runtime.register_method(0);
//!
//! let env = HostEnvironment::new(TestWatchdog::new(), StdDebugger);
//! let compiled = compile(&runtime, 0, &JitDriverConfig::default(), &env, &BoxedAllocator)
//!     .expect("minimal function compiles");
//! assert!(compiled.loop_edges().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::needless_return)]

/// Driver-wide configuration.
pub mod config;
/// The two error channels: compile-time status and in-band runtime codes.
pub mod error;
/// The host collaborator contract: watchdog, debugger, error reporting.
pub mod environment;
/// The compile driver and its supporting machinery.
pub mod jit;
/// The p-code format: opcodes and the code image.
pub mod pcode;
/// The architecture-neutral instruction-stream builder.
pub mod assembler;
/// Plugin/method bookkeeping, compiled functions, executable memory,
/// entry-frame discovery.
pub mod runtime;
/// Host instruction-set architecture detection.
pub mod target_info;

pub use config::JitDriverConfig;
pub use error::{CompileError, RuntimeErrorCode};
pub use jit::{compile, compile_from_thunk, PatchSite, ThunkOutcome};
