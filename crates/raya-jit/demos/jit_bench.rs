//! Benchmarks the compile driver against a handful of synthetic p-code
//! functions, shaped after spec.md §8's concrete scenarios.
//!
//! Run with:
//!   cargo run --example jit_bench --release

use std::hint::black_box;
use std::time::Instant;

use raya_jit::config::JitDriverConfig;
use raya_jit::environment::watchdog::TestWatchdog;
use raya_jit::environment::{HostEnvironment, StdDebugger};
use raya_jit::jit::compile;
use raya_jit::pcode::CodeImage;
use raya_jit::runtime::{BoxedAllocator, PluginRuntime};

fn minimal_function() -> Vec<u8> {
    vec![0xF0, 0x00, 0x00, 0x33, 0xF1] // PROC; RETURN_VOID; ENDPROC
}

fn bounds_checked_array_load() -> Vec<u8> {
    vec![0xF0, 0x00, 0x00, 0x50, 0x33, 0xF1] // PROC; LOAD_ELEM; RETURN_VOID; ENDPROC
}

fn tight_loop() -> Vec<u8> {
    let mut bytes = vec![0xF0, 0x00, 0x00];
    let jmp_cip = bytes.len() as i32;
    bytes.push(0x30); // JMP
    bytes.extend_from_slice(&(-jmp_cip).to_le_bytes());
    bytes.push(0xF1); // ENDPROC
    bytes
}

fn run_case(label: &str, bytes: Vec<u8>, iterations: u32) {
    let env = HostEnvironment::new(TestWatchdog::new(), StdDebugger);
    let config = JitDriverConfig::default();

    let started = Instant::now();
    for _ in 0..iterations {
        let mut runtime = PluginRuntime::new(CodeImage::new(bytes.clone()));
        runtime.register_method(0);
        let compiled = compile(&runtime, 0, &config, &env, &BoxedAllocator)
            .expect("synthetic benchmark functions always compile");
        black_box(compiled);
    }
    let elapsed = started.elapsed();
    println!(
        "{label}: {iterations} compiles in {elapsed:?} ({:.2} us/compile)",
        elapsed.as_micros() as f64 / iterations as f64
    );
}

fn main() {
    run_case("minimal_function", minimal_function(), 50_000);
    run_case("bounds_checked_array_load", bounds_checked_array_load(), 50_000);
    run_case("tight_loop", tight_loop(), 50_000);
}
