//! The environment collaborator (spec.md §6): watchdog access, error
//! reporting, and debugger spew. Process-wide in the source (§9 "Global
//! environment"); modeled here as a trait object threaded explicitly
//! instead, since the Design Notes say both shapes are acceptable and
//! explicit threading composes better with this crate having no global
//! init/teardown of its own.

pub mod watchdog;

pub use watchdog::Watchdog;

use crate::error::RuntimeErrorCode;

/// `debugger().OnDebugSpew(fmt, ...)` (§6). The host owns where spew goes;
/// this crate never reaches for a logging crate directly (SPEC_FULL.md §C).
pub trait Debugger {
    fn on_debug_spew(&self, message: &str);
}

/// A line-oriented debugger that writes to stderr, for hosts that don't
/// supply their own sink.
pub struct StdDebugger;

impl Debugger for StdDebugger {
    fn on_debug_spew(&self, message: &str) {
        eprintln!("[raya-jit] {message}");
    }
}

/// The full environment contract (§6): watchdog, error reporting, debug
/// spew. One reference implementation (`HostEnvironment`) is provided for
/// tests and simple embedders; production hosts supply their own.
pub trait Environment {
    type Watchdog: Watchdog;
    type Debugger: Debugger;

    fn watchdog(&self) -> &Self::Watchdog;
    fn debugger(&self) -> &Self::Debugger;

    /// Tail of the in-band error channel (§7): emitted code's shared error
    /// paths call into this with the runtime error code after unwinding to
    /// the entry frame.
    fn report_error(&self, code: RuntimeErrorCode);
}

/// A minimal `Environment` sufficient to drive the compile driver and
/// thunk patcher end-to-end in tests.
pub struct HostEnvironment<W: Watchdog, D: Debugger> {
    watchdog: W,
    debugger: D,
    reported: parking_lot::Mutex<Vec<RuntimeErrorCode>>,
}

impl<W: Watchdog, D: Debugger> HostEnvironment<W, D> {
    pub fn new(watchdog: W, debugger: D) -> Self {
        HostEnvironment { watchdog, debugger, reported: parking_lot::Mutex::new(Vec::new()) }
    }

    /// Errors reported so far, in order. Test-only convenience; real hosts
    /// act on `report_error` instead of recording it.
    pub fn reported_errors(&self) -> Vec<RuntimeErrorCode> {
        self.reported.lock().clone()
    }
}

impl<W: Watchdog, D: Debugger> Environment for HostEnvironment<W, D> {
    type Watchdog = W;
    type Debugger = D;

    fn watchdog(&self) -> &W {
        &self.watchdog
    }

    fn debugger(&self) -> &D {
        &self.debugger
    }

    fn report_error(&self, code: RuntimeErrorCode) {
        self.debugger.on_debug_spew(&format!("report_error: {code:?}"));
        self.reported.lock().push(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::watchdog::TestWatchdog;

    #[test]
    fn report_error_is_recorded_in_order() {
        let env = HostEnvironment::new(TestWatchdog::new(), StdDebugger);
        env.report_error(RuntimeErrorCode::DivideByZero);
        env.report_error(RuntimeErrorCode::ArrayBounds);
        assert_eq!(
            env.reported_errors(),
            vec![RuntimeErrorCode::DivideByZero, RuntimeErrorCode::ArrayBounds]
        );
    }
}
