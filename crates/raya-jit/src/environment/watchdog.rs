//! The watchdog collaborator (spec.md §4.5, §4.6, §6).
//!
//! Real implementations run on a separate timer thread and communicate
//! through a process-wide interrupt flag; this crate only needs the
//! contract `compile_from_thunk` and the loop-edge finalization logic
//! consume.

use crate::runtime::CodeChunk;

/// `watchdog()` collaborator (§6): `HandleInterrupt() -> bool`,
/// `NotifyTimeoutReceived()`, plus the loop-edge retargeting operation
/// described narratively in §4.5 and named here as `preempt_loop_edge`.
pub trait Watchdog {
    /// Process any pending preemption request. Returns `false` if a
    /// preemption is currently active — `compile_from_thunk` must not
    /// compile in that case (§4.6 step 1).
    fn handle_interrupt(&self) -> bool;

    /// Called from the timeout thunk once it has reported the timeout, to
    /// unblock whatever was waiting on the preemption (§4.5).
    fn notify_timeout_received(&self);

    /// Rewrite the 32-bit displacement of the branch at `edge.offset` inside
    /// `chunk` to point at its preemption thunk instead of the loop head
    /// (§4.5: "rewrites the 32-bit displacement of the branch ... to point
    /// to the thunk instead of the loop head. The branch remains in place;
    /// only its target changes.").
    fn preempt_loop_edge(&self, chunk: &CodeChunk, edge: &crate::runtime::LoopEdge) {
        chunk.patch_i32_at(edge.offset as usize, edge.disp32);
    }
}

/// A watchdog reference implementation for tests: interrupt state is a
/// plain flag the test sets directly, with no real timer thread.
#[derive(Default)]
pub struct TestWatchdog {
    preemption_pending: std::sync::atomic::AtomicBool,
    timeout_notified: std::sync::atomic::AtomicBool,
}

impl TestWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the timer firing: the next `handle_interrupt()` call will
    /// report a pending preemption.
    pub fn request_preemption(&self) {
        self.preemption_pending.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn timeout_was_notified(&self) -> bool {
        self.timeout_notified.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Watchdog for TestWatchdog {
    fn handle_interrupt(&self) -> bool {
        !self.preemption_pending.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn notify_timeout_received(&self) {
        self.timeout_notified.store(true, std::sync::atomic::Ordering::SeqCst);
        self.preemption_pending.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{BoxedAllocator, ExecutableMemoryAllocator, LoopEdge};

    #[test]
    fn handle_interrupt_reports_pending_preemption() {
        let wd = TestWatchdog::new();
        assert!(wd.handle_interrupt());
        wd.request_preemption();
        assert!(!wd.handle_interrupt());
    }

    #[test]
    fn notify_timeout_clears_pending_state() {
        let wd = TestWatchdog::new();
        wd.request_preemption();
        wd.notify_timeout_received();
        assert!(wd.timeout_was_notified());
        assert!(wd.handle_interrupt());
    }

    #[test]
    fn preempt_loop_edge_retargets_branch_only() {
        let chunk = BoxedAllocator.publish(&[0u8; 8]).unwrap();
        let wd = TestWatchdog::new();
        let edge = LoopEdge { offset: 0, disp32: 99 };
        wd.preempt_loop_edge(&chunk, &edge);
        assert_eq!(&chunk.as_slice()[0..4], &99i32.to_le_bytes());
        assert_eq!(&chunk.as_slice()[4..8], &[0u8; 4]);
    }
}
