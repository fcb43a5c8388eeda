//! Entry-frame discovery (spec.md §4.7, §6 "JitFrameIterator").
//!
//! Real native frame walking is ABI- and host-specific and out of scope
//! (§1); what's specified is the shape of the walk and its stopping
//! condition, so `find_entry_fp` is generic over anything that can hand
//! back a `Frame` for a given frame pointer.

/// The two frame kinds the walk distinguishes. Everything between the
/// deepest frame and the entry frame is a `Scripted` frame; `Entry` is the
/// frame the host held when it first re-entered scripted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Scripted,
    Entry,
}

/// One native frame as seen by the iterator: its kind, and the frame
/// pointer of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub prev_fp: usize,
}

/// Forward-only iterator over native frames (§6 `JitFrameIterator`).
pub trait JitFrameIterator {
    /// Look up the frame at `fp`. Returns `None` once the walk runs off the
    /// chain (should not happen for a well-formed entry-to-scripted stack).
    fn frame(&self, fp: usize) -> Option<Frame>;
}

/// Walk the frame chain from `from_fp` outward, returning the `prev_fp` of
/// the first `Entry` frame encountered (§4.7).
///
/// Used by the generic `report_error` tail to unwind the entire scripted
/// call stack in one shot (§4.4 "creates an exit frame ... calls into the
/// runtime's report_error(int) helper").
pub fn find_entry_fp(iter: &impl JitFrameIterator, from_fp: usize) -> Option<usize> {
    let mut fp = from_fp;
    loop {
        let frame = iter.frame(fp)?;
        if frame.frame_type == FrameType::Entry {
            return Some(frame.prev_fp);
        }
        fp = frame.prev_fp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    struct FakeStack(FxHashMap<usize, Frame>);

    impl JitFrameIterator for FakeStack {
        fn frame(&self, fp: usize) -> Option<Frame> {
            self.0.get(&fp).copied()
        }
    }

    #[test]
    fn walks_to_first_entry_frame() {
        let mut frames = FxHashMap::default();
        frames.insert(300, Frame { frame_type: FrameType::Scripted, prev_fp: 200 });
        frames.insert(200, Frame { frame_type: FrameType::Scripted, prev_fp: 100 });
        frames.insert(100, Frame { frame_type: FrameType::Entry, prev_fp: 8 });
        let stack = FakeStack(frames);

        assert_eq!(find_entry_fp(&stack, 300), Some(8));
    }

    #[test]
    fn single_entry_frame_resolves_directly() {
        let mut frames = FxHashMap::default();
        frames.insert(100, Frame { frame_type: FrameType::Entry, prev_fp: 8 });
        let stack = FakeStack(frames);
        assert_eq!(find_entry_fp(&stack, 100), Some(8));
    }
}
