//! The executable-memory allocator (spec.md §6's `LinkCode` collaborator).
//!
//! On unix this is a real `mmap`/`mprotect`-backed allocator: pages are
//! mapped RWX up front, matching spec.md §5's statement that "the deployment
//! assumes W^X is relaxed." Off unix (and wherever `libc` is unavailable) a
//! boxed-buffer fallback stands in so the crate still builds and the driver
//! is still exercisable, at the cost of never actually executing the bytes.

use thiserror::Error;

/// Failure publishing a finished assembler buffer as executable memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("executable memory allocation failed for {requested} bytes")]
    OutOfMemory { requested: usize },
}

/// A published block of executable native code (§3 "Code chunk").
///
/// Invariant carried from spec.md §3: once `base()` is nonzero, the bytes it
/// points at are never rewritten except by the thunk patcher (call targets
/// only) and the watchdog (known loop-edge thunk slots only). This type does
/// not enforce that on its own — it hands out the raw pointer and trusts its
/// two callers.
pub struct CodeChunk {
    backing: ChunkBacking,
    len: usize,
}

enum ChunkBacking {
    #[cfg(unix)]
    Mapped { ptr: *mut u8, mapped_len: usize },
    Boxed(Box<[u8]>),
}

// Safety: the chunk is immutable published machine code after construction;
// the only mutations are single-word patches performed through `patch_at`,
// which callers serialize themselves (method-info lock, watchdog being the
// sole owner of loop-edge slots).
unsafe impl Send for CodeChunk {}
unsafe impl Sync for CodeChunk {}

impl CodeChunk {
    /// Base address of the published code, or 0 if this chunk represents a
    /// failed publish (callers should prefer `LinkError` instead of relying
    /// on this, but §6 explicitly defines "nonzero base means success").
    pub fn base(&self) -> usize {
        match &self.backing {
            #[cfg(unix)]
            ChunkBacking::Mapped { ptr, .. } => *ptr as usize,
            ChunkBacking::Boxed(bytes) => bytes.as_ptr() as usize,
        }
    }

    /// Length in bytes of the published region.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw bytes, for test assertions and cip-map/loop-edge bookkeeping.
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            #[cfg(unix)]
            ChunkBacking::Mapped { ptr, .. } => unsafe { std::slice::from_raw_parts(*ptr, self.len) },
            ChunkBacking::Boxed(bytes) => bytes,
        }
    }

    /// Overwrite a 4-byte displacement at `offset`. Used by the thunk
    /// patcher for call-site rewrites and by the watchdog for loop-edge
    /// retargeting (§4.5, §4.6) — the only two writers spec.md permits
    /// against published code.
    ///
    /// Callers are responsible for the single-writer discipline spec.md §5
    /// requires (method-info lock / watchdog exclusivity); this method does
    /// not itself serialize concurrent callers.
    pub fn patch_i32_at(&self, offset: usize, value: i32) {
        assert!(offset + 4 <= self.len, "patch site out of bounds");
        let bytes = value.to_le_bytes();
        match &self.backing {
            #[cfg(unix)]
            ChunkBacking::Mapped { ptr, .. } => unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(offset), 4);
            },
            ChunkBacking::Boxed(b) => {
                // Boxed backing is only reachable off-unix or in the fallback
                // allocator; it is never actually executed, so an interior
                // mutation through a shared reference is safe here — it
                // exists purely so patch semantics are testable everywhere.
                let slice = b.as_ref();
                let ptr = slice.as_ptr() as *mut u8;
                unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(offset), 4) };
            }
        }
    }
}

#[cfg(unix)]
impl Drop for CodeChunk {
    fn drop(&mut self) {
        if let ChunkBacking::Mapped { ptr, mapped_len } = self.backing {
            unsafe {
                libc::munmap(ptr as *mut libc::c_void, mapped_len);
            }
        }
    }
}

/// Publishes a finished instruction stream as an executable `CodeChunk`.
///
/// Spec.md §6: `LinkCode(env, assembler) -> CodeChunk`. The `env` parameter
/// in the spec's signature is the environment collaborator (for diagnostics
/// on failure); here that's folded into the caller logging through
/// `Environment::debugger()` before calling this, since the allocator itself
/// has no use for it.
pub trait ExecutableMemoryAllocator {
    fn publish(&self, bytes: &[u8]) -> Result<CodeChunk, LinkError>;
}

/// Real mmap/mprotect allocator, used on unix targets.
#[cfg(unix)]
pub struct MmapAllocator;

#[cfg(unix)]
impl ExecutableMemoryAllocator for MmapAllocator {
    fn publish(&self, bytes: &[u8]) -> Result<CodeChunk, LinkError> {
        let page_size = 4096usize;
        let len = bytes.len().max(1);
        let mapped_len = len.div_ceil(page_size) * page_size;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(LinkError::OutOfMemory { requested: mapped_len });
        }
        let ptr = ptr as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        }
        Ok(CodeChunk { backing: ChunkBacking::Mapped { ptr, mapped_len }, len: bytes.len() })
    }
}

/// Fallback allocator for non-unix targets: a boxed buffer that is never
/// actually executed. Keeps the crate buildable and the driver testable
/// everywhere, at the cost of the RWX guarantee real deployments need.
pub struct BoxedAllocator;

impl ExecutableMemoryAllocator for BoxedAllocator {
    fn publish(&self, bytes: &[u8]) -> Result<CodeChunk, LinkError> {
        let boxed: Box<[u8]> = bytes.to_vec().into_boxed_slice();
        let len = boxed.len();
        Ok(CodeChunk { backing: ChunkBacking::Boxed(boxed), len })
    }
}

/// The allocator a host would use by default: mmap on unix, boxed buffer
/// elsewhere.
#[cfg(unix)]
pub fn default_allocator() -> impl ExecutableMemoryAllocator {
    MmapAllocator
}

#[cfg(not(unix))]
pub fn default_allocator() -> impl ExecutableMemoryAllocator {
    BoxedAllocator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_allocator_publishes_nonzero_base() {
        let alloc = BoxedAllocator;
        let chunk = alloc.publish(&[1, 2, 3, 4]).unwrap();
        assert_ne!(chunk.base(), 0);
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn patch_overwrites_displacement() {
        let alloc = BoxedAllocator;
        let chunk = alloc.publish(&[0, 0, 0, 0, 0xAA]).unwrap();
        chunk.patch_i32_at(0, -1);
        assert_eq!(&chunk.as_slice()[0..4], &(-1i32).to_le_bytes());
        assert_eq!(chunk.as_slice()[4], 0xAA);
    }

    #[cfg(unix)]
    #[test]
    fn mmap_allocator_publishes_executable_chunk() {
        let alloc = MmapAllocator;
        let chunk = alloc.publish(&[0xC3]).unwrap();
        assert_ne!(chunk.base(), 0);
        assert_eq!(chunk.as_slice(), &[0xC3]);
    }
}
