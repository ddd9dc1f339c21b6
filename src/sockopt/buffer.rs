//! Scoped scratch buffer for `getsockopt()`
//!
//! `getsockopt(fd, level, name, optval, optlen)` takes two out-parameters:
//! the value buffer, and its length *by reference*. The kernel writes at most
//! `*optlen` bytes and then stores how many it actually wrote back into
//! `*optlen`. [`RawBuffer`] owns both, for exactly one call.
//!
//! # Educational Notes
//!
//! ## RAII Pattern
//!
//! The buffer is acquired right before the syscall and released when the
//! `RawBuffer` goes out of scope, on every path: success, syscall error,
//! length mismatch, or a panic unwinding through the fetch. There is no
//! `free()` to forget.
//!
//! ```rust,ignore
//! {
//!     let mut buffer = RawBuffer::zeroed(104);   // allocated here
//!     getsockopt(fd, ..., buffer.as_mut_ptr(), buffer.len_mut());
//!     if ret != 0 { return Err(...); }           // released here...
//!     decode(buffer.as_bytes());
//! }                                              // ...or here
//! ```
//!
//! ## Why Zeroed?
//!
//! If the kernel writes fewer bytes than requested, the tail must not hold
//! leftover heap data. Zeroing keeps every byte of the buffer initialised, so
//! handing out `&[u8]` over the whole region is always sound.

use log::trace;

/// Heap scratch region plus its in/out length word
pub struct RawBuffer {
    bytes: Box<[u8]>,
    len: libc::socklen_t,
}

impl RawBuffer {
    /// Allocate `size` zeroed bytes with the length word pre-set to `size`
    #[must_use]
    pub fn zeroed(size: usize) -> Self {
        // Kernel structs are a few hundred bytes; socklen_t is at least 32 bits
        let len = libc::socklen_t::try_from(size).unwrap_or(libc::socklen_t::MAX);
        trace!("acquired {size} byte getsockopt buffer");
        Self {
            bytes: vec![0u8; size].into_boxed_slice(),
            len,
        }
    }

    /// Size requested from the kernel
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// `optval` argument
    pub fn as_mut_ptr(&mut self) -> *mut libc::c_void {
        self.bytes.as_mut_ptr().cast()
    }

    /// `optlen` argument
    pub fn len_mut(&mut self) -> &mut libc::socklen_t {
        &mut self.len
    }

    /// Length the kernel wrote back (equals `capacity()` until the call)
    #[must_use]
    pub fn returned_len(&self) -> usize {
        self.len as usize
    }

    /// The whole region, including any tail the kernel did not write
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        trace!("released {} byte getsockopt buffer", self.bytes.len());
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_buffer() {
        let buffer = RawBuffer::zeroed(104);
        assert_eq!(buffer.capacity(), 104);
        assert_eq!(buffer.returned_len(), 104);
        assert!(buffer.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_length_word_is_writable() {
        // Simulate the kernel shrinking optlen
        let mut buffer = RawBuffer::zeroed(104);
        *buffer.len_mut() = 92;
        assert_eq!(buffer.returned_len(), 92);
        assert_eq!(buffer.capacity(), 104);
    }

    #[test]
    fn test_buffers_are_independent() {
        let mut a = RawBuffer::zeroed(8);
        let b = RawBuffer::zeroed(8);
        unsafe { *a.as_mut_ptr().cast::<u8>() = 0xAB };
        assert_eq!(a.as_bytes()[0], 0xAB);
        assert_eq!(b.as_bytes()[0], 0);
    }
}
