//! Raw sample memory shared between buffers.
//!
//! A [`RegionStorage`] is a zero-initialised, 8-byte aligned allocation.
//! Buffers hold the only reference to their storage, except while a
//! channel-mapped view borrows it from a suspended source.

use core::ptr::NonNull;
use std::sync::Arc;

/// Heap block backing one or more buffer regions.
pub(crate) struct RegionStorage {
    ptr: NonNull<u64>,
    words: usize,
}

// SAFETY: the storage is a plain heap block reached only through buffers.
// Buffers share a block only while all but one of them are suspended to
// zero bytes, and a view that no longer holds its lent storage on drop hands
// the source a fresh block.
unsafe impl Send for RegionStorage {}
unsafe impl Sync for RegionStorage {}

impl RegionStorage {
    pub(crate) fn zeroed(byte_len: usize) -> Arc<Self> {
        let words = byte_len.div_ceil(8).max(1);
        let block: &mut [u64] = Box::leak(vec![0u64; words].into_boxed_slice());
        Arc::new(Self {
            ptr: NonNull::from(block).cast::<u64>(),
            words,
        })
    }

    #[inline]
    pub(crate) fn byte_len(&self) -> usize {
        self.words * 8
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr().cast::<u8>()
    }

    /// Zeroes the first `len` bytes.
    pub(crate) fn zero_prefix(&self, len: usize) {
        let len = len.min(self.byte_len());
        // SAFETY: `len` is clamped to the allocation.
        unsafe { core::ptr::write_bytes(self.as_ptr(), 0, len) }
    }
}

impl Drop for RegionStorage {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`words` came from the leaked boxed slice in `zeroed`.
        unsafe {
            drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.words,
            )));
        }
    }
}

/// One contiguous region of a buffer: a storage reference plus the number of
/// interleaved channels it carries and its declared valid byte size.
#[derive(Clone)]
pub(crate) struct Region {
    pub(crate) storage: Arc<RegionStorage>,
    pub(crate) channels: u32,
    pub(crate) byte_size: usize,
}

impl Region {
    pub(crate) fn owned(channels: u32, byte_capacity: usize) -> Self {
        Self {
            storage: RegionStorage::zeroed(byte_capacity),
            channels,
            byte_size: byte_capacity,
        }
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.storage.as_ptr()
    }

    /// Frames the declared byte size holds, for the given sample width.
    #[inline]
    pub(crate) fn frames(&self, bytes_per_sample: usize) -> u32 {
        (self.byte_size / self.channels as usize / bytes_per_sample) as u32
    }

    /// Deep copy of the declared bytes into fresh storage of `byte_capacity`.
    pub(crate) fn deep_copy(&self, byte_capacity: usize) -> Self {
        let storage = RegionStorage::zeroed(byte_capacity);
        let len = self.byte_size.min(byte_capacity);
        // SAFETY: both blocks hold at least `len` bytes and are distinct.
        unsafe { core::ptr::copy_nonoverlapping(self.as_ptr(), storage.as_ptr(), len) }
        Self {
            storage,
            channels: self.channels,
            byte_size: self.byte_size,
        }
    }
}
