//! Lock-free primitives shared between the render and control threads.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use atomic_float::AtomicF64;

use crate::time::Time;

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

const HOST_VALID: u8 = 0b001;
const SAMPLE_VALID: u8 = 0b010;
const STORED: u8 = 0b100;

/// Single-writer [`Time`] cell.
///
/// The render thread stores, any thread loads. Readers retry while a store
/// is in progress (sequence counter is odd or changed during the read).
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicTime {
    sequence: AtomicU64,
    flags: AtomicU8,
    host_time: AtomicU64,
    sample_position: AtomicF64,
    sample_rate: AtomicF64,
}

impl AtomicTime {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            flags: AtomicU8::new(0),
            host_time: AtomicU64::new(0),
            sample_position: AtomicF64::new(0.0),
            sample_rate: AtomicF64::new(0.0),
        }
    }

    /// Must not be called from two threads at once.
    pub fn store(&self, time: &Time) {
        let mut flags = STORED;
        if time.is_host_time_valid() {
            flags |= HOST_VALID;
        }
        if time.is_sample_time_valid() {
            flags |= SAMPLE_VALID;
        }

        self.sequence.fetch_add(1, Ordering::SeqCst);
        self.flags.store(flags, Ordering::SeqCst);
        self.host_time
            .store(time.host_time().unwrap_or(0), Ordering::SeqCst);
        self.sample_position
            .store(time.sample_position().unwrap_or(0.0), Ordering::SeqCst);
        self.sample_rate.store(time.sample_rate(), Ordering::SeqCst);
        self.sequence.fetch_add(1, Ordering::SeqCst);
    }

    /// Most recently stored time, `None` before the first store or after
    /// [`clear`](Self::clear).
    pub fn load(&self) -> Option<Time> {
        loop {
            let before = self.sequence.load(Ordering::SeqCst);
            if before % 2 == 1 {
                core::hint::spin_loop();
                continue;
            }
            let flags = self.flags.load(Ordering::SeqCst);
            let host_time = self.host_time.load(Ordering::SeqCst);
            let sample_position = self.sample_position.load(Ordering::SeqCst);
            let sample_rate = self.sample_rate.load(Ordering::SeqCst);
            if self.sequence.load(Ordering::SeqCst) != before {
                core::hint::spin_loop();
                continue;
            }

            if flags & STORED == 0 {
                return None;
            }
            let host_time = (flags & HOST_VALID != 0).then_some(host_time);
            let sample_position = (flags & SAMPLE_VALID != 0).then_some(sample_position);
            return Some(Time::from_parts(host_time, sample_position, sample_rate));
        }
    }

    pub fn clear(&self) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        self.flags.store(0, Ordering::SeqCst);
        self.sequence.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for AtomicTime {
    fn default() -> Self {
        Self::new()
    }
}
