//! Channel-mapped views onto another buffer's memory.
//!
//! A view borrows the storage of the source channels it maps and leaves
//! the source suspended at zero frames until the view is dropped. Unmapped
//! channels read a zero region lent from a process-wide pool, so two live
//! views never share one.

use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender};
use smallvec::SmallVec;

use crate::buffer::storage::{Region, RegionStorage};
use crate::buffer::SampleBuffer;
use crate::config::MAX_FRAMES_LIMIT;
use crate::format::Format;
use crate::{Error, Result};

/// Bytes in one zero region: a full slice of the widest sample type.
pub const ZERO_SCRATCH_CAPACITY: usize = MAX_FRAMES_LIMIT as usize * 8;

const ZERO_POOL_CAPACITY: usize = 32;

/// Idle zero regions, shared by every thread.
struct ZeroPool {
    idle_tx: Sender<Arc<RegionStorage>>,
    idle_rx: Receiver<Arc<RegionStorage>>,
}

impl ZeroPool {
    fn new(capacity: usize) -> Self {
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(capacity);
        Self { idle_tx, idle_rx }
    }

    fn warm(&self) {
        if !self.idle_tx.is_full() {
            let _ = self
                .idle_tx
                .try_send(RegionStorage::zeroed(ZERO_SCRATCH_CAPACITY));
        }
    }

    /// Takes an idle region, allocating when none is left.
    fn lend(&self) -> Arc<RegionStorage> {
        self.idle_rx
            .try_recv()
            .unwrap_or_else(|_| RegionStorage::zeroed(ZERO_SCRATCH_CAPACITY))
    }

    /// Returns a region unless some buffer still holds it.
    fn give_back(&self, mut storage: Arc<RegionStorage>) {
        if Arc::get_mut(&mut storage).is_some() {
            let _ = self.idle_tx.try_send(storage);
        }
    }
}

fn zero_pool() -> &'static ZeroPool {
    static POOL: OnceLock<ZeroPool> = OnceLock::new();
    POOL.get_or_init(|| ZeroPool::new(ZERO_POOL_CAPACITY))
}

/// Adds an idle zero region to the pool, so a render thread can map
/// channels without allocating.
pub(crate) fn warm_zero_scratch() {
    zero_pool().warm();
}

/// A buffer whose channels alias another buffer's channels.
///
/// Channel `n` aliases source channel `channel_map[n]`; a map entry of `-1`
/// reads a zero-filled region owned by this view. Writes to an unmapped
/// channel are discarded when the view is dropped.
///
/// The view borrows its source mutably for its whole lifetime and is not
/// `Send`. The source reads as empty until the view is dropped, which
/// hands the borrowed storage back. Storage the view no longer holds at
/// that point is replaced with zeroed storage in the source.
pub struct MappedBuffer<'a> {
    buffer: SampleBuffer,
    source: &'a mut SampleBuffer,
    saved: (u32, u32),
    /// Source channels whose storage the view borrowed.
    lent: SmallVec<[usize; 8]>,
    scratch: Option<Arc<RegionStorage>>,
    _not_send: PhantomData<*const ()>,
}

impl SampleBuffer {
    /// Builds a channel-mapped view of `source` with the layout of `format`.
    pub fn channel_mapped<'a>(
        format: Format,
        source: &'a mut SampleBuffer,
        channel_map: &[i32],
    ) -> Result<MappedBuffer<'a>> {
        let source_format = *source.format();

        if channel_map.len() != format.channel_count() as usize {
            return Err(Error::InvalidArgument(format!(
                "channel map has {} entries for {} channels",
                channel_map.len(),
                format.channel_count()
            )));
        }
        if format.is_interleaved() || source_format.is_interleaved() {
            return Err(Error::InvalidArgument(
                "channel mapping requires non-interleaved formats".into(),
            ));
        }
        if format.representation() != source_format.representation() {
            return Err(Error::InvalidArgument(format!(
                "representation {} does not match source {}",
                format.representation(),
                source_format.representation()
            )));
        }

        let frame_length = source.frame_length();
        let byte_size = frame_length as usize * format.bytes_per_frame();
        let source_channels = source_format.channel_count();

        for &entry in channel_map {
            if entry < 0 {
                if byte_size > ZERO_SCRATCH_CAPACITY {
                    return Err(Error::Overflow {
                        needed: byte_size,
                        capacity: ZERO_SCRATCH_CAPACITY,
                    });
                }
                continue;
            }
            let channel = entry as u32;
            if channel >= source_channels {
                return Err(Error::out_of_range("channel", channel, source_channels));
            }
            let actual = source.regions()[channel as usize].frames(format.bytes_per_sample());
            if actual != frame_length {
                return Err(Error::InvalidArgument(format!(
                    "source channel {channel} holds {actual} frames, frame length is {frame_length}"
                )));
            }
        }

        let mut regions: SmallVec<[Region; 8]> = SmallVec::with_capacity(channel_map.len());
        let mut lent: SmallVec<[usize; 8]> = SmallVec::new();
        let mut scratch: Option<Arc<RegionStorage>> = None;

        for &entry in channel_map {
            let storage = if entry < 0 {
                let storage = scratch.get_or_insert_with(|| {
                    let storage = zero_pool().lend();
                    storage.zero_prefix(byte_size);
                    storage
                });
                Arc::clone(storage)
            } else {
                let channel = entry as usize;
                if !lent.contains(&channel) {
                    lent.push(channel);
                }
                Arc::clone(&source.regions()[channel].storage)
            };
            regions.push(Region {
                storage,
                channels: 1,
                byte_size,
            });
        }

        let saved = source.suspend();
        Ok(MappedBuffer {
            buffer: SampleBuffer::from_regions(format, regions, frame_length),
            source,
            saved,
            lent,
            scratch,
            _not_send: PhantomData,
        })
    }
}

impl Deref for MappedBuffer<'_> {
    type Target = SampleBuffer;

    fn deref(&self) -> &SampleBuffer {
        &self.buffer
    }
}

impl DerefMut for MappedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut SampleBuffer {
        &mut self.buffer
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        let held = self.buffer.take_regions();
        let regions = self.source.regions_mut();
        // Storage that left with a buffer moved out of the view stays there.
        let mut moved_out: SmallVec<[*const RegionStorage; 8]> = SmallVec::new();
        for &channel in &self.lent {
            let Some(region) = regions.get(channel) else {
                continue;
            };
            if !held.iter().any(|view| Arc::ptr_eq(&view.storage, &region.storage)) {
                moved_out.push(Arc::as_ptr(&region.storage));
            }
        }
        for region in regions.iter_mut() {
            if moved_out.contains(&Arc::as_ptr(&region.storage)) {
                region.storage = RegionStorage::zeroed(region.storage.byte_len());
            }
        }
        drop(held);
        self.source.resume(self.saved);

        if let Some(storage) = self.scratch.take() {
            zero_pool().give_back(storage);
        }
    }
}

impl core::fmt::Debug for MappedBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("MappedBuffer").field(&self.buffer).finish()
    }
}
