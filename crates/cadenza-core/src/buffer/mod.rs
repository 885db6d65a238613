//! Multi-channel PCM sample buffers.
//!
//! A [`SampleBuffer`] owns a [`Format`], a fixed frame capacity and a
//! mutable frame length. Its memory is split into one region per buffer of
//! the format (one region when interleaved, one per channel otherwise).
//! Every region's declared byte size is `frame_length * bytes_per_frame`.
//!
//! Buffers built with [`SampleBuffer::channel_mapped`] borrow another
//! buffer's regions; see [`MappedBuffer`].

mod channel_map;
mod copy;
mod enumerator;
mod sample;
pub(crate) mod storage;

use core::fmt;

use smallvec::SmallVec;

pub use channel_map::{MappedBuffer, ZERO_SCRATCH_CAPACITY};
pub(crate) use channel_map::warm_zero_scratch;
pub use enumerator::{ChannelSamples, ChannelSamplesMut, FrameEnumerator};
pub use sample::Sample;

use crate::format::Format;
use crate::{Error, Result};
use copy::BufferLayout;
use storage::Region;

pub struct SampleBuffer {
    format: Format,
    regions: SmallVec<[Region; 8]>,
    frame_capacity: u32,
    frame_length: u32,
}

impl SampleBuffer {
    /// Allocates a zeroed buffer whose frame length starts at capacity.
    pub fn new(format: Format, frame_capacity: u32) -> Result<Self> {
        if frame_capacity == 0 {
            return Err(Error::InvalidArgument(
                "frame_capacity must be at least 1".into(),
            ));
        }
        let byte_capacity = frame_capacity as usize * format.bytes_per_frame();
        let regions = (0..format.buffer_count())
            .map(|_| Region::owned(format.stride(), byte_capacity))
            .collect();
        Ok(Self {
            format,
            regions,
            frame_capacity,
            frame_length: frame_capacity,
        })
    }

    pub(crate) fn from_regions(format: Format, regions: SmallVec<[Region; 8]>, frame_length: u32) -> Self {
        Self {
            format,
            regions,
            frame_capacity: frame_length,
            frame_length,
        }
    }

    #[inline]
    pub fn format(&self) -> &Format {
        &self.format
    }

    #[inline]
    pub fn frame_capacity(&self) -> u32 {
        self.frame_capacity
    }

    #[inline]
    pub fn frame_length(&self) -> u32 {
        self.frame_length
    }

    /// Number of memory regions.
    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.regions.len()
    }

    /// Declared byte size of region `buf_idx`.
    pub fn data_byte_size(&self, buf_idx: usize) -> Result<usize> {
        self.region(buf_idx).map(|region| region.byte_size)
    }

    #[inline]
    pub(crate) fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[inline]
    pub(crate) fn regions_mut(&mut self) -> &mut [Region] {
        &mut self.regions
    }

    pub(crate) fn take_regions(&mut self) -> SmallVec<[Region; 8]> {
        core::mem::take(&mut self.regions)
    }

    /// Shrinks the buffer to zero frames and returns `(capacity, length)`
    /// for [`resume`](Self::resume).
    pub(crate) fn suspend(&mut self) -> (u32, u32) {
        let saved = (self.frame_capacity, self.frame_length);
        self.frame_capacity = 0;
        self.frame_length = 0;
        for region in &mut self.regions {
            region.byte_size = 0;
        }
        saved
    }

    pub(crate) fn resume(&mut self, (frame_capacity, frame_length): (u32, u32)) {
        self.frame_capacity = frame_capacity;
        self.frame_length = frame_length;
        let byte_size = frame_length as usize * self.format.bytes_per_frame();
        for region in &mut self.regions {
            region.byte_size = byte_size;
        }
    }

    fn region(&self, buf_idx: usize) -> Result<&Region> {
        self.regions
            .get(buf_idx)
            .ok_or_else(|| Error::out_of_range("buffer", buf_idx as u64, self.regions.len() as u64))
    }

    /// Sets the valid frame count without reallocating.
    pub fn set_frame_length(&mut self, frame_length: u32) -> Result<()> {
        if frame_length > self.frame_capacity {
            return Err(Error::out_of_range(
                "frame_length",
                frame_length,
                self.frame_capacity,
            ));
        }
        let byte_size = frame_length as usize * self.format.bytes_per_frame();
        for region in &mut self.regions {
            region.byte_size = byte_size;
        }
        self.frame_length = frame_length;
        Ok(())
    }

    /// Zeroes `length` frames starting at `start` in every channel.
    pub fn clear_range(&mut self, start: u32, length: u32) -> Result<()> {
        let end = start as u64 + length as u64;
        if end > self.frame_length as u64 {
            return Err(Error::out_of_range("frame", end, self.frame_length));
        }
        let bytes_per_frame = self.format.bytes_per_frame();
        for region in &self.regions {
            // SAFETY: the window lies within the declared byte size.
            unsafe {
                core::ptr::write_bytes(
                    region.as_ptr().add(start as usize * bytes_per_frame),
                    0,
                    length as usize * bytes_per_frame,
                );
            }
        }
        Ok(())
    }

    /// Zeroes the whole valid length.
    pub fn clear(&mut self) {
        let bytes = self.frame_length as usize * self.format.bytes_per_frame();
        for region in &self.regions {
            // SAFETY: `bytes` is the declared byte size of every region.
            unsafe { core::ptr::write_bytes(region.as_ptr(), 0, bytes) }
        }
    }

    /// Restores frame length to capacity and zeroes everything.
    pub fn reset(&mut self) {
        self.frame_length = self.frame_capacity;
        let bytes = self.frame_capacity as usize * self.format.bytes_per_frame();
        for region in &mut self.regions {
            region.byte_size = bytes;
        }
        self.clear();
    }

    /// Copies frames from `source` and returns how many were copied.
    ///
    /// `length` of `None` copies every source frame after `src_offset`. When
    /// both offsets are 0 and `length` is `None`, this buffer's frame length
    /// becomes the copied count.
    pub fn copy_from(
        &mut self,
        source: &SampleBuffer,
        src_offset: u32,
        dst_offset: u32,
        length: Option<u32>,
    ) -> Result<u32> {
        let src_format = source.format();
        if src_format.representation() != self.format.representation() {
            return Err(Error::InvalidFormat(format!(
                "representation {} does not match {}",
                src_format.representation(),
                self.format.representation()
            )));
        }
        if src_format.channel_count() != self.format.channel_count() {
            return Err(Error::InvalidFormat(format!(
                "{} source channels, {} destination channels",
                src_format.channel_count(),
                self.format.channel_count()
            )));
        }

        let src = BufferLayout::of(source)?;
        let dst = BufferLayout::of(self)?;

        let copy_length = length.unwrap_or_else(|| src.frame_length().saturating_sub(src_offset));
        let src_end = src_offset as u64 + copy_length as u64;
        if src_end > src.frame_length() as u64 {
            return Err(Error::out_of_range("source frame", src_end, src.frame_length()));
        }
        let dst_end = dst_offset as u64 + copy_length as u64;
        if dst_end > dst.frame_length() as u64 {
            return Err(Error::out_of_range(
                "destination frame",
                dst_end,
                dst.frame_length(),
            ));
        }
        if src.channel_count() > dst.channel_count() {
            return Err(Error::out_of_range(
                "channel",
                src.channel_count() as u64,
                dst.channel_count() as u64,
            ));
        }

        copy::copy_frames(
            &src,
            &dst,
            self.format.representation(),
            src_offset,
            dst_offset,
            copy_length,
        );

        if src_offset == 0 && dst_offset == 0 && length.is_none() {
            self.set_frame_length(copy_length)?;
        }
        Ok(copy_length)
    }

    /// Samples of region `buf_idx`, `frame_length * stride` long.
    pub fn data<T: Sample>(&self, buf_idx: usize) -> Result<&[T]> {
        self.check_representation::<T>()?;
        let region = self.region(buf_idx)?;
        let len = region.byte_size / core::mem::size_of::<T>();
        // SAFETY: the region is aligned for `T` and holds `byte_size` bytes.
        // Storage is shared only between a channel-mapped view and its
        // suspended source, which exposes zero bytes.
        Ok(unsafe { core::slice::from_raw_parts(region.as_ptr().cast::<T>(), len) })
    }

    pub fn data_mut<T: Sample>(&mut self, buf_idx: usize) -> Result<&mut [T]> {
        self.check_representation::<T>()?;
        let region = self.region(buf_idx)?;
        let len = region.byte_size / core::mem::size_of::<T>();
        // SAFETY: as in `data`; `&mut self` excludes every other slice into
        // this buffer's regions.
        Ok(unsafe { core::slice::from_raw_parts_mut(region.as_ptr().cast::<T>(), len) })
    }

    /// Iterator over the valid samples of channel `ch`.
    pub fn channel<T: Sample>(&self, ch: u32) -> Result<ChannelSamples<'_, T>> {
        let (buf_idx, start, stride) = self.channel_position(ch)?;
        let frames = self.frame_length as usize;
        Ok(ChannelSamples::new(self.data::<T>(buf_idx)?, start, stride, frames))
    }

    pub fn channel_mut<T: Sample>(&mut self, ch: u32) -> Result<ChannelSamplesMut<'_, T>> {
        let (buf_idx, start, stride) = self.channel_position(ch)?;
        let frames = self.frame_length as usize;
        Ok(ChannelSamplesMut::new(
            self.data_mut::<T>(buf_idx)?,
            start,
            stride,
            frames,
        ))
    }

    /// Cursor over every sample, frame by frame.
    pub fn frames<T: Sample>(&self) -> Result<FrameEnumerator<'_, T>> {
        let channels = (0..self.format.channel_count())
            .map(|ch| self.channel::<T>(ch))
            .collect::<Result<SmallVec<_>>>()?;
        Ok(FrameEnumerator::new(channels, self.frame_length as usize))
    }

    fn channel_position(&self, ch: u32) -> Result<(usize, usize, usize)> {
        let count = self.format.channel_count();
        if ch >= count {
            return Err(Error::out_of_range("channel", ch, count));
        }
        Ok(if self.format.is_interleaved() {
            (0, ch as usize, count as usize)
        } else {
            (ch as usize, 0, 1)
        })
    }

    fn check_representation<T: Sample>(&self) -> Result<()> {
        if T::REPRESENTATION != self.format.representation() {
            return Err(Error::InvalidFormat(format!(
                "buffer holds {}, requested {}",
                self.format.representation(),
                T::REPRESENTATION
            )));
        }
        Ok(())
    }
}

/// Deep copy into owned storage of the same capacity.
impl Clone for SampleBuffer {
    fn clone(&self) -> Self {
        let byte_capacity = self.frame_capacity as usize * self.format.bytes_per_frame();
        Self {
            format: self.format,
            regions: self
                .regions
                .iter()
                .map(|region| region.deep_copy(byte_capacity))
                .collect(),
            frame_capacity: self.frame_capacity,
            frame_length: self.frame_length,
        }
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("format", &self.format)
            .field("frame_capacity", &self.frame_capacity)
            .field("frame_length", &self.frame_length)
            .finish()
    }
}
