//! Channel layout extraction and sample copy between buffers.

use core::ptr;

use smallvec::SmallVec;

use crate::buffer::SampleBuffer;
use crate::format::SampleRepresentation;
use crate::{Error, Result};

#[derive(Clone, Copy)]
struct ChannelLayout {
    base: *mut u8,
    stride: usize,
}

/// Per-channel base pointers and strides derived from declared region sizes.
pub(crate) struct BufferLayout {
    channels: SmallVec<[ChannelLayout; 8]>,
    frame_length: u32,
}

impl BufferLayout {
    pub(crate) fn of(buffer: &SampleBuffer) -> Result<Self> {
        let sample_bytes = buffer.format().bytes_per_sample();
        let mut channels = SmallVec::new();
        let mut frame_length: Option<u32> = None;

        for (index, region) in buffer.regions().iter().enumerate() {
            let frames = region.frames(sample_bytes);
            match frame_length {
                None => frame_length = Some(frames),
                Some(expected) if expected != frames => {
                    return Err(Error::InvalidBuffer {
                        region: index,
                        frames,
                        expected,
                    });
                }
                Some(_) => {}
            }
            let stride = region.channels as usize;
            for ch in 0..stride {
                // SAFETY: `ch * sample_bytes` is inside the region's first frame.
                let base = unsafe { region.as_ptr().add(ch * sample_bytes) };
                channels.push(ChannelLayout { base, stride });
            }
        }

        Ok(Self {
            channels,
            frame_length: frame_length.unwrap_or(0),
        })
    }

    #[inline]
    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub(crate) fn frame_length(&self) -> u32 {
        self.frame_length
    }
}

/// Copies `length` frames of every source channel into the destination.
///
/// Windows and channel counts must already be validated against both layouts.
/// Source and destination may share storage.
pub(crate) fn copy_frames(
    src: &BufferLayout,
    dst: &BufferLayout,
    representation: SampleRepresentation,
    src_offset: u32,
    dst_offset: u32,
    length: u32,
) {
    let sample_bytes = representation.byte_count();
    let (src_offset, dst_offset, length) = (src_offset as usize, dst_offset as usize, length as usize);

    for (s, d) in src.channels.iter().zip(dst.channels.iter()) {
        // SAFETY: offsets and lengths were checked against both frame lengths,
        // so every access stays within the declared region bytes. Bases are
        // aligned to the sample size because storage is 8-byte aligned.
        unsafe {
            let from = s.base.add(src_offset * sample_bytes * s.stride);
            let to = d.base.add(dst_offset * sample_bytes * d.stride);

            if s.stride == 1 && d.stride == 1 {
                ptr::copy(from, to, length * sample_bytes);
                continue;
            }

            match representation {
                SampleRepresentation::Float32 => {
                    strided_copy(from.cast::<f32>(), s.stride, to.cast::<f32>(), d.stride, length)
                }
                SampleRepresentation::Float64 => {
                    strided_copy(from.cast::<f64>(), s.stride, to.cast::<f64>(), d.stride, length)
                }
                SampleRepresentation::Int16 | SampleRepresentation::Fixed824 => {
                    for frame in 0..length {
                        ptr::copy(
                            from.add(frame * sample_bytes * s.stride),
                            to.add(frame * sample_bytes * d.stride),
                            sample_bytes,
                        );
                    }
                }
            }
        }
    }
}

/// # Safety
/// `from`/`to` must be valid for `length` strided reads/writes.
#[inline]
unsafe fn strided_copy<T: Copy>(from: *const T, from_stride: usize, to: *mut T, to_stride: usize, length: usize) {
    for frame in 0..length {
        let value = ptr::read(from.add(frame * from_stride));
        ptr::write(to.add(frame * to_stride), value);
    }
}
