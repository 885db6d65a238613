//! Strided sample cursors over buffer regions.

use smallvec::SmallVec;

use crate::buffer::Sample;
use crate::{Error, Result};

/// Read-only iterator over one channel's samples.
///
/// Cloning or calling [`reset`](Self::reset) restarts it from frame 0.
#[derive(Debug, Clone)]
pub struct ChannelSamples<'a, T> {
    data: &'a [T],
    start: usize,
    stride: usize,
    frames: usize,
    position: usize,
}

impl<'a, T: Sample> ChannelSamples<'a, T> {
    pub(crate) fn new(data: &'a [T], start: usize, stride: usize, frames: usize) -> Self {
        debug_assert!(frames == 0 || start + (frames - 1) * stride < data.len());
        Self {
            data,
            start,
            stride,
            frames,
            position: 0,
        }
    }

    /// Number of frames the channel holds.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Current frame position of the cursor.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn get(&self, frame: usize) -> Option<T> {
        if frame < self.frames {
            Some(self.data[self.start + frame * self.stride])
        } else {
            None
        }
    }

    pub fn set_position(&mut self, frame: usize) -> Result<()> {
        if frame > self.frames {
            return Err(Error::out_of_range("frame", frame as u64, self.frames as u64));
        }
        self.position = frame;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}

impl<T: Sample> Iterator for ChannelSamples<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let value = self.get(self.position)?;
        self.position += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frames - self.position;
        (remaining, Some(remaining))
    }
}

impl<T: Sample> ExactSizeIterator for ChannelSamples<'_, T> {}

/// Mutable view of one channel's samples.
#[derive(Debug)]
pub struct ChannelSamplesMut<'a, T> {
    data: &'a mut [T],
    start: usize,
    stride: usize,
    frames: usize,
}

impl<'a, T: Sample> ChannelSamplesMut<'a, T> {
    pub(crate) fn new(data: &'a mut [T], start: usize, stride: usize, frames: usize) -> Self {
        debug_assert!(frames == 0 || start + (frames - 1) * stride < data.len());
        Self {
            data,
            start,
            stride,
            frames,
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn get(&self, frame: usize) -> Option<T> {
        (frame < self.frames).then(|| self.data[self.start + frame * self.stride])
    }

    pub fn set(&mut self, frame: usize, value: T) -> Result<()> {
        if frame >= self.frames {
            return Err(Error::out_of_range("frame", frame as u64, self.frames as u64));
        }
        self.data[self.start + frame * self.stride] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.iter_mut().for_each(|sample| *sample = value);
    }

    /// Writes `values` from frame 0, stopping at whichever side ends first.
    pub fn write(&mut self, values: &[T]) -> usize {
        let mut written = 0;
        for (sample, value) in self.iter_mut().zip(values) {
            *sample = *value;
            written += 1;
        }
        written
    }

    pub fn iter(&self) -> ChannelSamples<'_, T> {
        ChannelSamples::new(self.data, self.start, self.stride, self.frames)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let data: &mut [T] = if self.frames == 0 {
            &mut []
        } else {
            &mut self.data[self.start..]
        };
        data.iter_mut()
            .step_by(self.stride)
            .take(self.frames)
    }
}

/// Cursor over every (frame, channel) sample of a buffer.
///
/// Advances channel-first: all channels of frame 0, then frame 1, and so on.
/// Positions are bounds-checked; moving past the end stops the cursor.
#[derive(Debug, Clone)]
pub struct FrameEnumerator<'a, T> {
    channels: SmallVec<[ChannelSamples<'a, T>; 8]>,
    frames: usize,
    frame: usize,
    channel: usize,
}

impl<'a, T: Sample> FrameEnumerator<'a, T> {
    pub(crate) fn new(channels: SmallVec<[ChannelSamples<'a, T>; 8]>, frames: usize) -> Self {
        Self {
            channels,
            frames,
            frame: 0,
            channel: 0,
        }
    }

    #[inline]
    pub fn frame(&self) -> usize {
        self.frame
    }

    #[inline]
    pub fn channel(&self) -> usize {
        self.channel
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Whether the cursor points at a valid sample.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.frame < self.frames && self.channel < self.channels.len()
    }

    /// Sample under the cursor, `None` once stopped.
    pub fn value(&self) -> Option<T> {
        self.channels.get(self.channel)?.get(self.frame)
    }

    /// Moves to the next channel of the current frame. Returns `false` past
    /// the last channel.
    pub fn move_channel(&mut self) -> bool {
        if self.channel < self.channels.len() {
            self.channel += 1;
        }
        self.channel < self.channels.len()
    }

    /// Moves to the next frame, rewinding to channel 0.
    pub fn move_frame(&mut self) -> bool {
        if self.frame < self.frames {
            self.frame += 1;
        }
        self.channel = 0;
        self.frame < self.frames
    }

    /// Moves to the next sample, wrapping to the next frame after the last
    /// channel.
    pub fn advance(&mut self) -> bool {
        if self.move_channel() {
            true
        } else {
            self.move_frame()
        }
    }

    pub fn set_frame_position(&mut self, frame: usize) -> Result<()> {
        if frame >= self.frames {
            return Err(Error::out_of_range("frame", frame as u64, self.frames as u64));
        }
        self.frame = frame;
        Ok(())
    }

    pub fn set_channel_position(&mut self, channel: usize) -> Result<()> {
        if channel >= self.channels.len() {
            return Err(Error::out_of_range(
                "channel",
                channel as u64,
                self.channels.len() as u64,
            ));
        }
        self.channel = channel;
        Ok(())
    }

    /// Moves the cursor past the end.
    pub fn stop(&mut self) {
        self.frame = self.frames;
        self.channel = self.channels.len();
    }

    pub fn reset(&mut self) {
        self.frame = 0;
        self.channel = 0;
    }
}

impl<T: Sample> Iterator for FrameEnumerator<'_, T> {
    /// `(frame, channel, value)`
    type Item = (usize, usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_valid() {
            return None;
        }
        let item = (self.frame, self.channel, self.value()?);
        self.advance();
        Some(item)
    }
}
