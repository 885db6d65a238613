//! Boundary between the graph and an audio clock source.
//!
//! An [`IoDevice`] describes the formats it plays and captures and builds a
//! [`RenderCore`]. The core owns the real-time callback: once started it
//! repeatedly invokes the registered [`IoRenderHandler`] with a hardware
//! output buffer to fill and, when capturing, the captured input.

mod manual;

pub use manual::{ManualIoDevice, ManualRenderCore};

use crossbeam_channel::Sender;

use crate::buffer::SampleBuffer;
use crate::format::Format;
use crate::time::Time;

/// Device and configuration notifications delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    /// A device changed its input or output format.
    FormatChanged,
    /// Devices were added or removed.
    DevicesChanged,
    /// Any other configuration change that should revalidate the graph.
    ConfigurationChanged,
}

/// Arguments of one real-time cycle.
pub struct IoRenderArgs<'a> {
    pub output_buffer: Option<&'a mut SampleBuffer>,
    pub output_time: Option<&'a Time>,
    pub input_buffer: Option<&'a mut SampleBuffer>,
    pub input_time: Option<&'a Time>,
}

/// Callback a render core invokes once per cycle on its real-time thread.
pub type IoRenderHandler = Box<dyn Fn(IoRenderArgs<'_>) + Send + Sync>;

/// Real-time driver for one device.
pub trait RenderCore: Send {
    fn set_render_handler(&mut self, handler: Option<IoRenderHandler>);

    fn set_max_frames_per_slice(&mut self, frames: u32);

    /// Starts the clock. Returns `false` when the device refuses.
    fn start(&mut self) -> bool;

    fn stop(&mut self);

    /// Input captured during the most recent cycle.
    fn input_buffer_on_render(&self) -> Option<SampleBuffer>;

    fn input_time_on_render(&self) -> Option<Time>;
}

/// A playback and/or capture device.
pub trait IoDevice: Send + Sync {
    /// Format of captured audio, `None` when the device has no input.
    fn input_format(&self) -> Option<Format>;

    /// Format the device plays, `None` when it has no output.
    fn output_format(&self) -> Option<Format>;

    fn make_render_core(&self) -> Box<dyn RenderCore>;

    /// Registers a sender for [`IoEvent`]s. Devices that never change may
    /// ignore it.
    fn subscribe(&self, _events: Sender<IoEvent>) {}
}
