//! In-process device driven by explicit render cycles.

use core::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::config::MAX_FRAMES_LIMIT;
use crate::format::Format;
use crate::io::{IoDevice, IoEvent, IoRenderArgs, IoRenderHandler, RenderCore};
use crate::lockfree::AtomicFlag;
use crate::time::Time;

struct ManualShared {
    input_format: Mutex<Option<Format>>,
    output_format: Mutex<Option<Format>>,
    handler: ArcSwapOption<IoRenderHandler>,
    running: AtomicFlag,
    refuse_start: AtomicFlag,
    max_frames: AtomicU32,
    sample_time: AtomicI64,
    epoch: Instant,
    pending_input: Mutex<Option<SampleBuffer>>,
    last_input: Mutex<Option<(SampleBuffer, Time)>>,
}

/// Device whose clock is whoever calls [`render_cycle`](Self::render_cycle).
///
/// Every cycle runs synchronously on the calling thread. A cycle locks the
/// device state and allocates its buffers, so this device is not real-time
/// safe; it drives tests and other deterministic, non-audio-thread callers.
pub struct ManualIoDevice {
    shared: Arc<ManualShared>,
    subscribers: Mutex<Vec<Sender<IoEvent>>>,
}

impl ManualIoDevice {
    pub fn new(input_format: Option<Format>, output_format: Option<Format>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(ManualShared {
                input_format: Mutex::new(input_format),
                output_format: Mutex::new(output_format),
                handler: ArcSwapOption::empty(),
                running: AtomicFlag::new(false),
                refuse_start: AtomicFlag::new(false),
                max_frames: AtomicU32::new(MAX_FRAMES_LIMIT),
                sample_time: AtomicI64::new(0),
                epoch: Instant::now(),
                pending_input: Mutex::new(None),
                last_input: Mutex::new(None),
            }),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Output-only device.
    pub fn output(format: Format) -> Arc<Self> {
        Self::new(None, Some(format))
    }

    pub fn set_input_format(&self, format: Option<Format>) {
        *self.shared.input_format.lock() = format;
        self.notify(IoEvent::FormatChanged);
    }

    pub fn set_output_format(&self, format: Option<Format>) {
        *self.shared.output_format.lock() = format;
        self.notify(IoEvent::FormatChanged);
    }

    /// Makes subsequent `start` calls fail.
    pub fn set_refuse_start(&self, refuse: bool) {
        self.shared.refuse_start.set(refuse);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    pub fn max_frames_per_slice(&self) -> u32 {
        self.shared.max_frames.load(Ordering::Acquire)
    }

    /// Input delivered to the handler on the next cycle.
    pub fn push_input(&self, buffer: SampleBuffer) {
        *self.shared.pending_input.lock() = Some(buffer);
    }

    /// Runs one cycle of up to `frames` frames and returns the rendered
    /// output. `None` while stopped or when the device has no output.
    pub fn render_cycle(&self, frames: u32) -> Option<SampleBuffer> {
        let shared = &self.shared;
        if !shared.running.get() {
            return None;
        }
        let frames = frames.min(shared.max_frames.load(Ordering::Acquire));
        if frames == 0 {
            return None;
        }

        let output_format = *shared.output_format.lock();
        let input_format = *shared.input_format.lock();
        let sample_rate = output_format
            .or(input_format)
            .map_or(0.0, |format| format.sample_rate());
        let host_time = shared.epoch.elapsed().as_nanos() as u64;
        let sample_time = shared.sample_time.fetch_add(frames as i64, Ordering::AcqRel);
        let time = Time::new(host_time, sample_time, sample_rate);

        let mut output = output_format.and_then(|format| SampleBuffer::new(format, frames).ok());
        let mut input = input_format.and_then(|format| {
            shared
                .pending_input
                .lock()
                .take()
                .filter(|buffer| *buffer.format() == format)
                .or_else(|| SampleBuffer::new(format, frames).ok())
        });

        if let Some(handler) = shared.handler.load_full() {
            let output_time = output.is_some().then_some(&time);
            let input_time = input.is_some().then_some(&time);
            handler(IoRenderArgs {
                output_buffer: output.as_mut(),
                output_time,
                input_buffer: input.as_mut(),
                input_time,
            });
        }

        *shared.last_input.lock() = input.map(|buffer| (buffer, time));
        output
    }

    fn notify(&self, event: IoEvent) {
        self.subscribers
            .lock()
            .retain(|sender| sender.send(event).is_ok());
    }
}

impl IoDevice for ManualIoDevice {
    fn input_format(&self) -> Option<Format> {
        *self.shared.input_format.lock()
    }

    fn output_format(&self) -> Option<Format> {
        *self.shared.output_format.lock()
    }

    fn make_render_core(&self) -> Box<dyn RenderCore> {
        Box::new(ManualRenderCore {
            shared: Arc::clone(&self.shared),
        })
    }

    fn subscribe(&self, events: Sender<IoEvent>) {
        self.subscribers.lock().push(events);
    }
}

/// Render core of a [`ManualIoDevice`].
pub struct ManualRenderCore {
    shared: Arc<ManualShared>,
}

impl RenderCore for ManualRenderCore {
    fn set_render_handler(&mut self, handler: Option<IoRenderHandler>) {
        self.shared.handler.store(handler.map(Arc::new));
    }

    fn set_max_frames_per_slice(&mut self, frames: u32) {
        self.shared.max_frames.store(frames, Ordering::Release);
    }

    fn start(&mut self) -> bool {
        if self.shared.refuse_start.get() {
            return false;
        }
        self.shared.running.set(true);
        true
    }

    fn stop(&mut self) {
        self.shared.running.set(false);
    }

    fn input_buffer_on_render(&self) -> Option<SampleBuffer> {
        self.shared
            .last_input
            .lock()
            .as_ref()
            .map(|(buffer, _)| buffer.clone())
    }

    fn input_time_on_render(&self) -> Option<Time> {
        self.shared.last_input.lock().as_ref().map(|(_, time)| *time)
    }
}

impl Drop for ManualRenderCore {
    fn drop(&mut self) {
        self.shared.running.set(false);
        self.shared.handler.store(None);
    }
}
