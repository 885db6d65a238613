//! Sink that renders the graph faster than real time on its own thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::lockfree::AtomicFlag;
use crate::node::{BusCount, Node, NodeArgs, PassThrough};
use crate::time::Time;
use crate::{Error, Result};

/// What the offline driver should do after a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineDirective {
    Continue,
    Stop,
}

/// Receives every rendered slice.
pub type OfflineRenderFn = Box<dyn FnMut(&SampleBuffer, &Time) -> OfflineDirective + Send>;

/// Called once when rendering ends; the flag is `true` when it was
/// cancelled by a stop request rather than by the render callback.
pub type OfflineCompletionFn = Box<dyn FnOnce(bool) + Send>;

#[derive(Default)]
struct OfflineState {
    running: AtomicFlag,
    cancel: AtomicFlag,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Engine sink pulled slice by slice from a dedicated thread.
pub struct OfflineOutputNode {
    node: Arc<Node>,
    state: Arc<OfflineState>,
}

impl OfflineOutputNode {
    pub fn new() -> Self {
        Self {
            node: Node::new(
                NodeArgs::new(BusCount::Bounded(1), BusCount::Bounded(0)),
                PassThrough,
            ),
            state: Arc::new(OfflineState::default()),
        }
    }

    #[inline]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    pub(crate) fn start(
        &self,
        slice_frames: u32,
        mut render_fn: OfflineRenderFn,
        completion_fn: OfflineCompletionFn,
    ) -> Result<()> {
        if self.state.running.get() {
            return Err(Error::AlreadyRunning);
        }
        let format = self.node.input_format(0).ok_or(Error::ConnectionNotFound)?;
        let mut buffer = SampleBuffer::new(format, slice_frames)?;

        // Reap a previous run that finished on its own.
        if let Some(handle) = self.state.thread.lock().take() {
            let _ = handle.join();
        }

        self.state.cancel.set(false);
        self.state.running.set(true);

        let node = Arc::clone(&self.node);
        let state = Arc::clone(&self.state);
        let spawned = std::thread::Builder::new()
            .name("cadenza-offline".into())
            .spawn(move || {
                let mut time = Time::from_sample_time(0, format.sample_rate());
                let mut cancelled = false;
                loop {
                    if state.cancel.get() {
                        cancelled = true;
                        break;
                    }
                    buffer.reset();
                    node.render(&mut buffer, 0, &time);
                    if render_fn(&buffer, &time) == OfflineDirective::Stop {
                        break;
                    }
                    time = time.advanced_by(slice_frames);
                }
                state.running.set(false);
                completion_fn(cancelled);
            });

        match spawned {
            Ok(handle) => {
                *self.state.thread.lock() = Some(handle);
                tracing::debug!(node = %self.node.id(), %format, slice_frames, "offline render started");
                Ok(())
            }
            Err(err) => {
                self.state.running.set(false);
                tracing::warn!(%err, "failed to spawn offline render thread");
                Err(Error::StartFailed)
            }
        }
    }

    /// Requests cancellation and waits for the slice in flight, unless
    /// called from the render thread itself.
    pub(crate) fn stop(&self) {
        self.state.cancel.set(true);
        let Some(handle) = self.state.thread.lock().take() else {
            return;
        };
        if handle.thread().id() != std::thread::current().id() {
            let _ = handle.join();
        }
    }
}

impl Default for OfflineOutputNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OfflineOutputNode {
    fn drop(&mut self) {
        self.stop();
    }
}
