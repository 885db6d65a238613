//! Node bridging an [`IoDevice`] to the graph.
//!
//! Input bus 0 feeds the device output; output bus 0 carries device input to
//! an input [`Tap`](crate::nodes::Tap). The render handler is registered with
//! the device's render core only while both connection formats match the
//! device formats.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::MAX_FRAMES_LIMIT;
use crate::io::{IoDevice, IoRenderArgs, IoRenderHandler, RenderCore};
use crate::lockfree::AtomicFlag;
use crate::node::{render_connection, Node, NodeArgs, NodeProcessor, RenderArgs};
use crate::{Error, Result};

struct IoState {
    device: Mutex<Option<Arc<dyn IoDevice>>>,
    core: Mutex<Option<Box<dyn RenderCore>>>,
    started: AtomicFlag,
    handler_registered: AtomicFlag,
    max_frames: AtomicU32,
}

impl IoState {
    fn update_render_handler(&self, node: &Node) {
        let mut core = self.core.lock();
        let Some(core) = core.as_mut() else {
            return;
        };
        let device = self.device.lock().clone();
        let handler = device
            .filter(|device| validate_connections(node, device.as_ref()))
            .map(|_| make_render_handler(node.downgrade()));
        self.handler_registered.set(handler.is_some());
        core.set_render_handler(handler);
    }

    fn ensure_core(&self) -> bool {
        let mut core = self.core.lock();
        if core.is_none() {
            *core = self
                .device
                .lock()
                .as_ref()
                .map(|device| device.make_render_core());
        }
        core.is_some()
    }

    fn drop_core(&self) {
        if let Some(mut core) = self.core.lock().take() {
            core.stop();
        }
        self.handler_registered.set(false);
    }
}

fn validate_connections(node: &Node, device: &dyn IoDevice) -> bool {
    if let Some(connection) = node.input_connection(0) {
        if device.output_format().as_ref() != Some(connection.format()) {
            tracing::warn!(
                node = %node.id(),
                connection = %connection.format(),
                device = ?device.output_format(),
                "output connection format does not match device output"
            );
            return false;
        }
    }
    if let Some(connection) = node.output_connection(0) {
        if device.input_format().as_ref() != Some(connection.format()) {
            tracing::warn!(
                node = %node.id(),
                connection = %connection.format(),
                device = ?device.input_format(),
                "input connection format does not match device input"
            );
            return false;
        }
    }
    true
}

fn make_render_handler(node: Weak<Node>) -> IoRenderHandler {
    Box::new(move |args: IoRenderArgs<'_>| {
        let Some(node) = node.upgrade() else {
            return;
        };
        let Some(kernel) = node.kernel() else {
            return;
        };

        if let (Some(output), Some(time)) = (args.output_buffer, args.output_time) {
            node.record_render_time(time);
            if let Some(connection) = kernel.input_connection(0) {
                if connection.format() == output.format() {
                    render_connection(connection, output, time);
                }
            }
        }

        if let (Some(input), Some(time)) = (args.input_buffer, args.input_time) {
            if let Some(connection) = kernel.output_connection(0) {
                if let Some(destination) = connection.destination_node() {
                    if destination.is_input_renderable() && connection.format() == input.format() {
                        destination.render(input, connection.destination_bus(), time);
                    }
                }
            }
        }
    })
}

struct IoProcessor {
    state: Arc<IoState>,
}

impl NodeProcessor for IoProcessor {
    // Device input reaches the graph by being pushed into an input tap, so
    // pulling this node leaves the buffer as supplied.
    fn render(&self, _args: &mut RenderArgs<'_>) {}

    fn update_connections(&self, node: &Node) {
        self.state.update_render_handler(node);
    }
}

/// Graph endpoint for a playback/capture device.
pub struct IoNode {
    node: Arc<Node>,
    state: Arc<IoState>,
}

impl IoNode {
    pub fn new(device: Option<Arc<dyn IoDevice>>) -> Self {
        let state = Arc::new(IoState {
            device: Mutex::new(device),
            core: Mutex::new(None),
            started: AtomicFlag::new(false),
            handler_registered: AtomicFlag::new(false),
            max_frames: AtomicU32::new(MAX_FRAMES_LIMIT),
        });
        let node = Node::new(
            NodeArgs::default(),
            IoProcessor {
                state: Arc::clone(&state),
            },
        );
        Self { node, state }
    }

    #[inline]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn device(&self) -> Option<Arc<dyn IoDevice>> {
        self.state.device.lock().clone()
    }

    /// Replaces the device. A started core is rebuilt for the new device and
    /// restarted.
    pub fn set_device(&self, device: Option<Arc<dyn IoDevice>>) -> Result<()> {
        let was_started = self.state.started.get();
        self.state.drop_core();
        *self.state.device.lock() = device;
        if was_started {
            self.state.started.set(false);
            self.start(self.state.max_frames.load(Ordering::Acquire))?;
        }
        Ok(())
    }

    /// Whether the device core currently has this node's handler.
    pub fn has_render_handler(&self) -> bool {
        self.state.handler_registered.get()
    }

    pub fn is_started(&self) -> bool {
        self.state.started.get()
    }

    /// Re-checks connection formats against the device and registers or
    /// clears the render handler.
    pub fn update_render_handler(&self) {
        self.state.update_render_handler(&self.node);
    }

    pub(crate) fn start(&self, max_frames_per_slice: u32) -> Result<()> {
        if !self.state.ensure_core() {
            tracing::warn!(node = %self.node.id(), "no device to start");
            return Err(Error::StartFailed);
        }
        self.state
            .max_frames
            .store(max_frames_per_slice, Ordering::Release);
        self.update_render_handler();

        let started = match self.state.core.lock().as_mut() {
            Some(core) => {
                core.set_max_frames_per_slice(max_frames_per_slice);
                core.start()
            }
            None => false,
        };
        if !started {
            tracing::warn!(node = %self.node.id(), "render core failed to start");
            return Err(Error::StartFailed);
        }
        self.state.started.set(true);
        Ok(())
    }

    pub(crate) fn stop(&self) {
        if let Some(core) = self.state.core.lock().as_mut() {
            core.stop();
        }
        self.state.started.set(false);
    }
}

impl Drop for IoNode {
    fn drop(&mut self) {
        self.state.drop_core();
    }
}
