//! Graph nodes and the pull-rendering protocol.
//!
//! A [`Node`] owns a [`NodeProcessor`] that decides what rendering means for
//! it. The default processor behaviour pulls audio from the input connection
//! on the requested bus, so a chain of default nodes passes audio through
//! unchanged. Leaf nodes synthesize into the buffer instead of pulling.
//!
//! Connection bookkeeping lives behind a mutex the render thread never
//! touches. What the render thread sees is the [`Kernel`] most recently
//! published with [`Node::update_kernel`].

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::connection::Connection;
use crate::format::Format;
use crate::kernel::Kernel;
use crate::lockfree::AtomicTime;
use crate::time::Time;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// How many buses a node exposes in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCount {
    Bounded(u32),
    Unbounded,
}

impl BusCount {
    #[inline]
    pub fn contains(&self, bus: u32) -> bool {
        match self {
            BusCount::Bounded(count) => bus < *count,
            BusCount::Unbounded => true,
        }
    }

    /// Count reported in errors; `u32::MAX` when unbounded.
    #[inline]
    pub fn limit(&self) -> u32 {
        match self {
            BusCount::Bounded(count) => *count,
            BusCount::Unbounded => u32::MAX,
        }
    }
}

/// Construction parameters for a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeArgs {
    pub input_bus_count: BusCount,
    pub output_bus_count: BusCount,
    /// Whether the IO node may push device input into this node.
    pub input_renderable: bool,
}

impl Default for NodeArgs {
    fn default() -> Self {
        Self {
            input_bus_count: BusCount::Bounded(1),
            output_bus_count: BusCount::Bounded(1),
            input_renderable: false,
        }
    }
}

impl NodeArgs {
    pub fn new(input_bus_count: BusCount, output_bus_count: BusCount) -> Self {
        Self {
            input_bus_count,
            output_bus_count,
            input_renderable: false,
        }
    }
}

/// Node behaviour.
///
/// [`render`](NodeProcessor::render) and
/// [`output_format`](NodeProcessor::output_format) run on the render thread;
/// every other method runs on the control thread.
pub trait NodeProcessor: Send + Sync + 'static {
    /// Fills `args.buffer` for output bus `args.bus_idx()`.
    fn render(&self, args: &mut RenderArgs<'_>) {
        args.render_source();
    }

    /// Adds node-specific state to a kernel before it is published.
    fn prepare_kernel(&self, _kernel: &mut Kernel) {}

    /// Format this node produces on `bus`, as seen from a render call.
    fn output_format(&self, kernel: Option<&Kernel>, bus: u32) -> Option<Format> {
        kernel?.output_connection(bus).map(|connection| *connection.format())
    }

    /// Called by the engine after the node's connections change.
    fn update_connections(&self, _node: &Node) {}

    /// Called when the node is reset, before its kernel is dropped.
    fn will_reset(&self) {}
}

/// Processor with only default behaviour: pulls from the matching input bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl NodeProcessor for PassThrough {}

/// Adapts a closure into a [`NodeProcessor`] that renders with it.
pub struct RenderFn<F>(pub F);

impl<F> NodeProcessor for RenderFn<F>
where
    F: Fn(&mut RenderArgs<'_>) + Send + Sync + 'static,
{
    fn render(&self, args: &mut RenderArgs<'_>) {
        (self.0)(args)
    }
}

/// Everything a processor sees during one render call.
pub struct RenderArgs<'a> {
    node: &'a Node,
    kernel: Option<&'a Kernel>,
    buffer: &'a mut SampleBuffer,
    bus_idx: u32,
    time: &'a Time,
}

impl<'a> RenderArgs<'a> {
    #[inline]
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// The kernel loaded for this call.
    #[inline]
    pub fn kernel(&self) -> Option<&'a Kernel> {
        self.kernel
    }

    #[inline]
    pub fn buffer(&self) -> &SampleBuffer {
        &*self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut *self.buffer
    }

    #[inline]
    pub fn bus_idx(&self) -> u32 {
        self.bus_idx
    }

    #[inline]
    pub fn time(&self) -> &'a Time {
        self.time
    }

    pub fn input_connection_on_render(&self, bus: u32) -> Option<&'a Arc<Connection>> {
        self.kernel?.input_connection(bus)
    }

    pub fn output_connection_on_render(&self, bus: u32) -> Option<&'a Arc<Connection>> {
        self.kernel?.output_connection(bus)
    }

    pub fn input_connections_on_render(&self) -> impl Iterator<Item = (u32, &'a Arc<Connection>)> {
        self.kernel
            .into_iter()
            .flat_map(|kernel| kernel.input_connections().iter().map(|(bus, c)| (*bus, c)))
    }

    pub fn output_connections_on_render(&self) -> impl Iterator<Item = (u32, &'a Arc<Connection>)> {
        self.kernel
            .into_iter()
            .flat_map(|kernel| kernel.output_connections().iter().map(|(bus, c)| (*bus, c)))
    }

    /// Pulls the upstream node connected to input bus `bus_idx` into the
    /// buffer. Returns whether anything was rendered.
    pub fn render_source(&mut self) -> bool {
        match self.input_connection_on_render(self.bus_idx) {
            Some(connection) => render_connection(connection, self.buffer, self.time),
            None => false,
        }
    }
}

/// Renders the source side of `connection` into `buffer`.
///
/// Skips and returns `false` when the source is gone or currently reports
/// an output format different from the connection's.
pub fn render_connection(connection: &Connection, buffer: &mut SampleBuffer, time: &Time) -> bool {
    let Some(source) = connection.source_node() else {
        return false;
    };
    let source_bus = connection.source_bus();
    if source.output_format_on_render(source_bus).as_ref() != Some(connection.format()) {
        return false;
    }
    source.render(buffer, source_bus, time);
    true
}

#[derive(Default)]
struct ConnectionSlots {
    inputs: BTreeMap<u32, Weak<Connection>>,
    outputs: BTreeMap<u32, Weak<Connection>>,
}

fn upgrade_live(slots: &mut BTreeMap<u32, Weak<Connection>>) -> BTreeMap<u32, Arc<Connection>> {
    slots.retain(|_, weak| weak.strong_count() > 0);
    slots
        .iter()
        .filter_map(|(bus, weak)| weak.upgrade().map(|connection| (*bus, connection)))
        .collect()
}

fn slot_is_free(slots: &BTreeMap<u32, Weak<Connection>>, bus: u32) -> bool {
    slots.get(&bus).map_or(true, |weak| weak.strong_count() == 0)
}

/// A processing unit in the graph.
pub struct Node {
    id: NodeId,
    weak_self: Weak<Node>,
    input_bus_count: BusCount,
    output_bus_count: BusCount,
    input_renderable: bool,
    processor: Box<dyn NodeProcessor>,
    connections: Mutex<ConnectionSlots>,
    kernel: ArcSwapOption<Kernel>,
    last_render_time: AtomicTime,
}

impl Node {
    pub fn new(args: NodeArgs, processor: impl NodeProcessor) -> Arc<Self> {
        Self::with_boxed_processor(args, Box::new(processor))
    }

    pub fn with_boxed_processor(args: NodeArgs, processor: Box<dyn NodeProcessor>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id: NodeId::next(),
            weak_self: weak_self.clone(),
            input_bus_count: args.input_bus_count,
            output_bus_count: args.output_bus_count,
            input_renderable: args.input_renderable,
            processor,
            connections: Mutex::new(ConnectionSlots::default()),
            kernel: ArcSwapOption::empty(),
            last_render_time: AtomicTime::new(),
        })
    }

    /// Node rendering with `render`.
    pub fn from_fn<F>(args: NodeArgs, render: F) -> Arc<Self>
    where
        F: Fn(&mut RenderArgs<'_>) + Send + Sync + 'static,
    {
        Self::new(args, RenderFn(render))
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn input_bus_count(&self) -> BusCount {
        self.input_bus_count
    }

    #[inline]
    pub fn output_bus_count(&self) -> BusCount {
        self.output_bus_count
    }

    #[inline]
    pub fn is_input_renderable(&self) -> bool {
        self.input_renderable
    }

    pub(crate) fn downgrade(&self) -> Weak<Node> {
        self.weak_self.clone()
    }

    // Control-thread queries.

    pub fn input_connection(&self, bus: u32) -> Option<Arc<Connection>> {
        self.connections.lock().inputs.get(&bus)?.upgrade()
    }

    pub fn output_connection(&self, bus: u32) -> Option<Arc<Connection>> {
        self.connections.lock().outputs.get(&bus)?.upgrade()
    }

    pub fn input_connections(&self) -> BTreeMap<u32, Arc<Connection>> {
        upgrade_live(&mut self.connections.lock().inputs)
    }

    pub fn output_connections(&self) -> BTreeMap<u32, Arc<Connection>> {
        upgrade_live(&mut self.connections.lock().outputs)
    }

    pub fn input_format(&self, bus: u32) -> Option<Format> {
        self.input_connection(bus).map(|connection| *connection.format())
    }

    pub fn output_format(&self, bus: u32) -> Option<Format> {
        self.output_connection(bus).map(|connection| *connection.format())
    }

    pub fn is_available_input_bus(&self, bus: u32) -> bool {
        self.input_bus_count.contains(bus) && slot_is_free(&self.connections.lock().inputs, bus)
    }

    pub fn is_available_output_bus(&self, bus: u32) -> bool {
        self.output_bus_count.contains(bus) && slot_is_free(&self.connections.lock().outputs, bus)
    }

    /// Lowest free input bus, `None` when every bounded bus is taken.
    pub fn next_available_input_bus(&self) -> Option<u32> {
        let slots = self.connections.lock();
        next_free(self.input_bus_count, &slots.inputs)
    }

    pub fn next_available_output_bus(&self) -> Option<u32> {
        let slots = self.connections.lock();
        next_free(self.output_bus_count, &slots.outputs)
    }

    pub(crate) fn add_connection(&self, connection: &Arc<Connection>) {
        let mut slots = self.connections.lock();
        if connection.destination_id() == self.id {
            slots
                .inputs
                .insert(connection.destination_bus(), Arc::downgrade(connection));
        }
        if connection.source_id() == self.id {
            slots
                .outputs
                .insert(connection.source_bus(), Arc::downgrade(connection));
        }
    }

    pub(crate) fn remove_connection(&self, connection: &Connection) {
        let mut slots = self.connections.lock();
        let matches = |weak: &Weak<Connection>| {
            weak.upgrade()
                .map_or(true, |existing| existing.id() == connection.id())
        };
        if connection.destination_id() == self.id
            && slots.inputs.get(&connection.destination_bus()).is_some_and(matches)
        {
            slots.inputs.remove(&connection.destination_bus());
        }
        if connection.source_id() == self.id
            && slots.outputs.get(&connection.source_bus()).is_some_and(matches)
        {
            slots.outputs.remove(&connection.source_bus());
        }
    }

    /// Rebuilds and publishes the kernel from the current connections.
    ///
    /// Control thread only. A render call already in flight keeps the
    /// kernel it loaded.
    pub fn update_kernel(&self) {
        // Held through publication so concurrent rebuilds publish in order.
        let mut slots = self.connections.lock();
        let inputs = upgrade_live(&mut slots.inputs);
        let outputs = upgrade_live(&mut slots.outputs);
        let mut kernel = Kernel::new(inputs, outputs);
        self.processor.prepare_kernel(&mut kernel);
        tracing::debug!(node = %self.id, ?kernel, "publishing kernel");
        self.kernel.store(Some(Arc::new(kernel)));
    }

    pub(crate) fn update_connections(&self) {
        self.processor.update_connections(self);
    }

    /// Drops every connection reference and the published kernel.
    pub fn reset(&self) {
        self.processor.will_reset();
        {
            let mut slots = self.connections.lock();
            slots.inputs.clear();
            slots.outputs.clear();
        }
        self.kernel.store(None);
        self.last_render_time.clear();
    }

    // Render-thread API.

    /// The currently published kernel.
    #[inline]
    pub fn kernel(&self) -> Option<Arc<Kernel>> {
        self.kernel.load_full()
    }

    pub fn last_render_time(&self) -> Option<Time> {
        self.last_render_time.load()
    }

    pub(crate) fn record_render_time(&self, time: &Time) {
        self.last_render_time.store(time);
    }

    /// Format this node produces on `bus`, from its published kernel.
    pub fn output_format_on_render(&self, bus: u32) -> Option<Format> {
        let kernel = self.kernel.load();
        self.processor.output_format(kernel.as_deref(), bus)
    }

    pub fn input_format_on_render(&self, bus: u32) -> Option<Format> {
        let kernel = self.kernel.load();
        kernel
            .as_deref()?
            .input_connection(bus)
            .map(|connection| *connection.format())
    }

    /// Renders output bus `bus_idx` into `buffer`.
    ///
    /// Records `time`, loads the kernel once and runs the processor exactly
    /// once with that kernel.
    pub fn render(&self, buffer: &mut SampleBuffer, bus_idx: u32, time: &Time) {
        self.record_render_time(time);
        let kernel = self.kernel.load_full();
        let mut args = RenderArgs {
            node: self,
            kernel: kernel.as_deref(),
            buffer,
            bus_idx,
            time,
        };
        self.processor.render(&mut args);
    }
}

fn next_free(count: BusCount, slots: &BTreeMap<u32, Weak<Connection>>) -> Option<u32> {
    match count {
        BusCount::Bounded(count) => (0..count).find(|bus| slot_is_free(slots, *bus)),
        BusCount::Unbounded => (0..=u32::MAX).find(|bus| slot_is_free(slots, *bus)),
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("input_bus_count", &self.input_bus_count)
            .field("output_bus_count", &self.output_bus_count)
            .finish_non_exhaustive()
    }
}
