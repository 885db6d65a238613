//! Graph ownership, topology mutation and render lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::config::EngineConfig;
use crate::connection::{Connection, ConnectionId};
use crate::format::Format;
use crate::io::{IoDevice, IoEvent};
use crate::lifecycle::{EngineState, Lifecycle, LifecycleEvent, TransitionResult};
use crate::node::{Node, NodeId};
use crate::nodes::{IoNode, OfflineDirective, OfflineOutputNode};
use crate::time::Time;
use crate::{Error, Result};

#[derive(Default)]
struct Graph {
    nodes: BTreeMap<NodeId, Arc<Node>>,
    connections: BTreeMap<ConnectionId, Arc<Connection>>,
}

impl Graph {
    fn attach(&mut self, node: &Arc<Node>) -> bool {
        if self.nodes.contains_key(&node.id()) {
            return false;
        }
        self.nodes.insert(node.id(), Arc::clone(node));
        node.update_kernel();
        tracing::debug!(node = %node.id(), "node attached");
        true
    }

    fn connection_ids_where(&self, predicate: impl Fn(&Connection) -> bool) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| predicate(connection))
            .map(|connection| connection.id())
            .collect()
    }

    /// Removes a connection from the set and from both endpoints, then
    /// republishes the endpoint kernels.
    fn remove_connection(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        let connection = self.connections.remove(&id)?;
        let source = connection.source_node();
        let destination = connection.destination_node();

        for node in source.iter().chain(destination.iter()) {
            node.remove_connection(&connection);
        }
        refresh(source.as_deref());
        if connection.source_id() != connection.destination_id() {
            refresh(destination.as_deref());
        }
        tracing::debug!(connection = %connection.id(), "disconnected");
        Some(connection)
    }
}

fn refresh(node: Option<&Node>) {
    if let Some(node) = node {
        node.update_kernel();
        node.update_connections();
    }
}

/// Owns the node graph and drives rendering.
///
/// Every method runs on a control thread and may be called while rendering
/// is in progress. The render thread only ever reads published kernels.
pub struct Engine {
    config: EngineConfig,
    graph: Mutex<Graph>,
    lifecycle: Mutex<Lifecycle>,
    io: Mutex<Option<Arc<IoNode>>>,
    offline: Mutex<Option<Arc<OfflineOutputNode>>>,
    io_events_tx: Sender<IoEvent>,
    io_events_rx: Receiver<IoEvent>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EngineConfig) -> Self {
        let (io_events_tx, io_events_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            graph: Mutex::new(Graph::default()),
            lifecycle: Mutex::new(Lifecycle::new()),
            io: Mutex::new(None),
            offline: Mutex::new(None),
            io_events_tx,
            io_events_rx,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Non-interleaved float32 at the engine sample rate.
    pub fn standard_format(&self, channel_count: u32) -> Result<Format> {
        Format::standard(self.config.sample_rate, channel_count)
    }

    pub fn state(&self) -> EngineState {
        let mut lifecycle = self.lifecycle.lock();
        self.settle(&mut lifecycle);
        lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    // Topology.

    pub fn attach_node(&self, node: &Arc<Node>) {
        let attached = self.graph.lock().attach(node);
        if attached {
            self.configured();
        }
    }

    /// Detaches `node`, destroying every connection that touches it.
    ///
    /// A render call already holding the node's kernel finishes with it.
    pub fn detach_node(&self, node: &Arc<Node>) {
        {
            let mut graph = self.graph.lock();
            if graph.nodes.remove(&node.id()).is_none() {
                return;
            }
            let id = node.id();
            for connection_id in graph.connection_ids_where(|c| c.source_id() == id || c.destination_id() == id) {
                graph.remove_connection(connection_id);
            }
            node.reset();
            tracing::debug!(node = %id, "node detached");
        }

        let io = take_if_node(&mut self.io.lock(), node, IoNode::node);
        if let Some(io) = io {
            io.stop();
        }
        let offline = take_if_node(&mut self.offline.lock(), node, OfflineOutputNode::node);
        if let Some(offline) = offline {
            offline.stop();
        }
        self.configured();
    }

    /// Detaches `node` if no connection references it. Returns whether it
    /// was detached.
    pub fn detach_node_if_unused(&self, node: &Arc<Node>) -> bool {
        let used = {
            let graph = self.graph.lock();
            if !graph.nodes.contains_key(&node.id()) {
                return false;
            }
            let id = node.id();
            graph
                .connections
                .values()
                .any(|c| c.source_id() == id || c.destination_id() == id)
        };
        if used {
            return false;
        }
        self.detach_node(node);
        true
    }

    pub fn node_exists(&self, node: &Node) -> bool {
        self.graph.lock().nodes.contains_key(&node.id())
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.graph.lock().nodes.values().cloned().collect()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.graph.lock().connections.values().cloned().collect()
    }

    pub fn input_connections_for(&self, node: &Node) -> Vec<Arc<Connection>> {
        let id = node.id();
        self.graph
            .lock()
            .connections
            .values()
            .filter(|c| c.destination_id() == id)
            .cloned()
            .collect()
    }

    pub fn output_connections_for(&self, node: &Node) -> Vec<Arc<Connection>> {
        let id = node.id();
        self.graph
            .lock()
            .connections
            .values()
            .filter(|c| c.source_id() == id)
            .cloned()
            .collect()
    }

    /// Connects `source`'s output bus to `destination`'s input bus,
    /// attaching either node if needed.
    pub fn connect(
        &self,
        source: &Arc<Node>,
        source_bus: u32,
        destination: &Arc<Node>,
        destination_bus: u32,
        format: Format,
    ) -> Result<Arc<Connection>> {
        if !source.output_bus_count().contains(source_bus) {
            return Err(Error::BusOutOfRange {
                bus: source_bus,
                count: source.output_bus_count().limit(),
            });
        }
        if !destination.input_bus_count().contains(destination_bus) {
            return Err(Error::BusOutOfRange {
                bus: destination_bus,
                count: destination.input_bus_count().limit(),
            });
        }

        let connection = {
            let mut graph = self.graph.lock();
            if !source.is_available_output_bus(source_bus) {
                return Err(Error::BusOccupied { bus: source_bus });
            }
            if !destination.is_available_input_bus(destination_bus) {
                return Err(Error::BusOccupied {
                    bus: destination_bus,
                });
            }

            graph.attach(source);
            graph.attach(destination);

            let connection = Connection::new(source, source_bus, destination, destination_bus, format);
            source.add_connection(&connection);
            destination.add_connection(&connection);
            graph
                .connections
                .insert(connection.id(), Arc::clone(&connection));

            refresh(Some(source));
            if source.id() != destination.id() {
                refresh(Some(destination));
            }
            tracing::debug!(
                connection = %connection.id(),
                source = %source.id(),
                source_bus,
                destination = %destination.id(),
                destination_bus,
                %format,
                "connected"
            );
            connection
        };

        self.configured();
        Ok(connection)
    }

    /// Removes `connection`. A second call for the same connection fails
    /// with [`Error::ConnectionNotFound`].
    pub fn disconnect(&self, connection: &Connection) -> Result<()> {
        self.graph
            .lock()
            .remove_connection(connection.id())
            .ok_or(Error::ConnectionNotFound)?;
        self.configured();
        Ok(())
    }

    /// Removes every connection touching `node`.
    pub fn disconnect_node(&self, node: &Node) {
        let id = node.id();
        self.remove_where(|c| c.source_id() == id || c.destination_id() == id);
    }

    pub fn disconnect_input(&self, node: &Node, bus: u32) -> Result<()> {
        let id = node.id();
        match self.remove_where(|c| c.destination_id() == id && c.destination_bus() == bus) {
            0 => Err(Error::ConnectionNotFound),
            _ => Ok(()),
        }
    }

    pub fn disconnect_output(&self, node: &Node, bus: u32) -> Result<()> {
        let id = node.id();
        match self.remove_where(|c| c.source_id() == id && c.source_bus() == bus) {
            0 => Err(Error::ConnectionNotFound),
            _ => Ok(()),
        }
    }

    fn remove_where(&self, predicate: impl Fn(&Connection) -> bool) -> usize {
        let removed = {
            let mut graph = self.graph.lock();
            let ids = graph.connection_ids_where(predicate);
            ids.into_iter()
                .filter(|id| graph.remove_connection(*id).is_some())
                .count()
        };
        if removed > 0 {
            self.configured();
        }
        removed
    }

    fn configured(&self) {
        self.lifecycle.lock().transition(LifecycleEvent::Configure);
    }

    // IO.

    /// Attaches an IO node for `device`, or points the existing one at it.
    pub fn add_io(&self, device: Arc<dyn IoDevice>) -> Result<Arc<IoNode>> {
        let (io, created) = {
            let mut slot = self.io.lock();
            match slot.as_ref() {
                Some(io) => {
                    io.set_device(Some(Arc::clone(&device)))?;
                    (Arc::clone(io), false)
                }
                None => {
                    let io = Arc::new(IoNode::new(Some(Arc::clone(&device))));
                    *slot = Some(Arc::clone(&io));
                    (io, true)
                }
            }
        };
        device.subscribe(self.io_events_tx.clone());
        if created {
            self.attach_node(io.node());
        }
        Ok(io)
    }

    pub fn io(&self) -> Option<Arc<IoNode>> {
        self.io.lock().clone()
    }

    pub fn remove_io(&self) {
        let io = self.io.lock().take();
        if let Some(io) = io {
            io.stop();
            self.detach_node(io.node());
        }
    }

    /// Sender devices and hosts use to report [`IoEvent`]s.
    pub fn io_event_sender(&self) -> Sender<IoEvent> {
        self.io_events_tx.clone()
    }

    /// Drains pending [`IoEvent`]s, revalidating the IO node against its
    /// device. Returns the number of events handled.
    pub fn process_io_events(&self) -> usize {
        let events: Vec<IoEvent> = self.io_events_rx.try_iter().collect();
        if events.is_empty() {
            return 0;
        }
        tracing::debug!(?events, "processing io events");
        if let Some(io) = self.io() {
            io.node().update_kernel();
            io.update_render_handler();
        }
        events.len()
    }

    // Offline.

    /// The offline sink, created and attached on first use.
    pub fn offline_output(&self) -> Arc<OfflineOutputNode> {
        let (offline, created) = {
            let mut slot = self.offline.lock();
            match slot.as_ref() {
                Some(offline) => (Arc::clone(offline), false),
                None => {
                    let offline = Arc::new(OfflineOutputNode::new());
                    *slot = Some(Arc::clone(&offline));
                    (offline, true)
                }
            }
        };
        if created {
            self.attach_node(offline.node());
        }
        offline
    }

    // Lifecycle.

    /// Starts real-time rendering through the IO node.
    pub fn start_render(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        self.settle(&mut lifecycle);
        if matches!(lifecycle.state(), EngineState::Running | EngineState::Stopping) {
            return Err(Error::AlreadyRunning);
        }

        let io = self.io().ok_or(Error::ConnectionNotFound)?;
        if io.node().input_connection(0).is_none() && io.node().output_connection(0).is_none() {
            return Err(Error::ConnectionNotFound);
        }
        io.start(self.config.max_frames_per_slice)?;

        if lifecycle.transition(LifecycleEvent::Start) == TransitionResult::Rejected {
            io.stop();
            return Err(Error::AlreadyRunning);
        }
        Ok(())
    }

    /// Starts rendering the offline sink on its own thread.
    ///
    /// `render_fn` receives every slice and may return
    /// [`OfflineDirective::Stop`]. `completion_fn` runs once at the end with
    /// `true` if [`stop`](Self::stop) cancelled the render.
    pub fn start_offline_render<R, C>(&self, render_fn: R, completion_fn: C) -> Result<()>
    where
        R: FnMut(&SampleBuffer, &Time) -> OfflineDirective + Send + 'static,
        C: FnOnce(bool) + Send + 'static,
    {
        let mut lifecycle = self.lifecycle.lock();
        self.settle(&mut lifecycle);
        if matches!(lifecycle.state(), EngineState::Running | EngineState::Stopping) {
            return Err(Error::AlreadyRunning);
        }

        let offline = self.offline.lock().clone().ok_or(Error::ConnectionNotFound)?;
        offline.start(
            self.config.offline_slice_frames,
            Box::new(render_fn),
            Box::new(completion_fn),
        )?;
        lifecycle.transition(LifecycleEvent::Start);
        Ok(())
    }

    /// Stops whichever driver is running. Calling it again is a no-op.
    pub fn stop(&self) {
        self.lifecycle.lock().transition(LifecycleEvent::BeginStop);
        if let Some(io) = self.io() {
            io.stop();
        }
        let offline = self.offline.lock().clone();
        if let Some(offline) = offline {
            offline.stop();
        }
        self.lifecycle.lock().transition(LifecycleEvent::FinishStop);
    }

    /// Moves a running lifecycle to idle once its driver has finished.
    fn settle(&self, lifecycle: &mut Lifecycle) {
        if lifecycle.state() != EngineState::Running {
            return;
        }
        let io_active = self.io.lock().as_ref().is_some_and(|io| io.is_started());
        let offline_active = self
            .offline
            .lock()
            .as_ref()
            .is_some_and(|offline| offline.is_running());
        if !io_active && !offline_active {
            lifecycle.transition(LifecycleEvent::FinishStop);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_valid_config(EngineConfig::default())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn take_if_node<T>(
    slot: &mut Option<Arc<T>>,
    node: &Node,
    node_of: impl Fn(&T) -> &Arc<Node>,
) -> Option<Arc<T>> {
    if slot.as_deref().is_some_and(|held| node_of(held).id() == node.id()) {
        slot.take()
    } else {
        None
    }
}
