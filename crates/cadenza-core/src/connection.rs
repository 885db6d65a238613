//! Directed, format-typed links between node buses.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::format::Format;
use crate::node::{Node, NodeId};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

/// Immutable link from a source node's output bus to a destination node's
/// input bus.
///
/// Endpoints are weak: a connection never keeps a node alive. Only
/// [`Engine::connect`](crate::Engine::connect) creates connections.
pub struct Connection {
    id: ConnectionId,
    source: Weak<Node>,
    source_id: NodeId,
    source_bus: u32,
    destination: Weak<Node>,
    destination_id: NodeId,
    destination_bus: u32,
    format: Format,
}

impl Connection {
    pub(crate) fn new(
        source: &Arc<Node>,
        source_bus: u32,
        destination: &Arc<Node>,
        destination_bus: u32,
        format: Format,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            source: Arc::downgrade(source),
            source_id: source.id(),
            source_bus,
            destination: Arc::downgrade(destination),
            destination_id: destination.id(),
            destination_bus,
            format,
        })
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Upstream node, if still alive.
    #[inline]
    pub fn source_node(&self) -> Option<Arc<Node>> {
        self.source.upgrade()
    }

    #[inline]
    pub fn destination_node(&self) -> Option<Arc<Node>> {
        self.destination.upgrade()
    }

    #[inline]
    pub fn source_id(&self) -> NodeId {
        self.source_id
    }

    #[inline]
    pub fn destination_id(&self) -> NodeId {
        self.destination_id
    }

    #[inline]
    pub fn source_bus(&self) -> u32 {
        self.source_bus
    }

    #[inline]
    pub fn destination_bus(&self) -> u32 {
        self.destination_bus
    }

    #[inline]
    pub fn format(&self) -> &Format {
        &self.format
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("source", &(self.source_id, self.source_bus))
            .field("destination", &(self.destination_id, self.destination_bus))
            .field("format", &self.format)
            .finish()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}
