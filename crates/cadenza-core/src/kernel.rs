//! Immutable per-node render snapshots.

use core::any::Any;
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connection::Connection;

/// Snapshot of a node's connections taken on the control thread.
///
/// The render thread loads a kernel once per render call and reads only
/// from it. A published kernel is never mutated; the node replaces it
/// wholesale on the next topology change.
#[derive(Default)]
pub struct Kernel {
    input_connections: BTreeMap<u32, Arc<Connection>>,
    output_connections: BTreeMap<u32, Arc<Connection>>,
    extension: Option<Box<dyn Any + Send + Sync>>,
}

impl Kernel {
    pub(crate) fn new(
        input_connections: BTreeMap<u32, Arc<Connection>>,
        output_connections: BTreeMap<u32, Arc<Connection>>,
    ) -> Self {
        Self {
            input_connections,
            output_connections,
            extension: None,
        }
    }

    #[inline]
    pub fn input_connection(&self, bus: u32) -> Option<&Arc<Connection>> {
        self.input_connections.get(&bus)
    }

    #[inline]
    pub fn output_connection(&self, bus: u32) -> Option<&Arc<Connection>> {
        self.output_connections.get(&bus)
    }

    #[inline]
    pub fn input_connections(&self) -> &BTreeMap<u32, Arc<Connection>> {
        &self.input_connections
    }

    #[inline]
    pub fn output_connections(&self) -> &BTreeMap<u32, Arc<Connection>> {
        &self.output_connections
    }

    /// Attaches node-specific state, replacing any previous extension.
    pub fn set_extension<T: Any + Send + Sync>(&mut self, extension: T) {
        self.extension = Some(Box::new(extension));
    }

    pub fn extension<T: Any>(&self) -> Option<&T> {
        self.extension.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("inputs", &self.input_connections.keys().collect::<Vec<_>>())
            .field("outputs", &self.output_connections.keys().collect::<Vec<_>>())
            .field("extension", &self.extension.is_some())
            .finish()
    }
}
