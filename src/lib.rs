//! # Cadenza - pull-rendered audio graph
//!
//! A directed graph of audio nodes rendered by pulling from a sink. Topology
//! can change from a control thread while a render thread keeps pulling;
//! each render call sees one consistent snapshot of a node's connections.
//!
//! ## Architecture
//!
//! Cadenza is an umbrella crate over:
//! - **cadenza-core** - formats, sample buffers, nodes, kernels, engine,
//!   IO boundary and built-in nodes
//!
//! and adds [`EngineBuilder`] with TOML configuration loading.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cadenza::prelude::*;
//!
//! let engine = EngineBuilder::default().sample_rate(48000.0).build()?;
//! let format = engine.standard_format(2)?;
//!
//! let device = ManualIoDevice::output(format);
//! let io = engine.add_io(device.clone())?;
//! let tap = Tap::new();
//! tap.set_render_handler(|args| {
//!     args.render_source();
//! });
//!
//! engine.connect(tap.node(), 0, io.node(), 0, format)?;
//! engine.start_render()?;
//! let output = device.render_cycle(512);
//! ```

/// Re-export of cadenza-core for direct access
pub use cadenza_core as core;

// Core types
pub use cadenza_core::{
    // Buffers and formats
    Format,
    SampleBuffer,
    SampleRepresentation,
    MappedBuffer,
    Sample,

    // Graph
    BusCount,
    Connection,
    ConnectionId,
    Engine,
    EngineConfig,
    EngineState,
    Kernel,
    Node,
    NodeArgs,
    NodeId,
    NodeProcessor,
    PassThrough,
    RenderArgs,
    RenderFn,

    // Built-in nodes
    IoNode,
    OfflineDirective,
    OfflineOutputNode,
    Route,
    RouteNode,
    RoutePoint,
    RouteSet,
    Tap,

    // IO boundary
    IoDevice,
    IoEvent,
    IoRenderArgs,
    IoRenderHandler,
    ManualIoDevice,
    RenderCore,

    // Time
    Time,
};

mod builder;
mod error;

pub use builder::EngineBuilder;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Engine, EngineBuilder, EngineConfig, EngineState};

    // Graph
    pub use crate::{BusCount, Node, NodeArgs, NodeProcessor, PassThrough, RenderArgs};

    // Buffers
    pub use crate::{Format, SampleBuffer, SampleRepresentation, Time};

    // Nodes
    pub use crate::{OfflineDirective, Route, RouteNode, RoutePoint, Tap};

    // IO
    pub use crate::{IoDevice, IoEvent, ManualIoDevice};
}
