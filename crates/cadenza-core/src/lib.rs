//! Pull-rendered audio graph with lock-free topology snapshots.
//!
//! # Primary API
//!
//! - [`Engine`]: owns nodes, creates connections, starts and stops rendering
//! - [`Node`] / [`NodeProcessor`]: graph vertices and their render behaviour
//! - [`SampleBuffer`] / [`Format`]: multi-channel PCM storage
//! - [`Time`]: host and sample clocks passed through a render call
//!
//! # Built-in nodes
//!
//! - [`IoNode`]: bridges an [`IoDevice`] to the graph
//! - [`OfflineOutputNode`]: faster-than-real-time sink on its own thread
//! - [`RouteNode`]: channel router driven by a [`RouteSet`]
//! - [`Tap`]: node with a replaceable render handler
//!
//! # Example
//!
//! ```ignore
//! use cadenza_core::*;
//!
//! let engine = Engine::default();
//! let format = engine.standard_format(2)?;
//! let device = ManualIoDevice::output(format);
//! let io = engine.add_io(device.clone())?;
//!
//! let source = Node::from_fn(NodeArgs::new(BusCount::Bounded(0), BusCount::Bounded(1)), |args| {
//!     for buf_idx in 0..args.buffer().buffer_count() {
//!         if let Ok(samples) = args.buffer_mut().data_mut::<f32>(buf_idx) {
//!             samples.fill(0.25);
//!         }
//!     }
//! });
//! engine.connect(&source, 0, io.node(), 0, format)?;
//! engine.start_render()?;
//!
//! let rendered = device.render_cycle(512);
//! ```

pub mod buffer;
pub use buffer::{
    ChannelSamples, ChannelSamplesMut, FrameEnumerator, MappedBuffer, Sample, SampleBuffer,
    ZERO_SCRATCH_CAPACITY,
};

mod config;
pub use config::{EngineConfig, MAX_FRAMES_LIMIT};

mod connection;
pub use connection::{Connection, ConnectionId};

mod engine;
pub use engine::Engine;

pub mod error;
pub use error::{Error, Result};

mod format;
pub use format::{Format, SampleRepresentation};

pub mod io;
pub use io::{IoDevice, IoEvent, IoRenderArgs, IoRenderHandler, ManualIoDevice, RenderCore};

mod kernel;
pub use kernel::Kernel;

mod lifecycle;
pub use lifecycle::EngineState;

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, AtomicTime};

mod node;
pub use node::{
    render_connection, BusCount, Node, NodeArgs, NodeId, NodeProcessor, PassThrough, RenderArgs,
    RenderFn,
};

pub mod nodes;
pub use nodes::{IoNode, OfflineDirective, OfflineOutputNode, RouteNode, Tap};

mod route;
pub use route::{channel_map_from_routes, ChannelMap, Route, RoutePoint, RouteSet};

mod time;
pub use time::{host_time_for_seconds, seconds_for_host_time, Time, SAMPLE_TIME_TOLERANCE};
