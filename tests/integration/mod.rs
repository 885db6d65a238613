//! Integration test modules for cadenza
//!
//! - engine: builder, configuration files, lifecycle
//! - graph: graph construction and signal flow
//! - routing: route nodes, taps and device input

pub mod engine;
pub mod graph;
pub mod routing;
