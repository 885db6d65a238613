//! Built-in node types.

mod io_node;
mod offline;
mod route;
mod tap;

pub use io_node::IoNode;
pub use offline::{OfflineCompletionFn, OfflineDirective, OfflineOutputNode, OfflineRenderFn};
pub use route::RouteNode;
pub use tap::{Tap, TapRenderHandler};
