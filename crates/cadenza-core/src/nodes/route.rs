//! Channel router node.
//!
//! Routes any channel of any input bus to any channel of any output bus.
//! Each route change republishes the kernel, so the render thread always
//! renders with a complete route table.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{self, SampleBuffer};
use crate::kernel::Kernel;
use crate::node::{render_connection, BusCount, Node, NodeArgs, NodeProcessor, RenderArgs};
use crate::route::{channel_map_from_routes, Route, RoutePoint, RouteSet};

/// Route table snapshot stored in the kernel.
struct RouteKernel {
    routes: RouteSet,
}

struct RouteProcessor {
    routes: Arc<Mutex<RouteSet>>,
}

impl NodeProcessor for RouteProcessor {
    fn render(&self, args: &mut RenderArgs<'_>) {
        let Some(kernel) = args.kernel() else {
            return;
        };
        let Some(route_kernel) = kernel.extension::<RouteKernel>() else {
            return;
        };
        let dst_bus = args.bus_idx();
        let dst_ch_count = args.buffer().format().channel_count();
        let time = args.time();

        for (src_bus, connection) in kernel.input_connections() {
            let src_format = *connection.format();
            let Some(map) = channel_map_from_routes(
                &route_kernel.routes,
                *src_bus,
                src_format.channel_count(),
                dst_bus,
                dst_ch_count,
            ) else {
                continue;
            };
            let Ok(mut mapped) = SampleBuffer::channel_mapped(src_format, args.buffer_mut(), &map) else {
                continue;
            };
            render_connection(connection, &mut mapped, time);
        }
    }

    fn prepare_kernel(&self, kernel: &mut Kernel) {
        kernel.set_extension(RouteKernel {
            routes: self.routes.lock().clone(),
        });
    }

    fn will_reset(&self) {
        self.routes.lock().clear();
    }
}

/// Node that routes channels between buses according to a [`RouteSet`].
///
/// Input and output bus counts are unbounded.
pub struct RouteNode {
    node: Arc<Node>,
    routes: Arc<Mutex<RouteSet>>,
}

impl RouteNode {
    pub fn new() -> Self {
        buffer::warm_zero_scratch();
        let routes = Arc::new(Mutex::new(RouteSet::new()));
        let node = Node::new(
            NodeArgs::new(BusCount::Unbounded, BusCount::Unbounded),
            RouteProcessor {
                routes: Arc::clone(&routes),
            },
        );
        node.update_kernel();
        Self { node, routes }
    }

    #[inline]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn routes(&self) -> RouteSet {
        self.routes.lock().clone()
    }

    /// Adds `route`, first removing any route sharing its source or its
    /// destination point.
    pub fn add_route(&self, route: Route) {
        self.modify(|routes| {
            routes.retain(|existing| {
                existing.source != route.source && existing.destination != route.destination
            });
            routes.insert(route);
        });
    }

    pub fn remove_route(&self, route: &Route) {
        self.modify(|routes| {
            routes.remove(route);
        });
    }

    pub fn remove_route_for_source(&self, source: RoutePoint) {
        self.modify(|routes| routes.retain(|route| route.source != source));
    }

    pub fn remove_route_for_destination(&self, destination: RoutePoint) {
        self.modify(|routes| routes.retain(|route| route.destination != destination));
    }

    pub fn set_routes(&self, routes: RouteSet) {
        self.modify(|current| *current = routes);
    }

    pub fn clear_routes(&self) {
        self.modify(RouteSet::clear);
    }

    fn modify(&self, change: impl FnOnce(&mut RouteSet)) {
        {
            let mut routes = self.routes.lock();
            change(&mut routes);
            tracing::debug!(node = %self.node.id(), routes = routes.len(), "routes changed");
        }
        self.node.update_kernel();
    }
}

impl Default for RouteNode {
    fn default() -> Self {
        Self::new()
    }
}
