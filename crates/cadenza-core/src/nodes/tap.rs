//! Nodes with a replaceable render handler.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::node::{BusCount, Node, NodeArgs, NodeProcessor, RenderArgs};

/// Handler a [`Tap`] renders with.
pub type TapRenderHandler = Box<dyn Fn(&mut RenderArgs<'_>) + Send + Sync>;

struct TapProcessor {
    handler: Arc<ArcSwapOption<TapRenderHandler>>,
}

impl NodeProcessor for TapProcessor {
    fn render(&self, args: &mut RenderArgs<'_>) {
        let handler = self.handler.load();
        match handler.as_deref() {
            Some(handler) => handler(args),
            None => {
                args.render_source();
            }
        }
    }
}

/// A node whose rendering can be swapped at any time.
///
/// Without a handler it passes its source through. A handler may call
/// [`RenderArgs::render_source`] to pull the source first and then inspect
/// or rewrite the buffer.
pub struct Tap {
    node: Arc<Node>,
    handler: Arc<ArcSwapOption<TapRenderHandler>>,
}

impl Tap {
    /// One input bus, one output bus.
    pub fn new() -> Self {
        Self::with_args(NodeArgs::default())
    }

    /// Sink for device input: connect the IO node's output bus 0 to its
    /// input bus 0 and the IO node renders captured input into it.
    pub fn input() -> Self {
        Self::with_args(NodeArgs {
            input_bus_count: BusCount::Bounded(1),
            output_bus_count: BusCount::Bounded(0),
            input_renderable: true,
        })
    }

    fn with_args(args: NodeArgs) -> Self {
        let handler = Arc::new(ArcSwapOption::empty());
        let node = Node::new(
            args,
            TapProcessor {
                handler: Arc::clone(&handler),
            },
        );
        Self { node, handler }
    }

    #[inline]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Replaces the handler. Takes effect from the next render call.
    pub fn set_render_handler<F>(&self, handler: F)
    where
        F: Fn(&mut RenderArgs<'_>) + Send + Sync + 'static,
    {
        let handler: TapRenderHandler = Box::new(handler);
        self.handler.store(Some(Arc::new(handler)));
    }

    pub fn clear_render_handler(&self) {
        self.handler.store(None);
    }
}

impl Default for Tap {
    fn default() -> Self {
        Self::new()
    }
}
