//! Channel routes between buses and the channel maps derived from them.

use core::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A channel on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutePoint {
    pub bus: u32,
    pub channel: u32,
}

impl RoutePoint {
    pub const fn new(bus: u32, channel: u32) -> Self {
        Self { bus, channel }
    }
}

/// Sends one source channel to one destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub source: RoutePoint,
    pub destination: RoutePoint,
}

impl Route {
    pub const fn new(source: RoutePoint, destination: RoutePoint) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Same bus and channel on both sides.
    pub const fn direct(bus: u32, channel: u32) -> Self {
        Self::new(RoutePoint::new(bus, channel), RoutePoint::new(bus, channel))
    }

    pub const fn with_buses(src_bus: u32, src_ch: u32, dst_bus: u32, dst_ch: u32) -> Self {
        Self::new(RoutePoint::new(src_bus, src_ch), RoutePoint::new(dst_bus, dst_ch))
    }
}

// Grouped by bus pair first so routes feeding one map sit together.
impl Ord for Route {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source
            .bus
            .cmp(&other.source.bus)
            .then(self.destination.bus.cmp(&other.destination.bus))
            .then(self.source.channel.cmp(&other.source.channel))
            .then(self.destination.channel.cmp(&other.destination.channel))
    }
}

impl PartialOrd for Route {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub type RouteSet = BTreeSet<Route>;

/// Destination channel per source channel, `-1` where unrouted.
pub type ChannelMap = SmallVec<[i32; 8]>;

/// Builds the map from `src_bus` to `dst_bus`, or `None` when no route in
/// range connects them.
///
/// Entry `n` names the destination channel source channel `n` feeds.
pub fn channel_map_from_routes(
    routes: &RouteSet,
    src_bus: u32,
    src_ch_count: u32,
    dst_bus: u32,
    dst_ch_count: u32,
) -> Option<ChannelMap> {
    let mut map: ChannelMap = SmallVec::from_elem(-1, src_ch_count as usize);
    let mut exists = false;

    for route in routes {
        if route.source.bus == src_bus
            && route.destination.bus == dst_bus
            && route.source.channel < src_ch_count
            && route.destination.channel < dst_ch_count
        {
            map[route.source.channel as usize] = route.destination.channel as i32;
            exists = true;
        }
    }

    exists.then_some(map)
}
