//! Routing table: external sources mapped to project parameters.

use arrayvec::ArrayVec;

use crate::config::ROUTE_COUNT;
use crate::midi::MidiPort;

/// Where a routed value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteSource {
    /// A CV input channel, normalized from [-5V, +5V].
    CvIn { channel: u8 },
    /// A MIDI control change; `port: None` accepts both ports.
    CcMidi {
        port: Option<MidiPort>,
        channel: u8,
        controller: u8,
    },
}

/// Which project parameter a route writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Bpm,
    Swing,
    SyncMeasure,
    Mute { track: u8 },
    Fill { track: u8 },
    Pattern { track: u8 },
}

/// A single source-to-target rule. The normalized source value 0..1 is
/// mapped linearly onto min..max before being written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Route {
    pub source: RouteSource,
    pub target: RouteTarget,
    pub min: f32,
    pub max: f32,
}

/// The project's routing table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Routing {
    routes: ArrayVec<Route, ROUTE_COUNT>,
}

impl Routing {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Add a route; returns false when the table is full.
    pub fn add_route(&mut self, route: Route) -> bool {
        self.routes.try_push(route).is_ok()
    }

    pub fn remove_route(&mut self, index: usize) {
        if index < self.routes.len() {
            self.routes.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}
