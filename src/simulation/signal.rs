//! Traffic lights at road ends

use serde::{Deserialize, Serialize};

use super::geometry::Footprint;
use super::topology::RoadSegment;
use super::types::{Position, RoadId, SignalId, SIGNAL_ZONE_DEPTH, SIGNAL_ZONE_WIDTH};

/// A two-state light guarding the last stretch of a road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPost {
    pub id: SignalId,
    pub road: RoadId,
    green: bool,
    heading: Position,
    zone: Footprint,
}

impl SignalPost {
    /// A green light whose zone covers the lane just before the road ends.
    pub fn new(id: SignalId, road: &RoadSegment) -> Self {
        let heading = road.heading();
        let center = road.end_point - heading * (SIGNAL_ZONE_DEPTH / 2.0);
        Self {
            id,
            road: road.id,
            green: true,
            heading,
            zone: Footprint::oriented(center, heading, SIGNAL_ZONE_WIDTH, SIGNAL_ZONE_DEPTH),
        }
    }

    pub fn is_green(&self) -> bool {
        self.green
    }

    pub fn toggle(&mut self) {
        self.green = !self.green;
    }

    /// Direction of the traffic this light applies to
    pub fn heading(&self) -> Position {
        self.heading
    }

    pub fn zone(&self) -> &Footprint {
        &self.zone
    }

    /// Whether a vehicle footprint reaches into the detection zone
    pub fn detects(&self, footprint: &Footprint) -> bool {
        self.zone.overlaps(footprint)
    }
}
