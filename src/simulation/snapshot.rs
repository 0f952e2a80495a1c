//! Read-only picture of the world, published once per tick

use ordered_float::OrderedFloat;
use serde::Serialize;
use std::sync::Arc;

use super::geometry::Footprint;
use super::session::SessionStats;
use super::topology::Topology;
use super::types::{ConvoyId, JunctionId, Position, RoadId, SignalId, VehicleId};
use super::vehicle::{Speed, VehicleState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub id: VehicleId,
    pub convoy: ConvoyId,
    pub footprint: Footprint,
    pub state: VehicleState,
    pub speed: Speed,
    pub crash_frame: Option<u8>,
    pub destination: JunctionId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalView {
    pub id: SignalId,
    pub road: RoadId,
    pub green: bool,
    pub zone: Footprint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvoyView {
    pub id: ConvoyId,
    /// Same list the fleet holds; never mutated in place
    pub members: Arc<[VehicleId]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub topology: Arc<Topology>,
    pub vehicles: Vec<VehicleView>,
    pub convoys: Vec<ConvoyView>,
    pub signals: Vec<SignalView>,
    pub stats: SessionStats,
}

impl SimSnapshot {
    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleView> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    /// The vehicle under `point`, nearest centre first
    pub fn vehicle_at(&self, point: Position) -> Option<VehicleId> {
        self.vehicles
            .iter()
            .filter(|v| v.footprint.contains(point))
            .min_by_key(|v| OrderedFloat(v.footprint.center().distance(&point)))
            .map(|v| v.id)
    }

    /// The signal post whose zone covers `point`
    pub fn signal_at(&self, point: Position) -> Option<SignalId> {
        self.signals
            .iter()
            .find(|s| s.zone.contains(point))
            .map(|s| s.id)
    }
}
