//! Standalone convoy traffic simulation
//!
//! Everything needed to build a road map, route vehicles across it and tick
//! the world, with no rendering attached. It can be driven from the console
//! or from tests.

mod collision;
mod convoy;
mod difficulty;
mod fleet;
mod geometry;
mod map;
mod road_network;
mod route_table;
mod session;
mod signal;
mod sim_loop;
mod snapshot;
mod topology;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use collision::{Collidable, Surroundings};
#[allow(unused_imports)]
pub use convoy::Convoy;
#[allow(unused_imports)]
pub use difficulty::{Difficulty, DifficultySettings};
#[allow(unused_imports)]
pub use fleet::{Fleet, Removal};
#[allow(unused_imports)]
pub use geometry::{
    angle_mod_pi, diagonal, heading_angle, is_parallel, line_intersection, opposite_heading,
    same_heading, Footprint,
};
#[allow(unused_imports)]
pub use map::{GraphInput, JunctionSpec, RoadSpec};
#[allow(unused_imports)]
pub use road_network::{RoadEdge, RoadNetwork};
#[allow(unused_imports)]
pub use route_table::{RouteStep, RouteTable};
#[allow(unused_imports)]
pub use session::{SessionContext, SessionStats, SimObserver};
#[allow(unused_imports)]
pub use signal::SignalPost;
#[allow(unused_imports)]
pub use sim_loop::{Command, RunState, SimulationHandle, SimulationLoop, TICK_PERIOD};
#[allow(unused_imports)]
pub use snapshot::{ConvoyView, SignalView, SimSnapshot, VehicleView};
#[allow(unused_imports)]
pub use topology::{Junction, JunctionKind, RoadSegment, SubIntersection, Topology};
#[allow(unused_imports)]
pub use types::{
    Cardinal, ConvoyId, JunctionId, Position, RoadId, SignalId, SubIntersectionId, VehicleId,
    ANGLE_EPSILON, CRASH_DURATION_MS, CRASH_FRAMES, JUNCTION_SIZE, NORMAL_SPEED,
    SIGNAL_ZONE_DEPTH, SIGNAL_ZONE_WIDTH, SPEED_STEP, VEHICLE_LENGTH, VEHICLE_WIDTH,
};
#[allow(unused_imports)]
pub use vehicle::{CrossingDecision, MotionResult, Speed, Vehicle, VehicleState};
pub use world::{reachable_pairs, SimWorld};
