//! A single vehicle: motion, crash animation and route choice at junctions
//!
//! Vehicles never touch their convoy directly. Decisions that change
//! membership are returned to the fleet, which applies them.

use serde::{Deserialize, Serialize};

use super::geometry::{is_parallel, same_heading, Footprint};
use super::route_table::RouteTable;
use super::topology::{RoadSegment, SubIntersection, Topology};
use super::types::{
    ConvoyId, JunctionId, Position, RoadId, SubIntersectionId, VehicleId, CRASH_DURATION_MS,
    CRASH_FRAMES, NORMAL_SPEED, SPEED_STEP, VEHICLE_LENGTH, VEHICLE_WIDTH,
};

/// Discrete cruising speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Speed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl Speed {
    /// Pixels per millisecond
    pub fn value(self) -> f32 {
        match self {
            Speed::Slow => NORMAL_SPEED / SPEED_STEP,
            Speed::Normal => NORMAL_SPEED,
            Speed::Fast => NORMAL_SPEED * SPEED_STEP,
        }
    }

    pub fn faster(self) -> Speed {
        match self {
            Speed::Slow => Speed::Normal,
            _ => Speed::Fast,
        }
    }

    pub fn slower(self) -> Speed {
        match self {
            Speed::Fast => Speed::Normal,
            _ => Speed::Slow,
        }
    }
}

/// Lifecycle of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VehicleState {
    Running,
    /// Held by a red light
    Stopped,
    /// Playing the crash animation; never moves again
    Crashing { elapsed_ms: f32 },
}

/// Result of advancing a vehicle by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionResult {
    Moved,
    Idle,
    /// The crash animation just ended; the vehicle must be removed
    CrashFinished,
}

/// What a vehicle wants to do about a sub-intersection under it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingDecision {
    Ignore,
    /// Arrived, or stuck with no way on
    Remove,
    /// Re-centre on `sub` and follow `road`
    Take { sub: SubIntersectionId, road: RoadId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Owning convoy; re-linked from the member lists after a restore
    #[serde(skip)]
    pub convoy: ConvoyId,
    center: Position,
    heading: Position,
    road: RoadId,
    speed: Speed,
    state: VehicleState,
    destination: JunctionId,
    target: Option<JunctionId>,
    last_traversed: Option<SubIntersectionId>,
    in_signal_zone: bool,
    force_quit: bool,
    #[serde(skip)]
    footprint: Footprint,
}

impl Vehicle {
    /// A vehicle parked on `sub`, about to drive along `road` towards `destination`.
    pub fn new(
        id: VehicleId,
        convoy: ConvoyId,
        sub: &SubIntersection,
        road: &RoadSegment,
        destination: JunctionId,
    ) -> Self {
        let mut vehicle = Self {
            id,
            convoy,
            center: sub.point,
            heading: road.heading(),
            road: road.id,
            speed: Speed::Normal,
            state: VehicleState::Running,
            destination,
            target: Some(road.end),
            last_traversed: Some(sub.id),
            in_signal_zone: false,
            force_quit: false,
            footprint: Footprint::default(),
        };
        vehicle.refresh_footprint();
        vehicle
    }

    /// Recomputes the footprint from centre and heading
    pub fn refresh_footprint(&mut self) {
        self.footprint = Footprint::oriented(self.center, self.heading, VEHICLE_WIDTH, VEHICLE_LENGTH);
    }

    pub fn center(&self) -> Position {
        self.center
    }

    pub fn heading(&self) -> Position {
        self.heading
    }

    pub fn road(&self) -> RoadId {
        self.road
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn destination(&self) -> JunctionId {
        self.destination
    }

    /// The junction the vehicle is currently driving to
    pub fn target(&self) -> Option<JunctionId> {
        self.target
    }

    pub fn last_traversed(&self) -> Option<SubIntersectionId> {
        self.last_traversed
    }

    pub fn is_running(&self) -> bool {
        self.state == VehicleState::Running
    }

    pub fn is_crashing(&self) -> bool {
        matches!(self.state, VehicleState::Crashing { .. })
    }

    /// Still part of the traffic: not crashing and not removed
    pub fn is_active(&self) -> bool {
        matches!(self.state, VehicleState::Running | VehicleState::Stopped)
    }

    pub fn in_signal_zone(&self) -> bool {
        self.in_signal_zone
    }

    pub fn is_force_quitting(&self) -> bool {
        self.force_quit
    }

    pub fn request_force_quit(&mut self) {
        self.force_quit = true;
    }

    /// Current frame of the crash animation, 1-based
    pub fn crash_frame(&self) -> Option<u8> {
        let VehicleState::Crashing { elapsed_ms } = self.state else {
            return None;
        };
        let progress = elapsed_ms / CRASH_DURATION_MS;
        let frame = if progress >= 4.0 / 5.0 {
            4
        } else if progress >= 3.0 / 5.0 {
            3
        } else if progress >= 2.0 / 5.0 {
            2
        } else {
            1
        };
        Some(frame.min(CRASH_FRAMES))
    }

    /// Starts the crash animation. Has no effect on a vehicle already crashing.
    pub fn crash(&mut self) {
        if self.is_active() {
            self.state = VehicleState::Crashing { elapsed_ms: 0.0 };
        }
    }

    /// Moves the vehicle or advances its crash animation by `elapsed_ms`.
    pub fn advance(&mut self, elapsed_ms: f32) -> MotionResult {
        match self.state {
            VehicleState::Running => {
                if self.heading.is_zero() || elapsed_ms <= 0.0 {
                    return MotionResult::Idle;
                }
                self.center += self.heading * (self.speed.value() * elapsed_ms);
                self.refresh_footprint();
                MotionResult::Moved
            }
            VehicleState::Crashing { elapsed_ms: so_far } => {
                let elapsed_ms = so_far + elapsed_ms.max(0.0);
                self.state = VehicleState::Crashing { elapsed_ms };
                if elapsed_ms > CRASH_DURATION_MS {
                    MotionResult::CrashFinished
                } else {
                    MotionResult::Idle
                }
            }
            VehicleState::Stopped => MotionResult::Idle,
        }
    }

    /// Green light ahead: note it so the light is not looked at again and
    /// get going if the light held us.
    pub fn pass_green_light(&mut self) {
        self.in_signal_zone = true;
        if self.state == VehicleState::Stopped {
            self.state = VehicleState::Running;
        }
    }

    /// Red light ahead.
    pub fn stop_at_red_light(&mut self) {
        if self.state == VehicleState::Running {
            self.state = VehicleState::Stopped;
        }
    }

    /// Follows `road` from the sub-intersection at `point`.
    pub fn adopt_road(&mut self, sub: SubIntersectionId, point: Position, road: &RoadSegment) {
        self.last_traversed = Some(sub);
        self.target = Some(road.end);
        self.road = road.id;
        self.center = point;
        self.heading = road.heading();
        self.in_signal_zone = false;
        self.force_quit = false;
        self.refresh_footprint();
    }

    /// Decides what to do about `sub`, which lies under the vehicle.
    ///
    /// `head_target` is the target of the convoy's head, used when the
    /// vehicle was asked to leave its convoy.
    pub fn plan_crossing(
        &self,
        sub: &SubIntersection,
        topology: &Topology,
        routes: &RouteTable,
        head_target: Option<JunctionId>,
    ) -> CrossingDecision {
        if !self.is_running() || self.last_traversed == Some(sub.id) {
            return CrossingDecision::Ignore;
        }

        let next = self
            .target
            .and_then(|target| routes.next_hop(target, self.destination));
        let junction = sub.junction();
        if !self.force_quit && Some(junction) != self.target && junction != self.destination {
            return CrossingDecision::Ignore;
        }
        if junction == self.destination || (sub.is_final() && next.is_none()) {
            return CrossingDecision::Remove;
        }

        let offered = match (self.target, next) {
            (Some(target), Some(next)) => topology.junction_road_to(target, next),
            _ => None,
        };
        if offered.is_none() && sub.is_final() {
            return CrossingDecision::Remove;
        }

        let Some(next) = next else {
            // off the route table: any road out of here will do
            return match sub.roads().first() {
                Some(&road) => CrossingDecision::Take { sub: sub.id, road },
                None => CrossingDecision::Ignore,
            };
        };

        let here = if self.force_quit && head_target == Some(next) {
            self.road_away_from(sub, next, topology)
        } else {
            topology.road_to(sub, next)
        };
        if let Some(road) = here {
            return CrossingDecision::Take { sub: sub.id, road };
        }

        let Some((_, offered_road)) = offered else {
            return CrossingDecision::Ignore;
        };
        let Some(offered_vector) = topology.road(offered_road).map(|r| r.vector) else {
            return CrossingDecision::Ignore;
        };
        if is_parallel(offered_vector, self.heading) && !same_heading(offered_vector, self.heading) {
            // the next hop lies behind us: leave by whatever still leads home
            return match self.reroute_ahead(sub, topology, routes) {
                Some((sub, road)) => CrossingDecision::Take { sub, road },
                None => CrossingDecision::Remove,
            };
        }
        CrossingDecision::Ignore
    }

    /// A road out of `sub` that neither leads to `avoid` nor runs along our lane
    fn road_away_from(
        &self,
        sub: &SubIntersection,
        avoid: JunctionId,
        topology: &Topology,
    ) -> Option<RoadId> {
        sub.roads().iter().copied().find(|id| {
            topology
                .road(*id)
                .is_some_and(|r| r.end != avoid && !is_parallel(r.vector, self.heading))
        })
    }

    /// Searches `sub` and the sub-intersections ahead of it on our line for a
    /// road from whose end the destination can still be reached.
    fn reroute_ahead(
        &self,
        sub: &SubIntersection,
        topology: &Topology,
        routes: &RouteTable,
    ) -> Option<(SubIntersectionId, RoadId)> {
        let siblings = topology.junction(sub.junction())?.sub_intersections();
        let mut ahead: Vec<(f32, &SubIntersection)> = siblings
            .iter()
            .filter(|s| s.id != sub.id)
            .filter_map(|s| {
                let offset = s.point - sub.point;
                let along = offset.dot(&self.heading);
                let aside = offset.cross(&self.heading).abs();
                (along > 0.0 && aside < 1e-3).then_some((along, s))
            })
            .collect();
        ahead.sort_by(|a, b| a.0.total_cmp(&b.0));

        std::iter::once(sub)
            .chain(ahead.into_iter().map(|(_, s)| s))
            .find_map(|candidate| {
                candidate
                    .roads()
                    .iter()
                    .copied()
                    .find(|id| {
                        topology
                            .road(*id)
                            .is_some_and(|r| routes.is_reachable(r.end, self.destination))
                    })
                    .map(|road| (candidate.id, road))
            })
    }
}
