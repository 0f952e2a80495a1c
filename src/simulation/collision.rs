//! The collision pass: what happens when a vehicle touches something
//!
//! Everything a vehicle can run into is a [`Collidable`]; each kind has its
//! own resolution rule.

use super::convoy::Convoy;
use super::fleet::{Fleet, Removal};
use super::geometry::{opposite_heading, same_heading};
use super::route_table::RouteTable;
use super::session::SessionStats;
use super::signal::SignalPost;
use super::topology::Topology;
use super::types::{SignalId, SubIntersectionId, VehicleId};
use super::vehicle::{CrossingDecision, Speed, Vehicle};

/// Anything a vehicle can come into contact with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collidable {
    Vehicle(VehicleId),
    SubIntersection(SubIntersectionId),
    Signal(SignalId),
}

/// Static parts of the world the collision pass reads from
#[derive(Clone, Copy)]
pub struct Surroundings<'a> {
    pub topology: &'a Topology,
    pub routes: &'a RouteTable,
    pub signals: &'a [SignalPost],
}

impl Fleet {
    /// Checks every vehicle against the vehicles after it, then against
    /// every sub-intersection and every signal post, in convoy order.
    pub fn resolve_collisions(&mut self, world: Surroundings<'_>, stats: &mut SessionStats) {
        let order = self.convoy_order();
        for (i, &vehicle) in order.iter().enumerate() {
            for &other in &order[i + 1..] {
                self.resolve(vehicle, Collidable::Vehicle(other), world, stats);
            }
            for sub in world.topology.sub_intersections() {
                self.resolve(vehicle, Collidable::SubIntersection(sub.id), world, stats);
            }
            for signal in world.signals {
                self.resolve(vehicle, Collidable::Signal(signal.id), world, stats);
            }
        }
    }

    /// Whether `vehicle` is currently in contact with `target`
    pub fn touches(&self, vehicle: VehicleId, target: Collidable, world: Surroundings<'_>) -> bool {
        let Some(v) = self.vehicle(vehicle) else {
            return false;
        };
        match target {
            Collidable::Vehicle(other) => {
                other != vehicle
                    && self
                        .vehicle(other)
                        .is_some_and(|o| v.footprint().overlaps(o.footprint()))
            }
            Collidable::SubIntersection(id) => world
                .topology
                .sub_intersection(id)
                .is_some_and(|s| v.footprint().contains(s.point)),
            Collidable::Signal(id) => world
                .signals
                .get(id.0)
                .is_some_and(|s| s.detects(v.footprint())),
        }
    }

    /// Applies the rule for `target` if `vehicle` touches it.
    pub fn resolve(
        &mut self,
        vehicle: VehicleId,
        target: Collidable,
        world: Surroundings<'_>,
        stats: &mut SessionStats,
    ) {
        if !self.touches(vehicle, target, world) {
            return;
        }
        match target {
            Collidable::Vehicle(other) => self.encounter_vehicle(vehicle, other),
            Collidable::SubIntersection(id) => self.cross_sub_intersection(vehicle, id, world, stats),
            Collidable::Signal(id) => self.meet_signal(vehicle, id, world),
        }
    }

    fn encounter_vehicle(&mut self, a: VehicleId, b: VehicleId) {
        let (Some(va), Some(vb)) = (self.vehicle(a), self.vehicle(b)) else {
            return;
        };
        if va.convoy == vb.convoy || !va.is_active() || !vb.is_active() {
            return;
        }
        if opposite_heading(va.heading(), vb.heading()) {
            return;
        }
        let (ca, cb) = (va.convoy, vb.convoy);
        let (Some(convoy_a), Some(convoy_b)) = (self.convoy(ca), self.convoy(cb)) else {
            return;
        };
        if convoy_a.is_joining(cb) || convoy_b.is_joining(ca) {
            return;
        }

        let same_lane = same_heading(va.heading(), vb.heading());
        match (convoy_a.is_singleton(), convoy_b.is_singleton()) {
            (false, false) => {
                // whoever has the other's nose inside it gives way
                if va.footprint().contains(vb.footprint().anchor()) {
                    self.set_waiting(ca, Some(cb));
                    self.set_waiting(cb, None);
                } else {
                    self.set_waiting(cb, Some(ca));
                    self.set_waiting(ca, None);
                }
            }
            (true, true) => {
                if same_lane {
                    self.queue_up(a, b);
                } else {
                    self.crash(a);
                    self.crash(b);
                }
            }
            (true, false) => self.single_meets_convoy(a, b, same_lane),
            (false, true) => self.single_meets_convoy(b, a, same_lane),
        }
    }

    fn single_meets_convoy(&mut self, single: VehicleId, member: VehicleId, same_lane: bool) {
        let crawling = self
            .vehicle(single)
            .is_some_and(|v| v.speed() == Speed::Slow && v.is_running());
        if same_lane && !crawling {
            self.queue_up(single, member);
        } else {
            self.crash(single);
            self.split_at(member);
            self.crash(member);
        }
    }

    /// The convoy of whichever vehicle is behind joins the other's.
    fn queue_up(&mut self, a: VehicleId, b: VehicleId) {
        let (Some(va), Some(vb)) = (self.vehicle(a), self.vehicle(b)) else {
            return;
        };
        let (behind, ahead) = if is_behind(va, vb) { (va, vb) } else { (vb, va) };
        let (joiner, target) = (behind.convoy, ahead.convoy);
        self.request_join(joiner, target);
        self.clear_join(target);
    }

    fn cross_sub_intersection(
        &mut self,
        vehicle: VehicleId,
        sub_id: SubIntersectionId,
        world: Surroundings<'_>,
        stats: &mut SessionStats,
    ) {
        let (Some(v), Some(sub)) = (self.vehicle(vehicle), world.topology.sub_intersection(sub_id))
        else {
            return;
        };
        let head_target = self.head_of(v.convoy).and_then(Vehicle::target);

        match v.plan_crossing(sub, world.topology, world.routes, head_target) {
            CrossingDecision::Ignore => {}
            CrossingDecision::Remove => self.remove_vehicle(vehicle, Removal::Arrived, stats),
            CrossingDecision::Take { sub, road } => {
                let (Some(chosen), Some(segment)) =
                    (world.topology.sub_intersection(sub), world.topology.road(road))
                else {
                    return;
                };
                let Some(v) = self.vehicle_mut(vehicle) else {
                    return;
                };
                v.adopt_road(sub, chosen.point, segment);
                let (target, convoy) = (v.target(), v.convoy);

                if self.head_of(convoy).and_then(Vehicle::target) != target {
                    self.split_at(vehicle);
                }
            }
        }
    }

    fn meet_signal(&mut self, vehicle: VehicleId, id: SignalId, world: Surroundings<'_>) {
        let Some(signal) = world.signals.get(id.0) else {
            return;
        };
        let Some(v) = self.vehicle_mut(vehicle) else {
            return;
        };
        if !v.is_active() || v.in_signal_zone() || !same_heading(signal.heading(), v.heading()) {
            return;
        }

        if signal.is_green() {
            v.pass_green_light();
            return;
        }
        v.stop_at_red_light();
        let convoy = v.convoy;
        if self.convoy(convoy).and_then(Convoy::head) != Some(vehicle) {
            self.split_at(vehicle);
        }
    }
}

/// `a` trails `b` on their common heading. Exact ties go to whoever has
/// its nose inside the other.
fn is_behind(a: &Vehicle, b: &Vehicle) -> bool {
    let gap = (b.center() - a.center()).dot(&a.heading());
    if gap.abs() > 1e-3 {
        gap > 0.0
    } else {
        b.footprint().contains(a.footprint().anchor())
    }
}
