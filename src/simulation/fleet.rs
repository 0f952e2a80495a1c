//! Owner of every vehicle and convoy
//!
//! All membership changes (spawn, split, merge, removal) go through here so
//! that every vehicle always belongs to exactly one non-empty convoy.

use anyhow::{anyhow, bail, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::HashSet;

use super::convoy::Convoy;
use super::geometry::diagonal;
use super::route_table::RouteTable;
use super::session::SessionStats;
use super::topology::Topology;
use super::types::{ConvoyId, JunctionId, VehicleId, VEHICLE_LENGTH, VEHICLE_WIDTH};
use super::vehicle::{MotionResult, Speed, Vehicle};

/// Why a vehicle leaves the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Reached its destination or a dead end
    Arrived,
    /// Its crash animation finished
    Crashed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fleet {
    vehicles: SlotMap<VehicleId, Vehicle>,
    convoys: SlotMap<ConvoyId, Convoy>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub(crate) fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id)
    }

    pub fn convoy(&self, id: ConvoyId) -> Option<&Convoy> {
        self.convoys.get(id)
    }

    pub(crate) fn convoy_mut(&mut self, id: ConvoyId) -> Option<&mut Convoy> {
        self.convoys.get_mut(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> + '_ {
        self.vehicles.values()
    }

    pub fn convoys(&self) -> impl Iterator<Item = &Convoy> + '_ {
        self.convoys.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn convoy_count(&self) -> usize {
        self.convoys.len()
    }

    /// The convoy a vehicle belongs to
    pub fn convoy_of(&self, vehicle: VehicleId) -> Option<&Convoy> {
        self.convoys.get(self.vehicles.get(vehicle)?.convoy)
    }

    /// Lead vehicle of a convoy
    pub fn head_of(&self, convoy: ConvoyId) -> Option<&Vehicle> {
        self.vehicles.get(self.convoys.get(convoy)?.head()?)
    }

    /// Every vehicle, convoy by convoy, heads first
    pub fn convoy_order(&self) -> Vec<VehicleId> {
        self.convoys.values().flat_map(|c| c.iter()).collect()
    }

    /// Places a new singleton convoy on `start`, routed to `destination`.
    ///
    /// Returns `None` when the destination cannot be reached from `start`.
    pub fn spawn(
        &mut self,
        start: JunctionId,
        destination: JunctionId,
        topology: &Topology,
        routes: &RouteTable,
    ) -> Option<VehicleId> {
        let first_hop = routes.next_hop(start, destination)?;
        if first_hop == start {
            return None;
        }
        let (sub_id, road_id) = topology.junction_road_to(start, first_hop)?;
        let sub = topology.sub_intersection(sub_id)?;
        let road = topology.road(road_id)?;

        let convoy = self
            .convoys
            .insert_with_key(|id| Convoy::new(id, Vec::new()));
        let vehicle = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, convoy, sub, road, destination));
        if let Some(c) = self.convoys.get_mut(convoy) {
            *c = Convoy::new(convoy, vec![vehicle]);
        }
        debug!(
            "Spawned vehicle {:?} at {} heading for {:?} via {:?}",
            vehicle, sub.point, destination, first_hop
        );
        Some(vehicle)
    }

    /// Takes a vehicle off the map. A singleton convoy disappears with it.
    pub fn remove_vehicle(&mut self, id: VehicleId, why: Removal, stats: &mut SessionStats) {
        let Some(vehicle) = self.vehicles.remove(id) else {
            return;
        };

        let convoy = vehicle.convoy;
        let last_member = match self.convoys.get_mut(convoy) {
            Some(c) => {
                c.remove_member(id);
                c.is_empty()
            }
            None => false,
        };
        if last_member {
            self.convoys.remove(convoy);
        }

        match why {
            Removal::Arrived => stats.arrived += 1,
            Removal::Crashed => stats.crashed += 1,
        }
        debug!("Vehicle {:?} removed ({:?})", id, why);
    }

    /// Detaches `vehicle` and everyone behind it into a new convoy.
    ///
    /// The head cannot be detached from its own convoy; `None` is returned.
    pub fn split_at(&mut self, vehicle: VehicleId) -> Option<ConvoyId> {
        let convoy = self.vehicles.get(vehicle)?.convoy;
        let rear = self.convoys.get_mut(convoy)?.split_off_at(vehicle)?;
        let new_id = self
            .convoys
            .insert_with_key(|id| Convoy::new(id, rear.clone()));
        for id in &rear {
            if let Some(v) = self.vehicles.get_mut(*id) {
                v.convoy = new_id;
            }
        }
        debug!(
            "Convoy {:?} split at {:?}, {} vehicle(s) now in {:?}",
            convoy,
            vehicle,
            rear.len(),
            new_id
        );
        Some(new_id)
    }

    /// Asks `joiner` to catch up with and absorb `target`.
    pub fn request_join(&mut self, joiner: ConvoyId, target: ConvoyId) {
        if joiner == target {
            return;
        }
        let Some(convoy) = self.convoys.get_mut(joiner) else {
            return;
        };
        if convoy.is_joining(target) {
            return;
        }
        convoy.set_join_target(Some(target));

        for id in [joiner, target] {
            let Some(c) = self.convoys.get(id) else {
                continue;
            };
            if let (true, Some(head)) = (c.is_singleton(), c.head()) {
                if let Some(v) = self.vehicles.get_mut(head) {
                    v.set_speed(Speed::Normal);
                }
            }
        }
        debug!("Convoy {:?} will join {:?}", joiner, target);
    }

    pub fn clear_join(&mut self, convoy: ConvoyId) {
        if let Some(c) = self.convoys.get_mut(convoy) {
            c.set_join_target(None);
        }
    }

    pub fn set_waiting(&mut self, waiter: ConvoyId, target: Option<ConvoyId>) {
        if let Some(c) = self.convoys.get_mut(waiter) {
            c.set_wait_target(target);
        }
    }

    /// True once no corner of our vehicles lies inside one of theirs.
    /// A convoy that no longer exists has always passed.
    pub fn has_passed(&self, me: ConvoyId, other: Option<ConvoyId>) -> bool {
        let Some(other) = other else {
            return true;
        };
        let (Some(mine), Some(theirs)) = (self.convoys.get(me), self.convoys.get(other)) else {
            return true;
        };
        !mine.iter().filter_map(|id| self.vehicles.get(id)).any(|a| {
            theirs
                .iter()
                .filter_map(|id| self.vehicles.get(id))
                .any(|b| a.footprint().has_corner_inside(b.footprint()))
        })
    }

    /// Whether the convoy may close in on its join target this tick.
    pub fn can_join(&self, me: ConvoyId, topology: &Topology, routes: &RouteTable) -> bool {
        let Some(convoy) = self.convoys.get(me) else {
            return true;
        };
        let Some(target) = convoy.join_target() else {
            return true;
        };
        let Some(front) = self.convoys.get(target) else {
            return true;
        };
        let Some(tail) = front.tail().and_then(|id| self.vehicles.get(id)) else {
            return true;
        };
        if tail.convoy != target {
            return true;
        }
        let Some(head) = convoy.head().and_then(|id| self.vehicles.get(id)) else {
            return true;
        };

        let clearance = diagonal(VEHICLE_WIDTH, VEHICLE_LENGTH);
        if head.target() == tail.target() {
            return head.footprint().min_corner_distance(tail.footprint()) > clearance;
        }

        let head_next = head
            .target()
            .and_then(|t| routes.next_hop(t, head.destination()));
        if head_next.is_some() && head_next == tail.target() {
            // the tail already turned at a junction we still have to reach
            let Some(turn) = tail
                .last_traversed()
                .and_then(|s| topology.sub_intersection(s))
            else {
                return true;
            };
            let gap = head.footprint().front_center().distance(&turn.point)
                + tail.footprint().rear_center().distance(&turn.point);
            return gap > clearance;
        }
        true
    }

    /// Advances every convoy by `elapsed_ms` of simulated time.
    pub fn update(
        &mut self,
        elapsed_ms: f32,
        topology: &Topology,
        routes: &RouteTable,
        stats: &mut SessionStats,
    ) {
        let ids: Vec<ConvoyId> = self.convoys.keys().collect();
        for id in ids {
            self.update_convoy(id, elapsed_ms, topology, routes, stats);
        }
    }

    fn update_convoy(
        &mut self,
        id: ConvoyId,
        elapsed_ms: f32,
        topology: &Topology,
        routes: &RouteTable,
        stats: &mut SessionStats,
    ) {
        let Some(convoy) = self.convoys.get(id) else {
            return;
        };
        let (wait, join) = (convoy.wait_target(), convoy.join_target());
        if !self.has_passed(id, wait) {
            trace!("Convoy {:?} waiting for {:?}", id, wait);
            return;
        }
        self.set_waiting(id, None);

        if self.has_passed(id, join) && self.can_join(id, topology, routes) {
            self.advance_members(id, elapsed_ms, stats);
            if let Some(target) = join {
                self.complete_join(id, target);
            }
        }
    }

    fn advance_members(&mut self, id: ConvoyId, elapsed_ms: f32, stats: &mut SessionStats) {
        let Some(members) = self.convoys.get(id).map(Convoy::members) else {
            return;
        };
        let Some((&head, followers)) = members.split_first() else {
            return;
        };
        if self.step_vehicle(head, elapsed_ms, stats) {
            for &follower in followers {
                self.step_vehicle(follower, elapsed_ms, stats);
            }
        }
    }

    /// Moves one vehicle; returns whether it is still running afterwards.
    fn step_vehicle(&mut self, id: VehicleId, elapsed_ms: f32, stats: &mut SessionStats) -> bool {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return false;
        };
        let result = vehicle.advance(elapsed_ms);
        let running = vehicle.is_running();
        if result == MotionResult::CrashFinished {
            self.remove_vehicle(id, Removal::Crashed, stats);
        }
        running
    }

    /// Splices the members of `target` in front of ours and drops `target`.
    fn complete_join(&mut self, id: ConvoyId, target: ConvoyId) {
        if id == target || !self.convoys.contains_key(id) {
            return;
        }
        let Some(front) = self.convoys.remove(target) else {
            self.clear_join(id);
            return;
        };
        let members = front.members();
        for vehicle in members.iter() {
            if let Some(v) = self.vehicles.get_mut(*vehicle) {
                v.convoy = id;
            }
        }
        if let Some(convoy) = self.convoys.get_mut(id) {
            convoy.prepend(&members);
            convoy.set_join_target(None);
            debug!(
                "Convoy {:?} absorbed {:?}, now {} vehicle(s)",
                id,
                target,
                convoy.len()
            );
        }
    }

    pub fn crash(&mut self, id: VehicleId) {
        if let Some(v) = self.vehicles.get_mut(id) {
            if v.is_active() {
                v.crash();
                debug!("Vehicle {:?} crashed at {}", id, v.center());
            }
        }
    }

    /// One speed step up; only a convoy of one can change speed.
    pub fn accelerate(&mut self, id: VehicleId) -> bool {
        self.change_speed(id, Speed::faster)
    }

    /// One speed step down; only a convoy of one can change speed.
    pub fn decelerate(&mut self, id: VehicleId) -> bool {
        self.change_speed(id, Speed::slower)
    }

    fn change_speed(&mut self, id: VehicleId, step: fn(Speed) -> Speed) -> bool {
        if !self.convoy_of(id).is_some_and(Convoy::is_singleton) {
            return false;
        }
        match self.vehicles.get_mut(id) {
            Some(v) => {
                v.set_speed(step(v.speed()));
                true
            }
            None => false,
        }
    }

    /// Asks a vehicle to leave its convoy at the next junction.
    pub fn force_quit(&mut self, id: VehicleId) -> bool {
        match self.vehicles.get_mut(id) {
            Some(v) => {
                v.request_force_quit();
                true
            }
            None => false,
        }
    }

    /// Restores vehicle → convoy links and derived geometry after loading.
    pub fn relink(&mut self) -> Result<()> {
        for (convoy_id, convoy) in &self.convoys {
            for id in convoy.iter() {
                let vehicle = self
                    .vehicles
                    .get_mut(id)
                    .ok_or_else(|| anyhow!("Convoy {:?} lists unknown vehicle {:?}", convoy_id, id))?;
                vehicle.convoy = convoy_id;
            }
        }
        for vehicle in self.vehicles.values_mut() {
            vehicle.refresh_footprint();
        }
        self.check_membership()
    }

    /// Every vehicle in exactly one convoy, no convoy empty, links agree.
    pub fn check_membership(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (convoy_id, convoy) in &self.convoys {
            if convoy.is_empty() {
                bail!("Convoy {:?} is empty", convoy_id);
            }
            for id in convoy.iter() {
                if !seen.insert(id) {
                    bail!("Vehicle {:?} is listed twice", id);
                }
                match self.vehicles.get(id) {
                    Some(v) if v.convoy == convoy_id => {}
                    Some(v) => bail!(
                        "Vehicle {:?} points at {:?} but is listed by {:?}",
                        id,
                        v.convoy,
                        convoy_id
                    ),
                    None => bail!("Convoy {:?} lists unknown vehicle {:?}", convoy_id, id),
                }
            }
        }
        if seen.len() != self.vehicles.len() {
            bail!(
                "{} vehicle(s) belong to no convoy",
                self.vehicles.len() - seen.len()
            );
        }
        Ok(())
    }
}
