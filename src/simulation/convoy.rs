//! Convoys: ordered groups of vehicles moving as one
//!
//! The member list is copy-on-write. Every change builds a fresh
//! `Arc<[VehicleId]>`, so a list handed out earlier (to a snapshot, or to a
//! loop iterating members) never changes under its reader.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::{ConvoyId, VehicleId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convoy {
    pub id: ConvoyId,
    members: Arc<[VehicleId]>,
    join_target: Option<ConvoyId>,
    wait_target: Option<ConvoyId>,
}

impl Convoy {
    pub fn new(id: ConvoyId, members: Vec<VehicleId>) -> Self {
        Self {
            id,
            members: members.into(),
            join_target: None,
            wait_target: None,
        }
    }

    /// Shared handle on the current member list, head first
    pub fn members(&self) -> Arc<[VehicleId]> {
        Arc::clone(&self.members)
    }

    pub fn iter(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.members.iter().copied()
    }

    pub fn head(&self) -> Option<VehicleId> {
        self.members.first().copied()
    }

    pub fn tail(&self) -> Option<VehicleId> {
        self.members.last().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.members.contains(&vehicle)
    }

    pub fn position_of(&self, vehicle: VehicleId) -> Option<usize> {
        self.members.iter().position(|v| *v == vehicle)
    }

    pub fn join_target(&self) -> Option<ConvoyId> {
        self.join_target
    }

    pub fn wait_target(&self) -> Option<ConvoyId> {
        self.wait_target
    }

    pub fn set_join_target(&mut self, target: Option<ConvoyId>) {
        self.join_target = target;
    }

    pub fn set_wait_target(&mut self, target: Option<ConvoyId>) {
        self.wait_target = target;
    }

    /// Whether this convoy is on its way to absorb `other`
    pub fn is_joining(&self, other: ConvoyId) -> bool {
        self.join_target == Some(other)
    }

    /// Cuts the list at `vehicle`: this convoy keeps everything in front of
    /// it, the returned list holds `vehicle` and everything behind.
    ///
    /// Returns `None` when `vehicle` is the head or not a member.
    pub fn split_off_at(&mut self, vehicle: VehicleId) -> Option<Vec<VehicleId>> {
        let at = self.position_of(vehicle)?;
        if at == 0 {
            return None;
        }
        let rear = self.members[at..].to_vec();
        self.members = self.members[..at].into();
        Some(rear)
    }

    /// Drops one member. Returns false if it was not a member.
    pub fn remove_member(&mut self, vehicle: VehicleId) -> bool {
        if !self.contains(vehicle) {
            return false;
        }
        self.members = self.members.iter().copied().filter(|v| *v != vehicle).collect();
        true
    }

    /// Puts `front` ahead of the current members.
    pub fn prepend(&mut self, front: &[VehicleId]) {
        self.members = front.iter().chain(self.members.iter()).copied().collect();
    }
}
