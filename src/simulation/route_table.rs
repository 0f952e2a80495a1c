//! All-pairs shortest paths over the junction graph
//!
//! Floyd–Warshall, keeping for each pair the last intermediate junction that
//! shortened it. The first hop of a route is recovered by unwinding those
//! intermediates.

use anyhow::{bail, Result};
use log::warn;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use super::road_network::RoadNetwork;
use super::types::JunctionId;

/// How a pair of junctions is connected in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStep {
    /// A single road, or the pair is the same junction
    Direct,
    /// The shortest route passes through this junction
    Via(JunctionId),
    Unreachable,
}

/// Precomputed routing information, immutable once built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTable {
    size: usize,
    /// Row-major; `None` means unreachable
    distances: Vec<Option<f32>>,
    via: Vec<Option<JunctionId>>,
}

impl RouteTable {
    pub fn compute(network: &RoadNetwork) -> Self {
        let graph = network.graph();
        let size = graph
            .node_weights()
            .map(|j| j.0 + 1)
            .max()
            .unwrap_or(0);
        let mut table = Self {
            size,
            distances: vec![None; size * size],
            via: vec![None; size * size],
        };

        for junction in graph.node_weights() {
            let at = table.slot(*junction, *junction);
            table.distances[at] = Some(0.0);
        }
        for edge in graph.edge_references() {
            let (a, b) = (graph[edge.source()], graph[edge.target()]);
            if a == b {
                continue;
            }
            let at = table.slot(a, b);
            let d = edge.weight().distance;
            if table.distances[at].map_or(true, |current| d < current) {
                table.distances[at] = Some(d);
            }
        }

        for k in 0..size {
            for i in 0..size {
                let Some(ik) = table.distances[i * size + k] else {
                    continue;
                };
                for j in 0..size {
                    let Some(kj) = table.distances[k * size + j] else {
                        continue;
                    };
                    let candidate = ik + kj;
                    let at = i * size + j;
                    if table.distances[at].map_or(true, |current| candidate < current) {
                        table.distances[at] = Some(candidate);
                        table.via[at] = Some(JunctionId(k));
                    }
                }
            }
        }

        table
    }

    fn slot(&self, a: JunctionId, b: JunctionId) -> usize {
        a.0 * self.size + b.0
    }

    fn contains(&self, j: JunctionId) -> bool {
        j.0 < self.size
    }

    /// Fails unless the table covers exactly `junction_count` junctions.
    pub fn check(&self, junction_count: usize) -> Result<()> {
        if self.size != junction_count {
            bail!(
                "Route table covers {} junctions, the map has {}",
                self.size,
                junction_count
            );
        }
        let cells = self.size * self.size;
        if self.distances.len() != cells || self.via.len() != cells {
            bail!(
                "Route table has {} distances and {} hops, expected {}",
                self.distances.len(),
                self.via.len(),
                cells
            );
        }
        if let Some(k) = self.via.iter().flatten().find(|k| !self.contains(**k)) {
            bail!("Route table passes through unknown junction {:?}", k);
        }
        Ok(())
    }

    /// Number of junction slots covered by the table
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn step(&self, start: JunctionId, end: JunctionId) -> RouteStep {
        if !self.contains(start) || !self.contains(end) {
            return RouteStep::Unreachable;
        }
        let at = self.slot(start, end);
        match (self.via[at], self.distances[at]) {
            (Some(k), _) => RouteStep::Via(k),
            (None, Some(_)) => RouteStep::Direct,
            (None, None) => RouteStep::Unreachable,
        }
    }

    /// Length of the shortest route, if there is one
    pub fn distance(&self, start: JunctionId, end: JunctionId) -> Option<f32> {
        if !self.contains(start) || !self.contains(end) {
            return None;
        }
        self.distances[self.slot(start, end)]
    }

    /// The junction to drive to first when heading from `start` to `end`.
    ///
    /// Returns `end` itself when the two are adjacent or equal, `None` when
    /// `end` cannot be reached.
    pub fn next_hop(&self, start: JunctionId, end: JunctionId) -> Option<JunctionId> {
        let mut target = end;
        for _ in 0..=self.size {
            match self.step(start, target) {
                RouteStep::Unreachable => return None,
                RouteStep::Direct => return Some(target),
                RouteStep::Via(k) => target = k,
            }
        }
        warn!(
            "Route from {:?} to {:?} does not resolve, treating as unreachable",
            start, end
        );
        None
    }

    pub fn is_reachable(&self, start: JunctionId, end: JunctionId) -> bool {
        self.next_hop(start, end).is_some()
    }

    /// Every junction visited after `start`, ending with `end`
    pub fn path(&self, start: JunctionId, end: JunctionId) -> Option<Vec<JunctionId>> {
        let mut hops = Vec::new();
        let mut current = start;
        for _ in 0..=self.size {
            if current == end {
                return Some(hops);
            }
            let next = self.next_hop(current, end)?;
            hops.push(next);
            current = next;
        }
        None
    }
}
