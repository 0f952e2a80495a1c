//! Junction graph for route planning
//!
//! A thin petgraph wrapper: one node per junction, one edge per road,
//! weighted by the road's length.

use anyhow::{anyhow, Result};
use ordered_float::OrderedFloat;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use super::topology::{RoadSegment, Topology};
use super::types::{JunctionId, RoadId};

/// Edge data for the road network graph
#[derive(Debug, Clone, Copy)]
pub struct RoadEdge {
    pub road_id: RoadId,
    pub distance: f32,
}

impl RoadEdge {
    pub fn from_road(road: &RoadSegment) -> Self {
        Self {
            road_id: road.id,
            distance: road.distance,
        }
    }
}

/// Directed graph of junctions
#[derive(Debug, Default)]
pub struct RoadNetwork {
    /// The underlying petgraph directed graph (one-way roads)
    graph: DiGraph<JunctionId, RoadEdge>,

    /// Maps junction IDs to their node indices in the graph
    junction_to_node: HashMap<JunctionId, NodeIndex>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_topology(topology: &Topology) -> Self {
        let mut network = Self::new();
        for junction in topology.junctions() {
            network.add_junction(junction.id);
        }
        for road in topology.roads() {
            network.add_road(road.start, road.end, RoadEdge::from_road(road));
        }
        network
    }

    /// Adds a junction to the network graph
    pub fn add_junction(&mut self, junction_id: JunctionId) {
        if self.junction_to_node.contains_key(&junction_id) {
            return;
        }
        let node_index = self.graph.add_node(junction_id);
        self.junction_to_node.insert(junction_id, node_index);
    }

    /// Adds a one-way road, creating missing junctions on the way
    pub fn add_road(&mut self, start: JunctionId, end: JunctionId, edge: RoadEdge) {
        self.add_junction(start);
        self.add_junction(end);
        let start_node = self.junction_to_node[&start];
        let end_node = self.junction_to_node[&end];
        self.graph.add_edge(start_node, end_node, edge);
    }

    pub fn road_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_of(&self, junction: JunctionId) -> Option<NodeIndex> {
        self.junction_to_node.get(&junction).copied()
    }

    pub fn graph(&self) -> &DiGraph<JunctionId, RoadEdge> {
        &self.graph
    }

    /// Finds the shortest road connecting two junctions
    pub fn find_road_between(&self, from: JunctionId, to: JunctionId) -> Result<RoadId> {
        let from_node = self
            .node_of(from)
            .ok_or_else(|| anyhow!("Junction {:?} not found", from))?;
        let to_node = self
            .node_of(to)
            .ok_or_else(|| anyhow!("Junction {:?} not found", to))?;

        self.graph
            .edges(from_node)
            .filter(|edge| edge.target() == to_node)
            .min_by_key(|edge| OrderedFloat(edge.weight().distance))
            .map(|edge| edge.weight().road_id)
            .ok_or_else(|| anyhow!("No road found connecting {:?} to {:?}", from, to))
    }
}
