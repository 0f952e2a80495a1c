//! Junctions, road segments and the sub-intersections inside each junction
//!
//! Built once from a [`GraphInput`] and read-only afterwards.

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::geometry::{is_parallel, line_intersection};
use super::map::GraphInput;
use super::types::{Cardinal, JunctionId, Position, RoadId, SubIntersectionId, JUNCTION_SIZE};

/// What a junction does in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JunctionKind {
    /// No entering roads; vehicles spawn here
    Source,
    /// No exiting roads; vehicles leave the map here
    Final,
    /// At least one road in and one road out
    Transit,
}

/// A point inside a junction where a vehicle may pick its next road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubIntersection {
    pub id: SubIntersectionId,
    pub point: Position,
    roads: Vec<RoadId>,
}

impl SubIntersection {
    pub fn junction(&self) -> JunctionId {
        self.id.junction
    }

    /// Exiting roads that can be taken from this point
    pub fn roads(&self) -> &[RoadId] {
        &self.roads
    }

    /// A dead end: nothing can be taken from here
    pub fn is_final(&self) -> bool {
        self.roads.is_empty()
    }
}

/// A directed, straight road between two junctions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: RoadId,
    pub start: JunctionId,
    pub end: JunctionId,
    /// Side of the start junction the road leaves from
    pub start_side: Cardinal,
    /// Side of the end junction the road arrives at
    pub end_side: Cardinal,
    pub start_point: Position,
    pub end_point: Position,
    pub vector: Position,
    pub distance: f32,
}

impl RoadSegment {
    /// Attaches a road to the lane the two junction positions call for.
    ///
    /// Traffic keeps to the right: a northbound road runs along the eastern
    /// quarter of both squares, a westbound one along the northern quarter.
    pub fn between(id: RoadId, start: &Junction, end: &Junction) -> Result<Self> {
        let (s, e) = (start.position, end.position);
        let d = e - s;
        if d.is_zero() {
            bail!(
                "Junctions '{}' and '{}' share a position, road {:?} has no length",
                start.name,
                end.name,
                id
            );
        }

        let w = JUNCTION_SIZE;
        let vertical = d.x == 0.0 || (d.y / d.x).abs() > 1.0;
        let (start_side, end_side, start_point, end_point) = if vertical {
            if d.y < 0.0 {
                (
                    Cardinal::North,
                    Cardinal::South,
                    Position::new(s.x + 3.0 * w / 4.0, s.y),
                    Position::new(e.x + 3.0 * w / 4.0, e.y + w),
                )
            } else {
                (
                    Cardinal::South,
                    Cardinal::North,
                    Position::new(s.x + w / 4.0, s.y + w),
                    Position::new(e.x + w / 4.0, e.y),
                )
            }
        } else if d.x < 0.0 {
            (
                Cardinal::West,
                Cardinal::East,
                Position::new(s.x, s.y + w / 4.0),
                Position::new(e.x + w, e.y + w / 4.0),
            )
        } else {
            (
                Cardinal::East,
                Cardinal::West,
                Position::new(s.x + w, s.y + 3.0 * w / 4.0),
                Position::new(e.x, e.y + 3.0 * w / 4.0),
            )
        };

        let vector = end_point - start_point;
        let distance = vector.length();
        if distance <= 0.0 {
            bail!(
                "Road from '{}' to '{}' collapses to a point",
                start.name,
                end.name
            );
        }

        Ok(Self {
            id,
            start: start.id,
            end: end.id,
            start_side,
            end_side,
            start_point,
            end_point,
            vector,
            distance,
        })
    }

    /// Unit direction of travel
    pub fn heading(&self) -> Position {
        self.vector.normalized()
    }
}

/// A square junction with up to one entering and one exiting road per side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Junction {
    pub id: JunctionId,
    pub name: String,
    /// Upper-left corner of the square
    pub position: Position,
    entering: [Option<RoadId>; 4],
    exiting: [Option<RoadId>; 4],
    sub_intersections: Vec<SubIntersection>,
}

impl Junction {
    pub fn new(id: JunctionId, name: impl Into<String>, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            entering: [None; 4],
            exiting: [None; 4],
            sub_intersections: Vec::new(),
        }
    }

    pub fn kind(&self) -> JunctionKind {
        if self.entering_roads().next().is_none() {
            JunctionKind::Source
        } else if self.exiting_roads().next().is_none() {
            JunctionKind::Final
        } else {
            JunctionKind::Transit
        }
    }

    pub fn is_source(&self) -> bool {
        self.kind() == JunctionKind::Source
    }

    pub fn is_final(&self) -> bool {
        self.kind() == JunctionKind::Final
    }

    pub fn entering_roads(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.entering.iter().flatten().copied()
    }

    pub fn exiting_roads(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.exiting.iter().flatten().copied()
    }

    pub fn sub_intersections(&self) -> &[SubIntersection] {
        &self.sub_intersections
    }

    fn attach_exiting(&mut self, road: &RoadSegment) -> Result<()> {
        let slot = &mut self.exiting[road.start_side.index()];
        if let Some(existing) = slot {
            bail!(
                "Junction '{}' already has road {:?} leaving by its {:?} side",
                self.name,
                existing,
                road.start_side
            );
        }
        *slot = Some(road.id);
        Ok(())
    }

    fn attach_entering(&mut self, road: &RoadSegment) -> Result<()> {
        let slot = &mut self.entering[road.end_side.index()];
        if let Some(existing) = slot {
            bail!(
                "Junction '{}' already has road {:?} arriving by its {:?} side",
                self.name,
                existing,
                road.end_side
            );
        }
        *slot = Some(road.id);
        Ok(())
    }

    /// Rebuilds the sub-intersections of this junction from its roads.
    pub fn fix(&mut self, roads: &[RoadSegment]) {
        let entering: Vec<&RoadSegment> = self
            .entering_roads()
            .filter_map(|id| roads.get(id.0))
            .collect();
        let exiting: Vec<&RoadSegment> = self
            .exiting_roads()
            .filter_map(|id| roads.get(id.0))
            .collect();

        let mut points: Vec<(Position, Vec<RoadId>)> = Vec::new();
        let mut insert = |point: Position, road: Option<RoadId>| {
            let index = match points.iter().position(|(p, _)| p.same_bits(&point)) {
                Some(index) => index,
                None => {
                    points.push((point, Vec::new()));
                    points.len() - 1
                }
            };
            if let Some(road) = road {
                let set = &mut points[index].1;
                if let Err(at) = set.binary_search(&road) {
                    set.insert(at, road);
                }
            }
        };

        match self.kind() {
            JunctionKind::Source => {
                for x in &exiting {
                    insert(x.start_point, Some(x.id));
                }
            }
            JunctionKind::Final => {
                for e in &entering {
                    insert(e.end_point, None);
                }
            }
            JunctionKind::Transit => {
                for e in &entering {
                    let has_way_on = exiting.iter().any(|x| {
                        !is_parallel(e.vector, x.vector) || x.start_side == e.end_side.opposite()
                    });
                    if !has_way_on {
                        insert(e.end_point, None);
                    }
                }
                for e in &entering {
                    for x in &exiting {
                        if !is_parallel(e.vector, x.vector) {
                            if let Some(point) =
                                line_intersection(e.start_point, e.vector, x.start_point, x.vector)
                            {
                                insert(point, Some(x.id));
                            }
                        } else if x.start_side != e.end_side {
                            insert(x.start_point, Some(x.id));
                        }
                    }
                }
            }
        }

        let junction = self.id;
        self.sub_intersections = points
            .into_iter()
            .enumerate()
            .map(|(index, (point, roads))| SubIntersection {
                id: SubIntersectionId { junction, index },
                point,
                roads,
            })
            .collect();
    }
}

/// The static road map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    junctions: Vec<Junction>,
    roads: Vec<RoadSegment>,
}

impl Topology {
    /// Builds junctions, attaches roads and computes all sub-intersections.
    pub fn build(input: &GraphInput) -> Result<Self> {
        let mut junctions = Vec::with_capacity(input.junctions.len());
        let mut by_name: HashMap<&str, JunctionId> = HashMap::new();
        for (i, entry) in input.junctions.iter().enumerate() {
            let id = JunctionId(i);
            if by_name.insert(entry.name.as_str(), id).is_some() {
                bail!("Duplicate junction name '{}'", entry.name);
            }
            junctions.push(Junction::new(id, entry.name.clone(), Position::new(entry.x, entry.y)));
        }

        let mut roads: Vec<RoadSegment> = Vec::with_capacity(input.roads.len());
        for (i, entry) in input.roads.iter().enumerate() {
            let lookup = |name: &str| {
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| anyhow!("Unknown junction '{}'", name))
            };
            let from = lookup(&entry.from).with_context(|| format!("Road #{} start", i))?;
            let to = lookup(&entry.to).with_context(|| format!("Road #{} end", i))?;
            if from == to {
                bail!("Road #{} loops on junction '{}'", i, entry.from);
            }

            let road = RoadSegment::between(RoadId(i), &junctions[from.0], &junctions[to.0])?;
            junctions[from.0].attach_exiting(&road)?;
            junctions[to.0].attach_entering(&road)?;
            roads.push(road);
        }

        if let Some(isolated) = junctions
            .iter()
            .find(|j| j.entering_roads().next().is_none() && j.exiting_roads().next().is_none())
        {
            bail!("Junction '{}' has no roads", isolated.name);
        }

        let mut topology = Self { junctions, roads };
        topology.fix();
        debug!(
            "Built topology: {} junctions, {} roads, {} sub-intersections",
            topology.junctions.len(),
            topology.roads.len(),
            topology.sub_intersections().count()
        );
        Ok(topology)
    }

    /// Recomputes the sub-intersections of every junction.
    pub fn fix(&mut self) {
        let roads = &self.roads;
        for junction in &mut self.junctions {
            junction.fix(roads);
        }
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn roads(&self) -> &[RoadSegment] {
        &self.roads
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id.0)
    }

    pub fn junction_by_name(&self, name: &str) -> Option<&Junction> {
        self.junctions.iter().find(|j| j.name == name)
    }

    pub fn road(&self, id: RoadId) -> Option<&RoadSegment> {
        self.roads.get(id.0)
    }

    pub fn sub_intersection(&self, id: SubIntersectionId) -> Option<&SubIntersection> {
        self.junction(id.junction)?.sub_intersections.get(id.index)
    }

    pub fn sub_intersections(&self) -> impl Iterator<Item = &SubIntersection> + '_ {
        self.junctions.iter().flat_map(|j| j.sub_intersections.iter())
    }

    pub fn sources(&self) -> impl Iterator<Item = JunctionId> + '_ {
        self.junctions.iter().filter(|j| j.is_source()).map(|j| j.id)
    }

    pub fn finals(&self) -> impl Iterator<Item = JunctionId> + '_ {
        self.junctions.iter().filter(|j| j.is_final()).map(|j| j.id)
    }

    /// The road from this sub-intersection that ends at `to`, if any
    pub fn road_to(&self, sub: &SubIntersection, to: JunctionId) -> Option<RoadId> {
        sub.roads
            .iter()
            .copied()
            .find(|id| self.road(*id).is_some_and(|r| r.end == to))
    }

    /// Any sub-intersection of `junction` offering a road to `to`
    pub fn junction_road_to(&self, junction: JunctionId, to: JunctionId) -> Option<(SubIntersectionId, RoadId)> {
        self.junction(junction)?
            .sub_intersections
            .iter()
            .find_map(|sub| self.road_to(sub, to).map(|road| (sub.id, road)))
    }
}
