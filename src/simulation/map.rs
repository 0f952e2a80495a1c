//! Graph input handed over by the map loader, and the built-in demo map

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::types::JUNCTION_SIZE;

/// A named junction placed by its upper-left corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionSpec {
    pub name: String,
    pub x: f32,
    pub y: f32,
}

/// A one-way road between two junctions, by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadSpec {
    pub from: String,
    pub to: String,
}

/// Plain description of a road network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInput {
    pub junctions: Vec<JunctionSpec>,
    pub roads: Vec<RoadSpec>,
}

impl GraphInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn junction(mut self, name: &str, x: f32, y: f32) -> Self {
        self.add_junction(name, x, y);
        self
    }

    pub fn road(mut self, from: &str, to: &str) -> Self {
        self.add_road(from, to);
        self
    }

    pub fn add_junction(&mut self, name: &str, x: f32, y: f32) {
        self.junctions.push(JunctionSpec {
            name: name.to_string(),
            x,
            y,
        });
    }

    pub fn add_road(&mut self, from: &str, to: &str) {
        self.roads.push(RoadSpec {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Adds a road in each direction between two junctions
    pub fn add_two_way_road(&mut self, a: &str, b: &str) {
        self.add_road(a, b);
        self.add_road(b, a);
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse graph input")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read map file {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("In map file {}", path.display()))
    }

    /// A 3x3 grid of two-way streets fed by four entries and drained by four
    /// exits on the outer edges.
    pub fn demo() -> Self {
        let spacing = 200.0;
        let origin = 250.0;
        let offset = spacing + JUNCTION_SIZE;
        let mut map = GraphInput::new();

        let grid = |row: usize, col: usize| format!("G{}{}", row, col);
        for row in 0..3 {
            for col in 0..3 {
                map.add_junction(
                    &grid(row, col),
                    origin + col as f32 * spacing,
                    origin + row as f32 * spacing,
                );
            }
        }

        for row in 0..3 {
            for col in 0..2 {
                map.add_two_way_road(&grid(row, col), &grid(row, col + 1));
            }
        }
        for row in 0..2 {
            for col in 0..3 {
                map.add_two_way_road(&grid(row, col), &grid(row + 1, col));
            }
        }

        let far = origin + 2.0 * spacing;
        let mid = origin + spacing;
        // Entries on the north and west edges, exits on the south and east
        let edges = [
            ("IN-N", origin + spacing, origin - offset, grid(0, 1), true),
            ("IN-W", origin - offset, mid, grid(1, 0), true),
            ("IN-NW", origin, origin - offset, grid(0, 0), true),
            ("IN-SW", origin - offset, far, grid(2, 0), true),
            ("OUT-S", mid, far + offset, grid(2, 1), false),
            ("OUT-E", far + offset, mid, grid(1, 2), false),
            ("OUT-NE", far + offset, origin, grid(0, 2), false),
            ("OUT-SE", far, far + offset, grid(2, 2), false),
        ];
        for (name, x, y, anchor, entry) in edges {
            map.add_junction(name, x, y);
            if entry {
                map.add_road(name, &anchor);
            } else {
                map.add_road(&anchor, name);
            }
        }

        map
    }
}
