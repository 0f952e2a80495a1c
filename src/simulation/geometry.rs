//! Plane geometry helpers: headings, oriented rectangles, line crossings.

use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use super::types::{Position, ANGLE_EPSILON};

/// Heading of a vector in radians, clockwise from north, in `[0, 2π)`.
pub fn heading_angle(v: Position) -> f32 {
    (PI - v.x.atan2(v.y)).rem_euclid(TAU)
}

/// Heading folded onto `[0, π)`, identical for a vector and its opposite.
pub fn angle_mod_pi(v: Position) -> f32 {
    heading_angle(v).rem_euclid(PI)
}

fn circular_gap(a: f32, b: f32, period: f32) -> f32 {
    let d = (a - b).rem_euclid(period);
    d.min(period - d)
}

/// Two angles are the same direction within `ANGLE_EPSILON`.
pub fn same_angle(a: f32, b: f32) -> bool {
    circular_gap(a, b, TAU) < ANGLE_EPSILON
}

/// Two vectors point the same way.
pub fn same_heading(u: Position, v: Position) -> bool {
    !u.is_zero() && !v.is_zero() && same_angle(heading_angle(u), heading_angle(v))
}

/// Two vectors point in exactly opposite directions.
pub fn opposite_heading(u: Position, v: Position) -> bool {
    !u.is_zero() && !v.is_zero() && same_angle(heading_angle(u), heading_angle(v) + PI)
}

/// Two vectors lie on parallel lines, whichever way they point.
pub fn is_parallel(u: Position, v: Position) -> bool {
    !u.is_zero()
        && !v.is_zero()
        && circular_gap(angle_mod_pi(u), angle_mod_pi(v), PI) < ANGLE_EPSILON
}

/// Crossing point of the lines `p + t·u` and `q + s·v`.
///
/// Axis-aligned lines keep their fixed coordinate exactly, so crossings that
/// describe the same lane pair land on bit-identical points.
pub fn line_intersection(p: Position, u: Position, q: Position, v: Position) -> Option<Position> {
    let denom = u.cross(&v);
    if denom.abs() <= f32::EPSILON * u.length() * v.length() {
        return None;
    }
    let t = (q - p).cross(&v) / denom;
    let mut point = p + u * t;
    if u.x == 0.0 {
        point.x = p.x;
    }
    if u.y == 0.0 {
        point.y = p.y;
    }
    if v.x == 0.0 {
        point.x = q.x;
    }
    if v.y == 0.0 {
        point.y = q.y;
    }
    Some(point)
}

/// An oriented rectangle.
///
/// Corners are stored as `[front_left, rear_left, rear_right, front_right]`;
/// the front-left corner doubles as the anchor used by the wait protocol.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Footprint {
    pub corners: [Position; 4],
}

impl Footprint {
    /// Rectangle centred on `center`, its length running along `heading`.
    pub fn oriented(center: Position, heading: Position, width: f32, length: f32) -> Self {
        let along = heading.normalized() * (length / 2.0);
        let across = heading.normalized().right() * (width / 2.0);
        Self {
            corners: [
                center + along - across,
                center - along - across,
                center - along + across,
                center + along + across,
            ],
        }
    }

    pub fn anchor(&self) -> Position {
        self.corners[0]
    }

    pub fn front_center(&self) -> Position {
        self.corners[0].lerp(&self.corners[3], 0.5)
    }

    pub fn rear_center(&self) -> Position {
        self.corners[1].lerp(&self.corners[2], 0.5)
    }

    pub fn center(&self) -> Position {
        self.corners[0].lerp(&self.corners[2], 0.5)
    }

    /// Point-in-rectangle test, boundary included.
    pub fn contains(&self, point: Position) -> bool {
        let mut positive = false;
        let mut negative = false;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let side = (b - a).cross(&(point - a));
            if side > 0.0 {
                positive = true;
            } else if side < 0.0 {
                negative = true;
            }
            if positive && negative {
                return false;
            }
        }
        true
    }

    /// True if any of our corners lies inside `other`.
    pub fn has_corner_inside(&self, other: &Footprint) -> bool {
        self.corners.iter().any(|c| other.contains(*c))
    }

    /// Separating-axis overlap test between two rectangles.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        for shape in [self, other] {
            for i in 0..2 {
                let axis = shape.corners[i + 1] - shape.corners[i];
                if axis.is_zero() {
                    continue;
                }
                let (min_a, max_a) = self.project(axis);
                let (min_b, max_b) = other.project(axis);
                if max_a < min_b || max_b < min_a {
                    return false;
                }
            }
        }
        true
    }

    fn project(&self, axis: Position) -> (f32, f32) {
        self.corners
            .iter()
            .map(|c| c.dot(&axis))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            })
    }

    /// Smallest distance between a corner of ours and a corner of theirs.
    pub fn min_corner_distance(&self, other: &Footprint) -> f32 {
        self.corners
            .iter()
            .flat_map(|a| other.corners.iter().map(move |b| a.distance(b)))
            .fold(f32::INFINITY, f32::min)
    }
}

/// Diameter of the circle around a `width` × `length` rectangle.
pub fn diagonal(width: f32, length: f32) -> f32 {
    (width * width + length * length).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_run_clockwise_from_north() {
        assert!(heading_angle(Position::new(0.0, -1.0)).abs() < 1e-6);
        assert!((heading_angle(Position::new(1.0, 0.0)) - PI / 2.0).abs() < 1e-6);
        assert!((heading_angle(Position::new(0.0, 1.0)) - PI).abs() < 1e-6);
        assert!((heading_angle(Position::new(-1.0, 0.0)) - 3.0 * PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn parallel_ignores_direction_and_length() {
        let east = Position::new(3.0, 0.0);
        let west = Position::new(-100.0, 0.0);
        let north = Position::new(0.0, -5.0);
        assert!(is_parallel(east, west));
        assert!(!is_parallel(east, north));
        assert!(opposite_heading(east, west));
        assert!(!same_heading(east, west));
        assert!(same_heading(east, Position::new(0.5, 0.0)));
    }

    #[test]
    fn near_north_headings_compare_across_zero() {
        let a = Position::new(1e-6, -1.0);
        let b = Position::new(-1e-6, -1.0);
        assert!(same_heading(a, b));
        assert!(is_parallel(a, b));
    }

    #[test]
    fn axis_aligned_lines_cross_exactly() {
        let p = Position::new(45.0, 300.0);
        let u = Position::new(0.0, -170.0);
        let q = Position::new(60.0, 15.0);
        let v = Position::new(140.0, 0.0);
        let hit = line_intersection(p, u, q, v).unwrap();
        assert!(hit.same_bits(&Position::new(45.0, 15.0)));
        assert!(line_intersection(p, u, q, Position::new(0.0, 3.0)).is_none());
    }

    #[test]
    fn footprint_corners_follow_heading() {
        let fp = Footprint::oriented(Position::new(0.0, 0.0), Position::new(0.0, -1.0), 10.0, 20.0);
        // facing north: front-left is up and to the west
        assert_eq!(fp.anchor(), Position::new(-5.0, -10.0));
        assert_eq!(fp.corners[2], Position::new(5.0, 10.0));
        assert!(fp.contains(Position::new(0.0, 0.0)));
        assert!(fp.contains(Position::new(5.0, 10.0)));
        assert!(!fp.contains(Position::new(6.0, 0.0)));
        assert_eq!(fp.front_center(), Position::new(0.0, -10.0));
    }

    #[test]
    fn overlap_detects_crossing_rectangles() {
        let a = Footprint::oriented(Position::new(0.0, 0.0), Position::new(1.0, 0.0), 10.0, 30.0);
        let b = Footprint::oriented(Position::new(0.0, 0.0), Position::new(0.0, 1.0), 10.0, 30.0);
        let c = Footprint::oriented(Position::new(40.0, 0.0), Position::new(1.0, 0.0), 10.0, 30.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // plus-shaped overlap has no corner inside the other rectangle
        assert!(!a.has_corner_inside(&b));
    }
}
