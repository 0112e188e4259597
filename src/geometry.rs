//! Footprint geometry primitives.
//!
//! Footprints live in a planar, meter-based projection. A [`Ring`] is a simple
//! closed polygon boundary stored without the closing duplicate vertex; a
//! [`Footprint`] is either a single ring or a multi-part set of rings.

use serde::Serialize;

use crate::error::SolarRankError;
use crate::Result;

/// A 2D coordinate in the projected (meter-based) plane.
pub type Coord = (f64, f64);

/// Rings whose enclosed area is below this are treated as degenerate when
/// computing centroids and fall back to the vertex mean.
const DEGENERATE_AREA: f64 = 1e-12;

/// A simple polygon ring.
///
/// Construction validates the ring: a closing duplicate vertex is stripped,
/// fewer than three remaining vertices or a properly self-crossing boundary is
/// rejected with [`SolarRankError::InvalidGeometry`]. Zero-area rings are
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ring(Vec<Coord>);

impl Ring {
    pub fn new(mut coords: Vec<Coord>) -> Result<Self> {
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        if coords.len() < 3 {
            return Err(SolarRankError::InvalidGeometry(format!(
                "ring needs at least 3 vertices, got {}",
                coords.len()
            )));
        }
        if let Some(((a, b), (c, d))) = find_proper_crossing(&coords) {
            return Err(SolarRankError::InvalidGeometry(format!(
                "ring boundary crosses itself: edge {:?}-{:?} intersects edge {:?}-{:?}",
                a, b, c, d
            )));
        }
        Ok(Self(coords))
    }

    /// Vertex coordinates, without the closing duplicate.
    pub fn coords(&self) -> &[Coord] {
        &self.0
    }

    /// Number of distinct ring vertices.
    pub fn vertex_count(&self) -> usize {
        self.0.len()
    }

    /// Enclosed area in m², via the shoelace formula. Winding-independent.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    fn signed_area(&self) -> f64 {
        let n = self.0.len();
        let mut acc = 0.0;
        for i in 0..n {
            let (x1, y1) = self.0[i];
            let (x2, y2) = self.0[(i + 1) % n];
            acc += x1 * y2 - x2 * y1;
        }
        acc / 2.0
    }

    /// Center point of the enclosed area.
    ///
    /// Degenerate (zero-area) rings fall back to the arithmetic mean of the
    /// vertices.
    pub fn centroid(&self) -> Coord {
        let a = self.signed_area();
        if a.abs() < DEGENERATE_AREA {
            return vertex_mean(&self.0);
        }
        let n = self.0.len();
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let (x1, y1) = self.0[i];
            let (x2, y2) = self.0[(i + 1) % n];
            let w = x1 * y2 - x2 * y1;
            cx += (x1 + x2) * w;
            cy += (y1 + y2) * w;
        }
        (cx / (6.0 * a), cy / (6.0 * a))
    }

    /// Azimuth of the longest edge in degrees, `[0, 360)`.
    ///
    /// 0° is grid north (+y), 90° east (+x). When several edges tie, the
    /// first along the ring wins.
    pub fn longest_edge_azimuth(&self) -> f64 {
        let n = self.0.len();
        let mut max_len_sq = 0.0;
        let mut longest: Option<(Coord, Coord)> = None;
        for i in 0..n {
            let p1 = self.0[i];
            let p2 = self.0[(i + 1) % n];
            let dx = p2.0 - p1.0;
            let dy = p2.1 - p1.1;
            let len_sq = dx * dx + dy * dy;
            if len_sq > max_len_sq {
                max_len_sq = len_sq;
                longest = Some((p1, p2));
            }
        }
        match longest {
            Some(((x1, y1), (x2, y2))) => {
                let angle = (x2 - x1).atan2(y2 - y1).to_degrees();
                angle.rem_euclid(360.0)
            }
            None => 0.0,
        }
    }
}

/// A building footprint: one ring, or several disjoint parts.
///
/// Multi-part footprints resolve per-ring properties (orientation, vertex
/// extraction) through [`Footprint::largest_part`]; area is the sum over all
/// parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Footprint {
    SinglePart(Ring),
    MultiPart(Vec<Ring>),
}

impl Footprint {
    /// Build a single-part footprint from one coordinate ring.
    pub fn single(coords: Vec<Coord>) -> Result<Self> {
        Ok(Self::SinglePart(Ring::new(coords)?))
    }

    /// Build a multi-part footprint. At least one part is required.
    pub fn multi(parts: Vec<Vec<Coord>>) -> Result<Self> {
        if parts.is_empty() {
            return Err(SolarRankError::InvalidGeometry(
                "multi-part footprint needs at least one part".to_string(),
            ));
        }
        let rings = parts.into_iter().map(Ring::new).collect::<Result<Vec<_>>>()?;
        Ok(Self::MultiPart(rings))
    }

    /// The largest part by area. Single-part footprints are their own
    /// largest part.
    pub fn largest_part(&self) -> &Ring {
        match self {
            Self::SinglePart(ring) => ring,
            Self::MultiPart(rings) => rings
                .iter()
                .max_by(|a, b| a.area().total_cmp(&b.area()))
                .expect("multi-part footprint has at least one part"),
        }
    }

    /// Total enclosed area in m², summed over all parts.
    pub fn area(&self) -> f64 {
        match self {
            Self::SinglePart(ring) => ring.area(),
            Self::MultiPart(rings) => rings.iter().map(Ring::area).sum(),
        }
    }

    /// Area-weighted centroid over all parts.
    pub fn centroid(&self) -> Coord {
        match self {
            Self::SinglePart(ring) => ring.centroid(),
            Self::MultiPart(rings) => {
                let total: f64 = rings.iter().map(Ring::area).sum();
                if total < DEGENERATE_AREA {
                    let all: Vec<Coord> = rings
                        .iter()
                        .flat_map(|r| r.coords().iter().copied())
                        .collect();
                    return vertex_mean(&all);
                }
                let mut cx = 0.0;
                let mut cy = 0.0;
                for ring in rings {
                    let (x, y) = ring.centroid();
                    let w = ring.area() / total;
                    cx += x * w;
                    cy += y * w;
                }
                (cx, cy)
            }
        }
    }

    /// Roof orientation in degrees `[0, 360)`, from the longest edge of the
    /// largest part.
    pub fn orientation_deg(&self) -> f64 {
        self.largest_part().longest_edge_azimuth()
    }

    /// Number of vertices of the largest part.
    pub fn vertex_count(&self) -> usize {
        self.largest_part().vertex_count()
    }

    /// Vertex coordinates of the largest part.
    pub fn vertices(&self) -> &[Coord] {
        self.largest_part().coords()
    }
}

fn vertex_mean(coords: &[Coord]) -> Coord {
    if coords.is_empty() {
        return (0.0, 0.0);
    }
    let n = coords.len() as f64;
    let (sx, sy) = coords
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

/// Find a pair of non-adjacent edges that properly cross, if any.
///
/// Only strict crossings count: rings that merely touch at a vertex or run
/// along a shared segment are considered recoverable and accepted.
fn find_proper_crossing(coords: &[Coord]) -> Option<((Coord, Coord), (Coord, Coord))> {
    let n = coords.len();
    for i in 0..n {
        let a1 = coords[i];
        let a2 = coords[(i + 1) % n];
        for j in (i + 1)..n {
            // skip the edge itself and the two edges sharing a vertex with it
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = coords[j];
            let b2 = coords[(j + 1) % n];
            if segments_properly_cross(a1, a2, b1, b2) {
                return Some(((a1, a2), (b1, b2)));
            }
        }
    }
    None
}

fn segments_properly_cross(p1: Coord, p2: Coord, p3: Coord, p4: Coord) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Cross product of (b - a) x (p - a); sign gives which side of ab p lies on.
fn cross(a: Coord, b: Coord, p: Coord) -> f64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}
