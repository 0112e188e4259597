use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use geo_traits::CoordTrait;
use tinyvec::TinyVec;

use crate::error::{Result, SolarRankError};
use crate::indices::Indices;

/// Centroids closer to the query point than this are treated as the query
/// building itself and excluded from radius results. Coordinates are meters,
/// so two footprints whose centroids land within a meter of each other are
/// duplicate records, not neighbors.
pub const SELF_MATCH_EPSILON_M: f64 = 1.0;

/// A single query result: an item position and its distance from the query
/// point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion-order position of the item in the indexed set.
    pub item: u32,
    /// Euclidean distance from the query point, in meters.
    pub distance: f64,
}

/// A trait for searching an immutable centroid index.
pub trait SpatialQuery: Sized {
    /// The underlying raw coordinate buffer of this index
    fn coords(&self) -> &[f64];

    /// The underlying raw indices buffer of this index
    fn indices(&self) -> Indices<'_>;

    /// The node size of this index
    fn node_size(&self) -> usize;

    /// The number of items in this index
    fn num_items(&self) -> usize;

    /// Search the index for items within a given radius.
    ///
    /// Results are sorted ascending by distance and include every item with
    /// distance at most `radius`, except self-matches closer than
    /// [`SELF_MATCH_EPSILON_M`]. Items at equal distance keep insertion
    /// order. An empty index yields an empty result.
    ///
    /// Fails with [`SolarRankError::OutOfRangeQuery`] when `radius` is
    /// negative.
    fn within(&self, qx: f64, qy: f64, radius: f64) -> Result<Vec<Neighbor>> {
        if radius < 0.0 {
            return Err(SolarRankError::OutOfRangeQuery(format!(
                "radius must be non-negative, got {radius}"
            )));
        }
        if self.num_items() == 0 {
            return Ok(vec![]);
        }

        let indices = self.indices();
        let coords = self.coords();
        let node_size = self.node_size();

        // Use TinyVec to avoid heap allocations
        let mut stack: TinyVec<[usize; 33]> = TinyVec::new();
        stack.push(0);
        stack.push(indices.len() - 1);
        stack.push(0);

        let mut result: Vec<Neighbor> = vec![];
        let r2 = radius * radius;
        let eps2 = SELF_MATCH_EPSILON_M * SELF_MATCH_EPSILON_M;

        // iteratively search for items within radius in the kd-sorted arrays
        while !stack.is_empty() {
            let axis = stack.pop().unwrap_or(0);
            let right = stack.pop().unwrap_or(0);
            let left = stack.pop().unwrap_or(0);

            // if we reached "tree node", search linearly
            if right - left <= node_size {
                for i in left..right + 1 {
                    let d2 = sq_dist(coords[2 * i], coords[2 * i + 1], qx, qy);
                    if d2 <= r2 && d2 >= eps2 {
                        result.push(Neighbor {
                            item: indices.get(i) as u32,
                            distance: d2.sqrt(),
                        });
                    }
                }
                continue;
            }

            // otherwise find the middle index
            let m = (left + right) >> 1;

            // include the middle item if it's in range
            let x = coords[2 * m];
            let y = coords[2 * m + 1];
            let d2 = sq_dist(x, y, qx, qy);
            if d2 <= r2 && d2 >= eps2 {
                result.push(Neighbor {
                    item: indices.get(m) as u32,
                    distance: d2.sqrt(),
                });
            }

            // queue search in halves that intersect the query
            let lte = if axis == 0 { qx - radius <= x } else { qy - radius <= y };
            if lte {
                // Note: these are pushed in backwards order to what gets popped
                stack.push(left);
                stack.push(m - 1);
                stack.push(1 - axis);
            }

            let gte = if axis == 0 { qx + radius >= x } else { qy + radius >= y };
            if gte {
                // Note: these are pushed in backwards order to what gets popped
                stack.push(m + 1);
                stack.push(right);
                stack.push(1 - axis);
            }
        }

        result.sort_unstable_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.item.cmp(&b.item))
        });
        Ok(result)
    }

    /// Search the index for items within a given radius of a coordinate.
    fn within_coord(&self, coord: &impl CoordTrait<T = f64>, radius: f64) -> Result<Vec<Neighbor>> {
        self.within(coord.x(), coord.y(), radius)
    }

    /// Search the index for the `k` nearest items to the query point.
    ///
    /// Results are sorted ascending by distance; items at equal distance
    /// keep insertion order. `k` larger than the population returns every
    /// item; an empty index yields an empty result.
    ///
    /// Best-first traversal over the implicit tree: candidate halves are
    /// queued with a distance lower bound, so the search touches
    /// O(log N + k) nodes on balanced data.
    ///
    /// Fails with [`SolarRankError::OutOfRangeQuery`] when `k == 0`.
    fn nearest(&self, qx: f64, qy: f64, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(SolarRankError::OutOfRangeQuery(
                "k must be at least 1 for a nearest-neighbor query".to_string(),
            ));
        }
        let num_items = self.num_items();
        if num_items == 0 {
            return Ok(vec![]);
        }
        let k = k.min(num_items);

        let indices = self.indices();
        let coords = self.coords();
        let node_size = self.node_size();

        let mut queue: BinaryHeap<Reverse<QueueNode>> = BinaryHeap::new();
        queue.push(Reverse(QueueNode {
            dist2: 0.0,
            kind: QueueEntry::Range {
                left: 0,
                right: num_items - 1,
                axis: 0,
            },
        }));

        let mut result = Vec::with_capacity(k);

        while let Some(Reverse(node)) = queue.pop() {
            match node.kind {
                QueueEntry::Item { id } => {
                    result.push(Neighbor {
                        item: id,
                        distance: node.dist2.sqrt(),
                    });
                    if result.len() == k {
                        break;
                    }
                }
                QueueEntry::Range { left, right, axis } => {
                    // leaf range, enqueue all items with their true distance
                    if right - left <= node_size {
                        for i in left..right + 1 {
                            let d2 = sq_dist(coords[2 * i], coords[2 * i + 1], qx, qy);
                            queue.push(Reverse(QueueNode {
                                dist2: d2,
                                kind: QueueEntry::Item {
                                    id: indices.get(i) as u32,
                                },
                            }));
                        }
                        continue;
                    }

                    let m = (left + right) >> 1;
                    let x = coords[2 * m];
                    let y = coords[2 * m + 1];
                    queue.push(Reverse(QueueNode {
                        dist2: sq_dist(x, y, qx, qy),
                        kind: QueueEntry::Item {
                            id: indices.get(m) as u32,
                        },
                    }));

                    // each half is queued with the axis distance to the
                    // splitting value as a lower bound on any distance inside
                    let split = if axis == 0 { x } else { y };
                    let q_axis = if axis == 0 { qx } else { qy };
                    let axis_d2 = (q_axis - split) * (q_axis - split);
                    queue.push(Reverse(QueueNode {
                        dist2: if q_axis <= split { 0.0 } else { axis_d2 },
                        kind: QueueEntry::Range {
                            left,
                            right: m - 1,
                            axis: 1 - axis,
                        },
                    }));
                    queue.push(Reverse(QueueNode {
                        dist2: if q_axis >= split { 0.0 } else { axis_d2 },
                        kind: QueueEntry::Range {
                            left: m + 1,
                            right,
                            axis: 1 - axis,
                        },
                    }));
                }
            }
        }

        Ok(result)
    }

    /// Search the index for the `k` nearest items to a coordinate.
    fn nearest_coord(&self, coord: &impl CoordTrait<T = f64>, k: usize) -> Result<Vec<Neighbor>> {
        self.nearest(coord.x(), coord.y(), k)
    }
}

#[derive(Debug, Clone, Copy)]
enum QueueEntry {
    /// A half of the kd-sorted array not yet expanded.
    Range { left: usize, right: usize, axis: usize },
    /// A materialized item with its exact distance.
    Item { id: u32 },
}

/// Best-first queue entry ordered by squared distance.
///
/// At equal distance, ranges order before items so that every item at that
/// distance is materialized before the first one is yielded; items then
/// order by insertion id, which is what gives `nearest` its deterministic
/// tie-breaking.
#[derive(Debug, Clone, Copy)]
struct QueueNode {
    dist2: f64,
    kind: QueueEntry,
}

impl QueueNode {
    fn rank(&self) -> (u8, u32) {
        match self.kind {
            QueueEntry::Range { left, .. } => (0, left as u32),
            QueueEntry::Item { id } => (1, id),
        }
    }
}

impl PartialEq for QueueNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueNode {}

impl PartialOrd for QueueNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then_with(|| self.rank().cmp(&other.rank()))
    }
}

#[inline]
pub(crate) fn sq_dist(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}
