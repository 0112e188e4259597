//! An immutable, buffer-backed 2D index over building centroids.
//!
//! The index is a single kd-sorted byte buffer in the
//! [kdbush](https://github.com/mourner/kdbush) layout: an 8-byte header,
//! the id array, and the coordinate array. It is built once per analysis
//! run and never mutated; when the building set changes, a new index is
//! built from scratch.

#![warn(missing_docs)]

mod builder;
pub(crate) mod constants;
mod index;
mod r#trait;

pub use builder::SpatialIndexBuilder;
pub use index::{OwnedSpatialIndex, SpatialIndexRef};
pub use r#trait::{Neighbor, SpatialQuery, SELF_MATCH_EPSILON_M};

#[cfg(test)]
mod test;
