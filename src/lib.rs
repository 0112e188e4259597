#![doc = include_str!("../README.md")]

pub mod building;
pub mod context;
mod error;
pub mod geometry;
pub mod indices;
pub mod kdtree;
pub mod score;
pub mod shadow;

pub use error::{Result, SolarRankError};

#[cfg(test)]
pub(crate) mod test;
