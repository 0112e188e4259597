use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum SolarRankError {
    /// A footprint ring that cannot be repaired: too few distinct vertices,
    /// or a self-intersecting boundary. Zero-area rings are accepted and do
    /// not produce this error.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// An input outside its documented domain: a shading factor outside
    /// `[0, 1]`, a broken weight set, or a serialized index buffer that
    /// fails header validation. Out-of-domain inputs are rejected, never
    /// clamped.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A query parameter outside its valid range: `k == 0` for a
    /// nearest-neighbor query or a negative search radius.
    #[error("Out of range query: {0}")]
    OutOfRangeQuery(String),

    /// A requested attribute is absent from a building record and has no
    /// documented fallback.
    #[error("Missing field `{field}` on building `{id}`")]
    MissingField {
        /// Id of the offending building record.
        id: String,
        /// Name of the absent attribute.
        field: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, SolarRankError>;
