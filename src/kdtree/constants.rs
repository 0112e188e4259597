/// Buffer layout identifier shared with the kdbush family of serialized
/// indexes.
pub(crate) const INDEX_MAGIC: u8 = 0xdb;

/// Version of the buffer layout written by [`SpatialIndexBuilder`][crate::kdtree::SpatialIndexBuilder].
pub(crate) const INDEX_VERSION: u8 = 1;

/// Bytes reserved at the front of the buffer for magic, version/type,
/// node size, and item count.
pub(crate) const INDEX_HEADER_SIZE: usize = 8;

/// Coordinate array type tag. Coordinates are always `f64` meters.
pub(crate) const ARRAY_TYPE_F64: u8 = 8;

/// Bytes per coordinate value.
pub(crate) const COORD_BYTES_PER_ELEMENT: usize = 8;
