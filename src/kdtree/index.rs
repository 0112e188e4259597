use bytemuck::cast_slice;
use log::info;

use crate::building::Building;
use crate::error::{Result, SolarRankError};
use crate::indices::Indices;
use crate::kdtree::constants::{
    ARRAY_TYPE_F64, COORD_BYTES_PER_ELEMENT, INDEX_HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION,
};
use crate::kdtree::r#trait::SpatialQuery;
use crate::kdtree::SpatialIndexBuilder;

/// Byte layout of a serialized index with `num_items` entries: end of the id
/// array, start and end of the coordinate array.
pub(crate) fn buffer_layout(num_items: usize) -> (usize, usize, usize) {
    let indices_bytes_per_element = if num_items < 65536 { 2 } else { 4 };
    let ids_byte_size = num_items * indices_bytes_per_element;
    let pad_coords_byte_size = (8 - (ids_byte_size % 8)) % 8;
    let ids_end = INDEX_HEADER_SIZE + ids_byte_size;
    let coords_start = ids_end + pad_coords_byte_size;
    let coords_end = coords_start + num_items * 2 * COORD_BYTES_PER_ELEMENT;
    (ids_end, coords_start, coords_end)
}

/// An owned spatial index buffer.
///
/// Usually this will be created from a building set via
/// [`build`][OwnedSpatialIndex::build] or from scratch via
/// [`SpatialIndexBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedSpatialIndex {
    pub(crate) buffer: Vec<u8>,
    pub(crate) node_size: usize,
    pub(crate) num_items: usize,
}

impl OwnedSpatialIndex {
    /// Build an index over the centroids of the given buildings.
    ///
    /// Item ids reported by queries are positions into this slice. The build
    /// is O(N log N); an empty slice produces a valid empty index.
    pub fn build(buildings: &[Building]) -> Self {
        let mut builder = SpatialIndexBuilder::new(buildings.len());
        for building in buildings {
            let (x, y) = building.centroid();
            builder.add(x, y);
        }
        let index = builder.finish();
        info!("built spatial index over {} centroids", buildings.len());
        index
    }

    /// Consume self, returning the underlying buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// A zero-copy view of this index.
    pub fn as_index_ref(&self) -> SpatialIndexRef {
        SpatialIndexRef {
            coords: SpatialQuery::coords(self),
            ids: SpatialQuery::indices(self),
            node_size: self.node_size,
            num_items: self.num_items,
        }
    }
}

impl AsRef<[u8]> for OwnedSpatialIndex {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

impl SpatialQuery for OwnedSpatialIndex {
    fn coords(&self) -> &[f64] {
        let (_, coords_start, coords_end) = buffer_layout(self.num_items);
        cast_slice(&self.buffer[coords_start..coords_end])
    }

    fn indices(&self) -> Indices<'_> {
        let (ids_end, _, _) = buffer_layout(self.num_items);
        Indices::new(&self.buffer[INDEX_HEADER_SIZE..ids_end], self.num_items)
    }

    fn node_size(&self) -> usize {
        self.node_size
    }

    fn num_items(&self) -> usize {
        self.num_items
    }
}

/// A reference on an external spatial index buffer.
///
/// Usually this will be created from an [`OwnedSpatialIndex`] via its
/// [`as_index_ref`][OwnedSpatialIndex::as_index_ref] method, but it can also
/// be created from any existing data buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialIndexRef<'a> {
    pub(crate) coords: &'a [f64],
    pub(crate) ids: Indices<'a>,
    pub(crate) node_size: usize,
    pub(crate) num_items: usize,
}

impl<'a> SpatialIndexRef<'a> {
    /// Validate the header of a serialized index buffer and construct a view
    /// over it.
    pub fn try_new<T: AsRef<[u8]>>(data: &'a T) -> Result<Self> {
        let data = data.as_ref();

        if data.len() < INDEX_HEADER_SIZE {
            return Err(SolarRankError::InvalidParameter(format!(
                "Buffer of {} bytes is shorter than the index header.",
                data.len()
            )));
        }

        if data[0] != INDEX_MAGIC {
            return Err(SolarRankError::InvalidParameter(
                "Data not in spatial index format.".to_string(),
            ));
        }

        let version_and_type = data[1];
        let version = version_and_type >> 4;
        if version != INDEX_VERSION {
            return Err(SolarRankError::InvalidParameter(format!(
                "Got v{} data when expected v{}.",
                version, INDEX_VERSION
            )));
        }

        let type_ = version_and_type & 0x0f;
        if type_ != ARRAY_TYPE_F64 {
            return Err(SolarRankError::InvalidParameter(format!(
                "Got type {} data when expected type {}.",
                type_, ARRAY_TYPE_F64
            )));
        }

        let node_size: u16 = cast_slice(&data[2..4])[0];
        let num_items: u32 = cast_slice(&data[4..8])[0];
        let node_size = node_size as usize;
        let num_items = num_items as usize;

        let (ids_end, coords_start, coords_end) = buffer_layout(num_items);
        if data.len() != coords_end {
            return Err(SolarRankError::InvalidParameter(format!(
                "Buffer of {} bytes does not match the {} bytes implied by the header.",
                data.len(),
                coords_end
            )));
        }

        let ids = Indices::new(&data[INDEX_HEADER_SIZE..ids_end], num_items);
        let coords = cast_slice(&data[coords_start..coords_end]);

        Ok(Self {
            coords,
            ids,
            node_size,
            num_items,
        })
    }
}

impl SpatialQuery for SpatialIndexRef<'_> {
    fn coords(&self) -> &[f64] {
        self.coords
    }

    fn indices(&self) -> Indices<'_> {
        self.ids
    }

    fn node_size(&self) -> usize {
        self.node_size
    }

    fn num_items(&self) -> usize {
        self.num_items
    }
}
