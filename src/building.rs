//! Building records and batch ingestion.
//!
//! A [`Building`] is the unit of analysis: an opaque id, a footprint in a
//! planar meter-based projection, and two optional attributes. Geometric
//! properties (roof area, orientation, centroid, vertex count) are derived
//! once at construction so downstream passes never re-walk the rings.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SolarRankError};
use crate::geometry::{Coord, Footprint, Ring};

/// Height in meters assumed for buildings with no recorded height.
///
/// Cadastral sources routinely omit height; the shadow model still needs one,
/// so absent heights fall back to this documented default rather than
/// erroring. Energy potential has no such fallback.
pub const DEFAULT_HEIGHT_M: f64 = 10.0;

/// A building record with derived geometric properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    id: String,
    footprint: Footprint,
    height_m: Option<f64>,
    energy_potential_kwh: Option<f64>,
    // Derived at construction.
    roof_area_m2: f64,
    orientation_deg: f64,
    vertex_count: usize,
    centroid: Coord,
}

impl Building {
    /// Create a building record, deriving roof area, orientation, vertex
    /// count, and centroid from the footprint.
    pub fn new(
        id: String,
        footprint: Footprint,
        height_m: Option<f64>,
        energy_potential_kwh: Option<f64>,
    ) -> Self {
        let roof_area_m2 = footprint.area();
        let orientation_deg = footprint.orientation_deg();
        let vertex_count = footprint.vertex_count();
        let centroid = footprint.centroid();
        Self {
            id,
            footprint,
            height_m,
            energy_potential_kwh,
            roof_area_m2,
            orientation_deg,
            vertex_count,
            centroid,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    /// Recorded height, or [`DEFAULT_HEIGHT_M`] when absent.
    pub fn height_m(&self) -> f64 {
        self.height_m.unwrap_or(DEFAULT_HEIGHT_M)
    }

    /// Recorded height as stored, without the default fallback.
    pub fn raw_height_m(&self) -> Option<f64> {
        self.height_m
    }

    /// Annual energy potential in kWh.
    ///
    /// There is no fallback: scoring a building without this attribute is a
    /// [`SolarRankError::MissingField`].
    pub fn energy_potential_kwh(&self) -> Option<f64> {
        self.energy_potential_kwh
    }

    /// Fallible accessor for the energy potential.
    pub fn require_energy_potential(&self) -> Result<f64> {
        self.energy_potential_kwh
            .ok_or_else(|| SolarRankError::MissingField {
                id: self.id.clone(),
                field: "energy_potential_kwh",
            })
    }

    /// Total footprint area in square meters. Always `>= 0`.
    pub fn roof_area_m2(&self) -> f64 {
        self.roof_area_m2
    }

    /// Azimuth of the longest footprint edge, degrees in `[0, 360)`.
    pub fn orientation_deg(&self) -> f64 {
        self.orientation_deg
    }

    /// Number of distinct vertices of the largest footprint part.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Area-weighted footprint centroid.
    pub fn centroid(&self) -> Coord {
        self.centroid
    }
}

/// Wire-shaped ingestion record: rings as raw coordinate lists.
///
/// The outer list is the footprint's parts; a single-part footprint is a
/// one-element list. Each ring is a list of `[x, y]` vertex pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBuildingRecord {
    pub id: String,
    pub rings: Vec<Vec<(f64, f64)>>,
    #[serde(default)]
    pub height_m: Option<f64>,
    #[serde(default)]
    pub energy_potential_kwh: Option<f64>,
}

impl RawBuildingRecord {
    /// Validate the raw rings and build a [`Building`].
    pub fn into_building(self) -> Result<Building> {
        if self.rings.is_empty() {
            return Err(SolarRankError::InvalidGeometry(format!(
                "building `{}` has no rings",
                self.id
            )));
        }
        let mut rings = self
            .rings
            .into_iter()
            .map(Ring::new)
            .collect::<Result<Vec<Ring>>>()?;
        let footprint = if rings.len() == 1 {
            Footprint::SinglePart(rings.remove(0))
        } else {
            Footprint::MultiPart(rings)
        };
        Ok(Building::new(
            self.id,
            footprint,
            self.height_m,
            self.energy_potential_kwh,
        ))
    }
}

/// A record rejected during batch ingestion, with the reason.
#[derive(Debug)]
pub struct RejectedRecord {
    pub id: String,
    pub error: SolarRankError,
}

/// Convert a batch of raw records into buildings, isolating per-record
/// failures.
///
/// Malformed records are skipped, logged at `warn`, and reported in the
/// second element; one bad footprint never aborts the batch.
pub fn ingest(records: Vec<RawBuildingRecord>) -> (Vec<Building>, Vec<RejectedRecord>) {
    let mut buildings = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        let id = record.id.clone();
        match record.into_building() {
            Ok(building) => buildings.push(building),
            Err(error) => {
                warn!("skipping building `{id}`: {error}");
                rejected.push(RejectedRecord { id, error });
            }
        }
    }
    (buildings, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> Vec<(f64, f64)> {
        vec![
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
        ]
    }

    #[test]
    fn derived_properties() {
        let footprint = Footprint::single(square(0.0, 0.0, 10.0)).unwrap();
        let b = Building::new("b1".to_string(), footprint, Some(25.0), Some(18_000.0));
        assert_eq!(b.roof_area_m2(), 100.0);
        assert_eq!(b.vertex_count(), 4);
        assert_eq!(b.centroid(), (5.0, 5.0));
        assert_eq!(b.height_m(), 25.0);
        assert_eq!(b.energy_potential_kwh(), Some(18_000.0));
    }

    #[test]
    fn height_falls_back_to_default() {
        let footprint = Footprint::single(square(0.0, 0.0, 10.0)).unwrap();
        let b = Building::new("b1".to_string(), footprint, None, None);
        assert_eq!(b.height_m(), DEFAULT_HEIGHT_M);
        assert_eq!(b.raw_height_m(), None);
    }

    #[test]
    fn energy_potential_has_no_fallback() {
        let footprint = Footprint::single(square(0.0, 0.0, 10.0)).unwrap();
        let b = Building::new("b1".to_string(), footprint, None, None);
        let err = b.require_energy_potential().unwrap_err();
        assert!(matches!(
            err,
            SolarRankError::MissingField {
                field: "energy_potential_kwh",
                ..
            }
        ));
    }

    #[test]
    fn raw_record_single_part() {
        let raw = RawBuildingRecord {
            id: "b1".to_string(),
            rings: vec![square(0.0, 0.0, 10.0)],
            height_m: Some(12.0),
            energy_potential_kwh: None,
        };
        let b = raw.into_building().unwrap();
        assert!(matches!(b.footprint(), Footprint::SinglePart(_)));
        assert_eq!(b.roof_area_m2(), 100.0);
    }

    #[test]
    fn raw_record_multi_part() {
        let raw = RawBuildingRecord {
            id: "b1".to_string(),
            rings: vec![square(0.0, 0.0, 10.0), square(100.0, 0.0, 5.0)],
            height_m: None,
            energy_potential_kwh: None,
        };
        let b = raw.into_building().unwrap();
        assert!(matches!(b.footprint(), Footprint::MultiPart(_)));
        assert_eq!(b.roof_area_m2(), 125.0);
    }

    #[test]
    fn raw_record_no_rings_rejected() {
        let raw = RawBuildingRecord {
            id: "b1".to_string(),
            rings: vec![],
            height_m: None,
            energy_potential_kwh: None,
        };
        assert!(matches!(
            raw.into_building(),
            Err(SolarRankError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn ingest_isolates_failures() {
        let records = vec![
            RawBuildingRecord {
                id: "good".to_string(),
                rings: vec![square(0.0, 0.0, 10.0)],
                height_m: None,
                energy_potential_kwh: Some(1000.0),
            },
            RawBuildingRecord {
                id: "bad".to_string(),
                rings: vec![vec![(0.0, 0.0), (1.0, 1.0)]],
                height_m: None,
                energy_potential_kwh: None,
            },
            RawBuildingRecord {
                id: "also-good".to_string(),
                rings: vec![square(50.0, 50.0, 8.0)],
                height_m: Some(6.0),
                energy_potential_kwh: None,
            },
        ];
        let (buildings, rejected) = ingest(records);
        assert_eq!(buildings.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "bad");
    }

    #[test]
    fn raw_record_json_round_trip() {
        let raw = RawBuildingRecord {
            id: "b1".to_string(),
            rings: vec![square(0.0, 0.0, 10.0)],
            height_m: Some(12.0),
            energy_potential_kwh: Some(18_000.0),
        };
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawBuildingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, raw.id);
        assert_eq!(back.rings, raw.rings);
        assert_eq!(back.height_m, raw.height_m);
    }

    #[test]
    fn missing_optionals_deserialize_as_none() {
        let json = r#"{"id":"b1","rings":[[[0.0,0.0],[10.0,0.0],[10.0,10.0],[0.0,10.0]]]}"#;
        let raw: RawBuildingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.height_m, None);
        assert_eq!(raw.energy_potential_kwh, None);
    }
}
