//! Mutual shading between buildings.
//!
//! For each building, nearby taller buildings are pulled from the spatial
//! index, every pair contributes a shading intensity, and the intensities
//! aggregate into a single `[0, 1]` shading factor. The model works on
//! centroid distances and a fixed mean sun elevation, not on ray-traced
//! shadow volumes.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::building::Building;
use crate::error::Result;
use crate::kdtree::{SpatialQuery, SELF_MATCH_EPSILON_M};

/// Per-building shading factors, keyed by building id.
pub type ShadingResult = BTreeMap<String, f64>;

/// Tuning constants of the shading model.
///
/// `height_diff_normalizer` and `size_ratio_cap` are empirical heuristics
/// inherited from field observation, not physically derived values. They are
/// kept as named configuration so a calibration pass can adjust them without
/// touching the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Mean sun elevation angle in degrees.
    pub sun_elevation_deg: f64,
    /// Radius of the neighbor search around each building centroid, meters.
    pub search_radius_m: f64,
    /// Height difference in meters that saturates the shading intensity.
    pub height_diff_normalizer: f64,
    /// Upper bound on the neighbor/target footprint area ratio.
    pub size_ratio_cap: f64,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            sun_elevation_deg: 45.0,
            search_radius_m: 100.0,
            height_diff_normalizer: 50.0,
            size_ratio_cap: 2.0,
        }
    }
}

/// Length in meters of the shadow cast by a building of the given height.
///
/// `height / tan(elevation)` for elevations strictly between 0° and 90°.
/// At the horizon there is no modelled lateral reach and at the zenith
/// there is none, so both ends return exactly `0.0`.
pub fn shadow_length(height_m: f64, sun_elevation_deg: f64) -> f64 {
    if sun_elevation_deg <= 0.0 || sun_elevation_deg >= 90.0 {
        return 0.0;
    }
    height_m / sun_elevation_deg.to_radians().tan()
}

/// Buildings within `radius` meters of the target's centroid, paired with
/// their centroid distance and sorted ascending.
///
/// Delegates to the index's radius query, so the target itself (and any
/// duplicate record within [`SELF_MATCH_EPSILON_M`]) is excluded.
pub fn find_nearby<'a>(
    buildings: &'a [Building],
    index: &impl SpatialQuery,
    target: &Building,
    radius: f64,
) -> Result<Vec<(&'a Building, f64)>> {
    let (x, y) = target.centroid();
    let neighbors = index.within(x, y, radius)?;
    Ok(neighbors
        .into_iter()
        .map(|n| (&buildings[n.item as usize], n.distance))
        .collect())
}

/// Shading factor in `[0, 1]` for one building given its nearby candidates.
///
/// Candidates are filtered down to actual obstructions:
/// duplicates of the target (centroid distance below
/// [`SELF_MATCH_EPSILON_M`]) are skipped, only strictly taller neighbors
/// count, and a neighbor whose shadow cannot reach the target's centroid is
/// discarded. Surviving neighbors contribute an intensity that grows with
/// height difference, shrinks with distance, and is weighted by the relative
/// footprint size of the obstruction. Intensities aggregate by
/// root-mean-square rather than arithmetic mean, so one dominant obstruction
/// weighs more than several faint ones while overlapping shadows are not
/// double-counted the way a straight sum would.
pub fn shading_factor(
    target: &Building,
    candidates: &[(&Building, f64)],
    config: &ShadowConfig,
) -> f64 {
    let target_height = target.height_m();
    let target_area = target.roof_area_m2();

    let mut intensities: Vec<f64> = Vec::new();
    for (neighbor, distance) in candidates {
        if *distance < SELF_MATCH_EPSILON_M {
            continue;
        }

        let height_diff = neighbor.height_m() - target_height;
        if height_diff <= 0.0 {
            continue;
        }

        let shadow_len = shadow_length(neighbor.height_m(), config.sun_elevation_deg);
        if *distance > shadow_len {
            continue;
        }

        let falloff = 1.0 - distance / shadow_len;
        let intensity = (height_diff / config.height_diff_normalizer * falloff).clamp(0.0, 1.0);

        // larger obstructions cast proportionally larger shadows; a target
        // with no area saturates the ratio at the cap
        let area_ratio = if target_area > 0.0 {
            neighbor.roof_area_m2() / target_area
        } else {
            config.size_ratio_cap
        };
        let size_factor = area_ratio.min(config.size_ratio_cap);
        intensities.push(intensity * (0.5 + 0.5 * size_factor.min(1.0)));
    }

    if intensities.is_empty() {
        return 0.0;
    }

    let mean_sq = intensities.iter().map(|i| i * i).sum::<f64>() / intensities.len() as f64;
    mean_sq.sqrt().min(1.0)
}

/// Shading factor for every building in the set.
///
/// One radius query plus an O(m) pairwise intensity pass per building. With
/// the `rayon` feature the per-building loop fans out over a thread pool;
/// the shared index is only ever read.
pub fn shading_factors(
    buildings: &[Building],
    index: &(impl SpatialQuery + Sync),
    config: &ShadowConfig,
) -> Result<ShadingResult> {
    let analyze = |building: &Building| -> Result<(String, f64)> {
        let candidates = find_nearby(buildings, index, building, config.search_radius_m)?;
        let factor = shading_factor(building, &candidates, config);
        debug!(
            "building `{}`: {} candidates, shading factor {:.3}",
            building.id(),
            candidates.len(),
            factor
        );
        Ok((building.id().to_string(), factor))
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;

        let entries: Vec<(String, f64)> = buildings
            .par_iter()
            .map(analyze)
            .collect::<Result<Vec<_>>>()?;
        Ok(entries.into_iter().collect())
    }

    #[cfg(not(feature = "rayon"))]
    {
        let mut result = ShadingResult::new();
        for building in buildings {
            let (id, factor) = analyze(building)?;
            result.insert(id, factor);
        }
        Ok(result)
    }
}
