//! Suitability scoring, classification, ranking, and selection.
//!
//! A building's score combines roof area, annual energy potential, shading,
//! and roof orientation into a single `[0, 100]` figure. Scored sets are
//! ranked densely, selected via a bounded top-k pass, or probed for the
//! entry closest to a target score.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::building::Building;
use crate::error::{Result, SolarRankError};

/// Roof area in square meters at which the area component saturates.
pub const AREA_SATURATION_M2: f64 = 500.0;

/// Annual energy potential in kWh at which the energy component saturates.
pub const ENERGY_SATURATION_KWH: f64 = 50_000.0;

/// Optimal roof orientation: due south.
pub const OPTIMAL_ORIENTATION_DEG: f64 = 180.0;

/// Weights of the four score components.
///
/// The struct covers every component, so a partial weight set is
/// unrepresentable in code and rejected on deserialization (all four fields
/// are required).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub area: f64,
    pub energy: f64,
    pub shading: f64,
    pub orientation: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            area: 0.2,
            energy: 0.4,
            shading: 0.2,
            orientation: 0.2,
        }
    }
}

impl Weights {
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("area", self.area),
            ("energy", self.energy),
            ("shading", self.shading),
            ("orientation", self.orientation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SolarRankError::InvalidParameter(format!(
                    "weight `{name}` must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Suitability band of a scored building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuitabilityCategory {
    Excellent,
    Good,
    Moderate,
    Poor,
    Unsuitable,
}

impl fmt::Display for SuitabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::Unsuitable => "Unsuitable",
        };
        f.write_str(name)
    }
}

/// One entry of a ranked result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityRecord {
    pub building_id: String,
    /// Composite score in `[0, 100]`.
    pub suitability_score: f64,
    pub category: SuitabilityCategory,
    /// Dense rank starting at 1; ranks form a contiguous `1..=N` run.
    pub rank: usize,
}

/// Composite suitability score in `[0, 100]`.
///
/// Each component is normalized into `[0, 1]` (area and energy saturate at
/// [`AREA_SATURATION_M2`] and [`ENERGY_SATURATION_KWH`], orientation falls
/// off linearly from due south to due north), then combined as a weighted
/// sum scaled by 100.
///
/// A shading factor outside `[0, 1]` or a non-finite/negative weight is an
/// [`SolarRankError::InvalidParameter`]; out-of-domain inputs are never
/// clamped into range.
pub fn suitability_score(
    roof_area_m2: f64,
    energy_potential_kwh: f64,
    shading_factor: f64,
    orientation_deg: f64,
    weights: &Weights,
) -> Result<f64> {
    weights.validate()?;
    if !(0.0..=1.0).contains(&shading_factor) {
        return Err(SolarRankError::InvalidParameter(format!(
            "shading factor must be within [0, 1], got {shading_factor}"
        )));
    }

    let area_score = (roof_area_m2 / AREA_SATURATION_M2).min(1.0);
    let energy_score = (energy_potential_kwh / ENERGY_SATURATION_KWH).min(1.0);
    let shading_score = 1.0 - shading_factor;
    let orientation_score = 1.0 - (orientation_deg - OPTIMAL_ORIENTATION_DEG).abs() / 180.0;

    let combined = weights.area * area_score
        + weights.energy * energy_score
        + weights.shading * shading_score
        + weights.orientation * orientation_score;
    Ok(combined * 100.0)
}

/// Score a building record against its shading factor.
///
/// Roof area and orientation come from the record's derived properties.
/// Energy potential has no fallback, so a record without it fails with
/// [`SolarRankError::MissingField`].
pub fn score_building(building: &Building, shading_factor: f64, weights: &Weights) -> Result<f64> {
    let energy = building.require_energy_potential()?;
    suitability_score(
        building.roof_area_m2(),
        energy,
        shading_factor,
        building.orientation_deg(),
        weights,
    )
}

/// Suitability band for a score. Bands are inclusive on their lower bound.
pub fn classify(score: f64) -> SuitabilityCategory {
    if score >= 80.0 {
        SuitabilityCategory::Excellent
    } else if score >= 60.0 {
        SuitabilityCategory::Good
    } else if score >= 40.0 {
        SuitabilityCategory::Moderate
    } else if score >= 20.0 {
        SuitabilityCategory::Poor
    } else {
        SuitabilityCategory::Unsuitable
    }
}

/// Rank scored buildings descending by score.
///
/// The sort is stable, so entries with equal scores keep their original
/// relative order. Ranks are dense positions `1..=N`.
pub fn rank(scored: &[(String, f64)]) -> Vec<SuitabilityRecord> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by(|a, b| scored[*b].1.total_cmp(&scored[*a].1));

    order
        .into_iter()
        .enumerate()
        .map(|(position, idx)| {
            let (id, score) = &scored[idx];
            SuitabilityRecord {
                building_id: id.clone(),
                suitability_score: *score,
                category: classify(*score),
                rank: position + 1,
            }
        })
        .collect()
}

/// Selection key for the bounded top-k pass.
///
/// Greater means better: higher score, and at equal scores the earlier
/// entry, which is exactly the order a stable descending sort produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TopEntry {
    score: OrderedScore,
    seq: usize,
}

#[derive(Debug, Clone, Copy)]
struct OrderedScore(f64);

impl PartialEq for OrderedScore {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for OrderedScore {}

impl Ord for TopEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .0
            .total_cmp(&other.score.0)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TopEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The `k` highest-scoring entries, identical to `rank(scored)[..k]`.
///
/// Selection runs through a k-sized min-heap, O(N log k) instead of the
/// full O(N log N) sort. `k == 0` or an empty input yields an empty result;
/// `k` beyond the population returns every entry.
pub fn top_k(scored: &[(String, f64)], k: usize) -> Vec<SuitabilityRecord> {
    if k == 0 || scored.is_empty() {
        return vec![];
    }

    let mut heap: BinaryHeap<Reverse<TopEntry>> = BinaryHeap::with_capacity(k + 1);
    for (seq, (_, score)) in scored.iter().enumerate() {
        heap.push(Reverse(TopEntry {
            score: OrderedScore(*score),
            seq,
        }));
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut selected: Vec<TopEntry> = heap.into_iter().map(|Reverse(e)| e).collect();
    selected.sort_by(|a, b| b.cmp(a));

    selected
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let (id, score) = &scored[entry.seq];
            SuitabilityRecord {
                building_id: id.clone(),
                suitability_score: *score,
                category: classify(*score),
                rank: position + 1,
            }
        })
        .collect()
}

/// The record whose score is closest to `target`, from a slice sorted
/// ascending by score.
///
/// Binary search that tracks the minimum-absolute-difference probe while
/// narrowing the interval; an exact match returns immediately. `None` only
/// for an empty slice.
pub fn closest_to_target(records: &[SuitabilityRecord], target: f64) -> Option<&SuitabilityRecord> {
    let first = records.first()?;

    let mut best = first;
    let mut best_diff = (first.suitability_score - target).abs();
    let mut lo = 0;
    let mut hi = records.len();

    while lo < hi {
        let mid = (lo + hi) / 2;
        let probe = &records[mid];
        let diff = (probe.suitability_score - target).abs();
        if diff < best_diff {
            best = probe;
            best_diff = diff;
        }
        if probe.suitability_score == target {
            return Some(probe);
        }
        if probe.suitability_score < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    Some(best)
}
