//! Whole-set analysis: an immutable context and its result snapshot.
//!
//! [`AnalysisContext`] owns the building set and the spatial index built
//! over it; [`AnalysisContext::run`] produces an [`AnalysisSnapshot`] with
//! the ranked records, the shading map, and the service-layer query methods
//! (get-by-id, predicate filters with pagination, top-N, summary stats).
//! Neither type is ever mutated after construction; a changed building set
//! means a new context.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::building::Building;
use crate::error::{Result, SolarRankError};
use crate::kdtree::OwnedSpatialIndex;
use crate::score::{rank, score_building, SuitabilityCategory, SuitabilityRecord, Weights};
use crate::shadow::{shading_factors, ShadingResult, ShadowConfig};

/// An immutable analysis session over a fixed building set.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    buildings: Vec<Building>,
    index: OwnedSpatialIndex,
}

impl AnalysisContext {
    /// Take ownership of the building set and build the spatial index over
    /// its centroids.
    ///
    /// Results are keyed by building id, so duplicate ids are rejected with
    /// [`SolarRankError::InvalidParameter`].
    pub fn new(buildings: Vec<Building>) -> Result<Self> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for building in &buildings {
            if !seen.insert(building.id()) {
                return Err(SolarRankError::InvalidParameter(format!(
                    "duplicate building id `{}`",
                    building.id()
                )));
            }
        }

        let index = OwnedSpatialIndex::build(&buildings);
        Ok(Self { buildings, index })
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn index(&self) -> &OwnedSpatialIndex {
        &self.index
    }

    /// Run the full analysis: shading for every building, scoring, ranking.
    ///
    /// Scoring failures are isolated per building: a record that cannot be
    /// scored (missing energy potential) is skipped, logged, and reported in
    /// the snapshot's [`skipped`][AnalysisSnapshot::skipped] list instead of
    /// aborting the batch. Broken configuration (invalid weights, negative
    /// search radius) aborts the whole run.
    pub fn run(&self, shadow_config: &ShadowConfig, weights: &Weights) -> Result<AnalysisSnapshot> {
        weights.validate()?;

        let shading = shading_factors(&self.buildings, &self.index, shadow_config)?;

        let mut scored: Vec<(String, f64)> = Vec::with_capacity(self.buildings.len());
        let mut skipped: Vec<SkippedBuilding> = Vec::new();
        for building in &self.buildings {
            let factor = shading.get(building.id()).copied().unwrap_or(0.0);
            match score_building(building, factor, weights) {
                Ok(score) => scored.push((building.id().to_string(), score)),
                Err(error @ SolarRankError::MissingField { .. }) => {
                    warn!("skipping building `{}`: {error}", building.id());
                    skipped.push(SkippedBuilding {
                        id: building.id().to_string(),
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        let records = rank(&scored);
        info!(
            "analysis run complete: {} ranked, {} skipped",
            records.len(),
            skipped.len()
        );

        let by_id = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.building_id.clone(), position))
            .collect();
        let properties = self
            .buildings
            .iter()
            .map(|b| {
                (
                    b.id().to_string(),
                    RoofProperties {
                        roof_area_m2: b.roof_area_m2(),
                        orientation_deg: b.orientation_deg(),
                        height_m: b.height_m(),
                        energy_potential_kwh: b.energy_potential_kwh(),
                    },
                )
            })
            .collect();

        Ok(AnalysisSnapshot {
            records,
            shading,
            skipped,
            properties,
            by_id,
        })
    }
}

/// Roof attributes carried alongside the ranked records for filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoofProperties {
    pub roof_area_m2: f64,
    pub orientation_deg: f64,
    pub height_m: f64,
    pub energy_potential_kwh: Option<f64>,
}

/// A building left out of the ranked result, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedBuilding {
    pub id: String,
    pub reason: String,
}

/// Predicate filters applied by [`AnalysisSnapshot::list`] before
/// pagination. Absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub min_roof_area_m2: Option<f64>,
    pub min_energy_kwh: Option<f64>,
    pub category: Option<SuitabilityCategory>,
}

impl RecordFilter {
    fn matches(&self, record: &SuitabilityRecord, properties: Option<&RoofProperties>) -> bool {
        if let Some(min_score) = self.min_score {
            if record.suitability_score < min_score {
                return false;
            }
        }
        if let Some(max_score) = self.max_score {
            if record.suitability_score > max_score {
                return false;
            }
        }
        if let Some(category) = self.category {
            if record.category != category {
                return false;
            }
        }
        if let Some(min_area) = self.min_roof_area_m2 {
            match properties {
                Some(props) if props.roof_area_m2 >= min_area => {}
                _ => return false,
            }
        }
        if let Some(min_energy) = self.min_energy_kwh {
            match properties.and_then(|p| p.energy_potential_kwh) {
                Some(energy) if energy >= min_energy => {}
                _ => return false,
            }
        }
        true
    }
}

/// Summary statistics over the ranked records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub count: usize,
    pub total_roof_area_m2: f64,
    pub mean_roof_area_m2: f64,
    pub mean_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub category_counts: BTreeMap<SuitabilityCategory, usize>,
}

/// The immutable result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    records: Vec<SuitabilityRecord>,
    shading: ShadingResult,
    skipped: Vec<SkippedBuilding>,
    properties: BTreeMap<String, RoofProperties>,
    by_id: BTreeMap<String, usize>,
}

impl AnalysisSnapshot {
    /// Ranked records, best first. Ranks run `1..=N` with no gaps.
    pub fn records(&self) -> &[SuitabilityRecord] {
        &self.records
    }

    /// Shading factor per building id, including skipped buildings.
    pub fn shading(&self) -> &ShadingResult {
        &self.shading
    }

    /// Buildings that could not be scored in this run.
    pub fn skipped(&self) -> &[SkippedBuilding] {
        &self.skipped
    }

    /// Roof attributes per building id.
    pub fn properties(&self, id: &str) -> Option<&RoofProperties> {
        self.properties.get(id)
    }

    /// Look up the ranked record for a building id.
    pub fn get(&self, id: &str) -> Option<&SuitabilityRecord> {
        self.by_id.get(id).map(|position| &self.records[*position])
    }

    /// Filtered, paginated view of the ranked records.
    ///
    /// Filters apply before pagination, so `offset`/`limit` window the
    /// filtered run, not the raw one. Rank order is preserved.
    pub fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Vec<&SuitabilityRecord> {
        self.records
            .iter()
            .filter(|record| filter.matches(record, self.properties.get(&record.building_id)))
            .skip(offset)
            .take(limit)
            .collect()
    }

    /// The `n` best records; `n` beyond the population returns every record.
    pub fn top_n(&self, n: usize) -> &[SuitabilityRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Summary statistics over the ranked records.
    pub fn summary(&self) -> SnapshotSummary {
        let count = self.records.len();
        let mut category_counts: BTreeMap<SuitabilityCategory, usize> = BTreeMap::new();
        let mut total_roof_area = 0.0;
        let mut score_sum = 0.0;
        let mut min_score = f64::INFINITY;
        let mut max_score = f64::NEG_INFINITY;

        for record in &self.records {
            *category_counts.entry(record.category).or_insert(0) += 1;
            score_sum += record.suitability_score;
            min_score = min_score.min(record.suitability_score);
            max_score = max_score.max(record.suitability_score);
            if let Some(props) = self.properties.get(&record.building_id) {
                total_roof_area += props.roof_area_m2;
            }
        }

        if count == 0 {
            return SnapshotSummary {
                count: 0,
                total_roof_area_m2: 0.0,
                mean_roof_area_m2: 0.0,
                mean_score: 0.0,
                min_score: 0.0,
                max_score: 0.0,
                category_counts,
            };
        }

        SnapshotSummary {
            count,
            total_roof_area_m2: total_roof_area,
            mean_roof_area_m2: total_roof_area / count as f64,
            mean_score: score_sum / count as f64,
            min_score,
            max_score,
            category_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Footprint;

    fn building(id: &str, x0: f64, height: f64, energy: Option<f64>) -> Building {
        let footprint = Footprint::single(vec![
            (x0, 0.0),
            (x0 + 10.0, 0.0),
            (x0 + 10.0, 10.0),
            (x0, 10.0),
        ])
        .unwrap();
        Building::new(id.to_string(), footprint, Some(height), energy)
    }

    fn fixture() -> AnalysisContext {
        AnalysisContext::new(vec![
            building("low", 0.0, 10.0, Some(12_000.0)),
            building("tower", 15.0, 40.0, Some(45_000.0)),
            building("far", 500.0, 10.0, Some(30_000.0)),
            building("no-energy", 1000.0, 10.0, None),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = AnalysisContext::new(vec![
            building("same", 0.0, 10.0, None),
            building("same", 100.0, 10.0, None),
        ])
        .unwrap_err();
        assert!(matches!(err, SolarRankError::InvalidParameter(_)));
    }

    #[test]
    fn run_ranks_scorable_buildings_and_reports_skips() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();

        assert_eq!(snapshot.records().len(), 3);
        let ranks: Vec<usize> = snapshot.records().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);

        assert_eq!(snapshot.skipped().len(), 1);
        assert_eq!(snapshot.skipped()[0].id, "no-energy");

        // shading is computed for every building, even unscorable ones
        assert_eq!(snapshot.shading().len(), 4);
        assert!(snapshot.shading()["low"] > 0.0);
        assert_eq!(snapshot.shading()["far"], 0.0);
    }

    #[test]
    fn shading_lowers_the_score() {
        let shaded_ctx = fixture();
        let snapshot = shaded_ctx
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();

        // same building without the tower next door scores higher
        let lone_ctx =
            AnalysisContext::new(vec![building("low", 0.0, 10.0, Some(12_000.0))]).unwrap();
        let lone_snapshot = lone_ctx
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();

        let shaded = snapshot.get("low").unwrap().suitability_score;
        let unshaded = lone_snapshot.get("low").unwrap().suitability_score;
        assert!(shaded < unshaded);
    }

    #[test]
    fn broken_weights_abort_the_run() {
        let weights = Weights {
            energy: -1.0,
            ..Default::default()
        };
        let err = fixture()
            .run(&ShadowConfig::default(), &weights)
            .unwrap_err();
        assert!(matches!(err, SolarRankError::InvalidParameter(_)));
    }

    #[test]
    fn negative_search_radius_aborts_the_run() {
        let config = ShadowConfig {
            search_radius_m: -5.0,
            ..Default::default()
        };
        let err = fixture().run(&config, &Weights::default()).unwrap_err();
        assert!(matches!(err, SolarRankError::OutOfRangeQuery(_)));
    }

    #[test]
    fn get_by_id() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();
        assert_eq!(snapshot.get("tower").unwrap().building_id, "tower");
        assert!(snapshot.get("nope").is_none());
        assert!(snapshot.get("no-energy").is_none());
    }

    #[test]
    fn list_filters_before_pagination() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();

        let all = snapshot.list(&RecordFilter::default(), usize::MAX, 0);
        assert_eq!(all.len(), 3);

        let min_score = all.last().unwrap().suitability_score + 0.001;
        let filter = RecordFilter {
            min_score: Some(min_score),
            ..Default::default()
        };

        // offset applies to the filtered run, not the raw one
        let page = snapshot.list(&filter, 1, 1);
        let filtered = snapshot.list(&filter, usize::MAX, 0);
        assert_eq!(filtered.len(), 2);
        assert_eq!(page[0].building_id, filtered[1].building_id);
    }

    #[test]
    fn list_filters_on_roof_properties() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();

        let filter = RecordFilter {
            min_energy_kwh: Some(40_000.0),
            ..Default::default()
        };
        let hits = snapshot.list(&filter, usize::MAX, 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].building_id, "tower");

        let filter = RecordFilter {
            min_roof_area_m2: Some(99.0),
            ..Default::default()
        };
        assert_eq!(snapshot.list(&filter, usize::MAX, 0).len(), 3);
    }

    #[test]
    fn top_n_is_the_leading_slice() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();
        assert_eq!(snapshot.top_n(2), &snapshot.records()[..2]);
        assert_eq!(snapshot.top_n(100).len(), 3);
    }

    #[test]
    fn summary_statistics() {
        let snapshot = fixture()
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();
        let summary = snapshot.summary();

        assert_eq!(summary.count, 3);
        assert!((summary.total_roof_area_m2 - 300.0).abs() < 1e-9);
        assert!((summary.mean_roof_area_m2 - 100.0).abs() < 1e-9);
        assert!(summary.min_score <= summary.mean_score);
        assert!(summary.mean_score <= summary.max_score);
        assert_eq!(summary.category_counts.values().sum::<usize>(), 3);
    }

    #[test]
    fn empty_context_runs_to_an_empty_snapshot() {
        let ctx = AnalysisContext::new(vec![]).unwrap();
        let snapshot = ctx
            .run(&ShadowConfig::default(), &Weights::default())
            .unwrap();
        assert!(snapshot.records().is_empty());
        assert!(snapshot.skipped().is_empty());
        assert_eq!(snapshot.summary().count, 0);
    }
}
