//! Admin-area statistics for choropleth rendering.
//!
//! Attaches a per-polygon value to a copy of the province or area-council
//! collection and reports the value range across polygons.

use crate::analysis::aggregator::{filter_by_year, place_value};
use crate::models::{AreaCollection, Observation, PlaceField};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inclusive value range across polygons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Nothing to colour unless some polygon has a positive value.
    pub fn is_empty(&self) -> bool {
        self.max <= 0.0
    }
}

/// Output of one stats pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminAreaStats {
    pub features: AreaCollection,
    pub place_field: PlaceField,
    pub min_value: f64,
    pub max_value: f64,
}

impl AdminAreaStats {
    pub fn range(&self) -> ValueRange {
        ValueRange {
            min: self.min_value,
            max: self.max_value,
        }
    }
}

/// Provinces are coloured until a province is selected, then its area councils.
pub fn place_field_for(selected_province: &str) -> PlaceField {
    if selected_province.is_empty() {
        PlaceField::Province
    } else {
        PlaceField::AreaCouncil
    }
}

/// Computes per-feature values on a copy of `features`.
///
/// `observations` must already be filtered to the active year.
pub fn compute_admin_area_stats(
    features: &AreaCollection,
    observations: &[Observation],
    selected_province: &str,
) -> AdminAreaStats {
    let place_field = place_field_for(selected_province);
    let mut features = features.clone();

    for feature in &mut features.features {
        let value = place_value(observations, &feature.properties.name, place_field);
        feature.properties.value = Some(value);
    }

    let mut values: Vec<f64> = features
        .features
        .iter()
        .filter_map(|f| f.properties.value)
        .filter(|v| v.is_finite())
        .collect();

    if values.is_empty() {
        return AdminAreaStats {
            features,
            place_field,
            min_value: 0.0,
            max_value: 0.0,
        };
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let min_value = values[0];
    let max_value = values[values.len() - 1];

    AdminAreaStats {
        features,
        place_field,
        min_value,
        max_value,
    }
}

/// Inputs that invalidate a cached stats pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsKey {
    pub observations_version: u64,
    pub province: String,
    pub area_council: String,
    pub year: String,
    pub feature_names: Vec<String>,
}

/// Reruns the stats pass whenever observations, area, year or features change.
#[derive(Debug, Default)]
pub struct StatsCache {
    key: Option<StatsKey>,
    stats: Option<AdminAreaStats>,
    recomputations: u64,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stats for these inputs, recomputing only when they changed.
    pub fn get_or_compute(
        &mut self,
        key: StatsKey,
        features: &AreaCollection,
        observations: &[Observation],
    ) -> &AdminAreaStats {
        let stale = self.key.as_ref() != Some(&key) || self.stats.is_none();

        if stale {
            debug!(
                "Recomputing admin-area stats (version {}, year {:?}, province {:?})",
                key.observations_version, key.year, key.province
            );
            let filtered = filter_by_year(observations, &key.year);
            let stats = compute_admin_area_stats(features, &filtered, &key.province);
            self.recomputations += 1;
            self.key = Some(key);
            self.stats = Some(stats);
        }

        self.stats.get_or_insert_with(|| AdminAreaStats {
            features: features.clone(),
            place_field: PlaceField::Province,
            min_value: 0.0,
            max_value: 0.0,
        })
    }

    /// Number of full recomputations performed so far.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// The cached pass, if it was computed for these observations, area
    /// and year. Any feature set counts.
    pub fn current_for(
        &self,
        observations_version: u64,
        province: &str,
        area_council: &str,
        year: &str,
    ) -> Option<&AdminAreaStats> {
        let key = self.key.as_ref()?;
        let fresh = key.observations_version == observations_version
            && key.province == province
            && key.area_council == area_council
            && key.year == year;
        if fresh {
            self.stats.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provinces() -> AreaCollection {
        AreaCollection::from_names(["TORBA", "SANMA", "PENAMA", "MALAMPA", "SHEFA", "TAFEA"])
    }

    #[test]
    fn test_province_values_and_range() {
        let observations = vec![
            Observation::new("ecce", "2023-02-01", 334.0).with_province("TAFEA"),
            Observation::new("ecce", "2023-02-01", 120.0).with_province("shefa"),
        ];
        let stats = compute_admin_area_stats(&provinces(), &observations, "");

        assert_eq!(stats.place_field, PlaceField::Province);
        assert_eq!(stats.min_value, 0.0);
        assert_eq!(stats.max_value, 334.0);

        let shefa = stats
            .features
            .features
            .iter()
            .find(|f| f.name() == "SHEFA")
            .unwrap();
        assert_eq!(shefa.value(), Some(120.0));
    }

    #[test]
    fn test_drill_down_uses_area_councils() {
        let councils = AreaCollection::from_names(["Central Malekula", "North West Malekula"]);
        let observations = vec![
            Observation::new("ecce", "2023-02-01", 17.0)
                .with_province("MALAMPA")
                .with_area_council("Central Malekula"),
            Observation::new("ecce", "2023-02-01", 40.0)
                .with_province("MALAMPA")
                .with_area_council("North West Malekula"),
        ];
        let stats = compute_admin_area_stats(&councils, &observations, "MALAMPA");

        assert_eq!(stats.place_field, PlaceField::AreaCouncil);
        assert_eq!(stats.range(), ValueRange { min: 17.0, max: 40.0 });
    }

    #[test]
    fn test_empty_input_signals_nothing_to_render() {
        let stats = compute_admin_area_stats(&AreaCollection::default(), &[], "");
        assert_eq!(stats.min_value, 0.0);
        assert_eq!(stats.max_value, 0.0);
        assert!(stats.range().is_empty());

        let stats = compute_admin_area_stats(&provinces(), &[], "");
        assert!(stats.range().is_empty());
    }

    #[test]
    fn test_non_positive_range_is_empty() {
        assert!(ValueRange { min: -3.0, max: 0.0 }.is_empty());
        assert!(ValueRange { min: -5.0, max: -1.0 }.is_empty());
        assert!(!ValueRange { min: -3.0, max: 2.0 }.is_empty());
        assert!(!ValueRange { min: 0.0, max: 0.5 }.is_empty());
    }

    #[test]
    fn test_caller_collection_is_not_mutated() {
        let original = provinces();
        let observations =
            vec![Observation::new("ecce", "2023-02-01", 5.0).with_province("TORBA")];
        let _ = compute_admin_area_stats(&original, &observations, "");

        assert!(original.features.iter().all(|f| f.value().is_none()));
    }

    #[test]
    fn test_stats_cache_recomputes_on_input_change() {
        let features = provinces();
        let observations = vec![
            Observation::new("ecce", "2022-02-01", 10.0).with_province("TAFEA"),
            Observation::new("ecce", "2023-02-01", 30.0).with_province("TAFEA"),
        ];
        let key = |year: &str| StatsKey {
            observations_version: 1,
            province: String::new(),
            area_council: String::new(),
            year: year.to_string(),
            feature_names: features.features.iter().map(|f| f.name().to_string()).collect(),
        };

        let mut cache = StatsCache::new();
        assert_eq!(cache.get_or_compute(key("2022"), &features, &observations).max_value, 10.0);
        assert_eq!(cache.get_or_compute(key("2022"), &features, &observations).max_value, 10.0);
        assert_eq!(cache.recomputations(), 1);

        assert_eq!(cache.get_or_compute(key("2023"), &features, &observations).max_value, 30.0);
        assert_eq!(cache.recomputations(), 2);

        assert!(cache.current_for(1, "", "", "2023").is_some());
        assert!(cache.current_for(1, "", "", "2022").is_none());
        assert!(cache.current_for(2, "", "", "2023").is_none());
        assert!(cache.current_for(1, "TAFEA", "", "2023").is_none());
    }
}
