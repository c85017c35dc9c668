//! Dashboard reports.
//!
//! A [`DashboardReport`] is a snapshot of what the dashboard shows for the
//! current state: legend, choropleth values, statistics table and time series.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report, write_report};

use crate::analysis::{
    available_years, consolidate_time_series, cross_tabulate, distinct_attributes, unit_of,
    StatsRow, TimeSeriesPoint, ValueRange,
};
use crate::legend::LegendEntry;
use crate::models::{AreaCollection, DataType, PlaceField};
use crate::store::Dashboard;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What to include in a report.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub monthly: bool,
    pub include_table: bool,
    pub include_time_series: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            monthly: false,
            include_table: true,
            include_time_series: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    /// Normalized link reproducing this view.
    pub share_link: String,
    pub layers: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub province: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub area_council: String,
    pub year: String,
    /// Where the data came from (API base URL or file path).
    pub data_source: String,
    pub observation_count: usize,
}

/// Choropleth value of one admin area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub legend: Vec<LegendEntry>,
    pub place_field: PlaceField,
    /// `None` when no area has a value.
    pub value_range: Option<ValueRange>,
    pub areas: Vec<AreaValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub attributes: Vec<String>,
    pub available_years: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<StatsRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series: Option<Vec<TimeSeriesPoint>>,
}

impl DashboardReport {
    /// Builds a report from the dashboard's current state.
    ///
    /// The table covers the selected year; the time series covers all years.
    pub fn build(
        dashboard: &mut Dashboard,
        boundaries: &AreaCollection,
        data_source: &str,
        options: ReportOptions,
    ) -> Self {
        let stats = dashboard.admin_area_stats(boundaries).clone();
        let place_field = stats.place_field;
        let range = stats.range();

        let all = dashboard.layers().observations();
        let year_observations = dashboard.year_observations();

        let table = options
            .include_table
            .then(|| cross_tabulate(&year_observations, place_field));
        let time_series = options
            .include_time_series
            .then(|| consolidate_time_series(all, options.monthly));

        let areas = stats
            .features
            .features
            .iter()
            .map(|f| AreaValue {
                name: f.name().to_string(),
                value: f.value().unwrap_or(0.0),
            })
            .collect();

        let metadata = ReportMetadata {
            generated_at: Utc::now(),
            share_link: dashboard.location().to_string(),
            layers: dashboard.layers().active().to_string(),
            province: dashboard.area().province.clone(),
            area_council: dashboard.area().area_council.clone(),
            year: dashboard.year().to_string(),
            data_source: data_source.to_string(),
            observation_count: all.len(),
        };

        Self {
            metadata,
            legend: dashboard.legend(),
            place_field,
            value_range: (!range.is_empty()).then_some(range),
            areas,
            unit: unit_of(all),
            attributes: distinct_attributes(all),
            available_years: available_years(all),
            table,
            time_series,
        }
    }

    /// Name of the active tabular dataset, if its metadata is loaded.
    pub fn tabular_name(&self) -> Option<&str> {
        self.legend
            .iter()
            .find(|e| e.layer.data_type == DataType::Tabular)
            .map(|e| e.name.as_str())
    }
}
