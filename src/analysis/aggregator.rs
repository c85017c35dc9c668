//! Observation aggregation and statistics.
//!
//! Pure functions that turn a flat list of observations into per-place
//! scalars, place x attribute tables and time series. Every function is
//! total: empty input yields the additive identity or an empty list, and
//! output order depends only on input order.

use crate::models::{Observation, PlaceField};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// One row of the cross-tabulation: a place and its per-attribute sums.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub place: String,
    /// Attribute sums, in first-seen attribute order.
    pub values: Vec<(String, f64)>,
}

impl StatsRow {
    pub fn get(&self, attribute: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, v)| *v)
    }
}

impl Serialize for StatsRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("place", &self.place)?;
        for (attribute, sum) in &self.values {
            map.serialize_entry(attribute, sum)?;
        }
        map.end()
    }
}

/// One point of a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub year: String,
    /// `YYYY-MM`, only set for monthly series.
    pub month: Option<String>,
    /// Literal date of the first observation in the group.
    pub date: String,
    pub values: Vec<(String, f64)>,
}

impl TimeSeriesPoint {
    pub fn get(&self, attribute: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, v)| *v)
    }
}

impl Serialize for TimeSeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("year", &self.year)?;
        if let Some(ref month) = self.month {
            map.serialize_entry("month", month)?;
        }
        map.serialize_entry("date", &self.date)?;
        for (attribute, sum) in &self.values {
            map.serialize_entry(attribute, sum)?;
        }
        map.end()
    }
}

/// Case-insensitive place name comparison.
fn same_place(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn matches_place(observation: &Observation, place: &str, field: PlaceField) -> bool {
    observation
        .place(field)
        .is_some_and(|p| same_place(p, place))
}

/// Distinct attribute names in first-seen order.
pub fn distinct_attributes(observations: &[Observation]) -> Vec<String> {
    let mut attributes: Vec<String> = Vec::new();

    for observation in observations {
        if !attributes.iter().any(|a| *a == observation.attribute) {
            attributes.push(observation.attribute.clone());
        }
    }

    attributes
}

/// Sum starting from `+0.0`; `Iterator::sum` yields `-0.0` for no items.
fn total(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, v| acc + v)
}

/// Sum of values whose attribute matches exactly.
pub fn sum_by_attribute(observations: &[Observation], attribute: &str) -> f64 {
    total(
        observations
            .iter()
            .filter(|o| o.attribute == attribute)
            .map(|o| o.value),
    )
}

/// Sum of values for one attribute at one place.
pub fn sum_by_attribute_for_place(
    observations: &[Observation],
    place: &str,
    attribute: &str,
    field: PlaceField,
) -> f64 {
    total(
        observations
            .iter()
            .filter(|o| matches_place(o, place, field))
            .filter(|o| o.attribute == attribute)
            .map(|o| o.value),
    )
}

/// Choropleth scalar for a place: sum of all values there, any attribute.
pub fn place_value(observations: &[Observation], place: &str, field: PlaceField) -> f64 {
    total(
        observations
            .iter()
            .filter(|o| matches_place(o, place, field))
            .map(|o| o.value),
    )
}

/// Distinct places under `field`, first-seen spelling, case-insensitive dedup.
pub fn distinct_places(observations: &[Observation], field: PlaceField) -> Vec<String> {
    let mut places: Vec<String> = Vec::new();

    for place in observations.iter().filter_map(|o| o.place(field)) {
        if !places.iter().any(|p| same_place(p, place)) {
            places.push(place.to_string());
        }
    }

    places
}

/// Place x attribute table. Only places present in the data get a row.
pub fn cross_tabulate(observations: &[Observation], field: PlaceField) -> Vec<StatsRow> {
    let attributes = distinct_attributes(observations);

    distinct_places(observations, field)
        .into_iter()
        .map(|place| {
            let values = attributes
                .iter()
                .map(|attr| {
                    let sum = sum_by_attribute_for_place(observations, &place, attr, field);
                    (attr.clone(), sum)
                })
                .collect();
            StatsRow { place, values }
        })
        .collect()
}

/// True once two distinct month components have been seen.
pub fn has_monthly_variation(observations: &[Observation]) -> bool {
    let mut first: Option<Option<&str>> = None;

    for observation in observations {
        let month = observation.month();
        match first {
            None => first = Some(month),
            Some(seen) if seen != month => return true,
            Some(_) => {}
        }
    }

    false
}

/// Attribute sums grouped by year (`YYYY`) or month (`YYYY-MM`), ascending.
pub fn to_time_series(observations: &[Observation], group_by_month: bool) -> Vec<TimeSeriesPoint> {
    let mut groups: BTreeMap<String, Vec<&Observation>> = BTreeMap::new();

    for observation in observations {
        let key = if group_by_month {
            observation
                .date
                .get(..7)
                .unwrap_or(&observation.date)
                .to_string()
        } else {
            observation.year().to_string()
        };
        groups.entry(key).or_default().push(observation);
    }

    let attributes = distinct_attributes(observations);

    groups
        .into_iter()
        .map(|(key, members)| {
            let values = attributes
                .iter()
                .map(|attr| {
                    let sum = total(
                        members
                            .iter()
                            .filter(|o| o.attribute == *attr)
                            .map(|o| o.value),
                    );
                    (attr.clone(), sum)
                })
                .collect();

            // Groups are created on first push, so members is never empty.
            let date = members.first().map(|o| o.date.clone()).unwrap_or_default();

            if group_by_month {
                TimeSeriesPoint {
                    year: key.split('-').next().unwrap_or(&key).to_string(),
                    month: Some(key),
                    date,
                    values,
                }
            } else {
                TimeSeriesPoint {
                    year: key,
                    month: None,
                    date,
                    values,
                }
            }
        })
        .collect()
}

/// Monthly series when preferred and the data varies by month, else yearly.
pub fn consolidate_time_series(
    observations: &[Observation],
    prefer_monthly: bool,
) -> Vec<TimeSeriesPoint> {
    let monthly = prefer_monthly && has_monthly_variation(observations);
    to_time_series(observations, monthly)
}

/// Observations whose date starts with `year`. An empty year keeps all.
pub fn filter_by_year(observations: &[Observation], year: &str) -> Vec<Observation> {
    observations
        .iter()
        .filter(|o| o.date.starts_with(year))
        .cloned()
        .collect()
}

/// Years with data, ascending. Dates without a numeric year are skipped.
pub fn available_years(observations: &[Observation]) -> Vec<i32> {
    let mut years: Vec<i32> = observations
        .iter()
        .filter_map(|o| o.date.get(..4).and_then(|y| y.parse().ok()))
        .collect();

    years.sort_unstable();
    years.dedup();
    years
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(attribute: &str, date: &str, value: f64, province: &str) -> Observation {
        Observation::new(attribute, date, value).with_province(province)
    }

    fn school_enrolment() -> Vec<Observation> {
        vec![
            obs("ecce", "2022-02-01", 378.0, "TAFEA"),
            obs("primary", "2022-02-01", 290.0, "TAFEA"),
            obs("ecce", "2022-02-01", 334.0, "MALAMPA"),
            obs("primary", "2022-02-01", 261.0, "MALAMPA")
                .with_area_council("Central Malekula"),
            obs("ecce", "2023-02-01", 410.0, "Tafea"),
            obs("primary", "2023-02-01", 120.0, "SHEFA"),
        ]
    }

    #[test]
    fn test_distinct_attributes_first_seen_order() {
        let data = vec![
            obs("primary", "2022-01-01", 1.0, "A"),
            obs("ecce", "2022-01-01", 1.0, "A"),
            obs("primary", "2022-01-01", 1.0, "B"),
            obs("secondary", "2022-01-01", 1.0, "B"),
        ];
        assert_eq!(distinct_attributes(&data), vec!["primary", "ecce", "secondary"]);
        assert!(distinct_attributes(&[]).is_empty());
    }

    #[test]
    fn test_sum_by_attribute() {
        let data = school_enrolment();
        assert_eq!(sum_by_attribute(&data, "ecce"), 378.0 + 334.0 + 410.0);
        assert_eq!(sum_by_attribute(&data, "ECCE"), 0.0);
        assert_eq!(sum_by_attribute(&[], "ecce"), 0.0);
    }

    #[test]
    fn test_sum_by_attribute_for_place_is_case_insensitive_on_place() {
        let data = school_enrolment();
        assert_eq!(
            sum_by_attribute_for_place(&data, "tafea", "ecce", PlaceField::Province),
            378.0 + 410.0
        );
        assert_eq!(
            sum_by_attribute_for_place(&data, "TAFEA", "Ecce", PlaceField::Province),
            0.0
        );
        assert_eq!(
            sum_by_attribute_for_place(
                &data,
                "central malekula",
                "primary",
                PlaceField::AreaCouncil
            ),
            261.0
        );
    }

    #[test]
    fn test_place_value() {
        let data = school_enrolment();
        assert_eq!(
            place_value(&data, "Malampa", PlaceField::Province),
            334.0 + 261.0
        );
        assert_eq!(place_value(&[], "Shefa", PlaceField::Province), 0.0);
        assert_eq!(place_value(&data, "Torba", PlaceField::Province), 0.0);
    }

    #[test]
    fn test_empty_sums_are_positive_zero() {
        let data = school_enrolment();

        assert!(place_value(&[], "Shefa", PlaceField::Province).is_sign_positive());
        assert!(sum_by_attribute(&data, "tertiary").is_sign_positive());
        assert!(
            sum_by_attribute_for_place(&data, "Torba", "ecce", PlaceField::Province)
                .is_sign_positive()
        );

        let rows = cross_tabulate(&data, PlaceField::Province);
        let shefa_ecce = rows[2].get("ecce").unwrap();
        assert!(shefa_ecce.is_sign_positive());
        let json = serde_json::to_string(&rows[2]).unwrap();
        assert!(!json.contains("-0"));

        let series = to_time_series(
            &[
                obs("ecce", "2022-02-01", 1.0, "TAFEA"),
                obs("primary", "2023-02-01", 2.0, "TAFEA"),
            ],
            false,
        );
        assert!(series[0].get("primary").unwrap().is_sign_positive());
        assert!(series[1].get("ecce").unwrap().is_sign_positive());
    }

    #[test]
    fn test_cross_tabulate_rows_and_column_totals() {
        let data = school_enrolment();
        let rows = cross_tabulate(&data, PlaceField::Province);

        let places: Vec<&str> = rows.iter().map(|r| r.place.as_str()).collect();
        assert_eq!(places, vec!["TAFEA", "MALAMPA", "SHEFA"]);

        assert_eq!(rows[0].get("ecce"), Some(788.0));
        assert_eq!(rows[2].get("ecce"), Some(0.0));

        for attribute in distinct_attributes(&data) {
            let column: f64 = rows.iter().filter_map(|r| r.get(&attribute)).sum();
            assert_eq!(column, sum_by_attribute(&data, &attribute));
        }
    }

    #[test]
    fn test_cross_tabulate_never_synthesizes_places() {
        let data = school_enrolment();
        let rows = cross_tabulate(&data, PlaceField::AreaCouncil);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].place, "Central Malekula");
        assert!(cross_tabulate(&[], PlaceField::Province).is_empty());
    }

    #[test]
    fn test_stats_row_serializes_flat() {
        let row = StatsRow {
            place: "TAFEA".to_string(),
            values: vec![("ecce".to_string(), 2.0)],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"place": "TAFEA", "ecce": 2.0}));
    }

    #[test]
    fn test_to_time_series_yearly() {
        let data = vec![
            obs("ecce", "2023-02-01", 334.0, "TAFEA"),
            obs("ecce", "2022-02-01", 378.0, "TAFEA"),
        ];
        let series = to_time_series(&data, false);

        assert_eq!(
            series,
            vec![
                TimeSeriesPoint {
                    year: "2022".to_string(),
                    month: None,
                    date: "2022-02-01".to_string(),
                    values: vec![("ecce".to_string(), 378.0)],
                },
                TimeSeriesPoint {
                    year: "2023".to_string(),
                    month: None,
                    date: "2023-02-01".to_string(),
                    values: vec![("ecce".to_string(), 334.0)],
                },
            ]
        );

        let json = serde_json::to_value(&series[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"year": "2022", "date": "2022-02-01", "ecce": 378.0})
        );
    }

    #[test]
    fn test_to_time_series_keeps_first_date_of_group() {
        let data = vec![
            obs("ecce", "2022-06-15", 1.0, "A"),
            obs("ecce", "2022-01-01", 2.0, "A"),
            obs("primary", "2021-03-01", 5.0, "A"),
        ];
        let series = to_time_series(&data, false);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].year, "2021");
        assert_eq!(series[0].get("ecce"), Some(0.0));
        assert_eq!(series[1].date, "2022-06-15");
        assert_eq!(series[1].get("ecce"), Some(3.0));
    }

    #[test]
    fn test_to_time_series_monthly() {
        let data = vec![
            obs("ecce", "2022-02-01", 1.0, "A"),
            obs("ecce", "2022-01-10", 2.0, "A"),
            obs("ecce", "2022-02-20", 4.0, "A"),
        ];
        let series = to_time_series(&data, true);

        let months: Vec<_> = series.iter().map(|p| p.month.clone().unwrap()).collect();
        assert_eq!(months, vec!["2022-01", "2022-02"]);
        assert_eq!(series[1].year, "2022");
        assert_eq!(series[1].get("ecce"), Some(5.0));
        assert_eq!(series[1].date, "2022-02-01");
    }

    #[test]
    fn test_has_monthly_variation() {
        assert!(!has_monthly_variation(&[]));

        let single_month = vec![
            obs("ecce", "2022-02-01", 1.0, "A"),
            obs("ecce", "2023-02-01", 1.0, "A"),
        ];
        assert!(!has_monthly_variation(&single_month));

        let varied = vec![
            obs("ecce", "2022-02-01", 1.0, "A"),
            obs("ecce", "2022-03-01", 1.0, "A"),
        ];
        assert!(has_monthly_variation(&varied));
    }

    #[test]
    fn test_consolidate_time_series_falls_back_to_yearly() {
        let single_month = vec![
            obs("ecce", "2022-02-01", 1.0, "A"),
            obs("ecce", "2023-02-01", 1.0, "A"),
        ];
        let series = consolidate_time_series(&single_month, true);
        assert!(series.iter().all(|p| p.month.is_none()));

        let varied = vec![
            obs("ecce", "2022-02-01", 1.0, "A"),
            obs("ecce", "2022-03-01", 1.0, "A"),
        ];
        let series = consolidate_time_series(&varied, true);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.month.is_some()));
    }

    #[test]
    fn test_filter_by_year_and_available_years() {
        let data = school_enrolment();
        assert_eq!(filter_by_year(&data, "2023").len(), 2);
        assert_eq!(filter_by_year(&data, "").len(), data.len());
        assert_eq!(available_years(&data), vec![2022, 2023]);

        let junk = vec![Observation::new("ecce", "n/a", 1.0)];
        assert!(available_years(&junk).is_empty());
    }
}
