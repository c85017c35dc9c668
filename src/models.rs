//! Data models for the dashboard engine.
//!
//! This module contains the core data structures shared by the
//! aggregation library, the stores and the legend: observations,
//! layer identifiers, dataset metadata and admin-area features.

use crate::error::LayerIdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Administrative level an observation or query is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceField {
    Province,
    AreaCouncil,
}

impl PlaceField {
    /// Query/field name used by the REST API.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceField::Province => "province",
            PlaceField::AreaCouncil => "area_council",
        }
    }
}

impl fmt::Display for PlaceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measured fact tied to an administrative place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Machine key of the measured attribute (e.g. "ecce", "primary").
    pub attribute: String,
    /// ISO date string (`YYYY-MM-DD`).
    pub date: String,
    /// Measured value. Missing or null values count as zero.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_council: Option<String>,
    #[serde(default, alias = "Unit", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

impl Observation {
    /// Creates an observation without place or unit.
    pub fn new(attribute: impl Into<String>, date: impl Into<String>, value: f64) -> Self {
        Self {
            attribute: attribute.into(),
            date: date.into(),
            value,
            province: None,
            area_council: None,
            unit: None,
        }
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn with_area_council(mut self, area_council: impl Into<String>) -> Self {
        self.area_council = Some(area_council.into());
        self
    }

    /// Returns the place name stored under the given field, if any.
    pub fn place(&self, field: PlaceField) -> Option<&str> {
        match field {
            PlaceField::Province => self.province.as_deref(),
            PlaceField::AreaCouncil => self.area_council.as_deref(),
        }
    }

    /// Year component of the date (`YYYY`).
    pub fn year(&self) -> &str {
        self.date.split('-').next().unwrap_or("")
    }

    /// Month component of the date (`MM`), if the date has one.
    pub fn month(&self) -> Option<&str> {
        self.date.split('-').nth(1)
    }
}

/// Kind of dataset a layer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Tabular,
    Vector,
    Raster,
    #[serde(rename = "pmtiles")]
    TiledVector,
}

impl DataType {
    /// Single-character prefix used in layer identifiers.
    pub fn prefix(&self) -> char {
        match self {
            DataType::Tabular => 't',
            DataType::Vector => 'v',
            DataType::Raster => 'r',
            DataType::TiledVector => 'p',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            't' => Some(DataType::Tabular),
            'v' => Some(DataType::Vector),
            'r' => Some(DataType::Raster),
            'p' => Some(DataType::TiledVector),
            _ => None,
        }
    }

    /// Path segment of the REST resource for this kind.
    pub fn api_path(&self) -> &'static str {
        match self {
            DataType::Tabular => "tabular",
            DataType::Vector => "vector",
            DataType::Raster => "raster",
            DataType::TiledVector => "pmtiles",
        }
    }

    /// Tabular and raster layers allow at most one active member each.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, DataType::Tabular | DataType::Raster)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_path())
    }
}

/// Compact layer token: `{type-prefix}{numeric-id}`, e.g. `t1`, `r12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId {
    pub data_type: DataType,
    pub id: u32,
}

impl LayerId {
    pub fn new(data_type: DataType, id: u32) -> Self {
        Self { data_type, id }
    }

    /// Whether this layer competes with `other` for the same exclusive slot.
    pub fn shares_exclusivity_with(&self, other: &LayerId) -> bool {
        self.data_type.is_exclusive() && self.data_type == other.data_type
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.data_type.prefix(), self.id)
    }
}

impl FromStr for LayerId {
    type Err = LayerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let mut chars = token.chars();
        let prefix = chars.next().ok_or(LayerIdError::Empty)?;
        let data_type = DataType::from_prefix(prefix).ok_or_else(|| LayerIdError::UnknownPrefix {
            token: token.to_string(),
        })?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(LayerIdError::InvalidId {
                token: token.to_string(),
            });
        }
        let id = digits.parse().map_err(|_| LayerIdError::InvalidId {
            token: token.to_string(),
        })?;
        Ok(Self { data_type, id })
    }
}

impl Serialize for LayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

/// Dataset metadata as returned by the detail/list endpoints, before it
/// is tagged with the kind it was fetched as.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRecord {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Normalized dataset metadata, cached per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: u32,
    pub name: String,
    /// Category of the indicator (e.g. "Education").
    #[serde(rename = "type")]
    pub category: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Tile archive location for tiled-vector datasets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
}

impl Dataset {
    /// Tags a raw record with the kind it was fetched as.
    pub fn from_record(record: DatasetRecord, data_type: DataType) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            id: record.id,
            name: record.name,
            category: record.category,
            cluster: record.cluster,
            unit: clean(record.unit),
            source: clean(record.source),
            url: clean(record.url),
            data_type,
        }
    }

    pub fn layer_id(&self) -> LayerId {
        LayerId::new(self.data_type, self.id)
    }
}

/// Properties of a province or area-council polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaProperties {
    pub name: String,
    /// Derived choropleth value, recomputed on every stats pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Parent province id (area councils only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<u32>,
}

/// A named admin-area polygon. Geometry is carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaFeature {
    #[serde(default)]
    pub geometry: serde_json::Value,
    pub properties: AreaProperties,
}

impl AreaFeature {
    /// Creates a feature with a name and no geometry.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            geometry: serde_json::Value::Null,
            properties: AreaProperties {
                name: name.into(),
                value: None,
                province: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn value(&self) -> Option<f64> {
        self.properties.value
    }
}

/// GeoJSON-style collection of admin-area polygons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaCollection {
    #[serde(default)]
    pub features: Vec<AreaFeature>,
}

impl AreaCollection {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: names.into_iter().map(AreaFeature::named).collect(),
        }
    }
}

/// Geometry kind of a vector feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryType {
    /// Parses a GeoJSON geometry type name. Collections and unknown names yield `None`.
    pub fn from_geojson(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(GeometryType::Point),
            "LineString" => Some(GeometryType::LineString),
            "Polygon" => Some(GeometryType::Polygon),
            "MultiPoint" => Some(GeometryType::MultiPoint),
            "MultiLineString" => Some(GeometryType::MultiLineString),
            "MultiPolygon" => Some(GeometryType::MultiPolygon),
            _ => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, GeometryType::Point | GeometryType::MultiPoint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub coordinates: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorFeature {
    #[serde(default)]
    pub geometry: Option<VectorGeometry>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Fully drained vector dataset payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    pub features: Vec<VectorFeature>,
}

impl VectorPayload {
    /// Geometry type of the first feature that carries one.
    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.features
            .first()
            .and_then(|f| f.geometry.as_ref())
            .and_then(|g| GeometryType::from_geojson(&g.kind))
    }
}

/// Map camera state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            longitude: 168.014,
            latitude: -16.741,
            zoom: 7.0,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

/// Partial viewport update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportUpdate {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub zoom: Option<f64>,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
}

impl ViewportUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
