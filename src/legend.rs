//! Legend assembly for the active layers.

use crate::analysis::{abbreviate_unit, AdminAreaStats, ValueRange};
use crate::models::{DataType, Dataset, GeometryType, LayerId};
use crate::store::{DataKey, LayerRegistry, LayerStatus, OpacityMap};
use serde::Serialize;

/// Named colours used for vector layers, indexed by dataset id.
pub const VECTOR_PALETTE: [(&str, &str); 15] = [
    ("blue", "#3d4aff"),
    ("orange", "#f09000"),
    ("green", "#31a354"),
    ("teal", "#20c997"),
    ("gray", "#6c757d"),
    ("yellow", "#ffb703"),
    ("mint", "#3eb489"),
    ("violet", "#9c36b5"),
    ("indigo", "#5c7cfa"),
    ("brown", "#a0522d"),
    ("black", "#000000"),
    ("pink", "#e0318c"),
    ("purple", "#8856a7"),
    ("red", "#e34a33"),
    ("blueLight", "#198EC8"),
];

/// Colour of tiled vector layers.
pub const TILED_VECTOR_COLOR: &str = "#e34a33";

/// Palette colour for a vector dataset.
pub fn vector_layer_color(id: u32) -> &'static str {
    VECTOR_PALETTE[id as usize % VECTOR_PALETTE.len()].1
}

/// Kind-specific part of a legend entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dataType", rename_all = "camelCase")]
pub enum LegendDetail {
    Tabular {
        color_scheme: &'static str,
        /// `None` when there is nothing to colour.
        data_range: Option<ValueRange>,
    },
    Vector {
        geometry_type: GeometryType,
        color: &'static str,
    },
    Raster {
        opacity: f64,
    },
    #[serde(rename = "pmtiles")]
    TiledVector {
        geometry_type: GeometryType,
        color: &'static str,
    },
}

/// Display descriptor for one active layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub layer: LayerId,
    pub name: String,
    pub unit: Option<String>,
    pub source: Option<String>,
    pub status: LayerStatus,
    #[serde(flatten)]
    pub detail: LegendDetail,
}

impl LegendEntry {
    pub fn geometry_type(&self) -> Option<GeometryType> {
        match &self.detail {
            LegendDetail::Vector { geometry_type, .. }
            | LegendDetail::TiledVector { geometry_type, .. } => Some(*geometry_type),
            _ => None,
        }
    }

    pub fn data_range(&self) -> Option<ValueRange> {
        match &self.detail {
            LegendDetail::Tabular { data_range, .. } => *data_range,
            _ => None,
        }
    }
}

/// State the legend is derived from.
pub struct LegendInputs<'a> {
    pub registry: &'a LayerRegistry,
    pub opacity: &'a OpacityMap,
    pub stats: Option<&'a AdminAreaStats>,
    /// Current area filter string, used to look up vector payloads.
    pub filter: &'a str,
}

/// One entry per active layer with cached metadata, in active-set order.
pub fn assemble_legend(inputs: &LegendInputs<'_>) -> Vec<LegendEntry> {
    inputs
        .registry
        .active()
        .iter()
        .filter_map(|layer| {
            let dataset = inputs.registry.dataset_metadata(layer)?;
            Some(entry_for(inputs, *layer, dataset))
        })
        .collect()
}

fn entry_for(inputs: &LegendInputs<'_>, layer: LayerId, dataset: &Dataset) -> LegendEntry {
    let detail = match layer.data_type {
        DataType::Tabular => LegendDetail::Tabular {
            color_scheme: "sequential",
            data_range: inputs
                .stats
                .map(AdminAreaStats::range)
                .filter(|range| !range.is_empty()),
        },
        DataType::Vector => {
            let key = DataKey::new(layer, inputs.filter);
            let geometry_type = inputs
                .registry
                .vector_data(&key)
                .and_then(|payload| payload.geometry_type())
                .unwrap_or(GeometryType::LineString);
            LegendDetail::Vector {
                geometry_type,
                color: vector_layer_color(layer.id),
            }
        }
        DataType::Raster => LegendDetail::Raster {
            opacity: inputs.opacity.fraction(&layer),
        },
        DataType::TiledVector => LegendDetail::TiledVector {
            geometry_type: GeometryType::LineString,
            color: TILED_VECTOR_COLOR,
        },
    };

    LegendEntry {
        layer,
        name: dataset.name.clone(),
        unit: dataset.unit.as_deref().map(abbreviate_unit),
        source: dataset.source.clone(),
        status: inputs
            .registry
            .status(&layer)
            .cloned()
            .unwrap_or(LayerStatus::Loading),
        detail,
    }
}
