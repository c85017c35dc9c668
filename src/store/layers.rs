//! Layer registry: the active layer set and everything cached for it.
//!
//! At most one tabular and one raster layer can be active at a time.
//! Switching on a layer of an exclusive kind removes the previous one in
//! the same call, so no intermediate state with two of them exists.

use crate::models::{DataType, Dataset, LayerId, Observation, VectorPayload};
use crate::url_sync::{QueryParams, UrlSlice, KEY_LAYERS};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Ordered set of active layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLayers(Vec<LayerId>);

impl ActiveLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-joined token list. Malformed tokens are skipped, and
    /// a later tabular/raster token displaces an earlier one of its kind.
    pub fn parse(s: &str) -> Self {
        let mut layers = Self::new();

        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.parse::<LayerId>() {
                Ok(id) => {
                    layers.insert(id);
                }
                Err(e) => warn!("Ignoring layer token: {}", e),
            }
        }

        layers
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn of_type(&self, data_type: DataType) -> impl Iterator<Item = &LayerId> {
        self.0.iter().filter(move |id| id.data_type == data_type)
    }

    /// The single active tabular layer, if any.
    pub fn tabular(&self) -> Option<LayerId> {
        self.of_type(DataType::Tabular).next().copied()
    }

    /// The single active raster layer, if any.
    pub fn raster(&self) -> Option<LayerId> {
        self.of_type(DataType::Raster).next().copied()
    }

    /// Adds `id` after removing any layer it is exclusive with.
    /// Returns the displaced layers.
    fn insert(&mut self, id: LayerId) -> Vec<LayerId> {
        if self.contains(&id) {
            return Vec::new();
        }

        let (displaced, kept): (Vec<LayerId>, Vec<LayerId>) = self
            .0
            .iter()
            .partition(|other| id.shares_exclusivity_with(other));
        self.0 = kept;
        self.0.push(id);
        displaced
    }

    fn remove(&mut self, id: &LayerId) -> bool {
        let before = self.0.len();
        self.0.retain(|l| l != id);
        self.0.len() != before
    }

    fn holds_invariants(&self) -> bool {
        self.of_type(DataType::Tabular).count() <= 1 && self.of_type(DataType::Raster).count() <= 1
    }
}

impl fmt::Display for ActiveLayers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<String> = self.0.iter().map(LayerId::to_string).collect();
        f.write_str(&tokens.join(","))
    }
}

impl FromIterator<LayerId> for ActiveLayers {
    fn from_iter<I: IntoIterator<Item = LayerId>>(iter: I) -> Self {
        let mut layers = Self::new();
        for id in iter {
            layers.insert(id);
        }
        layers
    }
}

/// Load state of a layer's data or metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LayerStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Cache key for fetched layer data: kind, id and area filter string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataKey {
    pub layer: LayerId,
    pub filter: String,
}

impl DataKey {
    pub fn new(layer: LayerId, filter: impl Into<String>) -> Self {
        Self {
            layer,
            filter: filter.into(),
        }
    }
}

/// Result of a toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub activated: Option<LayerId>,
    pub deactivated: Vec<LayerId>,
}

/// Canonical "what's on the map" state.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    active: ActiveLayers,
    metadata: HashMap<LayerId, Dataset>,
    observations: Vec<Observation>,
    observations_version: u64,
    /// Fetch the current observations came from, when they were fetched.
    observations_key: Option<DataKey>,
    status: HashMap<LayerId, LayerStatus>,
    vector_cache: HashMap<DataKey, VectorPayload>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &ActiveLayers {
        &self.active
    }

    pub fn is_active(&self, id: &LayerId) -> bool {
        self.active.contains(id)
    }

    /// Switches `id` off if active, otherwise on (displacing its exclusivity class).
    pub fn toggle(&mut self, id: LayerId) -> ToggleOutcome {
        let outcome = if self.active.remove(&id) {
            ToggleOutcome {
                activated: None,
                deactivated: vec![id],
            }
        } else {
            let displaced = self.active.insert(id);
            ToggleOutcome {
                activated: Some(id),
                deactivated: displaced,
            }
        };

        for layer in &outcome.deactivated {
            self.forget_layer(layer);
        }
        debug_assert!(self.active.holds_invariants());

        info!("Active layers: [{}]", self.active);
        outcome
    }

    /// Bulk replace, used when restoring from a link.
    pub fn set_active(&mut self, layers: ActiveLayers) {
        let removed: Vec<LayerId> = self
            .active
            .iter()
            .filter(|id| !layers.contains(id))
            .copied()
            .collect();
        self.active = layers;

        for layer in &removed {
            self.forget_layer(layer);
        }
        debug_assert!(self.active.holds_invariants());

        info!("Active layers restored: [{}]", self.active);
    }

    fn forget_layer(&mut self, layer: &LayerId) {
        self.status.remove(layer);
        if layer.data_type == DataType::Tabular && self.clear_observations() {
            debug!("Cleared observations of deactivated layer {}", layer);
        }
    }

    /// Cached metadata, or `None` while it has not been fetched yet.
    pub fn dataset_metadata(&self, id: &LayerId) -> Option<&Dataset> {
        self.metadata.get(id)
    }

    pub fn record_metadata(&mut self, dataset: Dataset) {
        debug!("Caching metadata for {}", dataset.layer_id());
        self.metadata.insert(dataset.layer_id(), dataset);
    }

    /// Active layers that still need metadata.
    pub fn missing_metadata(&self) -> Vec<LayerId> {
        self.active
            .iter()
            .filter(|id| !self.metadata.contains_key(id))
            .copied()
            .collect()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Increments on every wholesale replacement of the observations.
    pub fn observations_version(&self) -> u64 {
        self.observations_version
    }

    /// Replaces the tabular observations wholesale.
    pub fn record_tabular_observations(&mut self, observations: Vec<Observation>) {
        self.replace_observations(observations);
    }

    /// Replaces the tabular observations with the result of the fetch for `key`.
    pub fn record_fetched_observations(&mut self, key: DataKey, observations: Vec<Observation>) {
        self.replace_observations(observations);
        self.observations_key = Some(key);
    }

    /// Key of the fetch the current observations came from.
    pub fn observations_key(&self) -> Option<&DataKey> {
        self.observations_key.as_ref()
    }

    /// Drops the tabular observations. Returns whether anything was dropped.
    pub fn clear_observations(&mut self) -> bool {
        if self.observations.is_empty() && self.observations_key.is_none() {
            return false;
        }
        debug!("Clearing {} observations", self.observations.len());
        self.replace_observations(Vec::new());
        true
    }

    fn replace_observations(&mut self, observations: Vec<Observation>) {
        self.observations = observations;
        self.observations_version += 1;
        self.observations_key = None;
    }

    /// Whether a completed fetch for `key` may still be applied.
    pub fn accepts(&self, key: &DataKey) -> bool {
        self.active.contains(&key.layer)
    }

    pub fn vector_data(&self, key: &DataKey) -> Option<&VectorPayload> {
        self.vector_cache.get(key)
    }

    pub fn cache_vector_data(&mut self, key: DataKey, payload: VectorPayload) {
        debug!(
            "Caching {} features for {} ({})",
            payload.features.len(),
            key.layer,
            key.filter
        );
        self.vector_cache.insert(key, payload);
    }

    pub fn status(&self, id: &LayerId) -> Option<&LayerStatus> {
        self.status.get(id)
    }

    pub fn set_status(&mut self, id: LayerId, status: LayerStatus) {
        if !self.active.contains(&id) {
            return;
        }
        self.status.insert(id, status);
    }

    /// Number of active layers that belong to `datasets`.
    pub fn active_layer_count(&self, datasets: &[Dataset]) -> usize {
        self.active
            .iter()
            .filter(|id| datasets.iter().any(|d| d.layer_id() == **id))
            .count()
    }
}

impl UrlSlice for LayerRegistry {
    fn keys(&self) -> &'static [&'static str] {
        &[KEY_LAYERS]
    }

    fn encode(&self, params: &mut QueryParams) {
        params.set_or_delete(KEY_LAYERS, &self.active.to_string());
    }

    fn decode(&mut self, params: &QueryParams) -> bool {
        match params.get(KEY_LAYERS) {
            Some(raw) => {
                let layers = ActiveLayers::parse(raw);
                if layers == self.active {
                    return false;
                }
                self.set_active(layers);
                true
            }
            None => false,
        }
    }
}
