//! Dashboard state stores.
//!
//! [`Dashboard`] owns every state slice together with the document
//! history. All mutations go through it: each one updates its slice,
//! writes that slice's query keys with a replace (never a push), and
//! publishes a [`StateEvent`], in that order and within the same call.

pub mod area;
pub mod date;
pub mod events;
pub mod layers;
pub mod map;
pub mod opacity;

pub use area::AreaSelection;
pub use date::DateSelection;
pub use events::{EventBus, StateEvent};
pub use layers::{ActiveLayers, DataKey, LayerRegistry, LayerStatus, ToggleOutcome};
pub use map::MapView;
pub use opacity::OpacityMap;

use crate::analysis::{AdminAreaStats, StatsCache, StatsKey};
use crate::legend::{assemble_legend, LegendEntry, LegendInputs};
use crate::models::{
    AreaCollection, DataType, Dataset, LayerId, Observation, VectorPayload, Viewport, ViewportUpdate,
};
use crate::url_sync::{read_slice, write_slice, History, QueryParams, UrlSlice};
use reqwest::Url;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Owned application state: layers, area, year, viewport, opacity and history.
#[derive(Debug)]
pub struct Dashboard {
    layers: LayerRegistry,
    area: AreaSelection,
    date: DateSelection,
    map: MapView,
    opacity: OpacityMap,
    history: History,
    events: EventBus,
    stats: StatsCache,
}

impl Dashboard {
    /// Creates a dashboard at `location` with in-memory defaults.
    /// Call [`Dashboard::mount`] to apply the location's parameters.
    pub fn new(location: Url, default_year: &str, viewport: Viewport) -> Self {
        Self {
            layers: LayerRegistry::new(),
            area: AreaSelection::default(),
            date: DateSelection::new(default_year),
            map: MapView::new(viewport),
            opacity: OpacityMap::new(),
            history: History::new(location),
            events: EventBus::new(),
            stats: StatsCache::new(),
        }
    }

    /// Restores state from the current location, as on first load.
    pub fn mount(&mut self) {
        self.sync_from_url();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    pub fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    pub fn area(&self) -> &AreaSelection {
        &self.area
    }

    pub fn year(&self) -> &str {
        &self.date.year
    }

    pub fn viewport(&self) -> &Viewport {
        &self.map.viewport
    }

    pub fn opacity(&self) -> &OpacityMap {
        &self.opacity
    }

    pub fn location(&self) -> &Url {
        self.history.location()
    }

    /// Query string of the current location, without the leading `?`.
    pub fn query_string(&self) -> &str {
        self.history.location().query().unwrap_or("")
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn publish_layers(&self) {
        self.events.publish(StateEvent::LayersChanged {
            layers: self.layers.active().to_string(),
        });
    }

    fn publish_area(&self) {
        self.events.publish(StateEvent::AreaChanged {
            province: self.area.province.clone(),
            area_council: self.area.area_council.clone(),
        });
    }

    // === Layer mutations ===

    /// Toggles a layer and writes the new active set to the location.
    pub fn toggle_layer(&mut self, id: LayerId) -> ToggleOutcome {
        let version = self.layers.observations_version();
        let outcome = self.layers.toggle(id);
        write_slice(&mut self.history, &self.layers);

        if let Some(activated) = outcome.activated {
            self.layers.set_status(activated, LayerStatus::Loading);
        }
        self.publish_layers();
        self.publish_if_observations_replaced(version);
        outcome
    }

    /// Replaces the active set wholesale.
    pub fn set_active_layers(&mut self, layers: ActiveLayers) {
        let version = self.layers.observations_version();
        self.layers.set_active(layers);
        write_slice(&mut self.history, &self.layers);
        self.publish_layers();
        self.publish_if_observations_replaced(version);
    }

    fn publish_if_observations_replaced(&self, previous_version: u64) {
        let version = self.layers.observations_version();
        if version != previous_version {
            self.events.publish(StateEvent::ObservationsReplaced {
                version,
                count: self.layers.observations().len(),
            });
        }
    }

    // === Area / date / map mutations ===

    /// Selects a province; any area-council selection is cleared.
    pub fn select_province(&mut self, province: &str) {
        self.area.select_province(province);
        self.after_area_change();
    }

    pub fn select_area_council(&mut self, area_council: &str) {
        self.area.select_area_council(area_council);
        self.after_area_change();
    }

    pub fn clear_area(&mut self) {
        self.area.clear();
        self.after_area_change();
    }

    fn after_area_change(&mut self) {
        write_slice(&mut self.history, &self.area);
        self.invalidate_area_data();
        self.publish_area();
    }

    /// Data keyed by the old area filter no longer applies: tabular
    /// observations are dropped and data layers wait for a refetch.
    fn invalidate_area_data(&mut self) {
        let version = self.layers.observations_version();
        self.layers.clear_observations();
        self.mark_data_layers_loading();
        self.publish_if_observations_replaced(version);
    }

    fn mark_data_layers_loading(&mut self) {
        let keyed: Vec<LayerId> = self
            .layers
            .active()
            .iter()
            .filter(|id| matches!(id.data_type, DataType::Tabular | DataType::Vector))
            .copied()
            .collect();
        for id in keyed {
            self.layers.set_status(id, LayerStatus::Loading);
        }
    }

    pub fn set_year(&mut self, year: &str) {
        self.date.year = year.trim().to_string();
        write_slice(&mut self.history, &self.date);
        self.events.publish(StateEvent::YearChanged {
            year: self.date.year.clone(),
        });
    }

    pub fn set_viewport(&mut self, update: ViewportUpdate) {
        if self.map.apply(update) {
            write_slice(&mut self.history, &self.map);
            self.events.publish(StateEvent::ViewportChanged);
        }
    }

    /// Opacity is session state only; the location is not touched.
    pub fn set_opacity(&mut self, layer: LayerId, opacity: f64) {
        let stored = self.opacity.set(layer, opacity);
        self.events.publish(StateEvent::OpacityChanged {
            layer,
            opacity: stored,
        });
    }

    // === URL synchronization ===

    fn slices(&self) -> [&dyn UrlSlice; 4] {
        [&self.layers, &self.area, &self.date, &self.map]
    }

    /// Writes every slice to the current location with a replace.
    pub fn sync_to_url(&mut self) {
        let mut url = self.history.location().clone();
        let mut params = QueryParams::from_url(&url);
        for slice in self.slices() {
            slice.encode(&mut params);
        }
        params.apply_to(&mut url);

        if url != *self.history.location() {
            self.history.replace_state(url);
        }
    }

    /// Applies the parameters present in the current location.
    pub fn sync_from_url(&mut self) -> bool {
        let version = self.layers.observations_version();
        let layers_changed = read_slice(&self.history, &mut self.layers);
        let area_changed = read_slice(&self.history, &mut self.area);
        let year_changed = read_slice(&self.history, &mut self.date);
        let map_changed = read_slice(&self.history, &mut self.map);

        if layers_changed {
            let pending = self.layers.missing_metadata();
            for id in pending {
                self.layers.set_status(id, LayerStatus::Loading);
            }
            self.publish_layers();
            self.publish_if_observations_replaced(version);
        }
        if area_changed {
            self.invalidate_area_data();
            self.publish_area();
        }
        if year_changed {
            self.events.publish(StateEvent::YearChanged {
                year: self.date.year.clone(),
            });
        }
        if map_changed {
            self.events.publish(StateEvent::ViewportChanged);
        }

        let changed = layers_changed || area_changed || year_changed || map_changed;
        debug!("sync_from_url: changed={}", changed);
        self.events.publish(StateEvent::RestoredFromUrl);
        changed
    }

    /// Follows a link: pushes a new history entry and restores from it.
    pub fn navigate(&mut self, url: Url) {
        info!("Navigating to {}", url);
        self.history.push_state(url);
        self.sync_from_url();
    }

    /// Browser back. Returns whether a pop-state happened.
    pub fn go_back(&mut self) -> bool {
        if !self.history.back() {
            return false;
        }
        self.sync_from_url();
        true
    }

    /// Browser forward. Returns whether a pop-state happened.
    pub fn go_forward(&mut self) -> bool {
        if !self.history.forward() {
            return false;
        }
        self.sync_from_url();
        true
    }

    // === Fetch completion ===

    /// Cache key of `layer`'s data under the current area filter.
    pub fn data_key(&self, layer: LayerId) -> DataKey {
        DataKey::new(layer, self.area.filters().to_key_string())
    }

    pub fn begin_fetch(&mut self, layer: LayerId) {
        self.layers.set_status(layer, LayerStatus::Loading);
    }

    pub fn record_metadata(&mut self, dataset: Dataset) {
        let layer = dataset.layer_id();
        self.layers.record_metadata(dataset);
        self.events.publish(StateEvent::MetadataCached { layer });
    }

    /// Applies fetched observations if the layer is still the active tabular
    /// layer and the area filter is unchanged. Returns whether they were applied.
    pub fn complete_tabular_fetch(&mut self, key: &DataKey, observations: Vec<Observation>) -> bool {
        let current = self.data_key(key.layer);
        if self.layers.active().tabular() != Some(key.layer) || current != *key {
            debug!(
                "Discarding stale observations for {} ({:?})",
                key.layer, key.filter
            );
            return false;
        }

        let count = observations.len();
        self.layers.record_fetched_observations(key.clone(), observations);
        self.layers.set_status(key.layer, LayerStatus::Ready);
        info!("Loaded {} observations for {}", count, key.layer);
        self.events.publish(StateEvent::ObservationsReplaced {
            version: self.layers.observations_version(),
            count,
        });
        true
    }

    /// Caches a vector payload under its key. The layer's status only
    /// changes when the key matches the current filter.
    pub fn complete_vector_fetch(&mut self, key: DataKey, payload: VectorPayload) -> bool {
        let layer = key.layer;
        let current = self.data_key(layer) == key;
        self.layers.cache_vector_data(key, payload);

        if current && self.layers.accepts(&self.data_key(layer)) {
            self.layers.set_status(layer, LayerStatus::Ready);
            self.events.publish(StateEvent::VectorDataCached { layer });
            return true;
        }
        false
    }

    /// Records a failed data fetch for `key`, if the layer is active and the
    /// filter is still current. A failed tabular layer contributes no
    /// observations until a later fetch succeeds. Returns whether it applied.
    pub fn fail_data_fetch(&mut self, key: &DataKey, message: impl Into<String>) -> bool {
        if !self.layers.is_active(&key.layer) || self.data_key(key.layer) != *key {
            debug!("Ignoring failure of stale fetch for {} ({:?})", key.layer, key.filter);
            return false;
        }
        if key.layer.data_type == DataType::Tabular {
            let version = self.layers.observations_version();
            self.layers.clear_observations();
            self.publish_if_observations_replaced(version);
        }
        self.fail_fetch(key.layer, message);
        true
    }

    /// Marks a layer's fetch as failed. The layer stays active.
    pub fn fail_fetch(&mut self, layer: LayerId, message: impl Into<String>) {
        let message = message.into();
        warn!("Fetch failed for {}: {}", layer, message);
        self.layers
            .set_status(layer, LayerStatus::Failed(message.clone()));
        self.events.publish(StateEvent::FetchFailed { layer, message });
    }

    // === Derived views ===

    /// Choropleth stats for `features`, recomputed when observations, area,
    /// year or the feature set changed since the last call.
    pub fn admin_area_stats(&mut self, features: &AreaCollection) -> &AdminAreaStats {
        let key = StatsKey {
            observations_version: self.layers.observations_version(),
            province: self.area.province.clone(),
            area_council: self.area.area_council.clone(),
            year: self.date.year.clone(),
            feature_names: features
                .features
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
        };
        self.stats
            .get_or_compute(key, features, self.layers.observations())
    }

    /// Observations of the active tabular layer, filtered to the selected year.
    pub fn year_observations(&self) -> Vec<Observation> {
        crate::analysis::filter_by_year(self.layers.observations(), &self.date.year)
    }

    /// Legend entries for the active layers that have metadata. The tabular
    /// range is only shown when the last stats pass matches the current
    /// observations, area and year.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let filter = self.area.filters().to_key_string();
        let stats = self.stats.current_for(
            self.layers.observations_version(),
            &self.area.province,
            &self.area.area_council,
            &self.date.year,
        );
        assemble_legend(&LegendInputs {
            registry: &self.layers,
            opacity: &self.opacity,
            stats,
            filter: &filter,
        })
    }
}
