//! Map viewport state.

use crate::models::{Viewport, ViewportUpdate};
use crate::url_sync::{
    format_coordinate, format_zoom, QueryParams, UrlSlice, KEY_LATITUDE, KEY_LONGITUDE, KEY_ZOOM,
};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapView {
    pub viewport: Viewport,
}

impl MapView {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    /// Merges a partial update. Returns whether anything changed.
    pub fn apply(&mut self, update: ViewportUpdate) -> bool {
        let before = self.viewport;
        let v = &mut self.viewport;

        if let Some(longitude) = update.longitude {
            v.longitude = longitude;
        }
        if let Some(latitude) = update.latitude {
            v.latitude = latitude;
        }
        if let Some(zoom) = update.zoom {
            v.zoom = zoom;
        }
        if let Some(pitch) = update.pitch {
            v.pitch = pitch;
        }
        if let Some(bearing) = update.bearing {
            v.bearing = bearing;
        }

        before != self.viewport
    }
}

fn parse_number(params: &QueryParams, key: &str) -> Option<f64> {
    let raw = params.get(key)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!("Ignoring non-numeric {} parameter: {:?}", key, raw);
            None
        }
    }
}

impl UrlSlice for MapView {
    fn keys(&self) -> &'static [&'static str] {
        &[KEY_LONGITUDE, KEY_LATITUDE, KEY_ZOOM]
    }

    fn encode(&self, params: &mut QueryParams) {
        params.set(KEY_LONGITUDE, format_coordinate(self.viewport.longitude));
        params.set(KEY_LATITUDE, format_coordinate(self.viewport.latitude));
        params.set(KEY_ZOOM, format_zoom(self.viewport.zoom));
    }

    fn decode(&mut self, params: &QueryParams) -> bool {
        let mut update = ViewportUpdate::default();

        // A centre needs both coordinates.
        if let (Some(lng), Some(lat)) = (
            parse_number(params, KEY_LONGITUDE),
            parse_number(params, KEY_LATITUDE),
        ) {
            update.longitude = Some(lng);
            update.latitude = Some(lat);
        }
        update.zoom = parse_number(params, KEY_ZOOM);

        !update.is_empty() && self.apply(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_fixed_precision() {
        let map = MapView::new(Viewport {
            longitude: 168.01412345,
            latitude: -16.7,
            zoom: 7.26,
            ..Viewport::default()
        });
        let mut params = QueryParams::new();
        map.encode(&mut params);

        assert_eq!(params.to_key_string(), "lng=168.0141&lat=-16.7000&zoom=7.3");
    }

    #[test]
    fn test_decode_requires_both_coordinates() {
        let mut map = MapView::default();
        let mut params = QueryParams::new();
        params.set("lng", "167.5");

        assert!(!map.decode(&params));
        assert_eq!(map.viewport, Viewport::default());

        params.set("lat", "-15.5");
        params.set("zoom", "9");
        assert!(map.decode(&params));
        assert_eq!(map.viewport.longitude, 167.5);
        assert_eq!(map.viewport.latitude, -15.5);
        assert_eq!(map.viewport.zoom, 9.0);
    }

    #[test]
    fn test_decode_ignores_garbage() {
        let mut map = MapView::default();
        let mut params = QueryParams::new();
        params.set("zoom", "far");
        assert!(!map.decode(&params));
    }

    #[test]
    fn test_partial_update() {
        let mut map = MapView::default();
        assert!(map.apply(ViewportUpdate {
            zoom: Some(10.0),
            ..ViewportUpdate::default()
        }));
        assert_eq!(map.viewport.zoom, 10.0);
        assert_eq!(map.viewport.longitude, Viewport::default().longitude);
        assert!(!map.apply(ViewportUpdate::default()));
    }
}
