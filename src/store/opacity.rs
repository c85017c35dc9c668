//! Per-layer display opacity (0-100). Session-scoped; never written to the URL.

use crate::models::LayerId;
use std::collections::HashMap;

pub const DEFAULT_OPACITY: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpacityMap {
    opacities: HashMap<LayerId, f64>,
}

impl OpacityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a clamped opacity and returns the stored value.
    pub fn set(&mut self, layer: LayerId, opacity: f64) -> f64 {
        let clamped = if opacity.is_nan() {
            DEFAULT_OPACITY
        } else {
            opacity.clamp(0.0, 100.0)
        };
        self.opacities.insert(layer, clamped);
        clamped
    }

    pub fn get(&self, layer: &LayerId) -> f64 {
        self.opacities.get(layer).copied().unwrap_or(DEFAULT_OPACITY)
    }

    /// Opacity as a 0-1 fraction, as renderers expect.
    pub fn fraction(&self, layer: &LayerId) -> f64 {
        self.get(layer) / 100.0
    }
}
