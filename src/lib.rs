//! Mapboard - layer state and aggregation engine for admin-area map dashboards.
//!
//! The [`store::Dashboard`] owns which layers are active, the selected
//! province/area council, the year and the map viewport, and keeps every
//! piece of it mirrored into a shareable query string. The [`api`] module
//! fetches datasets for the active layers and [`analysis`] turns the
//! observations into choropleth values, tables and time series.

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod legend;
pub mod models;
pub mod report;
pub mod store;
pub mod url_sync;
