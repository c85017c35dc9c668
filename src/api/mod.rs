//! Dataset API access.

pub mod client;
pub mod loader;

pub use client::{describe, ApiSettings, HttpFetcher, Page, ResourceFetcher};
pub use loader::{
    apply_outcomes, execute_fetches, load_active_layers, load_boundaries, plan_fetches,
    FetchOutcome, FetchTask, LoadSummary,
};
