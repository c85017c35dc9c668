//! Fetch pipeline for the active layers.
//!
//! Loading happens in three steps so no borrow of the dashboard is held
//! across an await: plan from the current state, run the fetches
//! concurrently, then apply the outcomes through the dashboard's guarded
//! completion handlers. Results for layers switched off (or filters changed)
//! in between are dropped there.

use crate::api::client::{describe, ResourceFetcher};
use crate::error::FetchError;
use crate::models::{AreaCollection, DataType, Dataset, LayerId, Observation, VectorPayload};
use crate::store::{AreaSelection, DataKey, Dashboard, LayerStatus};
use crate::url_sync::QueryParams;
use futures::future::join_all;
use tracing::{debug, info};

/// One request needed to bring the active layers up to date.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchTask {
    Metadata(LayerId),
    Observations { key: DataKey, filters: QueryParams },
    Vector { key: DataKey, filters: QueryParams },
}

impl FetchTask {
    pub fn layer(&self) -> LayerId {
        match self {
            FetchTask::Metadata(layer) => *layer,
            FetchTask::Observations { key, .. } | FetchTask::Vector { key, .. } => key.layer,
        }
    }
}

/// Result of one [`FetchTask`].
#[derive(Debug)]
pub enum FetchOutcome {
    Metadata(LayerId, Result<Dataset, FetchError>),
    Observations(DataKey, Result<Vec<Observation>, FetchError>),
    Vector(DataKey, Result<VectorPayload, FetchError>),
}

/// Counts of what happened to a batch of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub applied: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// Requests needed for the current state: metadata for layers that lack it,
/// observations for the tabular layer and uncached vector payloads.
pub fn plan_fetches(dashboard: &Dashboard) -> Vec<FetchTask> {
    let registry = dashboard.layers();
    let filters = dashboard.area().filters();

    let mut tasks: Vec<FetchTask> = registry
        .missing_metadata()
        .into_iter()
        .map(FetchTask::Metadata)
        .collect();

    for layer in registry.active().iter() {
        let key = dashboard.data_key(*layer);
        match layer.data_type {
            DataType::Tabular => {
                let loaded = registry.observations_key() == Some(&key)
                    && registry.status(layer) == Some(&LayerStatus::Ready);
                if !loaded {
                    tasks.push(FetchTask::Observations {
                        key,
                        filters: filters.clone(),
                    });
                }
            }
            DataType::Vector if registry.vector_data(&key).is_none() => {
                tasks.push(FetchTask::Vector {
                    key,
                    filters: filters.clone(),
                })
            }
            _ => {}
        }
    }

    debug!("Planned {} fetch(es)", tasks.len());
    tasks
}

/// Runs all tasks concurrently. Outcomes come back in task order.
pub async fn execute_fetches(fetcher: &dyn ResourceFetcher, tasks: Vec<FetchTask>) -> Vec<FetchOutcome> {
    join_all(tasks.into_iter().map(|task| run_task(fetcher, task))).await
}

async fn run_task(fetcher: &dyn ResourceFetcher, task: FetchTask) -> FetchOutcome {
    match task {
        FetchTask::Metadata(layer) => {
            let result = fetcher.fetch_dataset_metadata(layer.data_type, layer.id).await;
            FetchOutcome::Metadata(layer, result)
        }
        FetchTask::Observations { key, filters } => {
            let result = fetcher.fetch_observations(key.layer.id, &filters).await;
            FetchOutcome::Observations(key, result)
        }
        FetchTask::Vector { key, filters } => {
            let result = fetcher.fetch_vector(key.layer.id, &filters).await;
            FetchOutcome::Vector(key, result)
        }
    }
}

/// Applies outcomes to the dashboard. Failures only mark still-active layers.
pub fn apply_outcomes(dashboard: &mut Dashboard, outcomes: Vec<FetchOutcome>) -> LoadSummary {
    let mut summary = LoadSummary::default();

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Metadata(_, Ok(dataset)) => {
                dashboard.record_metadata(dataset);
                summary.applied += 1;
            }
            FetchOutcome::Observations(key, Ok(observations)) => {
                if dashboard.complete_tabular_fetch(&key, observations) {
                    summary.applied += 1;
                } else {
                    summary.discarded += 1;
                }
            }
            FetchOutcome::Vector(key, Ok(payload)) => {
                if dashboard.complete_vector_fetch(key, payload) {
                    summary.applied += 1;
                } else {
                    summary.discarded += 1;
                }
            }
            FetchOutcome::Metadata(layer, Err(e)) => {
                if dashboard.layers().is_active(&layer) {
                    dashboard.fail_fetch(layer, describe(&e));
                    summary.failed += 1;
                } else {
                    summary.discarded += 1;
                }
            }
            FetchOutcome::Observations(key, Err(e)) | FetchOutcome::Vector(key, Err(e)) => {
                if dashboard.fail_data_fetch(&key, describe(&e)) {
                    summary.failed += 1;
                } else {
                    summary.discarded += 1;
                }
            }
        }
    }

    summary
}

/// Plans, runs and applies all fetches for the current state.
pub async fn load_active_layers(dashboard: &mut Dashboard, fetcher: &dyn ResourceFetcher) -> LoadSummary {
    let tasks = plan_fetches(dashboard);
    if tasks.is_empty() {
        return LoadSummary::default();
    }

    for task in &tasks {
        dashboard.begin_fetch(task.layer());
    }
    let outcomes = execute_fetches(fetcher, tasks).await;
    let summary = apply_outcomes(dashboard, outcomes);

    info!(
        "Loaded layers: {} applied, {} discarded, {} failed",
        summary.applied, summary.discarded, summary.failed
    );
    summary
}

/// Boundaries coloured for the selection: area councils of the selected
/// province, otherwise all provinces.
pub async fn load_boundaries(
    fetcher: &dyn ResourceFetcher,
    area: &AreaSelection,
) -> Result<AreaCollection, FetchError> {
    if area.province.is_empty() {
        fetcher.fetch_provinces().await
    } else {
        fetcher.fetch_area_councils(&area.province).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VectorFeature, VectorGeometry, Viewport};
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::Mutex;

    /// In-memory API keyed like the real endpoints.
    #[derive(Default)]
    struct FakeFetcher {
        observations: Vec<Observation>,
        failing: Vec<LayerId>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn status_error() -> FetchError {
        FetchError::Status {
            url: "https://dashboard.example".to_string(),
            status: 500,
        }
    }

    #[async_trait]
    impl ResourceFetcher for FakeFetcher {
        async fn fetch_dataset_metadata(
            &self,
            data_type: DataType,
            id: u32,
        ) -> Result<Dataset, FetchError> {
            let layer = LayerId::new(data_type, id);
            self.log(format!("metadata {}", layer));
            if self.failing.contains(&layer) {
                return Err(status_error());
            }
            Ok(Dataset {
                id,
                name: format!("Dataset {}", layer),
                category: "Education".to_string(),
                cluster: "Education".to_string(),
                unit: Some("students".to_string()),
                source: None,
                url: None,
                data_type,
            })
        }

        async fn fetch_observations(
            &self,
            id: u32,
            filters: &QueryParams,
        ) -> Result<Vec<Observation>, FetchError> {
            self.log(format!("observations t{} {}", id, filters.to_key_string()));
            if self.failing.contains(&LayerId::new(DataType::Tabular, id)) {
                return Err(status_error());
            }
            let province = filters.get("province");
            Ok(self
                .observations
                .iter()
                .filter(|o| province.is_none() || o.province.as_deref() == province)
                .cloned()
                .collect())
        }

        async fn fetch_vector(
            &self,
            id: u32,
            filters: &QueryParams,
        ) -> Result<VectorPayload, FetchError> {
            self.log(format!("vector v{} {}", id, filters.to_key_string()));
            Ok(VectorPayload {
                features: vec![VectorFeature {
                    geometry: Some(VectorGeometry {
                        kind: "Point".to_string(),
                        coordinates: serde_json::Value::Null,
                    }),
                    properties: serde_json::Value::Null,
                }],
            })
        }

        async fn fetch_provinces(&self) -> Result<AreaCollection, FetchError> {
            self.log("provinces".to_string());
            Ok(AreaCollection::from_names(["TAFEA", "SHEFA"]))
        }

        async fn fetch_area_councils(&self, province: &str) -> Result<AreaCollection, FetchError> {
            self.log(format!("area councils {}", province));
            Ok(AreaCollection::from_names(["Whitesands", "South Tanna"]))
        }
    }

    fn dashboard(query: &str) -> Dashboard {
        let url = Url::parse(&format!("https://dashboard.example/{}", query)).unwrap();
        let mut dashboard = Dashboard::new(url, "2023", Viewport::default());
        dashboard.mount();
        dashboard
    }

    fn fake() -> FakeFetcher {
        FakeFetcher {
            observations: vec![
                Observation::new("ecce", "2023-02-01", 334.0).with_province("TAFEA"),
                Observation::new("ecce", "2023-02-01", 120.0).with_province("SHEFA"),
            ],
            ..FakeFetcher::default()
        }
    }

    fn id(token: &str) -> LayerId {
        token.parse().unwrap()
    }

    #[test]
    fn test_plan_covers_metadata_and_data() {
        let d = dashboard("?layers=t1%2Cv2%2Cr3&province=TAFEA");
        let tasks = plan_fetches(&d);

        let layers: Vec<LayerId> = tasks.iter().map(FetchTask::layer).collect();
        assert_eq!(layers, vec![id("t1"), id("v2"), id("r3"), id("t1"), id("v2")]);
        assert!(matches!(
            &tasks[3],
            FetchTask::Observations { key, .. } if key.filter == "province=TAFEA"
        ));
    }

    #[test]
    fn test_load_populates_dashboard() {
        let fetcher = fake();
        let mut d = dashboard("?layers=t1%2Cv2&province=TAFEA");

        let summary = tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        assert_eq!(
            summary,
            LoadSummary {
                applied: 4,
                discarded: 0,
                failed: 0
            }
        );
        assert_eq!(d.layers().observations().len(), 1);
        assert_eq!(d.layers().status(&id("t1")), Some(&LayerStatus::Ready));
        assert_eq!(d.legend().len(), 2);
        assert!(fetcher
            .calls()
            .contains(&"observations t1 province=TAFEA".to_string()));
    }

    #[test]
    fn test_cached_vector_data_is_not_refetched() {
        let fetcher = fake();
        let mut d = dashboard("?layers=v2");

        tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        tokio_test::block_on(load_active_layers(&mut d, &fetcher));

        let vector_calls = fetcher
            .calls()
            .iter()
            .filter(|c| c.starts_with("vector"))
            .count();
        assert_eq!(vector_calls, 1);
    }

    #[test]
    fn test_loaded_observations_are_refetched_only_for_new_filter() {
        let fetcher = fake();
        let mut d = dashboard("?layers=t1&province=TAFEA");
        let observation_calls = |f: &FakeFetcher| {
            f.calls().iter().filter(|c| c.starts_with("observations")).count()
        };

        tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        assert_eq!(observation_calls(&fetcher), 1);
        assert!(plan_fetches(&d).is_empty());

        d.select_province("SHEFA");
        tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        assert_eq!(observation_calls(&fetcher), 2);
    }

    #[test]
    fn test_failure_for_old_filter_keeps_current_data() {
        let failing = FakeFetcher {
            failing: vec![id("t1")],
            ..fake()
        };
        let mut d = dashboard("?layers=t1");
        let outcomes = tokio_test::block_on(execute_fetches(&failing, plan_fetches(&d)));

        d.select_province("TAFEA");
        let key = d.data_key(id("t1"));
        assert!(d.complete_tabular_fetch(
            &key,
            vec![Observation::new("ecce", "2023-02-01", 334.0).with_province("TAFEA")],
        ));

        let summary = apply_outcomes(&mut d, outcomes);
        // the metadata failure still counts; the stale observations failure does not
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.discarded, 1);
        assert_eq!(d.layers().observations().len(), 1);
    }

    #[test]
    fn test_failed_refetch_leaves_no_data_from_previous_area() {
        let mut d = dashboard("?layers=t1&province=TAFEA");
        tokio_test::block_on(load_active_layers(&mut d, &fake()));
        assert_eq!(d.layers().observations().len(), 1);

        d.select_province("SHEFA");
        let failing = FakeFetcher {
            failing: vec![id("t1")],
            ..fake()
        };
        let summary = tokio_test::block_on(load_active_layers(&mut d, &failing));

        assert_eq!(summary.failed, 1);
        assert!(d.layers().observations().is_empty());
        assert!(matches!(
            d.layers().status(&id("t1")),
            Some(LayerStatus::Failed(_))
        ));
    }

    #[test]
    fn test_deactivated_layer_is_not_resurrected() {
        let fetcher = fake();
        let mut d = dashboard("?layers=t1");

        let tasks = plan_fetches(&d);
        let outcomes = tokio_test::block_on(execute_fetches(&fetcher, tasks));

        // switched off while the requests were in flight
        d.toggle_layer(id("t1"));
        let summary = apply_outcomes(&mut d, outcomes);

        assert_eq!(summary.discarded, 1);
        assert!(d.layers().observations().is_empty());
        assert!(!d.layers().is_active(&id("t1")));
    }

    #[test]
    fn test_replaced_tabular_layer_keeps_new_data_only() {
        let fetcher = fake();
        let mut d = dashboard("?layers=t1");

        let outcomes = tokio_test::block_on(execute_fetches(&fetcher, plan_fetches(&d)));
        d.toggle_layer(id("t2"));
        apply_outcomes(&mut d, outcomes);
        assert!(d.layers().observations().is_empty());

        tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        assert_eq!(d.layers().observations().len(), 2);
    }

    #[test]
    fn test_failure_marks_layer_and_keeps_it_active() {
        let fetcher = FakeFetcher {
            failing: vec![id("r3")],
            ..fake()
        };
        let mut d = dashboard("?layers=r3");

        let summary = tokio_test::block_on(load_active_layers(&mut d, &fetcher));
        assert_eq!(summary.failed, 1);
        assert!(d.layers().is_active(&id("r3")));
        assert!(matches!(
            d.layers().status(&id("r3")),
            Some(LayerStatus::Failed(message)) if message.contains("500")
        ));
        assert!(d.legend().is_empty());
    }

    #[test]
    fn test_boundaries_follow_drill_down() {
        let fetcher = fake();
        let mut area = AreaSelection::default();

        let provinces = tokio_test::block_on(load_boundaries(&fetcher, &area)).unwrap();
        assert_eq!(provinces.features.len(), 2);

        area.select_province("TAFEA");
        tokio_test::block_on(load_boundaries(&fetcher, &area)).unwrap();
        assert_eq!(fetcher.calls(), vec!["provinces", "area councils TAFEA"]);
    }
}
