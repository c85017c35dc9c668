//! REST client for dataset metadata, data and admin-area boundaries.

use crate::error::FetchError;
use crate::models::{
    AreaCollection, AreaFeature, DataType, Dataset, DatasetRecord, Observation, VectorFeature,
    VectorPayload,
};
use crate::url_sync::QueryParams;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Status the API gateway uses to signal that the device has no connectivity.
const DEVICE_OFFLINE_STATUS: u16 = 599;

/// Source of datasets and boundaries.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_dataset_metadata(&self, data_type: DataType, id: u32)
        -> Result<Dataset, FetchError>;

    /// All observations of a tabular dataset, every page drained.
    async fn fetch_observations(
        &self,
        id: u32,
        filters: &QueryParams,
    ) -> Result<Vec<Observation>, FetchError>;

    /// All features of a vector dataset, every page drained.
    async fn fetch_vector(&self, id: u32, filters: &QueryParams)
        -> Result<VectorPayload, FetchError>;

    async fn fetch_provinces(&self) -> Result<AreaCollection, FetchError>;

    async fn fetch_area_councils(&self, province: &str) -> Result<AreaCollection, FetchError>;
}

/// List envelope of the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Paginated GeoJSON feature collection.
#[derive(Debug, Clone, Deserialize)]
struct FeaturePage<F> {
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    features: Vec<F>,
}

/// Connection settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Extra attempts after a connection failure or timeout.
    pub retries: u32,
    pub page_size: Option<u32>,
}

/// `reqwest`-backed [`ResourceFetcher`].
pub struct HttpFetcher {
    http_client: reqwest::Client,
    base: Url,
    settings: ApiSettings,
}

impl HttpFetcher {
    pub fn new(settings: ApiSettings) -> Result<Self, FetchError> {
        let base = Url::parse(&settings.base_url).map_err(|_| FetchError::BadLink {
            link: settings.base_url.clone(),
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(FetchError::Client)?;

        info!("Using dataset API at {}", base);
        Ok(Self {
            http_client,
            base,
            settings,
        })
    }

    /// Resolves an API path (with optional query) against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base.join(path).map_err(|_| FetchError::BadLink {
            link: path.to_string(),
        })
    }

    /// Data endpoint of a dataset with the area filters and page size applied.
    fn data_url(&self, data_type: DataType, id: u32, filters: &QueryParams) -> Result<Url, FetchError> {
        let mut url = self.endpoint(&format!("/api/v1/{}/{}/data/", data_type.api_path(), id))?;
        let mut params = filters.clone();
        if let Some(size) = self.settings.page_size {
            params.set("page_size", size.to_string());
        }
        params.apply_to(&mut url);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            match self.try_get_json(url).await {
                Err(e @ (FetchError::Unreachable { .. } | FetchError::Timeout { .. }))
                    if attempt < self.settings.retries =>
                {
                    attempt += 1;
                    warn!("{} (retry {}/{})", e, attempt, self.settings.retries);
                }
                other => return other,
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        debug!("GET {}", url);

        let response = self.http_client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    seconds: self.settings.timeout_seconds,
                }
            } else {
                FetchError::Unreachable {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if status.as_u16() == DEVICE_OFFLINE_STATUS {
            return Err(FetchError::Offline);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolves a `next` link, if any, against the base URL.
    fn next_url(&self, next: Option<&str>) -> Result<Option<Url>, FetchError> {
        match next {
            Some(link) => Ok(Some(self.endpoint(&relative_link(link)?)?)),
            None => Ok(None),
        }
    }

    /// Follows `next` links until the last page.
    async fn drain_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, FetchError> {
        let mut results = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            pages += 1;
            results.extend(page.results);
            next = self.next_url(page.next.as_deref())?;
        }

        debug!("Drained {} page(s), {} results", pages, results.len());
        Ok(results)
    }

    /// Follows `next` links of a feature collection until the last page.
    async fn drain_features<F: DeserializeOwned>(&self, first: Url) -> Result<Vec<F>, FetchError> {
        let mut features = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let page: FeaturePage<F> = self.get_json(&url).await?;
            features.extend(page.features);
            next = self.next_url(page.next.as_deref())?;
        }

        Ok(features)
    }

    /// `/api/v1/provinces/{province}/area-councils/`, with the name encoded as one segment.
    fn area_councils_url(&self, province: &str) -> Result<Url, FetchError> {
        let mut url = self.endpoint("/api/v1/provinces/")?;
        url.path_segments_mut()
            .map_err(|_| FetchError::BadLink {
                link: province.to_string(),
            })?
            .pop_if_empty()
            .push(province)
            .push("area-councils")
            .push("");
        Ok(url)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_dataset_metadata(
        &self,
        data_type: DataType,
        id: u32,
    ) -> Result<Dataset, FetchError> {
        let url = self.endpoint(&format!("/api/v1/{}/{}/", data_type.api_path(), id))?;
        let record: DatasetRecord = self.get_json(&url).await?;
        Ok(Dataset::from_record(record, data_type))
    }

    async fn fetch_observations(
        &self,
        id: u32,
        filters: &QueryParams,
    ) -> Result<Vec<Observation>, FetchError> {
        let url = self.data_url(DataType::Tabular, id, filters)?;
        let observations: Vec<Observation> = self.drain_pages(url).await?;
        Ok(observations.into_iter().map(normalize_observation).collect())
    }

    async fn fetch_vector(
        &self,
        id: u32,
        filters: &QueryParams,
    ) -> Result<VectorPayload, FetchError> {
        let url = self.data_url(DataType::Vector, id, filters)?;
        let features: Vec<VectorFeature> = self.drain_features(url).await?;
        Ok(VectorPayload { features })
    }

    async fn fetch_provinces(&self) -> Result<AreaCollection, FetchError> {
        let url = self.endpoint("/api/v1/provinces/")?;
        let features: Vec<AreaFeature> = self.drain_features(url).await?;
        Ok(AreaCollection { features })
    }

    async fn fetch_area_councils(&self, province: &str) -> Result<AreaCollection, FetchError> {
        let url = self.area_councils_url(province)?;
        let features: Vec<AreaFeature> = self.drain_features(url).await?;
        Ok(AreaCollection { features })
    }
}

/// Reduces an absolute `next` link to path and query so it resolves against
/// the configured base; relative links are kept.
pub fn relative_link(link: &str) -> Result<String, FetchError> {
    if link.starts_with('/') {
        return Ok(link.to_string());
    }
    let url = Url::parse(link).map_err(|_| FetchError::BadLink {
        link: link.to_string(),
    })?;
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

fn normalize_observation(mut observation: Observation) -> Observation {
    observation.unit = observation
        .unit
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    observation
}

/// Human-readable summary of a failed fetch, as shown next to a layer.
pub fn describe(error: &FetchError) -> String {
    match error {
        FetchError::Offline => "Device is offline".to_string(),
        FetchError::Status { status, .. } => match StatusCode::from_u16(*status) {
            Ok(code) => format!(
                "Server responded {} {}",
                status,
                code.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            Err(_) => format!("Server responded {}", status),
        },
        other => other.to_string(),
    }
}
