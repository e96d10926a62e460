//! Measurement service over HTTP
//!
//! Every endpoint is a `GET {base}/{endpoint}` with query parameters and a
//! JSON body. Feature lists travel comma-joined.

use async_trait::async_trait;
use cellatlas_core::{
    AtlasConfig, AverageResponse, CelltypeXOrganResponse, CelltypesResponse, ClientError,
    FeatureSet, FractionDetectedResponse, HighestMeasurementResponse, MarkersResponse,
    MeasurementClient, SequencesResponse, SimilarFeaturesResponse,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body kept in a status error
const MAX_ERROR_BODY: usize = 200;

/// Query string pairs of one call
type Query = Vec<(&'static str, String)>;

/// reqwest-backed measurement client
#[derive(Debug, Clone)]
pub struct HttpMeasurementClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMeasurementClient {
    /// Build a client for the configured service
    pub fn new(config: &AtlasConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cellatlas/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self::with_http(http, &config.api_base_url))
    }

    /// Use an existing reqwest client
    #[inline]
    #[must_use]
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Service root, without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, endpoint: &str, query: &Query) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(query)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: Query,
    ) -> Result<T, ClientError> {
        tracing::debug!("GET {}/{} {:?}", self.base_url, endpoint, query);

        let response = self
            .request(endpoint, &query)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{endpoint}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("{endpoint}: {e}")))?;

        if !status.is_success() {
            tracing::warn!("{} answered {}", endpoint, status);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

fn organ_query(organism: &str, organ: &str) -> Query {
    vec![
        ("organism", organism.to_string()),
        ("organ", organ.to_string()),
    ]
}

#[async_trait]
impl MeasurementClient for HttpMeasurementClient {
    async fn celltypes(&self, organism: &str, organ: &str) -> Result<CelltypesResponse, ClientError> {
        self.fetch("celltypes", organ_query(organism, organ)).await
    }

    async fn average(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<AverageResponse, ClientError> {
        let mut query = organ_query(organism, organ);
        query.push(("features", features.joined()));
        self.fetch("average", query).await
    }

    async fn fraction_detected(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<FractionDetectedResponse, ClientError> {
        let mut query = organ_query(organism, organ);
        query.push(("features", features.joined()));
        self.fetch("fraction_detected", query).await
    }

    async fn markers(
        &self,
        organism: &str,
        organ: &str,
        celltype: &str,
        number: usize,
    ) -> Result<MarkersResponse, ClientError> {
        let mut query = organ_query(organism, organ);
        query.push(("celltype", celltype.to_string()));
        query.push(("number", number.to_string()));
        self.fetch("markers", query).await
    }

    async fn highest_measurement(
        &self,
        organism: &str,
        feature: &str,
        number: usize,
    ) -> Result<HighestMeasurementResponse, ClientError> {
        let query = vec![
            ("organism", organism.to_string()),
            ("feature", feature.to_string()),
            ("number", number.to_string()),
        ];
        self.fetch("highest_measurement", query).await
    }

    async fn celltypexorgan(&self, organism: &str) -> Result<CelltypeXOrganResponse, ClientError> {
        self.fetch("celltypexorgan", vec![("organism", organism.to_string())])
            .await
    }

    async fn similar_features(
        &self,
        organism: &str,
        organ: &str,
        feature: &str,
        number: usize,
    ) -> Result<SimilarFeaturesResponse, ClientError> {
        let mut query = organ_query(organism, organ);
        query.push(("feature", feature.to_string()));
        query.push(("number", number.to_string()));
        self.fetch("similar_features", query).await
    }

    async fn sequences(
        &self,
        organism: &str,
        features: &FeatureSet,
    ) -> Result<SequencesResponse, ClientError> {
        let query = vec![
            ("organism", organism.to_string()),
            ("features", features.joined()),
        ];
        self.fetch("sequences", query).await
    }
}
