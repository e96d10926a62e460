//! Response cache using moka
//!
//! Cell type lists and cell type x organ tables change only with atlas
//! releases, and every matrix turn asks for the cell types again. The cache
//! decorator keeps them; measurement matrices always go to the service.

use async_trait::async_trait;
use cellatlas_core::{
    AtlasConfig, AverageResponse, CelltypeXOrganResponse, CelltypesResponse, ClientError,
    FeatureSet, FractionDetectedResponse, HighestMeasurementResponse, MarkersResponse,
    MeasurementClient, SequencesResponse, SimilarFeaturesResponse,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached cell type lists
    pub celltypes: u64,
    /// Cached cell type x organ tables
    pub tables: u64,
}

/// Measurement client that remembers cell type lookups
///
/// Failed lookups are not cached.
#[derive(Debug)]
pub struct CachedClient<C> {
    inner: C,
    celltypes: Cache<(String, String), CelltypesResponse>,
    tables: Cache<String, CelltypeXOrganResponse>,
}

impl<C: MeasurementClient> CachedClient<C> {
    /// Wrap `inner` with capacity and time-to-live from config
    #[must_use]
    pub fn new(inner: C, config: &AtlasConfig) -> Self {
        Self::with_ttl(
            inner,
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    /// Wrap `inner` with explicit limits
    #[must_use]
    pub fn with_ttl(inner: C, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            celltypes: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            tables: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Wrapped client
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.celltypes.invalidate_all();
        self.tables.invalidate_all();
    }

    /// Approximate entry counts
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            celltypes: self.celltypes.entry_count(),
            tables: self.tables.entry_count(),
        }
    }
}

fn unshare(err: Arc<ClientError>) -> ClientError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| (*shared).clone())
}

#[async_trait]
impl<C: MeasurementClient> MeasurementClient for CachedClient<C> {
    async fn celltypes(&self, organism: &str, organ: &str) -> Result<CelltypesResponse, ClientError> {
        let key = (organism.to_string(), organ.to_string());
        self.celltypes
            .try_get_with(key, self.inner.celltypes(organism, organ))
            .await
            .map_err(unshare)
    }

    async fn average(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<AverageResponse, ClientError> {
        self.inner.average(organism, organ, features).await
    }

    async fn fraction_detected(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<FractionDetectedResponse, ClientError> {
        self.inner.fraction_detected(organism, organ, features).await
    }

    async fn markers(
        &self,
        organism: &str,
        organ: &str,
        celltype: &str,
        number: usize,
    ) -> Result<MarkersResponse, ClientError> {
        self.inner.markers(organism, organ, celltype, number).await
    }

    async fn highest_measurement(
        &self,
        organism: &str,
        feature: &str,
        number: usize,
    ) -> Result<HighestMeasurementResponse, ClientError> {
        self.inner
            .highest_measurement(organism, feature, number)
            .await
    }

    async fn celltypexorgan(&self, organism: &str) -> Result<CelltypeXOrganResponse, ClientError> {
        self.tables
            .try_get_with(organism.to_string(), self.inner.celltypexorgan(organism))
            .await
            .map_err(unshare)
    }

    async fn similar_features(
        &self,
        organism: &str,
        organ: &str,
        feature: &str,
        number: usize,
    ) -> Result<SimilarFeaturesResponse, ClientError> {
        self.inner
            .similar_features(organism, organ, feature, number)
            .await
    }

    async fn sequences(
        &self,
        organism: &str,
        features: &FeatureSet,
    ) -> Result<SequencesResponse, ClientError> {
        self.inner.sequences(organism, features).await
    }
}
