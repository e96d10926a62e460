//! Remote measurement client
//!
//! The seam between the resolver and the measurement service. Responses
//! mirror the service's JSON: parallel arrays and row-major matrices.

use crate::error::ClientError;
use crate::types::FeatureSet;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Cell types of one organ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelltypesResponse {
    /// Cell type names in service order
    pub celltypes: Vec<String>,
}

/// Average measurement per feature and cell type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageResponse {
    /// Rows are features, columns are cell types
    pub average: Vec<Vec<f64>>,
}

/// Fraction of cells with detected measurement per feature and cell type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionDetectedResponse {
    /// Rows are features, columns are cell types
    pub fraction_detected: Vec<Vec<f64>>,
}

/// Top markers of a cell type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkersResponse {
    /// Marker features, strongest first
    pub markers: Vec<String>,
}

/// Highest measuring (cell type, organ) pairs for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighestMeasurementResponse {
    /// Cell type of each pair
    pub celltypes: Vec<String>,
    /// Organ of each pair
    pub organs: Vec<String>,
    /// Value of each pair
    pub average: Vec<f64>,
}

/// Cell type x organ detection table for one organism
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelltypeXOrganResponse {
    /// Column labels
    pub organs: Vec<String>,
    /// Row labels
    pub celltypes: Vec<String>,
    /// Rows are cell types; the service sends either booleans or counts
    #[serde(deserialize_with = "indicator_matrix")]
    pub detected: Vec<Vec<bool>>,
}

/// Features ranked by similarity to a queried one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarFeaturesResponse {
    /// Most similar first, excluding the queried feature
    pub similar_features: Vec<String>,
}

/// Sequences of a set of features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencesResponse {
    /// Feature names as the service spells them
    pub features: Vec<String>,
    /// One sequence per feature
    pub sequences: Vec<String>,
}

/// Asynchronous access to the measurement service
///
/// Every call may fail or come back empty. Implementations must be shareable
/// across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeasurementClient: Send + Sync {
    /// Cell types of an organ
    async fn celltypes(&self, organism: &str, organ: &str)
        -> Result<CelltypesResponse, ClientError>;

    /// Averages of `features` across the organ's cell types
    async fn average(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<AverageResponse, ClientError>;

    /// Fractions detected of `features` across the organ's cell types
    async fn fraction_detected(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<FractionDetectedResponse, ClientError>;

    /// Top `number` markers of `celltype`
    async fn markers(
        &self,
        organism: &str,
        organ: &str,
        celltype: &str,
        number: usize,
    ) -> Result<MarkersResponse, ClientError>;

    /// Top `number` (cell type, organ) pairs for `feature` across the organism
    async fn highest_measurement(
        &self,
        organism: &str,
        feature: &str,
        number: usize,
    ) -> Result<HighestMeasurementResponse, ClientError>;

    /// Cell type x organ detection table
    async fn celltypexorgan(&self, organism: &str) -> Result<CelltypeXOrganResponse, ClientError>;

    /// Top `number` features similar to `feature`
    async fn similar_features(
        &self,
        organism: &str,
        organ: &str,
        feature: &str,
        number: usize,
    ) -> Result<SimilarFeaturesResponse, ClientError>;

    /// Sequences of `features`
    async fn sequences(
        &self,
        organism: &str,
        features: &FeatureSet,
    ) -> Result<SequencesResponse, ClientError>;
}

fn indicator_matrix<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<bool>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Flag(bool),
        Count(f64),
    }

    let rows = Vec::<Vec<Cell>>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Cell::Flag(flag) => flag,
                    Cell::Count(count) => count > 0.0,
                })
                .collect()
        })
        .collect())
}
