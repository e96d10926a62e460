//! Testing utilities for cellatlas workspace
//!
//! Shared test helpers, fixtures, and an in-memory measurement service.

#![allow(missing_docs)]

use async_trait::async_trait;
use cellatlas_core::{
    AverageResponse, CelltypeXOrganResponse, CelltypesResponse, ClientError, ExportError,
    ExportFile, ExportSink, FeatureSet, FractionDetectedResponse, HighestMeasurementResponse,
    MarkersResponse, MatrixPayload, MeasurementClient, PlotData, PlotState, PlotType,
    SequencesResponse, SimilarFeaturesResponse,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Celltypes,
    Average,
    FractionDetected,
    Markers,
    HighestMeasurement,
    CelltypeXOrgan,
    SimilarFeatures,
    Sequences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub endpoint: Endpoint,
    pub organism: String,
    pub detail: String,
}

/// In-memory measurement service with failure injection and a call log
#[derive(Debug, Default)]
pub struct ScriptedClient {
    celltypes: HashMap<(String, String), Vec<String>>,
    markers: HashMap<String, Vec<String>>,
    similar: HashMap<String, Vec<String>>,
    organs: HashMap<String, Vec<String>>,
    failing: Mutex<HashSet<Endpoint>>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    /// Empty service: every organ is unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Human lung and mouse liver with a few markers and similarity lists
    pub fn atlas() -> Self {
        Self::new()
            .with_celltypes("h_sapiens", "lung", &["AT1", "AT2", "macrophage", "fibroblast"])
            .with_celltypes("m_musculus", "liver", &["hepatocyte", "Kupffer", "endothelial"])
            .with_markers("fibroblast", &["COL1A1", "DCN", "LUM"])
            .with_similar("CD19", &["CD79A", "MS4A1", "PAX5"])
            .with_organs("h_sapiens", &["lung", "liver", "heart"])
            .with_organs("m_musculus", &["lung", "liver", "marrow", "brain", "kidney"])
    }

    pub fn with_celltypes(mut self, organism: &str, organ: &str, celltypes: &[&str]) -> Self {
        self.celltypes
            .insert((organism.to_string(), organ.to_string()), to_strings(celltypes));
        self
    }

    pub fn with_markers(mut self, celltype: &str, markers: &[&str]) -> Self {
        self.markers.insert(celltype.to_string(), to_strings(markers));
        self
    }

    pub fn with_similar(mut self, feature: &str, similar: &[&str]) -> Self {
        self.similar.insert(feature.to_string(), to_strings(similar));
        self
    }

    pub fn with_organs(mut self, organism: &str, organs: &[&str]) -> Self {
        self.organs.insert(organism.to_string(), to_strings(organs));
        self
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make an endpoint fail from now on
    pub fn fail_on(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().insert(endpoint);
    }

    /// Let an endpoint succeed again
    pub fn heal(&self, endpoint: Endpoint) {
        self.failing.lock().unwrap().remove(&endpoint);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    async fn enter(&self, endpoint: Endpoint, organism: &str, detail: String) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            organism: organism.to_string(),
            detail,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&endpoint) {
            return Err(ClientError::Status {
                status: 503,
                message: format!("{endpoint:?} unavailable"),
            });
        }
        Ok(())
    }

    fn organ_celltypes(&self, organism: &str, organ: &str) -> Result<&Vec<String>, ClientError> {
        self.celltypes
            .get(&(organism.to_string(), organ.to_string()))
            .ok_or_else(|| ClientError::Status {
                status: 404,
                message: format!("no data for {organism} {organ}"),
            })
    }
}

/// Deterministic expression value for feature row `row`, cell type column `col`
pub fn expression(row: usize, col: usize) -> f64 {
    (row as f64 + 1.0) * 10.0 + col as f64
}

/// Deterministic fraction for feature row `row`, cell type column `col`
pub fn fraction(row: usize, col: usize) -> f64 {
    ((row + col) % 10) as f64 / 10.0
}

fn matrix(rows: usize, cols: usize, cell: fn(usize, usize) -> f64) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|r| (0..cols).map(|c| cell(r, c)).collect())
        .collect()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl MeasurementClient for ScriptedClient {
    async fn celltypes(&self, organism: &str, organ: &str) -> Result<CelltypesResponse, ClientError> {
        self.enter(Endpoint::Celltypes, organism, organ.to_string())
            .await?;
        Ok(CelltypesResponse {
            celltypes: self.organ_celltypes(organism, organ)?.clone(),
        })
    }

    async fn average(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<AverageResponse, ClientError> {
        self.enter(Endpoint::Average, organism, features.joined())
            .await?;
        let cols = self.organ_celltypes(organism, organ)?.len();
        Ok(AverageResponse {
            average: matrix(features.len(), cols, expression),
        })
    }

    async fn fraction_detected(
        &self,
        organism: &str,
        organ: &str,
        features: &FeatureSet,
    ) -> Result<FractionDetectedResponse, ClientError> {
        self.enter(Endpoint::FractionDetected, organism, features.joined())
            .await?;
        let cols = self.organ_celltypes(organism, organ)?.len();
        Ok(FractionDetectedResponse {
            fraction_detected: matrix(features.len(), cols, fraction),
        })
    }

    async fn markers(
        &self,
        organism: &str,
        _organ: &str,
        celltype: &str,
        number: usize,
    ) -> Result<MarkersResponse, ClientError> {
        self.enter(Endpoint::Markers, organism, celltype.to_string())
            .await?;
        let markers = self.markers.get(celltype).cloned().unwrap_or_default();
        Ok(MarkersResponse {
            markers: markers.into_iter().take(number).collect(),
        })
    }

    async fn highest_measurement(
        &self,
        organism: &str,
        feature: &str,
        number: usize,
    ) -> Result<HighestMeasurementResponse, ClientError> {
        self.enter(Endpoint::HighestMeasurement, organism, feature.to_string())
            .await?;
        let organs = self.organs.get(organism).cloned().unwrap_or_default();
        if organs.is_empty() {
            return Ok(HighestMeasurementResponse {
                celltypes: Vec::new(),
                organs: Vec::new(),
                average: Vec::new(),
            });
        }
        Ok(HighestMeasurementResponse {
            celltypes: (0..number).map(|i| format!("celltype{i}")).collect(),
            organs: (0..number).map(|i| organs[i % organs.len()].clone()).collect(),
            average: (0..number).map(|i| 1000.0 / (i as f64 + 1.0)).collect(),
        })
    }

    async fn celltypexorgan(&self, organism: &str) -> Result<CelltypeXOrganResponse, ClientError> {
        self.enter(Endpoint::CelltypeXOrgan, organism, String::new())
            .await?;
        let organs = self.organs.get(organism).cloned().unwrap_or_default();
        let mut celltypes: Vec<String> = self
            .celltypes
            .iter()
            .filter(|((o, _), _)| o == organism)
            .flat_map(|(_, types)| types.iter().cloned())
            .collect();
        celltypes.sort();
        celltypes.dedup();

        let detected = celltypes
            .iter()
            .map(|celltype| {
                organs
                    .iter()
                    .map(|organ| {
                        self.celltypes
                            .get(&(organism.to_string(), organ.clone()))
                            .is_some_and(|types| types.contains(celltype))
                    })
                    .collect()
            })
            .collect();

        Ok(CelltypeXOrganResponse {
            organs,
            celltypes,
            detected,
        })
    }

    async fn similar_features(
        &self,
        organism: &str,
        _organ: &str,
        feature: &str,
        number: usize,
    ) -> Result<SimilarFeaturesResponse, ClientError> {
        self.enter(Endpoint::SimilarFeatures, organism, feature.to_string())
            .await?;
        let similar = self.similar.get(feature).cloned().unwrap_or_default();
        Ok(SimilarFeaturesResponse {
            similar_features: similar.into_iter().take(number).collect(),
        })
    }

    async fn sequences(
        &self,
        organism: &str,
        features: &FeatureSet,
    ) -> Result<SequencesResponse, ClientError> {
        self.enter(Endpoint::Sequences, organism, features.joined())
            .await?;
        Ok(SequencesResponse {
            features: features.to_vec(),
            sequences: features.iter().map(|_| "ATGC".repeat(3)).collect(),
        })
    }
}

/// Export sink that keeps files in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<ExportFile>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every save fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<ExportFile> {
        self.saved.lock().unwrap().clone()
    }
}

impl ExportSink for RecordingSink {
    fn save(&self, file: &ExportFile) -> Result<(), ExportError> {
        if self.fail {
            return Err(ExportError::Io(std::io::Error::other("sink unavailable")));
        }
        self.saved.lock().unwrap().push(file.clone());
        Ok(())
    }
}

/// Human lung heatmap over the atlas() cell types
pub fn lung_heatmap(features: &str) -> PlotState {
    lung_state(features, false)
}

/// Human lung bubble heatmap over the atlas() cell types
pub fn lung_bubble_heatmap(features: &str) -> PlotState {
    lung_state(features, true)
}

fn lung_state(features: &str, with_fractions: bool) -> PlotState {
    let features = FeatureSet::parse(features);
    let xaxis = to_strings(&["AT1", "AT2", "macrophage", "fibroblast"]);
    let average = matrix(features.len(), xaxis.len(), expression);

    let (plot_type, data) = if with_fractions {
        let fractions = matrix(features.len(), xaxis.len(), fraction);
        (
            PlotType::BubbleHeatmap,
            PlotData::FractionDetected(
                MatrixPayload::fraction_detected(
                    xaxis,
                    features.to_vec(),
                    average,
                    fractions,
                    "counts per million",
                )
                .unwrap(),
            ),
        )
    } else {
        (
            PlotType::Heatmap,
            PlotData::Average(
                MatrixPayload::average(xaxis, features.to_vec(), average, "counts per ten thousand")
                    .unwrap(),
            ),
        )
    };

    PlotState::new("average.geneExpression", plot_type, data)
        .with_organism("h_sapiens")
        .with_organ(Some("lung".to_string()))
        .with_features(features)
}
