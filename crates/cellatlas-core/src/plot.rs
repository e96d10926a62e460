//! Plot state
//!
//! The normalized, renderer-agnostic snapshot of what is currently displayed.
//! Payload constructors check axis alignment so a published state never
//! carries a matrix that disagrees with its labels.

use crate::error::ResolveError;
use crate::types::FeatureSet;
use serde::{Deserialize, Serialize};

/// Chart selected for a plot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlotType {
    /// Average measurement heatmap
    Heatmap,
    /// Fraction detected + average dot plot
    BubbleHeatmap,
    /// Ranked bar chart
    BarChart,
    /// Cell type x organ table
    Table,
    /// Organism listing
    ShowOrganisms,
    /// Feature sequences
    FeatureSequences,
}

impl PlotType {
    /// Wire name of the plot type
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heatmap => "heatmap",
            Self::BubbleHeatmap => "bubbleHeatmap",
            Self::BarChart => "barChart",
            Self::Table => "table",
            Self::ShowOrganisms => "showOrganisms",
            Self::FeatureSequences => "featureSequences",
        }
    }
}

impl std::fmt::Display for PlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matrix-shaped payload keyed by parallel axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixPayload {
    /// Column labels (cell types or organs)
    pub xaxis: Vec<String>,
    /// Row labels (features)
    pub yaxis: Vec<String>,
    /// Values, `yaxis.len()` rows of `xaxis.len()` columns
    pub average: Vec<Vec<f64>>,
    /// Same shape as `average`; `None` for plain averages
    pub fractions: Option<Vec<Vec<f64>>>,
    /// Display unit
    pub value_unit: String,
}

impl MatrixPayload {
    /// Build an average-only payload
    ///
    /// # Errors
    /// `ResolveError::ShapeMismatch` if `average` does not line up with the axes
    pub fn average(
        xaxis: Vec<String>,
        yaxis: Vec<String>,
        average: Vec<Vec<f64>>,
        value_unit: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        check_matrix("average", &average, yaxis.len(), xaxis.len())?;
        Ok(Self {
            xaxis,
            yaxis,
            average,
            fractions: None,
            value_unit: value_unit.into(),
        })
    }

    /// Build a payload carrying both averages and fractions detected
    ///
    /// # Errors
    /// `ResolveError::ShapeMismatch` if either matrix does not line up with the axes
    pub fn fraction_detected(
        xaxis: Vec<String>,
        yaxis: Vec<String>,
        average: Vec<Vec<f64>>,
        fractions: Vec<Vec<f64>>,
        value_unit: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        check_matrix("average", &average, yaxis.len(), xaxis.len())?;
        check_matrix("fractions", &fractions, yaxis.len(), xaxis.len())?;
        Ok(Self {
            xaxis,
            yaxis,
            average,
            fractions: Some(fractions),
            value_unit: value_unit.into(),
        })
    }

    /// Natural-log view of the averages and the matching unit label
    #[must_use]
    pub fn log_average(&self) -> (Vec<Vec<f64>>, String) {
        let values = self
            .average
            .iter()
            .map(|row| row.iter().map(|v| v.ln()).collect())
            .collect();
        (values, format!("log( {} )", self.value_unit))
    }
}

/// Ranked bar payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarPayload {
    /// Composite `"<celltype> (<organ>)"` labels
    pub celltypes_organ: Vec<String>,
    /// One value per label
    pub average: Vec<f64>,
    /// Display unit
    pub value_unit: String,
}

impl BarPayload {
    /// Build from parallel cell type / organ / value arrays
    ///
    /// # Errors
    /// `ResolveError::ShapeMismatch` if the arrays differ in length
    pub fn from_ranked(
        celltypes: &[String],
        organs: &[String],
        average: Vec<f64>,
        value_unit: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        check_len("organs", celltypes.len(), organs.len())?;
        check_len("average", celltypes.len(), average.len())?;
        let celltypes_organ = celltypes
            .iter()
            .zip(organs)
            .map(|(celltype, organ)| format!("{celltype} ({organ})"))
            .collect();
        Ok(Self {
            celltypes_organ,
            average,
            value_unit: value_unit.into(),
        })
    }
}

/// Cell type x organ detection table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    /// Column labels
    pub organs: Vec<String>,
    /// Row labels
    pub celltypes: Vec<String>,
    /// `celltypes.len()` rows of `organs.len()` indicators
    pub detected: Vec<Vec<bool>>,
}

impl TablePayload {
    /// Build a table, checking alignment
    ///
    /// # Errors
    /// `ResolveError::ShapeMismatch` if `detected` does not line up with the labels
    pub fn new(
        organs: Vec<String>,
        celltypes: Vec<String>,
        detected: Vec<Vec<bool>>,
    ) -> Result<Self, ResolveError> {
        check_matrix("detected", &detected, celltypes.len(), organs.len())?;
        Ok(Self {
            organs,
            celltypes,
            detected,
        })
    }
}

/// Feature sequences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePayload {
    /// Feature names
    pub features: Vec<String>,
    /// One sequence per feature
    pub sequences: Vec<String>,
}

impl SequencePayload {
    /// Build from parallel arrays
    ///
    /// # Errors
    /// `ResolveError::ShapeMismatch` if the arrays differ in length
    pub fn new(features: Vec<String>, sequences: Vec<String>) -> Result<Self, ResolveError> {
        check_len("sequences", features.len(), sequences.len())?;
        Ok(Self {
            features,
            sequences,
        })
    }
}

/// Plot payload, tagged by the base intent that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlotData {
    /// Averages only
    Average(MatrixPayload),
    /// Averages plus fractions detected
    FractionDetected(MatrixPayload),
    /// Ranked bars
    Bar(BarPayload),
    /// Detection table
    Table(TablePayload),
    /// Sequences
    Sequences(SequencePayload),
    /// Nothing to draw beyond the organism list
    Organisms,
}

impl PlotData {
    /// Matrix payload, if any
    #[must_use]
    pub fn matrix(&self) -> Option<&MatrixPayload> {
        match self {
            Self::Average(m) | Self::FractionDetected(m) => Some(m),
            _ => None,
        }
    }

    /// Which matrix path produced this payload, if it is a matrix
    #[must_use]
    pub fn matrix_base(&self) -> Option<MatrixBase> {
        match self {
            Self::Average(_) => Some(MatrixBase::Average),
            Self::FractionDetected(_) => Some(MatrixBase::FractionDetected),
            Self::Bar(_) | Self::Table(_) | Self::Sequences(_) | Self::Organisms => None,
        }
    }
}

/// Matrix-building path to re-run for incremental edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixBase {
    /// Heatmap of averages
    Average,
    /// Bubble heatmap of fractions and averages
    FractionDetected,
}

/// What is currently displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotState {
    /// Raw intent that produced the state
    pub intent: String,
    /// Selected chart
    pub plot_type: PlotType,
    /// Organism, empty for cross-organism views
    #[serde(default)]
    pub organism: String,
    /// Organ, absent for cross-organ views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organ: Option<String>,
    /// Features in canonical order
    #[serde(default)]
    pub features: FeatureSet,
    /// Log-transform display toggle
    #[serde(default)]
    pub has_log: bool,
    /// Payload
    pub data: PlotData,
}

impl PlotState {
    /// Create state with no features and log display off
    #[must_use]
    pub fn new(intent: impl Into<String>, plot_type: PlotType, data: PlotData) -> Self {
        Self {
            intent: intent.into(),
            plot_type,
            organism: String::new(),
            organ: None,
            features: FeatureSet::new(),
            has_log: false,
            data,
        }
    }

    /// With organism
    #[inline]
    #[must_use]
    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = organism.into();
        self
    }

    /// With organ
    #[inline]
    #[must_use]
    pub fn with_organ(mut self, organ: Option<String>) -> Self {
        self.organ = organ;
        self
    }

    /// With features
    #[inline]
    #[must_use]
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    /// Copy of this state with the log display toggled
    #[must_use]
    pub fn with_log(&self, has_log: bool) -> Self {
        Self {
            has_log,
            ..self.clone()
        }
    }

    /// Cell-type axis of a matrix plot
    #[must_use]
    pub fn celltype_axis(&self) -> Option<&[String]> {
        self.data.matrix().map(|m| m.xaxis.as_slice())
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), ResolveError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ResolveError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

fn check_matrix<T>(
    what: &'static str,
    matrix: &[Vec<T>],
    rows: usize,
    cols: usize,
) -> Result<(), ResolveError> {
    check_len(what, rows, matrix.len())?;
    matrix
        .iter()
        .try_for_each(|row| check_len(what, cols, row.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn average_payload_checks_rows() {
        let err = MatrixPayload::average(
            labels(&["T cell", "B cell"]),
            labels(&["GeneA", "GeneB"]),
            vec![vec![1.0, 2.0]],
            "cptt",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::ShapeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn fraction_payload_checks_fraction_shape() {
        let result = MatrixPayload::fraction_detected(
            labels(&["T cell", "B cell"]),
            labels(&["GeneA"]),
            vec![vec![1.0, 2.0]],
            vec![vec![0.1]],
            "cpm",
        );
        assert!(matches!(
            result,
            Err(ResolveError::ShapeMismatch {
                what: "fractions",
                ..
            })
        ));
    }

    #[test]
    fn bar_labels_are_composite() {
        let bar = BarPayload::from_ranked(
            &labels(&["macrophage", "neutrophil"]),
            &labels(&["lung", "marrow"]),
            vec![120.0, 80.0],
            "cptt",
        )
        .unwrap();
        assert_eq!(
            bar.celltypes_organ,
            labels(&["macrophage (lung)", "neutrophil (marrow)"])
        );
    }

    #[test]
    fn matrix_base_follows_variant() {
        let m = MatrixPayload::average(labels(&["x"]), labels(&["y"]), vec![vec![1.0]], "u").unwrap();
        assert_eq!(
            PlotData::Average(m.clone()).matrix_base(),
            Some(MatrixBase::Average)
        );
        assert_eq!(
            PlotData::FractionDetected(m).matrix_base(),
            Some(MatrixBase::FractionDetected)
        );
        assert_eq!(PlotData::Organisms.matrix_base(), None);
    }

    #[test]
    fn average_state_serializes_null_fractions() {
        let m = MatrixPayload::average(labels(&["x"]), labels(&["GeneA"]), vec![vec![1.0]], "u").unwrap();
        let state = PlotState::new("average.geneExpression", PlotType::Heatmap, PlotData::Average(m))
            .with_organism("h_sapiens")
            .with_organ(Some("lung".to_string()))
            .with_features(FeatureSet::parse("GeneA"));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["plotType"], "heatmap");
        assert_eq!(json["features"], "GeneA");
        assert_eq!(json["data"]["type"], "average");
        assert!(json["data"]["fractions"].is_null());
        assert_eq!(json["data"]["valueUnit"], "u");
    }

    #[test]
    fn log_average_relabels_unit() {
        let m = MatrixPayload::average(
            labels(&["x"]),
            labels(&["GeneA"]),
            vec![vec![std::f64::consts::E]],
            "counts per ten thousand",
        )
        .unwrap();
        let (values, unit) = m.log_average();
        assert!((values[0][0] - 1.0).abs() < 1e-12);
        assert_eq!(unit, "log( counts per ten thousand )");
    }
}
