//! Plot-state resolver
//!
//! Turns a classified intent into a new plot state:
//! - Dispatches on the general intent
//! - Issues the branch's remote calls concurrently and joins them
//! - Carries organism, organ and cell-type axis forward for `add`/`remove`
//! - Publishes nothing when any call fails (fail-together)
//!
//! The resolver keeps no state between calls. The prior plot state is an
//! argument and the result is a [`Resolution`] the caller publishes.

use crate::client::MeasurementClient;
use crate::config::AtlasConfig;
use crate::error::{ClientError, ResolveError};
use crate::plot::{
    BarPayload, MatrixBase, MatrixPayload, PlotData, PlotState, PlotType, SequencePayload,
    TablePayload,
};
use crate::types::{FeatureSet, GeneralIntent, Intent, ResolveRequest};
use futures::TryFutureExt;

/// Outcome of resolving one turn
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A complete new plot state to publish
    Updated(PlotState),
    /// Keep displaying whatever was there before
    Unchanged(UnchangedReason),
}

impl Resolution {
    /// Whether a new state was produced
    #[inline]
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// The new state, if any
    #[inline]
    #[must_use]
    pub fn state(&self) -> Option<&PlotState> {
        match self {
            Self::Updated(state) => Some(state),
            Self::Unchanged(_) => None,
        }
    }
}

/// Why a turn left the plot state alone
#[derive(Debug, Clone, PartialEq)]
pub enum UnchangedReason {
    /// No resolver branch for this general intent
    Unrecognized(String),
    /// The branch failed; the error was logged
    Failed(ResolveError),
}

/// Organism and organ a branch works against
#[derive(Debug, Clone)]
struct Scope {
    organism: String,
    organ: String,
}

impl Scope {
    /// Params win, then the prior state, then empty
    fn from_request(request: &ResolveRequest, prior: Option<&PlotState>) -> Self {
        let organism = request
            .params
            .organism
            .clone()
            .or_else(|| prior.map(|p| p.organism.clone()))
            .unwrap_or_default();
        let organ = request
            .params
            .organ
            .clone()
            .or_else(|| prior.and_then(|p| p.organ.clone()))
            .unwrap_or_default();
        Self { organism, organ }
    }

    fn require_organism(&self) -> Result<&str, ResolveError> {
        non_empty(&self.organism, "organism")
    }

    fn require_organ(&self) -> Result<&str, ResolveError> {
        non_empty(&self.organ, "organ")
    }
}

/// Resolves intents into plot states against a measurement client
#[derive(Debug)]
pub struct PlotStateResolver<C> {
    client: C,
    config: AtlasConfig,
}

impl<C: MeasurementClient> PlotStateResolver<C> {
    /// Create resolver with default configuration
    #[inline]
    #[must_use]
    pub fn new(client: C) -> Self {
        Self::with_config(client, AtlasConfig::default())
    }

    /// Create resolver with explicit configuration
    #[inline]
    #[must_use]
    pub fn with_config(client: C, config: AtlasConfig) -> Self {
        Self { client, config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Get client
    #[inline]
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Resolve one turn
    ///
    /// Never fails outward: unrecognized intents and branch failures come back
    /// as [`Resolution::Unchanged`].
    pub async fn resolve(&self, request: &ResolveRequest, prior: Option<&PlotState>) -> Resolution {
        let intent = &request.intent;
        tracing::info!("Resolving intent: {}", intent);

        if matches!(intent.general(), GeneralIntent::Unknown(_)) || intent.general().is_no_api() {
            tracing::warn!("No plot-state branch for intent: {}", intent);
            return Resolution::Unchanged(UnchangedReason::Unrecognized(intent.to_string()));
        }

        match self.dispatch(request, prior).await {
            Ok(state) => {
                tracing::info!(
                    "Resolved {} into {} with {} features",
                    intent,
                    state.plot_type,
                    state.features.len()
                );
                Resolution::Updated(state)
            }
            Err(e) => {
                tracing::warn!("Intent {} left plot state unchanged: {}", intent, e);
                Resolution::Unchanged(UnchangedReason::Failed(e))
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ResolveRequest,
        prior: Option<&PlotState>,
    ) -> Result<PlotState, ResolveError> {
        let intent = &request.intent;
        if intent.general().is_incremental() {
            return self.edit_features(request, prior).await;
        }

        let scope = Scope::from_request(request, prior);
        let features = request.params.features.clone().unwrap_or_default();

        match intent.general() {
            GeneralIntent::Average => self.average(intent, &scope, features, None).await,
            GeneralIntent::FractionDetected => {
                self.fraction_detected(intent, &scope, features, None).await
            }
            GeneralIntent::Markers => self.markers(request, &scope).await,
            GeneralIntent::HighestMeasurement => self.highest_measurement(request, &scope).await,
            GeneralIntent::SimilarFeatures => self.similar_features(request, &scope).await,
            GeneralIntent::CelltypeXOrgan => self.celltypexorgan(intent, &scope).await,
            GeneralIntent::Organisms => Ok(PlotState::new(
                intent.as_str(),
                PlotType::ShowOrganisms,
                PlotData::Organisms,
            )),
            GeneralIntent::Sequences => self.sequences(intent, &scope, features).await,
            GeneralIntent::Add
            | GeneralIntent::Remove
            | GeneralIntent::Download
            | GeneralIntent::Plot
            | GeneralIntent::Greetings
            | GeneralIntent::Link
            | GeneralIntent::Unknown(_) => Err(ResolveError::MissingParameter("intent")),
        }
    }

    /// Heatmap of averages
    ///
    /// `celltypes` reuses an existing cell-type axis instead of fetching one.
    async fn average(
        &self,
        intent: &Intent,
        scope: &Scope,
        features: FeatureSet,
        celltypes: Option<Vec<String>>,
    ) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        let organ = scope.require_organ()?;
        require_features(&features)?;
        tracing::debug!("Fetching averages of {} in {} {}", features, organism, organ);

        let (xaxis, response) = futures::try_join!(
            self.celltype_axis(organism, organ, celltypes),
            self.client
                .average(organism, organ, &features)
                .map_err(ResolveError::from),
        )?;

        let payload = MatrixPayload::average(
            xaxis,
            features.to_vec(),
            response.average,
            self.config.average_unit.clone(),
        )?;

        Ok(PlotState::new(intent.as_str(), PlotType::Heatmap, PlotData::Average(payload))
            .with_organism(organism)
            .with_organ(Some(organ.to_string()))
            .with_features(features))
    }

    /// Bubble heatmap of fractions detected and averages
    async fn fraction_detected(
        &self,
        intent: &Intent,
        scope: &Scope,
        features: FeatureSet,
        celltypes: Option<Vec<String>>,
    ) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        let organ = scope.require_organ()?;
        require_features(&features)?;
        tracing::debug!(
            "Fetching fractions and averages of {} in {} {}",
            features,
            organism,
            organ
        );

        let (xaxis, fractions, averages) = futures::try_join!(
            self.celltype_axis(organism, organ, celltypes),
            self.client
                .fraction_detected(organism, organ, &features)
                .map_err(ResolveError::from),
            self.client
                .average(organism, organ, &features)
                .map_err(ResolveError::from),
        )?;

        let payload = MatrixPayload::fraction_detected(
            xaxis,
            features.to_vec(),
            averages.average,
            fractions.fraction_detected,
            self.config.fraction_unit.clone(),
        )?;

        Ok(PlotState::new(
            intent.as_str(),
            PlotType::BubbleHeatmap,
            PlotData::FractionDetected(payload),
        )
        .with_organism(organism)
        .with_organ(Some(organ.to_string()))
        .with_features(features))
    }

    async fn markers(
        &self,
        request: &ResolveRequest,
        scope: &Scope,
    ) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        let organ = scope.require_organ()?;
        let celltype = request
            .params
            .celltype
            .as_deref()
            .ok_or(ResolveError::MissingParameter("celltype"))?;
        let number = request.params.number.unwrap_or(self.config.marker_count);

        let response = self
            .client
            .markers(organism, organ, celltype, number)
            .await?;
        if response.markers.is_empty() {
            return Err(ClientError::Empty("markers").into());
        }
        let markers: FeatureSet = response.markers.iter().collect();
        tracing::debug!("Markers of {}: {}", celltype, markers);

        self.fraction_detected(&request.intent, scope, markers, None)
            .await
    }

    async fn highest_measurement(
        &self,
        request: &ResolveRequest,
        scope: &Scope,
    ) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        let feature = request
            .params
            .features
            .as_ref()
            .and_then(FeatureSet::first)
            .ok_or(ResolveError::MissingParameter("feature"))?;
        let number = request.params.number.unwrap_or(self.config.top_n);

        let response = self
            .client
            .highest_measurement(organism, feature, number)
            .await?;
        if response.celltypes.is_empty() {
            return Err(ClientError::Empty("highest_measurement").into());
        }

        let payload = BarPayload::from_ranked(
            &response.celltypes,
            &response.organs,
            response.average,
            self.config.average_unit.clone(),
        )?;

        Ok(PlotState::new(
            request.intent.as_str(),
            PlotType::BarChart,
            PlotData::Bar(payload),
        )
        .with_organism(organism)
        .with_features(FeatureSet::from_iter([feature])))
    }

    async fn similar_features(
        &self,
        request: &ResolveRequest,
        scope: &Scope,
    ) -> Result<PlotState, ResolveError> {
        let queried = request
            .params
            .features
            .as_ref()
            .and_then(FeatureSet::first)
            .ok_or(ResolveError::MissingParameter("feature"))?;

        let ranked = match &request.similar_features {
            Some(ranked) => ranked.clone(),
            None => {
                let number = request.params.number.unwrap_or(self.config.similar_count);
                self.client
                    .similar_features(scope.require_organism()?, scope.require_organ()?, queried, number)
                    .await?
                    .similar_features
            }
        };

        let features: FeatureSet = std::iter::once(queried)
            .chain(ranked.iter().map(String::as_str))
            .collect();

        self.fraction_detected(&request.intent, scope, features, None)
            .await
    }

    /// `add` / `remove`: edit the prior feature set and re-run its matrix path
    async fn edit_features(
        &self,
        request: &ResolveRequest,
        prior: Option<&PlotState>,
    ) -> Result<PlotState, ResolveError> {
        let intent = &request.intent;
        let prior = prior.ok_or_else(|| ResolveError::NothingToExtend(intent.to_string()))?;
        let base = prior
            .data
            .matrix_base()
            .ok_or_else(|| ResolveError::NothingToExtend(intent.to_string()))?;

        let delta = request
            .params
            .features
            .clone()
            .filter(|f| !f.is_empty())
            .ok_or(ResolveError::MissingParameter("features"))?;

        let features = if *intent.general() == GeneralIntent::Add {
            prior.features.union(&delta)
        } else {
            prior.features.difference(&delta)
        };
        if features.is_empty() {
            return Err(ResolveError::EmptyFeatureSet);
        }
        tracing::debug!(
            "{} {} -> {} ({:?} path)",
            intent.general(),
            delta,
            features,
            base
        );

        let scope = Scope {
            organism: prior.organism.clone(),
            organ: prior.organ.clone().unwrap_or_default(),
        };
        let celltypes = prior.celltype_axis().map(<[String]>::to_vec);

        let state = match base {
            MatrixBase::Average => self.average(intent, &scope, features, celltypes).await?,
            MatrixBase::FractionDetected => {
                self.fraction_detected(intent, &scope, features, celltypes)
                    .await?
            }
        };
        Ok(PlotState {
            has_log: prior.has_log,
            ..state
        })
    }

    async fn celltypexorgan(&self, intent: &Intent, scope: &Scope) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        let response = self.client.celltypexorgan(organism).await?;
        if response.celltypes.is_empty() || response.organs.is_empty() {
            return Err(ClientError::Empty("celltypexorgan").into());
        }

        let payload = TablePayload::new(response.organs, response.celltypes, response.detected)?;
        Ok(PlotState::new(intent.as_str(), PlotType::Table, PlotData::Table(payload))
            .with_organism(organism))
    }

    async fn sequences(
        &self,
        intent: &Intent,
        scope: &Scope,
        features: FeatureSet,
    ) -> Result<PlotState, ResolveError> {
        let organism = scope.require_organism()?;
        require_features(&features)?;

        let response = self.client.sequences(organism, &features).await?;
        if response.sequences.is_empty() {
            return Err(ClientError::Empty("sequences").into());
        }

        let payload = SequencePayload::new(response.features, response.sequences)?;
        Ok(PlotState::new(
            intent.as_str(),
            PlotType::FeatureSequences,
            PlotData::Sequences(payload),
        )
        .with_organism(organism)
        .with_features(features))
    }

    /// Reuse a carried axis or fetch the organ's cell types
    async fn celltype_axis(
        &self,
        organism: &str,
        organ: &str,
        carried: Option<Vec<String>>,
    ) -> Result<Vec<String>, ResolveError> {
        if let Some(axis) = carried {
            return Ok(axis);
        }
        let response = self.client.celltypes(organism, organ).await?;
        if response.celltypes.is_empty() {
            return Err(ClientError::Empty("celltypes").into());
        }
        Ok(response.celltypes)
    }
}

fn non_empty<'a>(value: &'a str, name: &'static str) -> Result<&'a str, ResolveError> {
    if value.is_empty() {
        Err(ResolveError::MissingParameter(name))
    } else {
        Ok(value)
    }
}

fn require_features(features: &FeatureSet) -> Result<(), ResolveError> {
    if features.is_empty() {
        Err(ResolveError::MissingParameter("features"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        AverageResponse, CelltypesResponse, FractionDetectedResponse, HighestMeasurementResponse,
        MarkersResponse, MockMeasurementClient,
    };
    use crate::types::Params;
    use pretty_assertions::assert_eq;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn rows(features: &FeatureSet, cols: usize, value: f64) -> Vec<Vec<f64>> {
        vec![vec![value; cols]; features.len()]
    }

    fn lung_average_state(features: &str, fractions: bool) -> PlotState {
        let features = FeatureSet::parse(features);
        let xaxis = labels(&["AT1", "AT2", "macrophage"]);
        let average = rows(&features, 3, 1.0);
        let data = if fractions {
            PlotData::FractionDetected(
                MatrixPayload::fraction_detected(
                    xaxis,
                    features.to_vec(),
                    average.clone(),
                    average,
                    "counts per million",
                )
                .unwrap(),
            )
        } else {
            PlotData::Average(
                MatrixPayload::average(xaxis, features.to_vec(), average, "counts per ten thousand")
                    .unwrap(),
            )
        };
        let plot_type = if fractions {
            PlotType::BubbleHeatmap
        } else {
            PlotType::Heatmap
        };
        PlotState::new("average.geneExpression", plot_type, data)
            .with_organism("h_sapiens")
            .with_organ(Some("lung".to_string()))
            .with_features(features)
    }

    #[tokio::test]
    async fn add_on_average_reuses_axis_and_stays_heatmap() {
        let mut client = MockMeasurementClient::new();
        client.expect_celltypes().times(0);
        client.expect_fraction_detected().times(0);
        client
            .expect_average()
            .withf(|organism, organ, features| {
                organism == "h_sapiens" && organ == "lung" && features.joined() == "GeneA,GeneB,GeneC"
            })
            .times(1)
            .returning(|_, _, features| {
                Ok(AverageResponse {
                    average: rows(features, 3, 2.0),
                })
            });

        let resolver = PlotStateResolver::new(client);
        let prior = lung_average_state("GeneA,GeneB", false);
        let request = ResolveRequest::new("add.gene", Params::new().with_features("GeneC"));

        let resolution = resolver.resolve(&request, Some(&prior)).await;
        let state = resolution.state().expect("updated state");

        assert_eq!(state.features.joined(), "GeneA,GeneB,GeneC");
        assert_eq!(state.plot_type, PlotType::Heatmap);
        assert_eq!(state.organism, "h_sapiens");
        assert_eq!(state.organ.as_deref(), Some("lung"));
        assert_eq!(state.celltype_axis(), prior.celltype_axis());
        assert!(state.data.matrix().unwrap().fractions.is_none());
    }

    #[tokio::test]
    async fn remove_on_fractions_stays_bubble_heatmap() {
        let mut client = MockMeasurementClient::new();
        client.expect_celltypes().times(0);
        client
            .expect_fraction_detected()
            .times(1)
            .returning(|_, _, features| {
                Ok(FractionDetectedResponse {
                    fraction_detected: rows(features, 3, 0.5),
                })
            });
        client.expect_average().times(1).returning(|_, _, features| {
            Ok(AverageResponse {
                average: rows(features, 3, 3.0),
            })
        });

        let resolver = PlotStateResolver::new(client);
        let prior = lung_average_state("GeneA,GeneB,GeneC", true);
        let request = ResolveRequest::new("remove.gene", Params::new().with_features("GeneB"));

        let state = match resolver.resolve(&request, Some(&prior)).await {
            Resolution::Updated(state) => state,
            other => panic!("expected update, got {other:?}"),
        };

        assert_eq!(state.features.joined(), "GeneA,GeneC");
        assert_eq!(state.plot_type, PlotType::BubbleHeatmap);
        let matrix = state.data.matrix().unwrap();
        assert_eq!(matrix.yaxis, labels(&["GeneA", "GeneC"]));
        assert_eq!(matrix.fractions.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_ignores_organism_in_params() {
        let mut client = MockMeasurementClient::new();
        client
            .expect_average()
            .withf(|organism, organ, _| organism == "h_sapiens" && organ == "lung")
            .returning(|_, _, features| {
                Ok(AverageResponse {
                    average: rows(features, 3, 1.0),
                })
            });

        let resolver = PlotStateResolver::new(client);
        let prior = lung_average_state("GeneA", false);
        let request = ResolveRequest::new(
            "add.gene",
            Params::new()
                .with_features("GeneB")
                .with_organism("m_musculus")
                .with_organ("liver"),
        );

        let state = resolver.resolve(&request, Some(&prior)).await;
        assert_eq!(state.state().unwrap().organism, "h_sapiens");
    }

    #[tokio::test]
    async fn average_fetches_axis_and_values() {
        let mut client = MockMeasurementClient::new();
        client
            .expect_celltypes()
            .times(1)
            .returning(|_, _| {
                Ok(CelltypesResponse {
                    celltypes: labels(&["T cell", "B cell"]),
                })
            });
        client.expect_average().times(1).returning(|_, _, features| {
            Ok(AverageResponse {
                average: rows(features, 2, 4.0),
            })
        });

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "average.geneExpression",
            Params::new()
                .with_organism("h_sapiens")
                .with_organ("lung")
                .with_features("CD3E,CD19"),
        );

        let state = resolver.resolve(&request, None).await;
        let state = state.state().unwrap();
        assert_eq!(state.plot_type, PlotType::Heatmap);
        let matrix = state.data.matrix().unwrap();
        assert_eq!(matrix.xaxis, labels(&["T cell", "B cell"]));
        assert_eq!(matrix.value_unit, "counts per ten thousand");
    }

    #[tokio::test]
    async fn fraction_failure_suppresses_whole_update() {
        let mut client = MockMeasurementClient::new();
        client.expect_celltypes().returning(|_, _| {
            Ok(CelltypesResponse {
                celltypes: labels(&["T cell"]),
            })
        });
        client
            .expect_fraction_detected()
            .returning(|_, _, _| Err(ClientError::Transport("connection reset".to_string())));
        client.expect_average().returning(|_, _, features| {
            Ok(AverageResponse {
                average: rows(features, 1, 1.0),
            })
        });

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "fraction_detected.geneExpression",
            Params::new()
                .with_organism("h_sapiens")
                .with_organ("lung")
                .with_features("CD3E"),
        );

        let resolution = resolver.resolve(&request, None).await;
        assert!(matches!(
            resolution,
            Resolution::Unchanged(UnchangedReason::Failed(ResolveError::Client(
                ClientError::Transport(_)
            )))
        ));
    }

    #[tokio::test]
    async fn misaligned_average_is_rejected() {
        let mut client = MockMeasurementClient::new();
        client.expect_celltypes().returning(|_, _| {
            Ok(CelltypesResponse {
                celltypes: labels(&["T cell", "B cell"]),
            })
        });
        client
            .expect_average()
            .returning(|_, _, _| Ok(AverageResponse { average: vec![vec![1.0]] }));

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "average.geneExpression",
            Params::new()
                .with_organism("h_sapiens")
                .with_organ("lung")
                .with_features("CD3E"),
        );

        let resolution = resolver.resolve(&request, None).await;
        assert!(matches!(
            resolution,
            Resolution::Unchanged(UnchangedReason::Failed(ResolveError::ShapeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn markers_become_features_of_bubble_heatmap() {
        let mut client = MockMeasurementClient::new();
        client
            .expect_markers()
            .withf(|_, _, celltype, number| celltype == "fibroblast" && *number == 10)
            .returning(|_, _, _, _| {
                Ok(MarkersResponse {
                    markers: labels(&["COL1A1", "DCN", "LUM"]),
                })
            });
        client.expect_celltypes().returning(|_, _| {
            Ok(CelltypesResponse {
                celltypes: labels(&["fibroblast", "AT1"]),
            })
        });
        client.expect_fraction_detected().returning(|_, _, features| {
            Ok(FractionDetectedResponse {
                fraction_detected: rows(features, 2, 0.2),
            })
        });
        client.expect_average().returning(|_, _, features| {
            Ok(AverageResponse {
                average: rows(features, 2, 8.0),
            })
        });

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "markers.geneExpression",
            Params::new()
                .with_organism("h_sapiens")
                .with_organ("lung")
                .with_celltype("fibroblast"),
        );

        let state = resolver.resolve(&request, None).await;
        let state = state.state().unwrap();
        assert_eq!(state.features.joined(), "COL1A1,DCN,LUM");
        assert_eq!(state.plot_type, PlotType::BubbleHeatmap);
    }

    #[tokio::test]
    async fn highest_measurement_builds_composite_labels() {
        let mut client = MockMeasurementClient::new();
        client
            .expect_highest_measurement()
            .withf(|organism, feature, number| {
                organism == "m_musculus" && feature == "GeneX" && *number == 10
            })
            .returning(|_, _, number| {
                Ok(HighestMeasurementResponse {
                    celltypes: (0..number).map(|i| format!("type{i}")).collect(),
                    organs: (0..number).map(|i| format!("organ{i}")).collect(),
                    average: (0..number).map(|i| i as f64).collect(),
                })
            });

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "highest_measurement.geneExpression",
            Params::new().with_organism("m_musculus").with_features("GeneX"),
        );

        let state = resolver.resolve(&request, None).await;
        let state = state.state().unwrap();
        assert_eq!(state.plot_type, PlotType::BarChart);
        assert_eq!(state.organ, None);
        let PlotData::Bar(bar) = &state.data else {
            panic!("expected bar payload");
        };
        assert_eq!(bar.celltypes_organ.len(), 10);
        assert_eq!(bar.celltypes_organ[3], "type3 (organ3)");
    }

    #[tokio::test]
    async fn similar_features_prepends_queried_feature() {
        let mut client = MockMeasurementClient::new();
        client.expect_similar_features().times(0);
        client.expect_celltypes().returning(|_, _| {
            Ok(CelltypesResponse {
                celltypes: labels(&["B cell"]),
            })
        });
        client
            .expect_fraction_detected()
            .withf(|_, _, features| features.joined() == "CD19,CD79A,MS4A1")
            .returning(|_, _, features| {
                Ok(FractionDetectedResponse {
                    fraction_detected: rows(features, 1, 0.9),
                })
            });
        client.expect_average().returning(|_, _, features| {
            Ok(AverageResponse {
                average: rows(features, 1, 50.0),
            })
        });

        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new(
            "similar_features.geneExpression",
            Params::new()
                .with_organism("h_sapiens")
                .with_organ("lung")
                .with_features("CD19"),
        )
        .with_similar_features(labels(&["CD79A", "MS4A1"]));

        let state = resolver.resolve(&request, None).await;
        assert_eq!(state.state().unwrap().features.joined(), "CD19,CD79A,MS4A1");
    }

    #[tokio::test]
    async fn unrecognized_intent_touches_nothing() {
        let client = MockMeasurementClient::new();
        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new("foo.bar", Params::new());

        let resolution = resolver.resolve(&request, None).await;
        assert_eq!(
            resolution,
            Resolution::Unchanged(UnchangedReason::Unrecognized("foo.bar".to_string()))
        );
    }

    #[tokio::test]
    async fn add_without_prior_state_is_unchanged() {
        let client = MockMeasurementClient::new();
        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new("add.gene", Params::new().with_features("GeneC"));

        let resolution = resolver.resolve(&request, None).await;
        assert!(matches!(
            resolution,
            Resolution::Unchanged(UnchangedReason::Failed(ResolveError::NothingToExtend(_)))
        ));
    }

    #[tokio::test]
    async fn removing_every_feature_is_unchanged() {
        let client = MockMeasurementClient::new();
        let resolver = PlotStateResolver::new(client);
        let prior = lung_average_state("GeneA", false);
        let request = ResolveRequest::new("remove.gene", Params::new().with_features("GeneA"));

        let resolution = resolver.resolve(&request, Some(&prior)).await;
        assert!(matches!(
            resolution,
            Resolution::Unchanged(UnchangedReason::Failed(ResolveError::EmptyFeatureSet))
        ));
    }

    #[tokio::test]
    async fn organisms_needs_no_fetch() {
        let client = MockMeasurementClient::new();
        let resolver = PlotStateResolver::new(client);
        let request = ResolveRequest::new("organisms", Params::new());

        let state = resolver.resolve(&request, None).await;
        let state = state.state().unwrap();
        assert_eq!(state.plot_type, PlotType::ShowOrganisms);
        assert_eq!(state.data, PlotData::Organisms);
    }
}
