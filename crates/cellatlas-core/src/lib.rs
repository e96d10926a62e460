//! Cell atlas conversation core
//!
//! Resolves classified chat intents into the plot state a chart renderer
//! draws:
//! - Dispatches intents to remote measurement fetches
//! - Accumulates feature sets across turns (`add` / `remove`)
//! - Publishes only complete states, keeping the previous one on failure
//! - Answers chart-less intents (download, greetings, links)
//!
//! # Example
//!
//! ```rust,ignore
//! use cellatlas_core::{Params, PlotStateResolver, ResolveRequest, Resolution};
//!
//! # async fn example(client: impl cellatlas_core::MeasurementClient) {
//! let resolver = PlotStateResolver::new(client);
//! let request = ResolveRequest::new(
//!     "average.geneExpression",
//!     Params::new().with_organism("h_sapiens").with_organ("lung").with_features("SFTPC,AGER"),
//! );
//!
//! if let Resolution::Updated(state) = resolver.resolve(&request, None).await {
//!     println!("{} with {} features", state.plot_type, state.features.len());
//! }
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod answer;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod no_api;
pub mod plot;
pub mod resolver;
pub mod session;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use answer::{ActionOutcome, AnswerBuilder, TemplateAnswers};
pub use client::{
    AverageResponse, CelltypeXOrganResponse, CelltypesResponse, FractionDetectedResponse,
    HighestMeasurementResponse, MarkersResponse, MeasurementClient, SequencesResponse,
    SimilarFeaturesResponse,
};
pub use config::AtlasConfig;
pub use error::{ClientError, ConfigError, ExportError, ResolveError};
pub use export::{DirectorySink, ExportFile, ExportKind, ExportSink};
pub use no_api::{NoApiHandler, Redisplay, Reply, ReplyEffect};
pub use plot::{
    BarPayload, MatrixBase, MatrixPayload, PlotData, PlotState, PlotType, SequencePayload,
    TablePayload,
};
pub use resolver::{PlotStateResolver, Resolution, UnchangedReason};
pub use session::{Session, TurnOutcome};
pub use store::{PlotStateStore, PublishOutcome, TurnToken};
pub use types::{FeatureSet, GeneralIntent, Intent, Params, ResolveRequest};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the cell atlas core
    pub use crate::{
        AnswerBuilder, AtlasConfig, FeatureSet, Intent, MeasurementClient, Params, PlotState,
        PlotStateResolver, PlotType, Resolution, ResolveRequest, Session,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
