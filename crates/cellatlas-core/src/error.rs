//! Error types for the cell atlas core
//!
//! Provides error handling for:
//! - Remote measurement fetch failures
//! - Plot-state resolution failures
//! - Data export failures
//! - Configuration loading

/// Remote measurement client errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("service returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to decode {endpoint} response: {reason}")]
    Decode {
        /// Endpoint name
        endpoint: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Response decoded but carried no data
    #[error("empty {0} response")]
    Empty(&'static str),
}

/// Plot-state resolution errors
///
/// These never leave the resolver: every variant is converted into an
/// unchanged resolution so the previously displayed state stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A remote call in the branch failed
    #[error("remote fetch failed: {0}")]
    Client(#[from] ClientError),

    /// Fetched data does not line up with the requested axes
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which matrix or axis was checked
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A parameter the branch needs was not supplied
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Incremental intent without a matrix plot to extend
    #[error("no matrix plot to extend for {0}")]
    NothingToExtend(String),

    /// Feature edit would leave nothing to plot
    #[error("feature set is empty")]
    EmptyFeatureSet,
}

/// Data export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// No export routine exists for the displayed plot
    #[error("no export routine for plot type {0}")]
    Unsupported(String),

    /// Nothing is displayed
    #[error("no plot to export")]
    NothingDisplayed,

    /// CSV writer failed
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}
