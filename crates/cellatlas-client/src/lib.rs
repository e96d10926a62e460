//! Measurement service clients for the cell atlas
//!
//! - [`HttpMeasurementClient`]: reqwest client for the public atlas API
//! - [`CachedClient`]: moka-backed decorator for rarely changing lookups

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod http;

pub use cache::{CacheStats, CachedClient};
pub use http::HttpMeasurementClient;

use cellatlas_core::{AtlasConfig, ClientError};

/// HTTP client with the response cache in front, both configured from `config`
pub fn connect(config: &AtlasConfig) -> Result<CachedClient<HttpMeasurementClient>, ClientError> {
    let http = HttpMeasurementClient::new(config)?;
    tracing::info!("Measurement service at {}", http.base_url());
    Ok(CachedClient::new(http, config))
}
