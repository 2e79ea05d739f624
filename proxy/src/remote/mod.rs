//! Access to the remote instrument.
//!
//! [`RemoteSource`] is the only way the proxy talks to the instrument. Every
//! call returns an explicit [`Result`]; a reading is never ambiguously data or
//! an error.

mod http;

use core::{future::Future, time::Duration};

use thiserror::Error as ThisError;
use tokio::time::timeout;

use adcproxy_common::{AttributeReading, InfoMap, PropertyMap};

pub use http::HttpSource;

/// Failure of a single remote call.
#[derive(Debug, ThisError)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed remote response: {0}")]
    Decode(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("attribute '{0}' missing from remote response")]
    MissingAttribute(String),
    #[error("attribute '{0}' is not a scalar")]
    NotScalar(String),
}

/// The remote instrument as seen by the proxy.
///
/// Implementations may block for as long as a remote round-trip takes; callers
/// bound them with [`with_timeout`].
pub trait RemoteSource: Send + Sync + 'static {
    /// Names of every attribute the device exposes.
    fn list_attribute_names(&self) -> impl Future<Output = Result<Vec<String>, RemoteError>> + Send;

    /// Declared properties of the given attributes, fetched in one batch.
    fn attribute_properties(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<PropertyMap, RemoteError>> + Send;

    /// Current value of one attribute.
    fn read_attribute(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<AttributeReading, RemoteError>> + Send;

    /// Info blobs of the given attributes, fetched in one batch.
    fn attribute_metadata(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<InfoMap, RemoteError>> + Send;

    /// Current value of a scalar attribute.
    fn read_scalar(&self, name: &str) -> impl Future<Output = Result<f64, RemoteError>> + Send {
        async move {
            let reading = self.read_attribute(name).await?;
            reading
                .value
                .as_scalar()
                .ok_or_else(|| RemoteError::NotScalar(name.to_string()))
        }
    }
}

/// Await a remote call, giving up after `limit` when one is set.
///
/// # Errors
///
/// Returns the call's own error, or [`RemoteError::Timeout`] if `limit` elapsed first.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Option<Duration>,
    call: F,
) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match limit {
        Some(after) => timeout(after, call)
            .await
            .map_err(|_elapsed| RemoteError::Timeout { operation, after })?,
        None => call.await,
    }
}
