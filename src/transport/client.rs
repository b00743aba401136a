//! HTTP transport backed by `reqwest`.

use async_trait::async_trait;
use http::Request;
use thiserror::Error;
use tracing::{debug, trace};

use super::Transport;
use crate::error::TollgateError;
use crate::scope::RequestScopeExt;

/// Error from an HTTP round trip.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request scope was cancelled or expired before a response arrived
    #[error("request aborted: {0}")]
    Aborted(TollgateError),

    /// The HTTP client failed
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Sends requests over the network with a shared `reqwest::Client`.
///
/// The request's scope bounds the whole round trip: a response that has not
/// arrived by the scope deadline, or before the scope is cancelled, is
/// abandoned with [`HttpError::Aborted`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that sends through `client`.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl<B> Transport<B> for HttpTransport
where
    B: Into<reqwest::Body> + Send + 'static,
{
    type Response = reqwest::Response;
    type Error = HttpError;

    async fn round_trip(&self, request: Request<B>) -> Result<Self::Response, Self::Error> {
        let scope = request.scope();
        if let Some(err) = scope.error() {
            return Err(HttpError::Aborted(err));
        }

        let request = reqwest::Request::try_from(request)?;
        trace!(method = %request.method(), url = %request.url(), "Sending request");

        tokio::select! {
            biased;
            err = scope.aborted() => {
                debug!(error = %err, "Request abandoned before response");
                Err(HttpError::Aborted(err))
            }
            response = self.client.execute(request) => Ok(response?),
        }
    }
}
