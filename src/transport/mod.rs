//! Request dispatch: the transport seam and the throttling interceptor.

mod client;
mod throttled;

pub use client::{HttpError, HttpTransport};
pub use throttled::{InterceptError, MissingKeyPolicy, ThrottledTransport};

use async_trait::async_trait;

/// Something that sends a request and produces a response.
///
/// This abstracts over the real HTTP client and the throttling wrapper so
/// either can sit underneath the other, and tests can stand in for the network.
#[async_trait]
pub trait Transport<B: Send + 'static>: Send + Sync {
    /// What a successful round trip yields.
    type Response: Send;
    /// What a failed round trip yields.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send `request` and wait for its response.
    async fn round_trip(
        &self,
        request: http::Request<B>,
    ) -> std::result::Result<Self::Response, Self::Error>;
}

#[async_trait]
impl<T, B> Transport<B> for std::sync::Arc<T>
where
    T: Transport<B> + ?Sized,
    B: Send + 'static,
{
    type Response = T::Response;
    type Error = T::Error;

    async fn round_trip(
        &self,
        request: http::Request<B>,
    ) -> std::result::Result<Self::Response, Self::Error> {
        (**self).round_trip(request).await
    }
}
