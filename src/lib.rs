//! Tollgate - per-key admission control for outbound requests
//!
//! This crate keeps a registry of independent token bucket limiters, each
//! identified by a string key. Callers bind a key to a request's scope and a
//! transport interceptor holds the request until that key's limiter has a
//! token for it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tollgate::{HttpTransport, LimiterRegistry, RequestScopeExt, ThrottledTransport, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(LimiterRegistry::new());
//! registry.register("github", 2.0, 1)?;
//!
//! let transport = ThrottledTransport::new(HttpTransport::new(), registry);
//! let request = http::Request::get("https://api.github.com/")
//!     .body(String::new())?
//!     .with_limiter_key("github");
//! let _response = transport.round_trip(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod scope;
pub mod transport;

pub use config::{LimiterConfig, TollgateConfig};
pub use error::{Result, TollgateError};
pub use ratelimit::{Limiter, LimiterHandle, LimiterRegistry};
pub use scope::{RequestScope, RequestScopeExt};
pub use transport::{HttpError, HttpTransport, InterceptError, MissingKeyPolicy, ThrottledTransport, Transport};
