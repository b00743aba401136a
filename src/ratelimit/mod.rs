//! Token bucket limiters and the registry that owns them.

mod bucket;
mod limiter;
mod registry;

pub use bucket::{interval_for_rate, TokenBucket, MIN_INTERVAL};
pub use limiter::{Limiter, LimiterHandle};
pub use registry::LimiterRegistry;
