use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tollgate::{
    HttpTransport, LimiterRegistry, MissingKeyPolicy, RequestScope, RequestScopeExt,
    ThrottledTransport, TollgateConfig, Transport,
};

/// Send a batch of GET requests through a keyed rate limiter.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
struct Args {
    /// YAML file listing the limiters to register
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL to request
    #[arg(short, long)]
    url: String,

    /// Limiter key to bind to each request
    #[arg(short, long)]
    key: Option<String>,

    /// Number of concurrent requests to send
    #[arg(short = 'n', long, default_value_t = 1)]
    requests: usize,

    /// Give up on a request after this many seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Override the configured handling of unregistered keys
    #[arg(long)]
    missing_key: Option<MissingKeyPolicy>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Outcome of one request, printed as part of the summary.
#[derive(Debug, Serialize)]
struct Outcome {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct Summary {
    url: String,
    key: Option<String>,
    requests: usize,
    elapsed_ms: u128,
    outcomes: Vec<Outcome>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Tollgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TollgateConfig::load(args.config.as_deref())?;
    let policy = args.missing_key.unwrap_or(config.missing_key);
    info!(
        limiters = config.limiters.len(),
        missing_key = ?policy,
        "Configuration loaded"
    );

    let registry = Arc::new(LimiterRegistry::from_config(&config)?);
    if let Some(key) = &args.key {
        if !registry.contains(key) {
            warn!(key = %key, "Key is not registered, requests will not wait on a limiter");
        }
    }

    let transport = Arc::new(
        ThrottledTransport::new(HttpTransport::new(), registry).with_missing_key_policy(policy),
    );

    // Ctrl+C cancels every request still waiting for a token
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let mut scope = RequestScope::new().with_cancellation(cancel);
    if let Some(timeout) = args.timeout {
        scope = scope.with_timeout(Duration::try_from_secs_f64(timeout)?);
    }
    if let Some(key) = &args.key {
        scope = scope.with_limiter_key(key);
    }

    let start = Instant::now();
    let requests = (0..args.requests).map(|index| {
        let transport = transport.clone();
        let scope = scope.child();
        let url = args.url.clone();
        async move {
            let sent = Instant::now();
            let request = http::Request::get(url.as_str())
                .body(String::new())
                .map(|request| request.with_scope(scope));

            let (status, error) = match request {
                Ok(request) => match transport.round_trip(request).await {
                    Ok(response) => (Some(response.status().as_u16()), None),
                    Err(e) => (None, Some(e.to_string())),
                },
                Err(e) => (None, Some(e.to_string())),
            };

            Outcome {
                index,
                status,
                error,
                elapsed_ms: sent.elapsed().as_millis(),
            }
        }
    });
    let outcomes = futures::future::join_all(requests).await;

    let summary = Summary {
        url: args.url,
        key: args.key,
        requests: args.requests,
        elapsed_ms: start.elapsed().as_millis(),
        outcomes,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("Tollgate finished");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Cancel `token` when Ctrl+C is received.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, cancelling pending requests");
        token.cancel();
    }
}
