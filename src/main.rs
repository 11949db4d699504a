//! ShelfRank - Bookstore Recommendation Engine
//!
//! Demo binary: seeds the in-memory catalog and history adapters, serves
//! recommendations over a small HTTP API, and exposes health and
//! Prometheus metrics endpoints.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shelfrank::adapters::{InMemoryCatalog, InMemoryHistoryStore};
use shelfrank::domain::{CatalogItem, ItemId, RecommendationRequest, Strategy, UserId};
use shelfrank::error::{Error, Result};
use shelfrank::{EngineConfig, HybridWeights, RecommendationService};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ShelfRank - Recommendation ranking and caching engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with catalog items to seed the in-memory adapter
    #[arg(long, env = "CATALOG_FILE")]
    catalog_file: Option<String>,

    /// Maximum cached recommendation lists (0 disables caching)
    #[arg(long, env = "CACHE_CAPACITY", default_value = "2000")]
    cache_capacity: usize,

    /// TTL for trending / content-based results in seconds
    #[arg(long, env = "DEFAULT_TTL_SECONDS", default_value = "1800")]
    default_ttl_seconds: u64,

    /// TTL for collaborative / hybrid results in seconds
    #[arg(long, env = "PERSONALIZED_TTL_SECONDS", default_value = "300")]
    personalized_ttl_seconds: u64,

    /// TTL for degraded results in seconds
    #[arg(long, env = "DEGRADED_TTL_SECONDS", default_value = "60")]
    degraded_ttl_seconds: u64,

    /// Per-strategy computation deadline in milliseconds
    #[arg(long, env = "STRATEGY_TIMEOUT_MS", default_value = "2000")]
    strategy_timeout_ms: u64,

    /// Hard cap on the candidate pool consumed by any strategy
    #[arg(long, env = "CANDIDATE_POOL_CAP", default_value = "500")]
    candidate_pool_cap: usize,

    /// Minimum rating for an item to count as trending
    #[arg(long, env = "RATING_THRESHOLD", default_value = "4.0")]
    rating_threshold: f64,

    /// Hybrid weight for the collaborative slice
    #[arg(long, env = "HYBRID_WEIGHT_COLLABORATIVE", default_value = "0.5")]
    hybrid_weight_collaborative: f64,

    /// Hybrid weight for the content-based slice
    #[arg(long, env = "HYBRID_WEIGHT_CONTENT", default_value = "0.3")]
    hybrid_weight_content: f64,

    /// Hybrid weight for the trending slice
    #[arg(long, env = "HYBRID_WEIGHT_TRENDING", default_value = "0.2")]
    hybrid_weight_trending: f64,

    /// Cache sweep interval in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECONDS", default_value = "60")]
    sweep_interval_seconds: u64,

    /// Maximum cache entries examined per sweep pass
    #[arg(long, env = "SWEEP_BATCH", default_value = "256")]
    sweep_batch: usize,

    /// Recommendation API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    api_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache_capacity: self.cache_capacity,
            default_ttl: Duration::from_secs(self.default_ttl_seconds),
            personalized_ttl: Duration::from_secs(self.personalized_ttl_seconds),
            degraded_ttl: Duration::from_secs(self.degraded_ttl_seconds),
            strategy_timeout: Duration::from_millis(self.strategy_timeout_ms),
            candidate_pool_cap: self.candidate_pool_cap,
            rating_threshold: self.rating_threshold,
            hybrid_weights: HybridWeights {
                collaborative: self.hybrid_weight_collaborative,
                content_based: self.hybrid_weight_content,
                trending: self.hybrid_weight_trending,
            },
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
            sweep_batch: self.sweep_batch,
            ..Default::default()
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting ShelfRank recommendation engine");
    info!("  Cache capacity: {}", args.cache_capacity);
    info!("  Strategy timeout: {}ms", args.strategy_timeout_ms);
    info!("  Candidate pool cap: {}", args.candidate_pool_cap);

    let catalog = Arc::new(InMemoryCatalog::new());
    let history = Arc::new(InMemoryHistoryStore::new());

    if let Some(path) = &args.catalog_file {
        let count = seed_catalog(&catalog, path)?;
        info!("Seeded {} catalog items from {}", count, path);
    }

    let service = Arc::new(RecommendationService::new(
        catalog.clone(),
        history.clone(),
        args.engine_config(),
    )?);
    service.spawn_sweeper();

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_service = Arc::clone(&service);
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_service).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Start the recommendation API
    let api_addr = args.api_addr.clone();
    let api_service = Arc::clone(&service);
    tokio::spawn(async move {
        if let Err(e) = run_api_server(&api_addr, api_service).await {
            error!("API server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Internal(format!("failed to listen for shutdown signal: {e}")))?;

    info!("Shutdown signal received");
    service.shutdown().await;
    info!("Engine shutdown complete");
    Ok(())
}

// =============================================================================
// Catalog Seeding
// =============================================================================

fn seed_catalog(catalog: &InMemoryCatalog, path: &str) -> Result<usize> {
    let data = std::fs::read_to_string(path)?;
    let items: Vec<CatalogItem> = serde_json::from_str(&data)
        .map_err(|e| Error::Config(format!("invalid catalog file {path}: {e}")))?;
    let count = items.len();
    for item in items {
        catalog.upsert(item);
    }
    Ok(count)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Recommendation API
// =============================================================================

async fn run_api_server(addr: &str, service: Arc<RecommendationService>) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn bad_request(msg: String) -> Response<Full<Bytes>> {
        Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(Full::new(Bytes::from(msg)))
            .unwrap()
    }

    /// GET /recommendations?strategy=trending&user_id=7&item_id=42&limit=10
    async fn handle(
        req: Request<hyper::body::Incoming>,
        service: Arc<RecommendationService>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        if req.uri().path() != "/recommendations" {
            return Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap());
        }

        let mut strategy = Strategy::Trending;
        let mut user_id = None;
        let mut item_id = None;
        let mut limit = 10usize;

        for pair in req.uri().query().unwrap_or("").split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let parsed = match key {
                "strategy" => Strategy::from_str(value).map(|s| strategy = s),
                "user_id" => value
                    .parse::<u64>()
                    .map(|id| user_id = Some(UserId::new(id)))
                    .map_err(|e| Error::InvalidArgument(format!("user_id: {e}"))),
                "item_id" => value
                    .parse::<u64>()
                    .map(|id| item_id = Some(ItemId::new(id)))
                    .map_err(|e| Error::InvalidArgument(format!("item_id: {e}"))),
                "limit" => value
                    .parse::<usize>()
                    .map(|l| limit = l)
                    .map_err(|e| Error::InvalidArgument(format!("limit: {e}"))),
                _ => Ok(()),
            };
            if let Err(e) = parsed {
                return Ok(bad_request(e.to_string()));
            }
        }

        let mut request = RecommendationRequest::new(strategy, limit);
        request.user_id = user_id;
        request.item_id = item_id;

        let response = match service.get_recommendations(request).await {
            Ok(result) => {
                let body = serde_json::to_vec(&result).unwrap_or_default();
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "application/json")
                    .body(Full::new(Bytes::from(body)))
                    .unwrap()
            }
            Err(e @ Error::InvalidArgument(_)) => bad_request(e.to_string()),
            Err(e) => Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(Full::new(Bytes::from(e.to_string())))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("invalid API server address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind API server: {e}")))?;

    info!("API server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("API server accept error: {e}")))?;
        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(move |req| handle(req, Arc::clone(&service))))
                .await
            {
                tracing::error!("API server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn health_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/healthz" | "/livez" | "/readyz" => Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("ok")))
                .unwrap(),
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("invalid health server address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind health server: {e}")))?;

    info!("Health server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("health server accept error: {e}")))?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(health_handler))
                .await
            {
                tracing::error!("Health server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, service: Arc<RecommendationService>) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, IntGauge, TextEncoder};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    struct Gauges {
        computations: IntGauge,
        cache_hits: IntGauge,
        cache_entries: IntGauge,
        evictions: IntGauge,
        expirations: IntGauge,
        timeouts: IntGauge,
        degradations: IntGauge,
        flight_waits: IntGauge,
    }

    fn gauge(name: &str, help: &str) -> Result<IntGauge> {
        prometheus::register_int_gauge!(name, help)
            .map_err(|e| Error::Internal(format!("metric registration failed: {e}")))
    }

    let gauges = Arc::new(Gauges {
        computations: gauge(
            "shelfrank_computations_total",
            "Strategy computations performed",
        )?,
        cache_hits: gauge("shelfrank_cache_hits_total", "Recommendation cache hits")?,
        cache_entries: gauge("shelfrank_cache_entries", "Live cache entries")?,
        evictions: gauge("shelfrank_cache_evictions_total", "LRU evictions")?,
        expirations: gauge("shelfrank_cache_expirations_total", "TTL expirations")?,
        timeouts: gauge("shelfrank_strategy_timeouts_total", "Strategy timeouts")?,
        degradations: gauge(
            "shelfrank_degradations_total",
            "Requests degraded to trending",
        )?,
        flight_waits: gauge(
            "shelfrank_flight_waits_total",
            "Callers coalesced into an in-flight computation",
        )?,
    });

    async fn metrics_handler(
        req: Request<hyper::body::Incoming>,
        service: Arc<RecommendationService>,
        gauges: Arc<Gauges>,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        let response = match req.uri().path() {
            "/metrics" => {
                // Counters are snapshotted at scrape time
                let stats = service.stats();
                gauges.computations.set(stats.computations as i64);
                gauges.cache_hits.set(stats.cache_hits as i64);
                gauges.cache_entries.set(stats.cache.entries as i64);
                gauges.evictions.set(stats.cache.evictions as i64);
                gauges.expirations.set(stats.cache.expired as i64);
                gauges.timeouts.set(stats.timeouts as i64);
                gauges.degradations.set(stats.degradations as i64);
                gauges.flight_waits.set(stats.flight_waits as i64);

                let encoder = TextEncoder::new();
                let metric_families = prometheus::gather();
                let mut buffer = Vec::new();
                if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                    tracing::error!("Metrics encoding error: {}", e);
                }

                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", encoder.format_type())
                    .body(Full::new(Bytes::from(buffer)))
                    .unwrap()
            }
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found")))
                .unwrap(),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("invalid metrics server address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind metrics server: {e}")))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("metrics server accept error: {e}")))?;
        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);
        let gauges = Arc::clone(&gauges);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        metrics_handler(req, Arc::clone(&service), Arc::clone(&gauges))
                    }),
                )
                .await
            {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
