mod applications;
mod auth;
mod cache;
mod candidates;
mod companies;
mod config;
mod cv;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod monitoring;
mod notifications;
mod routes;
mod state;
mod storage;
mod uploads;
mod validation;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::jwt::JwtService;
use crate::cache::{redis::RedisCache, Cache};
use crate::config::Config;
use crate::cv::{llm_extractor::LlmFieldExtractor, ocr::TesseractOcr, CvAnalyzer};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::ObjectStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HireHub API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis; connections are opened lazily so a cold Redis does not block startup
    let redis = redis::Client::open(config.redis_url.clone())?;
    let cache = Cache::new(
        Arc::new(RedisCache::new(redis)),
        config.cache_key_prefix.clone(),
        config.cache_ttl_seconds,
    );
    info!("Redis cache initialized (prefix: {})", config.cache_key_prefix);

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let storage = ObjectStorage::new(s3, config.s3_bucket.clone());
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // CV pipeline: LLM field extraction with heuristic fallback, tesseract for scans
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    if !config.ocr.enabled {
        info!("OCR disabled; scanned CVs will be rejected");
    }
    let cv = CvAnalyzer::new(
        Arc::new(TesseractOcr::new(config.ocr.clone())),
        Arc::new(LlmFieldExtractor::new(llm)),
    );

    let jwt = JwtService::new(
        &config.jwt_secret,
        config.access_token_minutes,
        config.refresh_token_days,
    );

    let cors = build_cors(&config)?;
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let state = AppState {
        db,
        cache,
        storage,
        jwt: Arc::new(jwt),
        cv: Arc::new(cv),
        config: Arc::new(config),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive when no origins are configured (local development).
fn build_cors(config: &Config) -> Result<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "hirehub-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not virtual host
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
