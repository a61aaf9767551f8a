//! HTTP server for UV assignment.
//!
//! Resolves a resident's address (or a raw coordinate) to the territorial
//! unit that contains it, or the nearest one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use uvgeo::config::{Config, StorageConfig};
use uvgeo::geocode::providers::http_client;
use uvgeo::geocode::GeocodeOrchestrator;
use uvgeo::models::geocode::valid_coordinates;
use uvgeo::models::MAIPU_BBOX;
use uvgeo::uv::{MemoryUvStore, MySqlUvStore, UnitRef, UvResolver, UvStore};
use uvgeo::{AssignDefaults, Assigner, GeocodeResult, UvAssignment};

mod error;
use error::ApiError;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "UV assignment server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides [server] listen)
    #[arg(short, long)]
    listen: Option<String>,

    /// MySQL URL for the UV polygon table
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// GeoJSON FeatureCollection of UV polygons, used when no database is set
    #[arg(long)]
    uv_file: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    assigner: Assigner,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(url) = args.database_url {
        config.storage.database_url = Some(url);
    }
    if let Some(path) = args.uv_file {
        config.storage.uv_file = Some(path);
    }

    info!("uvgeo UV assignment server");

    let store = open_store(&config.storage)?;
    let client = http_client(&config.geocoding.user_agent)
        .context("Failed to build HTTP client")?;
    let orchestrator = GeocodeOrchestrator::from_config(&config.geocoding, client, MAIPU_BBOX);
    info!(
        "Worst-case geocoding latency without a budget: {:?}",
        orchestrator.worst_case_latency()
    );

    let defaults = AssignDefaults {
        locality: config.geocoding.locality.clone(),
        country: config.geocoding.country.clone(),
        budget_ms: config.geocoding.budget_ms,
    };
    let state = Arc::new(AppState {
        assigner: Assigner::new(orchestrator, UvResolver::new(store), defaults),
    });

    let app = router(state);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// MySQL when a database URL is configured, otherwise the GeoJSON file
fn open_store(storage: &StorageConfig) -> Result<Arc<dyn UvStore>> {
    if let Some(url) = &storage.database_url {
        let store = MySqlUvStore::connect_lazy(url, &storage.table, storage.max_connections)?;
        return Ok(Arc::new(store));
    }

    if let Some(path) = &storage.uv_file {
        let store = MemoryUvStore::load_from_file(path)
            .with_context(|| format!("Failed to load UV polygons from {}", path.display()))?;
        info!("Loaded {} territorial units", store.len());
        return Ok(Arc::new(store));
    }

    anyhow::bail!("No UV polygon source configured: set --database-url or --uv-file")
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/uv", get(list_handler))
        .route("/uv/assign", get(assign_handler))
        .route("/uv/by_point", get(by_point_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let units = state.assigner.resolver().store().list_units().await;

    Json(match units {
        Ok(units) => HealthResponse {
            status: if units.is_empty() { "degraded" } else { "ok" },
            units: units.len(),
        },
        Err(e) => {
            debug!("Health check could not reach the polygon store: {}", e);
            HealthResponse {
                status: "degraded",
                units: 0,
            }
        }
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    units: usize,
}

/// Geocode an address and assign its UV
async fn assign_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AssignQueryParams>, QueryRejection>,
) -> Result<Json<AssignResponse>, ApiError> {
    let Query(params) = params?;
    if params.direccion.trim().is_empty() {
        return Err(ApiError::BadRequest("direccion is required".to_string()));
    }

    let result = state
        .assigner
        .assign_address(
            &params.direccion,
            params.comuna.as_deref(),
            params.pais.as_deref(),
            params.timeout_ms,
        )
        .await?;

    Ok(Json(AssignResponse {
        ok: true,
        edge: result.uv.edge,
        geocoding: result.geocoding,
        uv: result.uv,
    }))
}

/// Assign the UV of a raw coordinate
async fn by_point_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PointQueryParams>, QueryRejection>,
) -> Result<Json<PointResponse>, ApiError> {
    let Query(params) = params?;
    if !valid_coordinates(params.lat, params.lon) {
        return Err(ApiError::BadRequest(format!(
            "invalid coordinates ({}, {})",
            params.lat, params.lon
        )));
    }

    let uv = state.assigner.assign_point(params.lat, params.lon).await?;
    Ok(Json(PointResponse {
        ok: true,
        edge: uv.edge,
        uv,
    }))
}

/// All configured units, without geometry
async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UnitRef>>, ApiError> {
    let units = state.assigner.resolver().store().list_units().await?;
    Ok(Json(units))
}

#[derive(Deserialize)]
struct AssignQueryParams {
    /// Street and number, e.g. "Las Naciones 857"
    direccion: String,
    /// Locality, defaults to the configured one
    comuna: Option<String>,
    /// Country, defaults to the configured one
    pais: Option<String>,
    /// Total geocoding budget in milliseconds, clamped to [2000, 60000]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct PointQueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct AssignResponse {
    ok: bool,
    geocoding: GeocodeResult,
    uv: UvAssignment,
    edge: bool,
}

#[derive(Serialize)]
struct PointResponse {
    ok: bool,
    uv: UvAssignment,
    edge: bool,
}
