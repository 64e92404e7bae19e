use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query},
    http, Json,
    response::{IntoResponse, Response},
    routing::get,
};
use ctod_core::{factory::DEFAULT_REQUEST_TIMEOUT, DatasetConfig, ProcessedWindowCache, TerrainFactory, TileArtifact, TileDiskCache};
use ctod_geo::{LatLonBounds, Tile};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::opt::Opt;
use crate::registry::{DatasetOptions, DatasetRegistry};
use crate::{AppError, Result};

pub struct State {
    factory: TerrainFactory,
    registry: DatasetRegistry,
    unsafe_mode: bool,
}

impl State {
    fn new(opt: &Opt) -> Result<Self> {
        let disk_cache = TileDiskCache::new(opt.tile_cache_path.clone());
        match disk_cache.sweep_stray_tempfiles() {
            Ok(0) => {}
            Ok(removed) => log::info!("removed {removed} stray tile-cache tempfile(s) left over from a previous run"),
            Err(err) => log::warn!("failed to sweep stray tile-cache tempfiles: {err}"),
        }

        let concurrency = rayon::current_num_threads().max(1) * 2;
        let factory = TerrainFactory::new(ProcessedWindowCache::default(), disk_cache, concurrency, DEFAULT_REQUEST_TIMEOUT);
        let registry = DatasetRegistry::load(opt.dataset_config_path.as_deref(), opt.unsafe_mode)?;
        Ok(State { factory, registry, unsafe_mode: opt.unsafe_mode })
    }
}

/// The response body for `.../layer.json`: a tilejson-flavored descriptor
/// plus the `cogBounds` extension (spec.md 6) holding the dataset's actual
/// geographic envelope, distinct from the tile matrix's full-world `bounds`.
#[derive(serde::Serialize)]
struct LayerJson {
    tilejson: String,
    name: String,
    format: String,
    scheme: String,
    bounds: [f64; 4],
    minzoom: i32,
    maxzoom: i32,
    available: Vec<i32>,
    tiles: Vec<String>,
    #[serde(rename = "cogBounds")]
    cog_bounds: [f64; 4],
}

async fn cog_geographic_bounds(dataset: Arc<DatasetConfig>) -> ctod_core::Result<LatLonBounds> {
    ctod_core::worker::run_cpu(move || {
        let reader = ctod_geo::CogReader::open(&dataset.cog_path)?;
        let bounds = reader.bounds()?;
        let geometry = ctod_core::geometry::WindowGeometry::new(dataset.tms, bounds);
        let (west, north) = geometry.lon_lat_at(0.0, 0.0);
        let (east, south) = geometry.lon_lat_at(1.0, 1.0);
        Ok(LatLonBounds::new(south, west, north, east))
    })
    .await
}

async fn layer_json_for(dataset: Arc<DatasetConfig>, name: &str, tiles_url: String) -> std::result::Result<Json<LayerJson>, AppError> {
    let cog_bounds = cog_geographic_bounds(dataset.clone()).await?;
    Ok(Json(LayerJson {
        tilejson: "2.1.0".to_string(),
        name: name.to_string(),
        format: "quantized-mesh-1.0".to_string(),
        scheme: "tms".to_string(),
        bounds: [LatLonBounds::WORLD.west, LatLonBounds::WORLD.south, LatLonBounds::WORLD.east, LatLonBounds::WORLD.north],
        minzoom: dataset.min_zoom,
        maxzoom: dataset.max_zoom,
        available: (dataset.min_zoom..=dataset.max_zoom).collect(),
        tiles: vec![tiles_url],
        cog_bounds: [cog_bounds.west, cog_bounds.south, cog_bounds.east, cog_bounds.north],
    }))
}

struct TerrainTileResponse(TileArtifact);

impl IntoResponse for TerrainTileResponse {
    fn into_response(self) -> Response {
        let artifact = self.0;
        Response::builder()
            .status(http::StatusCode::OK)
            .header(http::header::CONTENT_TYPE, artifact.content_type)
            .header(http::header::ETAG, artifact.etag)
            .body(Body::from(artifact.encoded_bytes))
            .unwrap_or((http::StatusCode::INTERNAL_SERVER_ERROR, "failed to build response").into_response())
    }
}

async fn status() -> &'static str {
    "OK"
}

async fn dynamic_layer_json(
    state: axum::Extension<Arc<State>>,
    Query(options): Query<DatasetOptions>,
) -> std::result::Result<Json<LayerJson>, AppError> {
    let dataset = Arc::new(options.into_config(state.unsafe_mode)?);
    layer_json_for(dataset, "dynamic", "{z}/{x}/{y}.terrain".to_string()).await
}

async fn dynamic_tile(
    state: axum::Extension<Arc<State>>,
    Path((z, x, y)): Path<(i32, i64, i64)>,
    Query(options): Query<DatasetOptions>,
) -> std::result::Result<TerrainTileResponse, AppError> {
    let dataset = Arc::new(options.into_config(state.unsafe_mode)?);
    let tile = Tile::new(dataset.tms, z, x, y).map_err(ctod_core::Error::from)?;
    log::debug!("dynamic tile request {z}/{x}/{y} against {}", dataset.cog_path);
    let artifact = state.factory.get_tile(tile, dataset).await?;
    Ok(TerrainTileResponse(artifact))
}

async fn named_layer_json(state: axum::Extension<Arc<State>>, Path(name): Path<String>) -> std::result::Result<Json<LayerJson>, AppError> {
    let dataset = state.registry.get(&name)?;
    layer_json_for(dataset, &name, "{z}/{x}/{y}.terrain".to_string()).await
}

async fn named_tile(
    state: axum::Extension<Arc<State>>,
    Path((name, z, x, y)): Path<(String, i32, i64, i64)>,
) -> std::result::Result<TerrainTileResponse, AppError> {
    let dataset = state.registry.get(&name)?;
    let tile = Tile::new(dataset.tms, z, x, y).map_err(ctod_core::Error::from)?;
    log::debug!("tile request {name}/{z}/{x}/{y}");
    let artifact = state.factory.get_tile(tile, dataset).await?;
    Ok(TerrainTileResponse(artifact))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<http::HeaderValue> = allowed_origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    CorsLayer::new().allow_origin(origins).allow_methods([http::Method::GET]).allow_headers(Any)
}

pub fn create_router(opt: &Opt) -> Result<axum::Router> {
    let state = Arc::new(State::new(opt)?);

    let mut router = axum::Router::new().route("/status", get(status));

    if !opt.no_dynamic {
        router = router
            .route("/tiles/dynamic/layer.json", get(dynamic_layer_json))
            .route("/tiles/dynamic/{z}/{x}/{y}.terrain", get(dynamic_tile));
    }

    router = router
        .route("/tiles/{dataset}/layer.json", get(named_layer_json))
        .route("/tiles/{dataset}/{z}/{x}/{y}.terrain", get(named_tile))
        .layer(axum::Extension(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors_layer(&opt.cors_allow_origins)));

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_is_permissive_when_no_origins_configured() {
        // Smoke test: building the layer must not panic either way.
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["https://example.com".to_string()]);
    }
}
