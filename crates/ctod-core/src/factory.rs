//! The Terrain Factory (spec.md 4.E): the orchestrator tying every other
//! component together behind one public operation, `get_tile`.
//!
//! A `CogReader` is opened fresh for every window fetch rather than kept
//! open per dataset: GDAL's `Dataset` is not `Sync`, and reopening headers
//! is cheap next to the COG's actual pixel I/O, so this sidesteps sharing a
//! non-`Sync` handle across rayon threads without a pool of its own.

use std::sync::Arc;
use std::time::Duration;

use ctod_geo::{CogReader, Rect, Tile};
use tokio::sync::Semaphore;

use crate::cache::ProcessedWindowCache;
use crate::coalescer::RequestCoalescer;
use crate::dataset::{DatasetConfig, MeshingMethod};
use crate::diskcache::{TileArtifact, TileDiskCache};
use crate::encoder;
use crate::error::{Error, Result};
use crate::geometry::{self, WindowGeometry};
use crate::mesh::Mesh;
use crate::meshproducer;
use crate::neighbors::{self, NeighborSet, Side};
use crate::windowkey::{MeshParam, TileKey, WindowKey};
use crate::worker;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct CogInfo {
    bounds: Rect,
    pixel_width: f64,
    pixel_height: f64,
}

#[derive(Clone)]
pub struct TerrainFactory {
    coalescer: RequestCoalescer,
    disk_cache: TileDiskCache,
    request_limiter: Arc<Semaphore>,
    request_timeout: Duration,
}

impl TerrainFactory {
    pub fn new(cache: ProcessedWindowCache, disk_cache: TileDiskCache, max_concurrent_requests: usize, request_timeout: Duration) -> Self {
        TerrainFactory {
            coalescer: RequestCoalescer::new(cache),
            disk_cache,
            request_limiter: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            request_timeout,
        }
    }

    /// Above the configured concurrency limit (default 2x the rayon pool
    /// size, spec.md 5's backpressure policy) requests are rejected with
    /// `Overloaded` rather than queued.
    pub async fn get_tile(&self, tile: Tile, dataset: Arc<DatasetConfig>) -> Result<TileArtifact> {
        let permit = self.request_limiter.clone().try_acquire_owned().map_err(|_| Error::Overloaded)?;
        let result = tokio::time::timeout(self.request_timeout, self.get_tile_inner(tile, dataset)).await;
        drop(permit);
        match result {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn get_tile_inner(&self, tile: Tile, dataset: Arc<DatasetConfig>) -> Result<TileArtifact> {
        let window_key = WindowKey::new(&dataset, TileKey::from_tile(tile));

        if !dataset.skip_cache {
            let disk_cache = self.disk_cache.clone();
            if let Some(artifact) = worker::run_blocking(move || disk_cache.read(&window_key)).await? {
                log::debug!("{tile:?} served from disk cache");
                return Ok(artifact);
            }
        }

        if tile.z < dataset.min_zoom {
            log::debug!("{tile:?} is below min_zoom {}, synthesizing an empty tile without touching the cog", dataset.min_zoom);
            let bytes = self.encode_empty_tile(tile).await?;
            self.persist(window_key, bytes.clone()).await;
            return Ok(TileArtifact::new(bytes));
        }

        let cog_info = self.inspect_cog(dataset.clone()).await?;
        let self_extent = geometry::native_extent(tile);

        if cog_info.bounds.intersection(&self_extent).is_none() {
            log::debug!("{tile:?} falls outside the dataset footprint, synthesizing an empty tile");
            let bytes = self.encode_empty_tile(tile).await?;
            self.persist(window_key, bytes.clone()).await;
            return Ok(TileArtifact::new(bytes));
        }

        if !dataset.unsafe_mode {
            let native_pixels = (self_extent.width() / cog_info.pixel_width) * (self_extent.height() / cog_info.pixel_height);
            if native_pixels.is_finite() && native_pixels > dataset.max_pixels as f64 {
                return Err(Error::UnsafeRequest(format!(
                    "window at zoom {} would read {:.0} native pixels, exceeding the {} pixel budget",
                    tile.z, native_pixels, dataset.max_pixels
                )));
            }
        }

        let neighbor_plan: Vec<(Side, Tile)> = Side::ALL
            .into_iter()
            .filter_map(|side| {
                let neighbor = neighbors::neighbor_tile(tile, side)?;
                let intersects = cog_info.bounds.intersection(&geometry::native_extent(neighbor)).is_some();
                intersects.then_some((side, neighbor))
            })
            .collect();

        let self_grid = {
            let dataset = dataset.clone();
            let self_tile_key = TileKey::from_tile(tile);
            self.coalescer.get_or_fetch(window_key, move || fetch_window(dataset, self_tile_key)).await?
        };

        let mut neighbor_tasks = Vec::with_capacity(neighbor_plan.len());
        for (side, neighbor_tile) in neighbor_plan {
            let coalescer = self.coalescer.clone();
            let dataset = dataset.clone();
            let neighbor_key = WindowKey::new(&dataset, TileKey::from_tile(neighbor_tile));
            neighbor_tasks.push(tokio::spawn(async move {
                let result = coalescer.get_or_fetch(neighbor_key, move || fetch_window(dataset, TileKey::from_tile(neighbor_tile))).await;
                (side, neighbor_tile, result)
            }));
        }

        let mut neighbor_grids = Vec::with_capacity(neighbor_tasks.len());
        for task in neighbor_tasks {
            let (side, neighbor_tile, result) = task.await.map_err(|_| Error::Internal("neighbor fetch task panicked".into()))?;
            match result {
                Ok(grid) => neighbor_grids.push((side, neighbor_tile, grid)),
                Err(err) if err.is_soft_neighbor_failure() => {
                    log::warn!("neighbor {side:?} of {tile:?} unavailable, treating it as absent: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        let mesh_param = mesh_param_for(&dataset, tile.z);
        let method = dataset.meshing_method;
        let tms = dataset.tms;
        let stitched = worker::run_cpu(move || {
            let self_geometry = WindowGeometry::new(tms, geometry::native_extent(tile));
            let mut self_mesh = meshproducer::produce_mesh(method, &self_grid, self_geometry, mesh_param)?;

            let mut neighbor_set = NeighborSet::default();
            for (side, neighbor_tile, grid) in &neighbor_grids {
                let neighbor_geometry = WindowGeometry::new(tms, geometry::native_extent(*neighbor_tile));
                let neighbor_mesh = meshproducer::produce_mesh(method, grid, neighbor_geometry, mesh_param)?;
                neighbor_set.set(*side, neighbor_mesh);
            }

            crate::stitcher::stitch(&mut self_mesh, &neighbor_set);
            Ok(self_mesh)
        })
        .await?;

        let bounds = tile.lat_lon_bounds();
        let bytes = worker::run_cpu(move || encoder::encode(&stitched, bounds)).await?;
        self.persist(window_key, bytes.clone()).await;
        Ok(TileArtifact::new(bytes))
    }

    async fn inspect_cog(&self, dataset: Arc<DatasetConfig>) -> Result<CogInfo> {
        worker::run_cpu(move || {
            let reader = CogReader::open(&dataset.cog_path)?;
            let bounds = reader.bounds()?;
            let gt = reader.geo_transform()?;
            Ok(CogInfo { bounds, pixel_width: gt.pixel_width.abs(), pixel_height: gt.pixel_height.abs() })
        })
        .await
    }

    async fn encode_empty_tile(&self, tile: Tile) -> Result<Vec<u8>> {
        worker::run_cpu(move || {
            let mesh = Mesh::empty_tile(tile.lat_lon_bounds());
            encoder::encode(&mesh, tile.lat_lon_bounds())
        })
        .await
    }

    /// Non-fatal: a disk-cache write failure is logged, never surfaced to
    /// the caller (spec.md 4.E: "the tile is still returned").
    async fn persist(&self, key: WindowKey, bytes: Vec<u8>) {
        if !self.disk_cache.is_enabled() {
            return;
        }
        let disk_cache = self.disk_cache.clone();
        if let Err(err) = worker::run_blocking(move || disk_cache.write(&key, &bytes)).await {
            log::warn!("failed to persist tile to disk cache: {err}");
        }
    }
}

fn mesh_param_for(dataset: &DatasetConfig, z: i32) -> MeshParam {
    match dataset.meshing_method {
        MeshingMethod::Grid => MeshParam::GridSize(dataset.grid_size_for_zoom(z)),
        MeshingMethod::Martini | MeshingMethod::Delatin => MeshParam::MaxError(dataset.max_error_for_zoom(z)),
    }
}

async fn fetch_window(dataset: Arc<DatasetConfig>, tile_key: TileKey) -> Result<ctod_geo::ElevationGrid> {
    worker::run_cpu(move || {
        let reader = CogReader::open(&dataset.cog_path)?;
        let tile = tile_key.to_tile();
        let extent = geometry::native_extent(tile);
        let side = dataset.grid_size_for_zoom(tile.z);
        let out_size = ctod_geo::RasterSize::new(ctod_geo::Rows(side as i64), ctod_geo::Columns(side as i64));
        let grid = reader.read_window(extent, out_size, dataset.resampling, dataset.no_data_replacement)?;
        Ok(grid)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctod_geo::TmsId;

    fn dataset_for_missing_cog() -> Arc<DatasetConfig> {
        Arc::new(DatasetConfig { cog_path: "/nonexistent/does-not-exist.tif".into(), min_zoom: 5, ..Default::default() })
    }

    #[tokio::test]
    async fn below_min_zoom_short_circuits_before_touching_the_cog() {
        let factory = TerrainFactory::new(ProcessedWindowCache::default(), TileDiskCache::disabled(), 4, DEFAULT_REQUEST_TIMEOUT);
        // min_zoom=5 > tile.z=3, and the cog path does not exist: if the
        // empty-tile fast path did not short-circuit before opening the
        // dataset, this would fail with `SourceUnavailable` instead.
        let dataset = dataset_for_missing_cog();
        let tile = Tile::new(TmsId::WebMercatorQuad, 3, 1, 1).unwrap();
        let artifact = factory.get_tile(tile, dataset).await.unwrap();
        assert_eq!(artifact.content_type, encoder::content_type());
        assert!(artifact.encoded_bytes.len() > 88);
    }

    #[tokio::test]
    async fn an_unreachable_cog_at_or_above_min_zoom_fails_with_source_unavailable() {
        let factory = TerrainFactory::new(ProcessedWindowCache::default(), TileDiskCache::disabled(), 4, DEFAULT_REQUEST_TIMEOUT);
        let dataset = Arc::new(DatasetConfig { cog_path: "/nonexistent/does-not-exist.tif".into(), min_zoom: 0, ..Default::default() });
        let tile = Tile::new(TmsId::WebMercatorQuad, 3, 1, 1).unwrap();
        let result = factory.get_tile(tile, dataset).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SourceUnavailable);
    }

    #[tokio::test]
    async fn overloaded_when_concurrency_limit_is_exhausted() {
        let factory = TerrainFactory::new(ProcessedWindowCache::default(), TileDiskCache::disabled(), 1, Duration::from_secs(5));
        let permit = factory.request_limiter.clone().try_acquire_owned().unwrap();
        let dataset = dataset_for_missing_cog();
        let tile = Tile::new(TmsId::WebMercatorQuad, 3, 1, 1).unwrap();
        let result = factory.get_tile(tile, dataset).await;
        assert!(matches!(result, Err(Error::Overloaded)));
        drop(permit);
    }
}
