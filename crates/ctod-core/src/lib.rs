//! Terrain-on-demand: turns a Cloud Optimized GeoTIFF DEM into Cesium
//! quantized-mesh tiles, with request coalescing, a byte-budgeted in-memory
//! cache of processed elevation windows, and an optional on-disk tile cache.
//! Kept free of anything HTTP-specific; `tools/ctod-server` is the thin
//! binary wrapping this crate the way the teacher's `tileserver` wraps
//! `tiler`.

pub mod cache;
pub mod coalescer;
pub mod dataset;
pub mod diskcache;
pub mod ellipsoid;
pub mod encoder;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod mesh;
pub mod meshproducer;
pub mod neighbors;
pub mod stitcher;
pub mod windowkey;
pub mod worker;

pub use cache::ProcessedWindowCache;
pub use coalescer::RequestCoalescer;
pub use dataset::{DatasetConfig, MeshingMethod};
pub use diskcache::{TileArtifact, TileDiskCache};
pub use error::{Error, ErrorKind, Result};
pub use factory::TerrainFactory;
pub use mesh::Mesh;
pub use windowkey::{TileKey, WindowKey};
