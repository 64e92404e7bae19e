//! `TileKey` and `WindowKey`: the identifiers spec.md 3 builds the whole
//! coalescing/caching story on top of.

use std::hash::{Hash, Hasher};

use ctod_geo::{Resampling, Tile, TmsId};

use crate::dataset::{DatasetConfig, MeshingMethod};

/// `(tms, z, x, y)`. Total order is lexicographic on `(z, x, y)`, per
/// spec.md 3 -- comparisons across different `tms` values are not
/// meaningful and are broken by `(z, x, y)` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub tms: TmsId,
    pub z: i32,
    pub x: i64,
    pub y: i64,
}

impl TileKey {
    pub fn new(tms: TmsId, z: i32, x: i64, y: i64) -> Self {
        TileKey { tms, z, x, y }
    }

    pub fn from_tile(tile: Tile) -> Self {
        TileKey { tms: tile.tms, z: tile.z, x: tile.x, y: tile.y }
    }

    pub fn to_tile(self) -> Tile {
        Tile { tms: self.tms, z: self.z, x: self.x, y: self.y }
    }
}

impl PartialOrd for TileKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TileKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.z, self.x, self.y).cmp(&(other.z, other.x, other.y))
    }
}

/// Either a grid-size (for `MeshingMethod::Grid`) or a max-error threshold
/// in meters (for `Martini`/`Delatin`) -- whichever one a window's meshing
/// method actually reads. Carrying both in `WindowKey` would alias windows
/// that differ only in the parameter their method ignores.
#[derive(Debug, Clone, Copy)]
pub enum MeshParam {
    GridSize(u32),
    MaxError(f64),
}

impl PartialEq for MeshParam {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MeshParam::GridSize(a), MeshParam::GridSize(b)) => a == b,
            (MeshParam::MaxError(a), MeshParam::MaxError(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for MeshParam {}

impl Hash for MeshParam {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            MeshParam::GridSize(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            MeshParam::MaxError(e) => {
                1u8.hash(state);
                e.to_bits().hash(state);
            }
        }
    }
}

/// Identifies a processed elevation grid uniquely: two requests with the
/// same `WindowKey` are guaranteed to want the exact same grid and may
/// share one COG read plus one processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub dataset_fingerprint: u64,
    pub tms: TmsId,
    pub z: i32,
    pub x: i64,
    pub y: i64,
    pub resampling: Resampling,
    no_data_bits: u32,
    pub mesh_param: MeshParam,
    pub meshing_method: MeshingMethod,
}

impl WindowKey {
    pub fn new(dataset: &DatasetConfig, tile: TileKey) -> Self {
        let mesh_param = match dataset.meshing_method {
            MeshingMethod::Grid => MeshParam::GridSize(dataset.grid_size_for_zoom(tile.z)),
            MeshingMethod::Martini | MeshingMethod::Delatin => MeshParam::MaxError(dataset.max_error_for_zoom(tile.z)),
        };
        WindowKey {
            dataset_fingerprint: dataset.fingerprint(),
            tms: tile.tms,
            z: tile.z,
            x: tile.x,
            y: tile.y,
            resampling: dataset.resampling,
            no_data_bits: dataset.no_data_replacement.to_bits(),
            mesh_param,
            meshing_method: dataset.meshing_method,
        }
    }

    pub fn tile(&self) -> TileKey {
        TileKey::new(self.tms, self.z, self.x, self.y)
    }

    pub fn no_data_replacement(&self) -> f32 {
        f32::from_bits(self.no_data_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetConfig {
        DatasetConfig { cog_path: "/data/dem.tif".into(), ..Default::default() }
    }

    #[test]
    fn tile_key_orders_lexicographically_on_z_x_y() {
        let a = TileKey::new(TmsId::WebMercatorQuad, 5, 1, 9);
        let b = TileKey::new(TmsId::WebMercatorQuad, 5, 2, 0);
        assert!(a < b);
        let c = TileKey::new(TmsId::WebMercatorQuad, 4, 999, 999);
        assert!(c < a);
    }

    #[test]
    fn window_key_same_for_same_inputs() {
        let dataset = dataset();
        let tile = TileKey::new(TmsId::WebMercatorQuad, 10, 3, 4);
        assert_eq!(WindowKey::new(&dataset, tile), WindowKey::new(&dataset, tile));
    }

    #[test]
    fn window_key_differs_when_no_data_replacement_differs() {
        let mut a = dataset();
        let mut b = dataset();
        a.no_data_replacement = 0.0;
        b.no_data_replacement = -9999.0;
        let tile = TileKey::new(TmsId::WebMercatorQuad, 10, 3, 4);
        assert_ne!(WindowKey::new(&a, tile), WindowKey::new(&b, tile));
    }

    #[test]
    fn window_key_differs_when_grid_size_differs_by_zoom() {
        let mut cfg = dataset();
        cfg.zoom_grid_sizes.insert(10, 35);
        let a = WindowKey::new(&cfg, TileKey::new(TmsId::WebMercatorQuad, 10, 3, 4));
        let b = WindowKey::new(&cfg, TileKey::new(TmsId::WebMercatorQuad, 9, 3, 4));
        assert_ne!(a.mesh_param, b.mesh_param);
    }
}
