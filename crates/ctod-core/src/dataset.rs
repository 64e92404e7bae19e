//! Resolved per-request/per-named-dataset configuration. One `DatasetConfig`
//! is built from a dataset-config-file entry's `options` object, or
//! synthesized ad hoc from the dynamic endpoint's query parameters; both
//! paths produce the same type so the terrain factory never has to know
//! which one it is serving.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use ctod_geo::{Resampling, TmsId};
use twox_hash::XxHash64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshingMethod {
    Grid,
    Martini,
    Delatin,
}

impl Default for MeshingMethod {
    fn default() -> Self {
        MeshingMethod::Grid
    }
}

impl std::str::FromStr for MeshingMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(MeshingMethod::Grid),
            "martini" => Ok(MeshingMethod::Martini),
            "delatin" => Ok(MeshingMethod::Delatin),
            other => Err(crate::Error::BadRequest(format!("unknown meshing method: {other}"))),
        }
    }
}

impl std::fmt::Display for MeshingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeshingMethod::Grid => "grid",
            MeshingMethod::Martini => "martini",
            MeshingMethod::Delatin => "delatin",
        };
        f.write_str(s)
    }
}

/// A fully resolved dataset: the COG to read, the zoom/resampling/no-data
/// policy, and the meshing method plus its per-zoom parameter tables. This
/// is the unit `dataset_fingerprint` is computed from (together with the
/// per-window fields already carried separately in `WindowKey`).
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub cog_path: String,
    pub tms: TmsId,
    pub min_zoom: i32,
    pub max_zoom: i32,
    pub no_data_replacement: f32,
    pub resampling: Resampling,
    pub skip_cache: bool,
    pub meshing_method: MeshingMethod,
    pub default_grid_size: u32,
    pub zoom_grid_sizes: HashMap<i32, u32>,
    pub default_max_error: f64,
    pub zoom_max_errors: HashMap<i32, f64>,
    /// Safety-check pixel budget (spec.md 6): refuse requests whose
    /// native-resolution window would exceed this many pixels, unless
    /// `unsafe_mode` is set.
    pub max_pixels: u64,
    pub unsafe_mode: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            cog_path: String::new(),
            tms: TmsId::default(),
            min_zoom: 0,
            max_zoom: 22,
            no_data_replacement: 0.0,
            resampling: Resampling::default(),
            skip_cache: false,
            meshing_method: MeshingMethod::default(),
            default_grid_size: 20,
            zoom_grid_sizes: HashMap::new(),
            default_max_error: 4.0,
            zoom_max_errors: HashMap::new(),
            max_pixels: 16 * 1024 * 1024,
            unsafe_mode: false,
        }
    }
}

impl DatasetConfig {
    pub fn grid_size_for_zoom(&self, z: i32) -> u32 {
        self.zoom_grid_sizes.get(&z).copied().unwrap_or(self.default_grid_size)
    }

    pub fn max_error_for_zoom(&self, z: i32) -> f64 {
        self.zoom_max_errors.get(&z).copied().unwrap_or(self.default_max_error)
    }

    /// A stable identifier for the (cog, dataset-level options) pair that
    /// participates in cache keys. Built with `twox-hash`'s `XxHash64`: a
    /// fast, non-cryptographic hash is all a cache-key fingerprint needs,
    /// and every COG/tile source in the wider retrieval pack that fingerprints
    /// cache keys reaches for the same kind of hash rather than `sha2`.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        self.cog_path.hash(&mut hasher);
        self.tms.to_string().hash(&mut hasher);
        self.min_zoom.hash(&mut hasher);
        self.max_zoom.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_identical_config() {
        let cfg = DatasetConfig {
            cog_path: "/data/dem.tif".into(),
            ..Default::default()
        };
        assert_eq!(cfg.fingerprint(), cfg.fingerprint());
    }

    #[test]
    fn fingerprint_differs_for_different_cog_path() {
        let a = DatasetConfig { cog_path: "/data/a.tif".into(), ..Default::default() };
        let b = DatasetConfig { cog_path: "/data/b.tif".into(), ..Default::default() };
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn zoom_tables_fall_back_to_defaults() {
        let mut cfg = DatasetConfig { default_grid_size: 20, ..Default::default() };
        cfg.zoom_grid_sizes.insert(15, 35);
        assert_eq!(cfg.grid_size_for_zoom(15), 35);
        assert_eq!(cfg.grid_size_for_zoom(5), 20);
    }

    #[test]
    fn meshing_method_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(MeshingMethod::from_str("Martini").unwrap(), MeshingMethod::Martini);
        assert!(MeshingMethod::from_str("bogus").is_err());
    }
}
