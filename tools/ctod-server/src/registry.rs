//! Turns a dataset-config-file entry's `options` object, or the dynamic
//! endpoint's query parameters, into a `ctod_core::DatasetConfig` -- both
//! share the same key shape (spec.md 6), so one `DatasetOptions` type and one
//! `into_config` parse the whole thing.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use ctod_core::dataset::MeshingMethod;
use ctod_core::{DatasetConfig, Error, Result};
use ctod_geo::Resampling;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOptions {
    pub cog: Option<String>,
    pub min_zoom: Option<i32>,
    pub max_zoom: Option<i32>,
    pub no_data: Option<f32>,
    pub resampling_method: Option<String>,
    pub skip_cache: Option<bool>,
    pub meshing_method: Option<String>,
    pub default_grid_size: Option<u32>,
    pub zoom_grid_sizes: Option<String>,
    pub default_max_error: Option<f64>,
    pub zoom_max_errors: Option<String>,
}

impl DatasetOptions {
    pub fn into_config(self, unsafe_mode: bool) -> Result<DatasetConfig> {
        let cog_path = self.cog.ok_or_else(|| Error::BadRequest("missing required \"cog\" parameter".into()))?;
        let mut config = DatasetConfig { cog_path, unsafe_mode, ..Default::default() };

        if let Some(min_zoom) = self.min_zoom {
            config.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = self.max_zoom {
            config.max_zoom = max_zoom;
        }
        if let Some(no_data) = self.no_data {
            config.no_data_replacement = no_data;
        }
        if let Some(resampling) = self.resampling_method {
            config.resampling = Resampling::from_str(&resampling)?;
        }
        if let Some(skip_cache) = self.skip_cache {
            config.skip_cache = skip_cache;
        }
        if let Some(method) = self.meshing_method {
            config.meshing_method = MeshingMethod::from_str(&method)?;
        }
        if let Some(size) = self.default_grid_size {
            config.default_grid_size = size;
        }
        if let Some(json) = self.zoom_grid_sizes {
            config.zoom_grid_sizes = parse_zoom_map(&json)?;
        }
        if let Some(max_error) = self.default_max_error {
            config.default_max_error = max_error;
        }
        if let Some(json) = self.zoom_max_errors {
            config.zoom_max_errors = parse_zoom_map(&json)?;
        }
        Ok(config)
    }
}

fn parse_zoom_map<V: serde::de::DeserializeOwned>(json: &str) -> Result<HashMap<i32, V>> {
    let raw: HashMap<String, V> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(zoom, value)| zoom.parse::<i32>().map(|zoom| (zoom, value)).map_err(|_| Error::BadRequest(format!("invalid zoom level key: {zoom}"))))
        .collect()
}

#[derive(Debug, Deserialize)]
struct DatasetConfigEntry {
    name: String,
    options: DatasetOptions,
}

#[derive(Debug, Deserialize)]
struct DatasetConfigFile {
    datasets: Vec<DatasetConfigEntry>,
}

/// Resolved named datasets, loaded once at startup (spec.md 4.K).
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: HashMap<String, Arc<DatasetConfig>>,
}

impl DatasetRegistry {
    /// A missing config file is not fatal: it just leaves the registry
    /// empty, so `/tiles/{dataset}/...` requests fail per-request with
    /// `NoSuchDataset` rather than refusing to start (SPEC_FULL.md 6).
    pub fn load(path: Option<&Path>, unsafe_mode: bool) -> Result<Self> {
        let Some(path) = path else { return Ok(DatasetRegistry::default()) };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("dataset config file {} not found, starting with no named datasets", path.display());
                return Ok(DatasetRegistry::default());
            }
            Err(err) => return Err(err.into()),
        };

        let file: DatasetConfigFile = serde_json::from_str(&contents)?;
        let mut datasets = HashMap::with_capacity(file.datasets.len());
        for entry in file.datasets {
            let config = entry.options.into_config(unsafe_mode)?;
            log::info!("registered dataset \"{}\" from {}", entry.name, config.cog_path);
            datasets.insert(entry.name, Arc::new(config));
        }
        Ok(DatasetRegistry { datasets })
    }

    pub fn get(&self, name: &str) -> Result<Arc<DatasetConfig>> {
        self.datasets.get(name).cloned().ok_or_else(|| Error::NoSuchDataset(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_config_requires_cog() {
        let options = DatasetOptions::default();
        assert!(matches!(options.into_config(false), Err(Error::BadRequest(_))));
    }

    #[test]
    fn into_config_overlays_provided_fields_on_defaults() {
        let options = DatasetOptions { cog: Some("/data/dem.tif".into()), min_zoom: Some(3), meshing_method: Some("martini".into()), ..Default::default() };
        let config = options.into_config(false).unwrap();
        assert_eq!(config.cog_path, "/data/dem.tif");
        assert_eq!(config.min_zoom, 3);
        assert_eq!(config.meshing_method, MeshingMethod::Martini);
        assert_eq!(config.max_zoom, DatasetConfig::default().max_zoom);
    }

    #[test]
    fn into_config_parses_per_zoom_grid_sizes() {
        let options = DatasetOptions { cog: Some("/data/dem.tif".into()), zoom_grid_sizes: Some(r#"{"10": 35, "15": 65}"#.into()), ..Default::default() };
        let config = options.into_config(false).unwrap();
        assert_eq!(config.grid_size_for_zoom(10), 35);
        assert_eq!(config.grid_size_for_zoom(15), 65);
        assert_eq!(config.grid_size_for_zoom(1), config.default_grid_size);
    }

    #[test]
    fn registry_with_no_config_path_is_empty_and_not_an_error() {
        let registry = DatasetRegistry::load(None, false).unwrap();
        assert!(matches!(registry.get("anything"), Err(Error::NoSuchDataset(_))));
    }

    #[test]
    fn registry_loads_named_datasets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("datasets.json");
        std::fs::write(&config_path, r#"{"datasets":[{"name":"flanders","options":{"cog":"/data/flanders.tif","minZoom":2}}]}"#).unwrap();
        let registry = DatasetRegistry::load(Some(&config_path), false).unwrap();
        let dataset = registry.get("flanders").unwrap();
        assert_eq!(dataset.cog_path, "/data/flanders.tif");
        assert_eq!(dataset.min_zoom, 2);
    }
}
