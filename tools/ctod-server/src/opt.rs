use std::path::PathBuf;

use clap::Parser;

/// Command line options for the CTOD terrain server, mirroring the
/// environment/flags table (spec.md 6).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Cesium terrain-on-demand server")]
pub struct Opt {
    /// Root of the on-disk tile cache. Omit to serve without a disk cache.
    #[arg(long, env = "TILE_CACHE_PATH")]
    pub tile_cache_path: Option<PathBuf>,

    /// Dataset config file listing named datasets and their options.
    #[arg(long, env = "DATASET_CONFIG_PATH")]
    pub dataset_config_path: Option<PathBuf>,

    /// env_logger filter spec, e.g. "warn" or "ctod_core=debug".
    #[arg(long, env = "LOGGING_LEVEL", default_value = "warn")]
    pub logging_level: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 3130)]
    pub port: u16,

    /// Skip the native-resolution pixel budget safety check.
    #[arg(long = "unsafe")]
    pub unsafe_mode: bool,

    /// Don't mount the `/tiles/dynamic/...` routes.
    #[arg(long)]
    pub no_dynamic: bool,

    /// Allowed CORS origins. Empty allows any origin.
    #[arg(long = "cors-allow-origins", value_delimiter = ',')]
    pub cors_allow_origins: Vec<String>,

    /// Bind address; defaults to the unspecified address (all interfaces).
    #[arg(long)]
    pub addr: Option<String>,
}
