//! Geographic primitives shared across the service: coordinates, tile
//! matrix addressing, georeferenced grids, and the COG reader built on top
//! of them. Kept deliberately free of anything terrain-mesh specific so it
//! can be exercised and tested without the meshing/encoding machinery.

pub mod cell;
pub mod cogreader;
pub mod constants;
pub mod coordinate;
pub mod crs;
pub mod elevationgrid;
pub mod error;
pub mod geotransform;
pub mod latlonbounds;
pub mod point;
pub mod rect;
pub mod resampling;
pub mod tms;

pub use cell::{Cell, Columns, RasterSize, Rows};
pub use cogreader::CogReader;
pub use coordinate::Coordinate;
pub use elevationgrid::ElevationGrid;
pub use error::{Error, Result};
pub use geotransform::GeoTransform;
pub use latlonbounds::LatLonBounds;
pub use point::Point;
pub use rect::Rect;
pub use resampling::Resampling;
pub use tms::{Tile, TmsId};
