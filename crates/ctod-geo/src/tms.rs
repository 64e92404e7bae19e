//! The tile matrix model: which tile matrix sets this service understands,
//! and how a `(tms, z, x, y)` tuple maps to a geographic / projected extent.

use crate::{
    constants::EARTH_CIRCUMFERENCE_M,
    coordinate::Coordinate,
    crs::{lat_lon_to_web_mercator, web_mercator_to_lat_lon},
    error::{Error, Result},
    latlonbounds::LatLonBounds,
    rect::Rect,
};

/// A tile matrix set this service knows how to address. Defaults to
/// `WebMercatorQuad`, the only one Cesium's terrain viewer speaks natively;
/// `Wgs84` is carried for completeness with the geographic (EPSG:4326)
/// quadtree some terrain providers use instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TmsId {
    WebMercatorQuad,
    Wgs84,
}

impl Default for TmsId {
    fn default() -> Self {
        TmsId::WebMercatorQuad
    }
}

impl std::str::FromStr for TmsId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WebMercatorQuad" | "web-mercator" | "EPSG:3857" => Ok(TmsId::WebMercatorQuad),
            "WorldCRS84Quad" | "wgs84" | "EPSG:4326" => Ok(TmsId::Wgs84),
            other => Err(Error::NoSuchTms(other.to_string())),
        }
    }
}

impl std::fmt::Display for TmsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TmsId::WebMercatorQuad => f.write_str("WebMercatorQuad"),
            TmsId::Wgs84 => f.write_str("WorldCRS84Quad"),
        }
    }
}

impl TmsId {
    /// Number of tiles spanning a full row at `z`.
    pub fn matrix_width(&self, z: i32) -> i64 {
        match self {
            TmsId::WebMercatorQuad => 1i64 << z,
            TmsId::Wgs84 => 2i64 << z,
        }
    }

    pub fn matrix_height(&self, z: i32) -> i64 {
        1i64 << z
    }
}

/// A single tile address within a tile matrix set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    pub tms: TmsId,
    pub z: i32,
    pub x: i64,
    pub y: i64,
}

impl Tile {
    pub fn new(tms: TmsId, z: i32, x: i64, y: i64) -> Result<Self> {
        let tile = Tile { tms, z, x, y };
        tile.validate()?;
        Ok(tile)
    }

    fn validate(&self) -> Result<()> {
        if self.z < 0 {
            return Err(Error::TileOutOfRange { z: self.z, x: self.x, y: self.y });
        }
        let width = self.tms.matrix_width(self.z);
        let height = self.tms.matrix_height(self.z);
        if self.x < 0 || self.x >= width || self.y < 0 || self.y >= height {
            return Err(Error::TileOutOfRange { z: self.z, x: self.x, y: self.y });
        }
        Ok(())
    }

    /// Geographic bounds of this tile, south/west/north/east.
    pub fn lat_lon_bounds(&self) -> LatLonBounds {
        match self.tms {
            TmsId::WebMercatorQuad => {
                let rect = self.web_mercator_bounds();
                let sw = web_mercator_to_lat_lon(crate::point::Point::new(rect.min_x, rect.min_y));
                let ne = web_mercator_to_lat_lon(crate::point::Point::new(rect.max_x, rect.max_y));
                LatLonBounds::new(sw.latitude, sw.longitude, ne.latitude, ne.longitude)
            }
            TmsId::Wgs84 => {
                let width = self.tms.matrix_width(self.z) as f64;
                let lon_span = 360.0 / width;
                let lat_span = 180.0 / self.tms.matrix_height(self.z) as f64;
                let west = -180.0 + self.x as f64 * lon_span;
                let north = 90.0 - self.y as f64 * lat_span;
                LatLonBounds::new(north - lat_span, west, north, west + lon_span)
            }
        }
    }

    /// Projected (web mercator meters) bounds; only meaningful for
    /// `TmsId::WebMercatorQuad`, but computed unconditionally for callers
    /// that need a metric extent regardless of tms (e.g. pixel-size math).
    pub fn web_mercator_bounds(&self) -> Rect {
        let n = self.tms.matrix_height(self.z) as f64;
        let tile_size = EARTH_CIRCUMFERENCE_M / n;
        let origin = EARTH_CIRCUMFERENCE_M / 2.0;
        let min_x = self.x as f64 * tile_size - origin;
        let max_x = min_x + tile_size;
        let max_y = origin - self.y as f64 * tile_size;
        let min_y = max_y - tile_size;
        Rect::new(min_x, min_y, max_x, max_y)
    }

    /// Ground resolution in meters-per-pixel at this tile's zoom, given a
    /// tile edge length in pixels.
    pub fn pixel_size_at_zoom(&self, tile_pixels: u32) -> f64 {
        let n = self.tms.matrix_height(self.z) as f64;
        (EARTH_CIRCUMFERENCE_M / n) / tile_pixels as f64
    }

    pub fn parent(&self) -> Option<Tile> {
        if self.z == 0 {
            return None;
        }
        Tile::new(self.tms, self.z - 1, self.x / 2, self.y / 2).ok()
    }

    pub fn north(&self) -> Option<Tile> {
        Tile::new(self.tms, self.z, self.x, self.y - 1).ok()
    }

    pub fn south(&self) -> Option<Tile> {
        Tile::new(self.tms, self.z, self.x, self.y + 1).ok()
    }

    pub fn east(&self) -> Option<Tile> {
        let width = self.tms.matrix_width(self.z);
        Tile::new(self.tms, self.z, (self.x + 1).rem_euclid(width), self.y).ok()
    }

    pub fn west(&self) -> Option<Tile> {
        let width = self.tms.matrix_width(self.z);
        Tile::new(self.tms, self.z, (self.x - 1).rem_euclid(width), self.y).ok()
    }

    /// The tile at `z` containing a geographic coordinate.
    pub fn containing(tms: TmsId, z: i32, coord: Coordinate) -> Result<Tile> {
        match tms {
            TmsId::WebMercatorQuad => {
                let merc = lat_lon_to_web_mercator(coord);
                let n = tms.matrix_height(z) as f64;
                let tile_size = EARTH_CIRCUMFERENCE_M / n;
                let origin = EARTH_CIRCUMFERENCE_M / 2.0;
                let x = ((merc.x() + origin) / tile_size).floor() as i64;
                let y = ((origin - merc.y()) / tile_size).floor() as i64;
                Tile::new(tms, z, x, y)
            }
            TmsId::Wgs84 => {
                let width = tms.matrix_width(z) as f64;
                let lon_span = 360.0 / width;
                let lat_span = 180.0 / tms.matrix_height(z) as f64;
                let x = ((coord.longitude + 180.0) / lon_span).floor() as i64;
                let y = ((90.0 - coord.latitude) / lat_span).floor() as i64;
                Tile::new(tms, z, x, y)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_tile_covers_the_world() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 0, 0, 0).unwrap();
        let bounds = tile.lat_lon_bounds();
        assert!(bounds.west < -179.0);
        assert!(bounds.east > 179.0);
    }

    #[test]
    fn rejects_out_of_range_tile() {
        assert!(Tile::new(TmsId::WebMercatorQuad, 2, 4, 0).is_err());
        assert!(Tile::new(TmsId::WebMercatorQuad, 2, 3, 3).is_ok());
    }

    #[test]
    fn containing_tile_round_trips_center() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 8, 131, 84).unwrap();
        let bounds = tile.lat_lon_bounds();
        let center = bounds.center();
        let found = Tile::containing(TmsId::WebMercatorQuad, 8, center).unwrap();
        assert_eq!(found, tile);
    }

    #[test]
    fn east_neighbor_wraps_around_the_antimeridian() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 2, 3, 1).unwrap();
        assert_eq!(tile.east().unwrap().x, 0);
    }

    #[test]
    fn parent_halves_coordinates() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 3, 5, 2).unwrap();
        let parent = tile.parent().unwrap();
        assert_eq!((parent.z, parent.x, parent.y), (2, 2, 1));
    }
}
