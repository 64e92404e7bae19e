//! Maps a fractional position inside a read window back to a geographic
//! (lon, lat) coordinate, honoring the Non-goal that output grids are never
//! reprojected: a `WebMercatorQuad` window's native bounds are meters and
//! need unprojecting per-vertex (mercator is non-linear in latitude); a
//! `Wgs84` window's native bounds already are degrees.

use ctod_geo::{crs, Point, Rect, Tile, TmsId};

#[derive(Debug, Clone, Copy)]
pub struct WindowGeometry {
    pub tms: TmsId,
    pub native_bounds: Rect,
}

impl WindowGeometry {
    pub fn new(tms: TmsId, native_bounds: Rect) -> Self {
        WindowGeometry { tms, native_bounds }
    }

    /// `col_frac`/`row_frac` in `[0, 1]`, `(0, 0)` at the top-left (north-west)
    /// corner of the window, matching raster row order.
    pub fn lon_lat_at(&self, col_frac: f64, row_frac: f64) -> (f64, f64) {
        let x = self.native_bounds.min_x + col_frac * self.native_bounds.width();
        let y = self.native_bounds.max_y - row_frac * self.native_bounds.height();
        match self.tms {
            TmsId::WebMercatorQuad => {
                let coord = crs::web_mercator_to_lat_lon(Point::new(x, y));
                (coord.longitude, coord.latitude)
            }
            TmsId::Wgs84 => (x, y),
        }
    }
}

/// The tile's footprint expressed in whatever CRS its COG is assumed to be
/// stored in: web mercator meters for `WebMercatorQuad`, geographic degrees
/// for `Wgs84`. Reprojecting a COG to match an arbitrary TMS is out of
/// scope (spec.md 1, Non-goals), so a dataset's native CRS is assumed to
/// already agree with its configured TMS.
pub fn native_extent(tile: Tile) -> Rect {
    match tile.tms {
        TmsId::WebMercatorQuad => tile.web_mercator_bounds(),
        TmsId::Wgs84 => {
            let bounds = tile.lat_lon_bounds();
            Rect::new(bounds.west, bounds.south, bounds.east, bounds.north)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_maps_linearly() {
        let geometry = WindowGeometry::new(TmsId::Wgs84, Rect::new(4.0, 51.0, 5.0, 52.0));
        let (lon, lat) = geometry.lon_lat_at(0.0, 0.0);
        assert_eq!((lon, lat), (4.0, 52.0));
        let (lon, lat) = geometry.lon_lat_at(1.0, 1.0);
        assert_eq!((lon, lat), (5.0, 51.0));
    }

    #[test]
    fn web_mercator_unprojects_per_vertex() {
        let bounds = ctod_geo::Tile::new(TmsId::WebMercatorQuad, 4, 8, 5).unwrap().web_mercator_bounds();
        let geometry = WindowGeometry::new(TmsId::WebMercatorQuad, bounds);
        let (lon, lat) = geometry.lon_lat_at(0.5, 0.5);
        assert!(lon.is_finite() && lat.is_finite());
        assert!((-180.0..=180.0).contains(&lon));
        assert!((-90.0..=90.0).contains(&lat));
    }

    #[test]
    fn native_extent_uses_projected_meters_for_web_mercator() {
        let tile = ctod_geo::Tile::new(TmsId::WebMercatorQuad, 0, 0, 0).unwrap();
        let extent = native_extent(tile);
        assert!(extent.width() > 1_000_000.0);
    }

    #[test]
    fn native_extent_uses_degrees_for_wgs84() {
        let tile = ctod_geo::Tile::new(TmsId::Wgs84, 0, 0, 0).unwrap();
        let extent = native_extent(tile);
        assert_eq!(extent.max_x - extent.min_x, 360.0);
    }
}
