//! Minimal coordinate reference system helpers: only the two transforms the
//! tile matrix model needs (geographic <-> spherical web mercator).

use crate::{constants::EARTH_RADIUS_M, coordinate::Coordinate, point::Point};

pub mod epsg {
    pub const WGS84: u32 = 4326;
    pub const WEB_MERCATOR: u32 = 3857;
}

pub fn lat_lon_to_web_mercator(coord: Coordinate) -> Point<f64> {
    let x = coord.longitude.to_radians() * EARTH_RADIUS_M;
    let lat_rad = coord.latitude.to_radians();
    let y = EARTH_RADIUS_M * ((std::f64::consts::FRAC_PI_4 + lat_rad / 2.0).tan()).ln();
    Point::new(x, y)
}

pub fn web_mercator_to_lat_lon(point: Point<f64>) -> Coordinate {
    let lon = point.x() / EARTH_RADIUS_M;
    let lat = 2.0 * (point.y() / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2;
    Coordinate::latlon(lat.to_degrees(), lon.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_trips_through_web_mercator() {
        let coord = Coordinate::latlon(51.046575, 4.344067);
        let merc = lat_lon_to_web_mercator(coord);
        let back = web_mercator_to_lat_lon(merc);
        assert_relative_eq!(back.latitude, coord.latitude, epsilon = 1e-9);
        assert_relative_eq!(back.longitude, coord.longitude, epsilon = 1e-9);
    }
}
