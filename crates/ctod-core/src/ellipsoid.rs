//! WGS84 ellipsoid math: geographic-to-ECEF conversion and the geodetic
//! surface normal, both needed by the mesh producers (vertex positions for
//! the encoder's bounding sphere) and by the edge stitcher / empty-tile
//! path (the "edge-of-world" normal used where no neighbor exists).

/// WGS84 semi-major axis, in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 semi-minor axis, in meters.
pub const WGS84_B: f64 = 6_356_752.314_245;

const RADII_SQUARED: [f64; 3] = [WGS84_A * WGS84_A, WGS84_A * WGS84_A, WGS84_B * WGS84_B];

/// Geodetic (lon, lat in degrees, height in meters above the ellipsoid) to
/// Earth-Centered-Earth-Fixed cartesian coordinates.
pub fn lon_lat_height_to_ecef(lon_deg: f64, lat_deg: f64, height: f64) -> [f64; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    let e2 = 1.0 - (WGS84_B * WGS84_B) / (WGS84_A * WGS84_A);
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    [
        (n + height) * cos_lat * cos_lon,
        (n + height) * cos_lat * sin_lon,
        (n * (1.0 - e2) + height) * sin_lat,
    ]
}

/// The outward geodetic surface normal at a geographic coordinate: the
/// gradient of the ellipsoid's implicit equation, normalized. Used as the
/// "edge-of-world" normal for tile edges with no neighbor, and for the
/// corners of a synthesized empty tile (spec.md 4.E step 2).
pub fn geodetic_surface_normal(lon_deg: f64, lat_deg: f64) -> [f32; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    let x = cos_lat * cos_lon / RADII_SQUARED[0];
    let y = cos_lat * sin_lon / RADII_SQUARED[1];
    let z = sin_lat / RADII_SQUARED[2];

    normalize([x, y, z])
}

pub fn normalize(v: [f64; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        return [0.0, 0.0, 1.0];
    }
    [(v[0] / len) as f32, (v[1] / len) as f32, (v[2] / len) as f32]
}

pub fn length(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn surface_normal_at_equator_prime_meridian_points_along_x() {
        let n = geodetic_surface_normal(0.0, 0.0);
        assert_relative_eq!(n[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(n[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(n[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn surface_normal_at_north_pole_points_along_z() {
        let n = geodetic_surface_normal(0.0, 90.0);
        assert_relative_eq!(n[2], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn surface_normal_is_unit_length() {
        let n = geodetic_surface_normal(13.4, 51.05);
        assert_relative_eq!(length(n), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn ecef_round_trips_roughly_through_known_radius() {
        let p = lon_lat_height_to_ecef(0.0, 0.0, 0.0);
        let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert_relative_eq!(r, WGS84_A, epsilon = 1e-6);
    }
}
