/// Mean earth radius in meters used by the spherical web mercator projection.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Circumference of the web mercator sphere, i.e. `2 * pi * EARTH_RADIUS_M`.
pub const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M;

/// Quantized-mesh vertices are quantized to 16-bit integers; an axis parameter
/// along a tile edge therefore has 1/32768 resolution (2^15).
pub const QUANTIZED_MESH_EDGE_RESOLUTION: f64 = 1.0 / 32768.0;
