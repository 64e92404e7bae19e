/// A bare 2D point, re-using `geo-types` the way the rest of the pack does
/// rather than rolling a fourth vector type.
pub type Point<T = f64> = geo_types::Point<T>;
