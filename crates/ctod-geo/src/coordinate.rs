#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn latlon(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }
}

impl approx::AbsDiffEq for Coordinate {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.latitude.abs_diff_eq(&other.latitude, epsilon) && self.longitude.abs_diff_eq(&other.longitude, epsilon)
    }
}
