use gdal::raster::ResampleAlg;

/// Resampling algorithm used when reading a COG window. This is the fixed
/// set the service exposes to callers (`resamplingMethod` query parameter /
/// dataset config option) rather than the full set GDAL supports.
/// `None` means "read the native nearest overview pixel-for-pixel, no
/// interpolation"; `NearestNeighbour` is the default otherwise since it
/// never invents elevation values between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resampling {
    None,
    #[default]
    NearestNeighbour,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Gauss,
    Rms,
}

impl Resampling {
    /// `None` maps to no GDAL resample algorithm at all: the caller reads
    /// the nearest overview level as-is rather than asking GDAL to
    /// interpolate between levels.
    pub fn to_gdal(self) -> Option<ResampleAlg> {
        Some(match self {
            Resampling::None => return None,
            Resampling::NearestNeighbour => ResampleAlg::NearestNeighbour,
            Resampling::Bilinear => ResampleAlg::Bilinear,
            Resampling::Cubic => ResampleAlg::Cubic,
            Resampling::CubicSpline => ResampleAlg::CubicSpline,
            Resampling::Lanczos => ResampleAlg::Lanczos,
            Resampling::Average => ResampleAlg::Average,
            Resampling::Mode => ResampleAlg::Mode,
            Resampling::Gauss => ResampleAlg::Gauss,
            Resampling::Rms => ResampleAlg::Rms,
        })
    }
}

impl std::str::FromStr for Resampling {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Resampling::None),
            "nearest" | "nearestneighbour" | "near" => Ok(Resampling::NearestNeighbour),
            "bilinear" => Ok(Resampling::Bilinear),
            "cubic" => Ok(Resampling::Cubic),
            "cubic_spline" | "cubicspline" => Ok(Resampling::CubicSpline),
            "lanczos" => Ok(Resampling::Lanczos),
            "average" => Ok(Resampling::Average),
            "mode" => Ok(Resampling::Mode),
            "gauss" => Ok(Resampling::Gauss),
            "rms" => Ok(Resampling::Rms),
            other => Err(crate::error::Error::InvalidArgument(format!("unknown resampling algorithm: {other}"))),
        }
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resampling::None => "none",
            Resampling::NearestNeighbour => "nearest",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::CubicSpline => "cubic_spline",
            Resampling::Lanczos => "lanczos",
            Resampling::Average => "average",
            Resampling::Mode => "mode",
            Resampling::Gauss => "gauss",
            Resampling::Rms => "rms",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!(Resampling::from_str("Bilinear").unwrap(), Resampling::Bilinear);
        assert_eq!(Resampling::from_str("NEAREST").unwrap(), Resampling::NearestNeighbour);
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(Resampling::from_str("bogus").is_err());
    }
}
