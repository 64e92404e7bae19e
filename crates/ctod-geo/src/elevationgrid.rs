use crate::{
    cell::{Cell, Columns, RasterSize, Rows},
    geotransform::GeoTransform,
    rect::Rect,
};

/// A dense grid of elevation samples read from (or resampled from) a raster
/// window, plus the georeferencing needed to place each sample in space.
/// Rows run top to bottom, matching raster row order, not screen order.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    size: RasterSize,
    transform: GeoTransform,
    samples: Vec<f32>,
    nodata: Option<f32>,
}

impl ElevationGrid {
    pub fn new(size: RasterSize, transform: GeoTransform, samples: Vec<f32>, nodata: Option<f32>) -> Self {
        assert_eq!(samples.len() as i64, size.cell_count(), "sample buffer does not match raster size");
        ElevationGrid { size, transform, samples, nodata }
    }

    /// An all-nodata grid, used when a requested window falls entirely
    /// outside a dataset's extent: callers encode this as a flat tile rather
    /// than treating it as an error.
    pub fn empty(size: RasterSize, transform: GeoTransform, nodata_value: f32) -> Self {
        let samples = vec![nodata_value; size.cell_count() as usize];
        ElevationGrid { size, transform, samples, nodata: Some(nodata_value) }
    }

    pub fn size(&self) -> RasterSize {
        self.size
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    pub fn bounds(&self) -> Rect {
        self.transform.bounds(self.size)
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    fn index(&self, cell: Cell) -> usize {
        (cell.row.0 * self.size.cols.0 + cell.col.0) as usize
    }

    pub fn get(&self, cell: Cell) -> Option<f32> {
        if !self.size.contains(cell) {
            return None;
        }
        Some(self.samples[self.index(cell)])
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        match self.nodata {
            Some(nd) => value == nd || value.is_nan(),
            None => value.is_nan(),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Height at an arbitrary point within the grid via bilinear
    /// interpolation of the four surrounding samples. Used by mesh
    /// producers when sampling at a resolution coarser than the source grid.
    pub fn sample_bilinear(&self, col: f64, row: f64) -> f32 {
        let c0 = col.floor().clamp(0.0, (self.size.cols.0 - 1) as f64) as i64;
        let r0 = row.floor().clamp(0.0, (self.size.rows.0 - 1) as f64) as i64;
        let c1 = (c0 + 1).min(self.size.cols.0 - 1);
        let r1 = (r0 + 1).min(self.size.rows.0 - 1);
        let fx = (col - c0 as f64).clamp(0.0, 1.0);
        let fy = (row - r0 as f64).clamp(0.0, 1.0);

        let v00 = self.get(Cell::new(Rows(r0), Columns(c0))).unwrap_or(0.0) as f64;
        let v10 = self.get(Cell::new(Rows(r0), Columns(c1))).unwrap_or(0.0) as f64;
        let v01 = self.get(Cell::new(Rows(r1), Columns(c0))).unwrap_or(0.0) as f64;
        let v11 = self.get(Cell::new(Rows(r1), Columns(c1))).unwrap_or(0.0) as f64;

        let top = v00 * (1.0 - fx) + v10 * fx;
        let bottom = v01 * (1.0 - fx) + v11 * fx;
        (top * (1.0 - fy) + bottom * fy) as f32
    }

    /// Min/max over non-nodata samples, used to compute a bounding sphere
    /// and minimum/maximum height for the quantized-mesh header.
    pub fn min_max(&self) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in &self.samples {
            if self.is_nodata(v) {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ElevationGrid {
        let size = RasterSize::new(Rows(2), Columns(2));
        let transform = GeoTransform::new(0.0, 1.0, 2.0, -1.0);
        ElevationGrid::new(size, transform, vec![0.0, 10.0, 20.0, 30.0], Some(-9999.0))
    }

    #[test]
    fn bilinear_sample_at_corner_matches_raw_value() {
        let g = grid();
        assert_eq!(g.sample_bilinear(0.0, 0.0), 0.0);
        assert_eq!(g.sample_bilinear(1.0, 1.0), 30.0);
    }

    #[test]
    fn bilinear_sample_at_center_averages_all_four() {
        let g = grid();
        assert_eq!(g.sample_bilinear(0.5, 0.5), 15.0);
    }

    #[test]
    fn min_max_ignores_nodata() {
        let size = RasterSize::new(Rows(1), Columns(2));
        let transform = GeoTransform::new(0.0, 1.0, 1.0, -1.0);
        let g = ElevationGrid::new(size, transform, vec![5.0, -9999.0], Some(-9999.0));
        assert_eq!(g.min_max(), (5.0, 5.0));
    }

    #[test]
    fn empty_grid_is_all_nodata() {
        let g = ElevationGrid::empty(RasterSize::square(4), GeoTransform::new(0.0, 1.0, 0.0, -1.0), -32768.0);
        assert!(g.is_nodata(g.get(Cell::new(Rows(2), Columns(2))).unwrap()));
    }
}
