use crate::{
    cell::{Cell, Columns, RasterSize, Rows},
    point::Point,
    rect::Rect,
};

/// Affine mapping between raster cell coordinates and a projected coordinate
/// space, in GDAL's six-parameter form: `x = c0 + col*c1 + row*c2`,
/// `y = c3 + col*c4 + row*c5`. Only the axis-aligned, non-rotated case
/// (`c2 == c4 == 0`) is supported, which covers every COG this service reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub top_left_y: f64,
    pub pixel_height: f64, // negative for north-up rasters
}

impl GeoTransform {
    pub const fn new(top_left_x: f64, pixel_width: f64, top_left_y: f64, pixel_height: f64) -> Self {
        GeoTransform { top_left_x, pixel_width, top_left_y, pixel_height }
    }

    /// Build from GDAL's raw 6-element `GeoTransform` array, rejecting rotation.
    pub fn from_gdal(gt: [f64; 6]) -> Option<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return None;
        }
        Some(GeoTransform::new(gt[0], gt[1], gt[3], gt[5]))
    }

    pub fn to_gdal(self) -> [f64; 6] {
        [self.top_left_x, self.pixel_width, 0.0, self.top_left_y, 0.0, self.pixel_height]
    }

    /// Projected coordinates of the top-left corner of `cell`.
    pub fn cell_top_left(&self, cell: Cell) -> Point<f64> {
        Point::new(
            self.top_left_x + cell.col.0 as f64 * self.pixel_width,
            self.top_left_y + cell.row.0 as f64 * self.pixel_height,
        )
    }

    /// Projected coordinates of the center of `cell`.
    pub fn cell_center(&self, cell: Cell) -> Point<f64> {
        let tl = self.cell_top_left(cell);
        Point::new(tl.x() + self.pixel_width / 2.0, tl.y() + self.pixel_height / 2.0)
    }

    /// The cell containing a projected point.
    pub fn point_to_cell(&self, point: Point<f64>) -> Cell {
        let col = ((point.x() - self.top_left_x) / self.pixel_width).floor() as i64;
        let row = ((point.y() - self.top_left_y) / self.pixel_height).floor() as i64;
        Cell::new(Rows(row), Columns(col))
    }

    pub fn bounds(&self, size: RasterSize) -> Rect {
        let p0 = self.cell_top_left(Cell::new(Rows(0), Columns(0)));
        let p1 = self.cell_top_left(Cell::new(size.rows, size.cols));
        Rect::new(p0.x().min(p1.x()), p0.y().min(p1.y()), p0.x().max(p1.x()), p0.y().max(p1.y()))
    }

    /// A new transform describing a sub-window starting at `origin`, keeping
    /// this transform's pixel size.
    pub fn windowed(&self, origin: Cell) -> GeoTransform {
        let tl = self.cell_top_left(origin);
        GeoTransform::new(tl.x(), self.pixel_width, tl.y(), self.pixel_height)
    }

    /// A new transform for the same extent, resampled to a different pixel size.
    pub fn with_pixel_size(&self, pixel_width: f64, pixel_height: f64) -> GeoTransform {
        GeoTransform::new(self.top_left_x, pixel_width, self.top_left_y, pixel_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> GeoTransform {
        GeoTransform::new(0.0, 1.0, 100.0, -1.0)
    }

    #[test]
    fn round_trips_cell_and_point() {
        let gt = sample();
        let cell = Cell::new(Rows(10), Columns(20));
        let p = gt.cell_top_left(cell);
        let back = gt.point_to_cell(p);
        assert_eq!(back, cell);
    }

    #[test]
    fn bounds_matches_raster_extent() {
        let gt = sample();
        let bounds = gt.bounds(RasterSize::square(100));
        assert_relative_eq!(bounds.min_x, 0.0);
        assert_relative_eq!(bounds.max_x, 100.0);
        assert_relative_eq!(bounds.min_y, 0.0);
        assert_relative_eq!(bounds.max_y, 100.0);
    }

    #[test]
    fn rejects_rotated_gdal_transform() {
        assert!(GeoTransform::from_gdal([0.0, 1.0, 0.1, 100.0, 0.0, -1.0]).is_none());
        assert!(GeoTransform::from_gdal([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]).is_some());
    }
}
