//! The `martini` meshing method: a right-triangulated irregular network
//! (RTIN), built the way Mapbox's public-domain "Martini" algorithm does --
//! a precomputed tree of right isoceles triangles over a `(2^k + 1)`-square
//! grid, with a per-midpoint error cached bottom-up so that extracting a
//! mesh for a given `max_error` is a single top-down traversal.

use ctod_geo::ElevationGrid;

use crate::ellipsoid::lon_lat_height_to_ecef;
use crate::error::{Error, Result};
use crate::geometry::WindowGeometry;
use crate::mesh::{EdgeList, EdgeVertex, Mesh, Vertex};

/// Smallest `2^k + 1` at least as large as `min`, capped at 513 so a single
/// tile's working grid stays bounded regardless of the source resolution.
fn resample_size(min: u32) -> u32 {
    let mut tile_size = 1u32;
    while tile_size + 1 < min {
        tile_size <<= 1;
    }
    (tile_size + 1).min(513)
}

struct RtinIndex {
    tile_size: u32,
    num_triangles: usize,
    num_parent_triangles: usize,
    coords: Vec<[u32; 4]>,
}

impl RtinIndex {
    fn build(grid_size: u32) -> Result<Self> {
        let tile_size = grid_size - 1;
        if tile_size & (tile_size - 1) != 0 {
            return Err(Error::MeshingFailed(format!("martini grid size {grid_size} is not 2^k + 1")));
        }
        let num_triangles = (tile_size as usize) * (tile_size as usize) * 2 - 2;
        let num_parent_triangles = num_triangles - (tile_size as usize) * (tile_size as usize);

        let mut coords = vec![[0u32; 4]; num_triangles];
        for (i, slot) in coords.iter_mut().enumerate() {
            let id = (i + 2) as u32;
            let (mut ax, mut ay, mut bx, mut by, mut cx, mut cy) = (0u32, 0u32, 0u32, 0u32, 0u32, 0u32);
            if id & 1 != 0 {
                bx = tile_size;
                by = tile_size;
                cx = tile_size;
            } else {
                ax = tile_size;
                ay = tile_size;
                cy = tile_size;
            }
            let mut id = id;
            loop {
                id >>= 1;
                if id <= 1 {
                    break;
                }
                let mx = (ax + bx) / 2;
                let my = (ay + by) / 2;
                if id & 1 != 0 {
                    bx = ax;
                    by = ay;
                    ax = cx;
                    ay = cy;
                } else {
                    ax = bx;
                    ay = by;
                    bx = cx;
                    by = cy;
                }
                cx = mx;
                cy = my;
            }
            *slot = [ax, ay, bx, by];
        }

        Ok(RtinIndex { tile_size, num_triangles, num_parent_triangles, coords })
    }

    /// Bottom-up: for each triangle (processed from finest to coarsest),
    /// the error at the midpoint of its long edge is the max of the direct
    /// linear-interpolation error and the errors already computed for its
    /// two children.
    fn compute_errors(&self, terrain: &[f32]) -> Vec<f32> {
        let size = self.tile_size as usize + 1;
        let mut errors = vec![0f32; terrain.len()];
        for i in (0..self.num_triangles).rev() {
            let [ax, ay, bx, by] = self.coords[i];
            let mx = (ax + bx) / 2;
            let my = (ay + by) / 2;
            let cx = mx as i64 + (my as i64 - ay as i64);
            let cy = my as i64 - (mx as i64 - ax as i64);

            let interpolated = (terrain[ay as usize * size + ax as usize] + terrain[by as usize * size + bx as usize]) / 2.0;
            let middle_index = my as usize * size + mx as usize;
            let middle_error = (interpolated - terrain[middle_index]).abs();
            errors[middle_index] = errors[middle_index].max(middle_error);

            if i < self.num_parent_triangles {
                let lcx = ((ax as i64 + cx) / 2) as usize;
                let lcy = ((ay as i64 + cy) / 2) as usize;
                let rcx = ((bx as i64 + cx) / 2) as usize;
                let rcy = ((by as i64 + cy) / 2) as usize;
                let left = errors[lcy * size + lcx];
                let right = errors[rcy * size + rcx];
                errors[middle_index] = errors[middle_index].max(left).max(right);
            }
        }
        errors
    }
}

struct MeshBuilder<'a> {
    size: usize,
    errors: &'a [f32],
    max_error: f32,
    slots: Vec<i64>,
    vertices: Vec<(u32, u32)>,
    triangles: Vec<[u32; 3]>,
}

impl<'a> MeshBuilder<'a> {
    fn new(size: usize, errors: &'a [f32], max_error: f32) -> Self {
        MeshBuilder { size, errors, max_error, slots: vec![-1i64; size * size], vertices: Vec::new(), triangles: Vec::new() }
    }

    fn vertex_index(&mut self, x: u32, y: u32) -> u32 {
        let key = y as usize * self.size + x as usize;
        if self.slots[key] < 0 {
            self.slots[key] = self.vertices.len() as i64;
            self.vertices.push((x, y));
        }
        self.slots[key] as u32
    }

    fn split(&mut self, ax: u32, ay: u32, bx: u32, by: u32, cx: u32, cy: u32) {
        let mx = (ax + bx) / 2;
        let my = (ay + by) / 2;
        let long_edge = (ax as i64 - cx as i64).abs() + (ay as i64 - cy as i64).abs();
        if long_edge > 1 && self.errors[my as usize * self.size + mx as usize] > self.max_error {
            self.split(cx, cy, ax, ay, mx, my);
            self.split(bx, by, cx, cy, mx, my);
        } else {
            let a = self.vertex_index(ax, ay);
            let b = self.vertex_index(bx, by);
            let c = self.vertex_index(cx, cy);
            self.triangles.push([a, b, c]);
        }
    }
}

pub fn mesh(elevation: &ElevationGrid, geometry: WindowGeometry, max_error: f64) -> Result<Mesh> {
    let source_size = elevation.size();
    let grid_size = resample_size(source_size.rows.0.max(source_size.cols.0).max(2) as u32);
    let tile_size = grid_size - 1;

    let mut terrain = vec![0f32; (grid_size * grid_size) as usize];
    for row in 0..grid_size {
        let row_frac = row as f64 / tile_size as f64;
        for col in 0..grid_size {
            let col_frac = col as f64 / tile_size as f64;
            let sample_col = col_frac * (source_size.cols.0 - 1) as f64;
            let sample_row = row_frac * (source_size.rows.0 - 1) as f64;
            terrain[(row * grid_size + col) as usize] = elevation.sample_bilinear(sample_col, sample_row);
        }
    }

    let index = RtinIndex::build(grid_size)?;
    let errors = index.compute_errors(&terrain);

    let mut builder = MeshBuilder::new(grid_size as usize, &errors, max_error as f32);
    builder.split(0, 0, tile_size, tile_size, tile_size, 0);
    builder.split(tile_size, tile_size, 0, 0, 0, tile_size);

    let mut out = Mesh::default();
    let mut vertex_indices = vec![0u32; builder.vertices.len()];
    for (i, &(x, y)) in builder.vertices.iter().enumerate() {
        let col_frac = x as f64 / tile_size as f64;
        let row_frac = y as f64 / tile_size as f64;
        let height = terrain[(y * grid_size + x) as usize] as f64;
        let (lon, lat) = geometry.lon_lat_at(col_frac, row_frac);
        vertex_indices[i] = out.push_vertex(Vertex { lon, lat, height }, [0.0, 0.0, 1.0]);
    }
    for tri in &builder.triangles {
        out.triangles.push([vertex_indices[tri[0] as usize], vertex_indices[tri[1] as usize], vertex_indices[tri[2] as usize]]);
    }

    let mut west = EdgeList::default();
    let mut east = EdgeList::default();
    let mut north = EdgeList::default();
    let mut south = EdgeList::default();
    for (i, &(x, y)) in builder.vertices.iter().enumerate() {
        let index = vertex_indices[i];
        if x == 0 {
            west.0.push(EdgeVertex { axis_param: y as f64 / tile_size as f64, vertex_index: index });
        }
        if x == tile_size {
            east.0.push(EdgeVertex { axis_param: y as f64 / tile_size as f64, vertex_index: index });
        }
        if y == 0 {
            north.0.push(EdgeVertex { axis_param: x as f64 / tile_size as f64, vertex_index: index });
        }
        if y == tile_size {
            south.0.push(EdgeVertex { axis_param: x as f64 / tile_size as f64, vertex_index: index });
        }
    }
    out.west = west.sorted_by_axis_param();
    out.east = east.sorted_by_axis_param();
    out.north = north.sorted_by_axis_param();
    out.south = south.sorted_by_axis_param();

    out.recompute_normals(|v| lon_lat_height_to_ecef(v.lon, v.lat, v.height));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctod_geo::{GeoTransform, RasterSize, Rows, Columns, TmsId};

    fn sloped_grid() -> ElevationGrid {
        let size = RasterSize::new(Rows(17), Columns(17));
        let transform = GeoTransform::new(4.0, 1.0 / 16.0, 52.0, -1.0 / 16.0);
        let mut samples = Vec::with_capacity(17 * 17);
        for row in 0..17 {
            for col in 0..17 {
                samples.push((row + col) as f32 * 10.0);
            }
        }
        ElevationGrid::new(size, transform, samples, Some(-9999.0))
    }

    fn geometry() -> WindowGeometry {
        WindowGeometry::new(TmsId::Wgs84, ctod_geo::Rect::new(4.0, 51.0, 5.0, 52.0))
    }

    #[test]
    fn resample_size_rounds_up_to_power_of_two_plus_one() {
        assert_eq!(resample_size(10), 17);
        assert_eq!(resample_size(17), 17);
        assert_eq!(resample_size(18), 33);
    }

    #[test]
    fn tighter_max_error_yields_more_vertices() {
        let coarse = mesh(&sloped_grid(), geometry(), 50.0).unwrap();
        let fine = mesh(&sloped_grid(), geometry(), 0.01).unwrap();
        assert!(fine.vertices.len() >= coarse.vertices.len());
    }

    #[test]
    fn mesh_has_no_degenerate_triangles_by_area() {
        let m = mesh(&sloped_grid(), geometry(), 0.01).unwrap();
        for &tri in &m.triangles {
            assert!(m.triangle_area(tri) > 0.0);
        }
    }

    #[test]
    fn every_boundary_vertex_lands_on_the_tile_edge() {
        let m = mesh(&sloped_grid(), geometry(), 1.0).unwrap();
        assert!(!m.west.0.is_empty());
        assert!(!m.north.0.is_empty());
    }
}
