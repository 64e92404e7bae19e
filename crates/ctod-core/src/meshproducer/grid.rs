//! The `grid` meshing method: a regular `n x n` sampling of the elevation
//! grid, triangulated as a structured mesh (two triangles per cell).

use ctod_geo::ElevationGrid;

use crate::ellipsoid::lon_lat_height_to_ecef;
use crate::error::Result;
use crate::geometry::WindowGeometry;
use crate::mesh::{EdgeList, EdgeVertex, Mesh, Vertex};

pub fn mesh(elevation: &ElevationGrid, geometry: WindowGeometry, n: u32) -> Result<Mesh> {
    let n = n.max(2);
    let size = elevation.size();
    let mut out = Mesh::default();
    let mut indices = vec![0u32; (n * n) as usize];

    for row in 0..n {
        let row_frac = row as f64 / (n - 1) as f64;
        for col in 0..n {
            let col_frac = col as f64 / (n - 1) as f64;
            let sample_col = col_frac * (size.cols.0 - 1) as f64;
            let sample_row = row_frac * (size.rows.0 - 1) as f64;
            let height = elevation.sample_bilinear(sample_col, sample_row) as f64;
            let (lon, lat) = geometry.lon_lat_at(col_frac, row_frac);
            let index = out.push_vertex(Vertex { lon, lat, height }, [0.0, 0.0, 1.0]);
            indices[(row * n + col) as usize] = index;
        }
    }

    for row in 0..n - 1 {
        for col in 0..n - 1 {
            let i00 = indices[(row * n + col) as usize];
            let i10 = indices[(row * n + col + 1) as usize];
            let i01 = indices[((row + 1) * n + col) as usize];
            let i11 = indices[((row + 1) * n + col + 1) as usize];
            out.triangles.push([i00, i10, i11]);
            out.triangles.push([i00, i11, i01]);
        }
    }

    // Axis parameter convention shared with every mesh producer: north/south
    // run west (0) to east (1); west/east run north (0) to south (1). Kept
    // identical across producers so the edge stitcher never has to flip one
    // side's parametrization to match the other.
    let mut north = EdgeList::default();
    let mut south = EdgeList::default();
    for col in 0..n {
        let axis_param = col as f64 / (n - 1) as f64;
        north.0.push(EdgeVertex { axis_param, vertex_index: indices[col as usize] });
        south.0.push(EdgeVertex { axis_param, vertex_index: indices[((n - 1) * n + col) as usize] });
    }
    let mut west = EdgeList::default();
    let mut east = EdgeList::default();
    for row in 0..n {
        let axis_param = row as f64 / (n - 1) as f64;
        west.0.push(EdgeVertex { axis_param, vertex_index: indices[(row * n) as usize] });
        east.0.push(EdgeVertex { axis_param, vertex_index: indices[(row * n + n - 1) as usize] });
    }
    out.west = west;
    out.south = south;
    out.east = east;
    out.north = north;

    out.recompute_normals(|v| lon_lat_height_to_ecef(v.lon, v.lat, v.height));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctod_geo::{Columns, GeoTransform, RasterSize, Rows, TmsId};

    fn flat_grid() -> ElevationGrid {
        let size = RasterSize::new(Rows(5), Columns(5));
        let transform = GeoTransform::new(4.0, 0.2, 52.0, -0.2);
        ElevationGrid::new(size, transform, vec![10.0; 25], Some(-9999.0))
    }

    fn geometry() -> WindowGeometry {
        WindowGeometry::new(TmsId::Wgs84, ctod_geo::Rect::new(4.0, 51.0, 5.0, 52.0))
    }

    #[test]
    fn produces_n_squared_vertices_and_two_triangles_per_cell() {
        let m = mesh(&flat_grid(), geometry(), 4).unwrap();
        assert_eq!(m.vertices.len(), 16);
        assert_eq!(m.triangles.len(), 2 * 3 * 3);
    }

    #[test]
    fn boundary_vertex_appears_in_exactly_one_edge_list_except_corners() {
        let m = mesh(&flat_grid(), geometry(), 4).unwrap();
        assert_eq!(m.west.0.len(), 4);
        assert_eq!(m.north.0.len(), 4);
        // corners shared between two lists, non-corner boundary vertices only one
        let nw_corner = m.west.0.iter().find(|e| e.axis_param == 0.0).unwrap().vertex_index;
        assert!(m.north.0.iter().any(|e| e.vertex_index == nw_corner));
    }

    #[test]
    fn flat_grid_yields_vertical_normals() {
        let m = mesh(&flat_grid(), geometry(), 4).unwrap();
        for n in &m.normals {
            assert!((n[2] - 1.0).abs() < 1e-3, "expected near-vertical normal, got {n:?}");
        }
    }
}
