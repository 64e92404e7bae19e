//! The `delatin` meshing method: greedy Delaunay refinement. Starting from
//! the four tile corners, repeatedly inserts the sample point with the
//! largest vertical error against the current triangulation's linear
//! interpolation, until every remaining sample is within `max_error`. The
//! triangulation itself is delegated to `spade`, the Delaunay crate the
//! retrieval pack's own geometry code reaches for.

use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};

use ctod_geo::ElevationGrid;

use crate::ellipsoid::lon_lat_height_to_ecef;
use crate::error::{Error, Result};
use crate::geometry::WindowGeometry;
use crate::mesh::{EdgeList, EdgeVertex, Mesh, Vertex};

/// Bound on the working sample grid and the number of inserted vertices:
/// this is a straightforward (not performance-tuned) greedy refinement, so
/// both are capped to keep a single request's CPU cost bounded.
const MAX_SAMPLE_SIZE: usize = 65;
const MAX_VERTICES: usize = 1500;

#[derive(Clone, Copy)]
struct GridPoint {
    col: f64,
    row: f64,
    height: f64,
}

impl HasPosition for GridPoint {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        Point2::new(self.col, self.row)
    }
}

fn barycentric_height(tri: [GridPoint; 3], col: f64, row: f64) -> Option<f64> {
    let (x1, y1) = (tri[0].col, tri[0].row);
    let (x2, y2) = (tri[1].col, tri[1].row);
    let (x3, y3) = (tri[2].col, tri[2].row);
    let denom = (y2 - y3) * (x1 - x3) + (x3 - x2) * (y1 - y3);
    if denom.abs() < 1e-12 {
        return None;
    }
    let a = ((y2 - y3) * (col - x3) + (x3 - x2) * (row - y3)) / denom;
    let b = ((y3 - y1) * (col - x3) + (x1 - x3) * (row - y3)) / denom;
    let c = 1.0 - a - b;
    const EPS: f64 = -1e-6;
    if a >= EPS && b >= EPS && c >= EPS {
        Some(a * tri[0].height + b * tri[1].height + c * tri[2].height)
    } else {
        None
    }
}

fn triangles_of(t: &DelaunayTriangulation<GridPoint>) -> Vec<[GridPoint; 3]> {
    t.inner_faces()
        .map(|face| {
            let v = face.vertices();
            [*v[0].data(), *v[1].data(), *v[2].data()]
        })
        .collect()
}

pub fn mesh(elevation: &ElevationGrid, geometry: WindowGeometry, max_error: f64) -> Result<Mesh> {
    let source_size = elevation.size();
    let rows = (source_size.rows.0 as usize).clamp(2, MAX_SAMPLE_SIZE);
    let cols = (source_size.cols.0 as usize).clamp(2, MAX_SAMPLE_SIZE);

    let mut samples = vec![0f32; rows * cols];
    for row in 0..rows {
        let row_frac = row as f64 / (rows - 1) as f64;
        for col in 0..cols {
            let col_frac = col as f64 / (cols - 1) as f64;
            let sample_col = col_frac * (source_size.cols.0 - 1) as f64;
            let sample_row = row_frac * (source_size.rows.0 - 1) as f64;
            samples[row * cols + col] = elevation.sample_bilinear(sample_col, sample_row);
        }
    }
    let height_at = |row: usize, col: usize| samples[row * cols + col] as f64;

    let mut triangulation = DelaunayTriangulation::<GridPoint>::new();
    for &(row, col) in &[(0usize, 0usize), (0, cols - 1), (rows - 1, cols - 1), (rows - 1, 0)] {
        triangulation
            .insert(GridPoint { col: col as f64, row: row as f64, height: height_at(row, col) })
            .map_err(|e| Error::MeshingFailed(format!("delaunay insertion failed: {e:?}")))?;
    }

    let mut inserted = vec![vec![false; cols]; rows];
    for &(row, col) in &[(0usize, 0usize), (0, cols - 1), (rows - 1, cols - 1), (rows - 1, 0)] {
        inserted[row][col] = true;
    }

    loop {
        if triangulation.num_vertices() >= MAX_VERTICES {
            break;
        }
        let triangles = triangles_of(&triangulation);
        let mut worst: Option<(usize, usize, f64)> = None;
        for row in 0..rows {
            for col in 0..cols {
                if inserted[row][col] {
                    continue;
                }
                let actual = height_at(row, col);
                let interpolated = triangles
                    .iter()
                    .find_map(|tri| barycentric_height(*tri, col as f64, row as f64))
                    .unwrap_or(actual);
                let error = (actual - interpolated).abs();
                if worst.map(|(_, _, e)| error > e).unwrap_or(true) {
                    worst = Some((row, col, error));
                }
            }
        }

        match worst {
            Some((row, col, error)) if error > max_error => {
                inserted[row][col] = true;
                triangulation
                    .insert(GridPoint { col: col as f64, row: row as f64, height: height_at(row, col) })
                    .map_err(|e| Error::MeshingFailed(format!("delaunay insertion failed: {e:?}")))?;
            }
            _ => break,
        }
    }

    let triangles = triangles_of(&triangulation);
    let mut out = Mesh::default();
    let mut west = EdgeList::default();
    let mut east = EdgeList::default();
    let mut north = EdgeList::default();
    let mut south = EdgeList::default();

    // `spade` vertex data is copied per face, so there is no stable vertex
    // index to key on; re-key by (row, col) as every inserted point is unique.
    let mut index_of = std::collections::HashMap::new();
    let mut vertex_index_for = |out: &mut Mesh, p: GridPoint| -> u32 {
        let key = (p.row.round() as i64, p.col.round() as i64);
        if let Some(&idx) = index_of.get(&key) {
            return idx;
        }
        let col_frac = p.col / (cols - 1) as f64;
        let row_frac = p.row / (rows - 1) as f64;
        let (lon, lat) = geometry.lon_lat_at(col_frac, row_frac);
        let idx = out.push_vertex(Vertex { lon, lat, height: p.height }, [0.0, 0.0, 1.0]);
        index_of.insert(key, idx);
        idx
    };

    for tri in &triangles {
        let indices = [
            vertex_index_for(&mut out, tri[0]),
            vertex_index_for(&mut out, tri[1]),
            vertex_index_for(&mut out, tri[2]),
        ];
        out.triangles.push(indices);
    }

    for (&(row, col), &idx) in &index_of {
        if row == 0 {
            north.0.push(EdgeVertex { axis_param: col as f64 / (cols - 1) as f64, vertex_index: idx });
        }
        if row == rows as i64 - 1 {
            south.0.push(EdgeVertex { axis_param: col as f64 / (cols - 1) as f64, vertex_index: idx });
        }
        if col == 0 {
            west.0.push(EdgeVertex { axis_param: row as f64 / (rows - 1) as f64, vertex_index: idx });
        }
        if col == cols as i64 - 1 {
            east.0.push(EdgeVertex { axis_param: row as f64 / (rows - 1) as f64, vertex_index: idx });
        }
    }
    out.west = west.sorted_by_axis_param();
    out.east = east.sorted_by_axis_param();
    out.north = north.sorted_by_axis_param();
    out.south = south.sorted_by_axis_param();

    out.recompute_normals(|v| lon_lat_height_to_ecef(v.lon, v.lat, v.height));
    Ok(out)
}
