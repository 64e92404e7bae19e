//! The Edge Stitcher (spec.md 4.G): reconciles the self-mesh's boundary
//! vertices against each present neighbor's matching edge, then the four
//! corners against up to three contributors each. Interior vertices and
//! triangles are never touched; only the boundary edge strips whose vertex
//! set gained points are re-triangulated.
//!
//! Axis parameters are quantized to 1/32768 (the quantized-mesh wire
//! resolution) before two vertices are deemed coincident, per spec.md 9.

use std::collections::BTreeMap;

use ctod_geo::constants::QUANTIZED_MESH_EDGE_RESOLUTION;

use crate::ellipsoid::geodetic_surface_normal;
use crate::mesh::{EdgeVertex, Mesh, Vertex};
use crate::neighbors::NeighborSet;

const QUANTIZATION: f64 = 1.0 / QUANTIZED_MESH_EDGE_RESOLUTION;

fn bucket(axis_param: f64) -> i64 {
    (axis_param * QUANTIZATION).round() as i64
}

#[derive(Debug, Clone, Copy)]
enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

fn corner_index(mesh: &Mesh, corner: Corner) -> Option<u32> {
    match corner {
        Corner::NorthWest => mesh.west.0.first().map(|e| e.vertex_index),
        Corner::NorthEast => mesh.north.0.last().map(|e| e.vertex_index),
        Corner::SouthWest => mesh.south.0.first().map(|e| e.vertex_index),
        Corner::SouthEast => mesh.south.0.last().map(|e| e.vertex_index),
    }
}

fn average_normals(normals: &[[f32; 3]]) -> [f32; 3] {
    let mut acc = [0f64; 3];
    for n in normals {
        acc[0] += n[0] as f64;
        acc[1] += n[1] as f64;
        acc[2] += n[2] as f64;
    }
    let len = (acc[0] * acc[0] + acc[1] * acc[1] + acc[2] * acc[2]).sqrt();
    if len < 1e-12 {
        [0.0, 0.0, 1.0]
    } else {
        [(acc[0] / len) as f32, (acc[1] / len) as f32, (acc[2] / len) as f32]
    }
}

fn interpolate_position(points: &[(f64, f64, f64)], axis_param: f64) -> (f64, f64) {
    for w in points.windows(2) {
        let (p0, p1) = (w[0], w[1]);
        if axis_param >= p0.0 && axis_param <= p1.0 {
            let span = p1.0 - p0.0;
            let t = if span.abs() < 1e-12 { 0.0 } else { (axis_param - p0.0) / span };
            return (p0.1 + t * (p1.1 - p0.1), p0.2 + t * (p1.2 - p0.2));
        }
    }
    points.last().map(|p| (p.1, p.2)).unwrap_or((0.0, 0.0))
}

/// Merges one self edge against the neighbor's opposite edge. Corner
/// buckets (axis_param 0 or 1) are left untouched here; `stitch_corner`
/// handles them with full visibility of both adjacent straight neighbors
/// plus the diagonal one. Returns the new edge (same length or longer) and
/// whether any vertex was inserted, which gates re-triangulation.
fn merge_side(self_mesh: &mut Mesh, self_edge: &[EdgeVertex], neighbor_mesh: &Mesh, neighbor_edge: &[EdgeVertex]) -> (Vec<EdgeVertex>, bool) {
    let max_bucket = QUANTIZATION as i64;
    let original_points: Vec<(f64, f64, f64)> = self_edge
        .iter()
        .map(|ev| {
            let v = self_mesh.vertices[ev.vertex_index as usize];
            (ev.axis_param, v.lon, v.lat)
        })
        .collect();

    let mut buckets: BTreeMap<i64, (Option<EdgeVertex>, Option<EdgeVertex>)> = BTreeMap::new();
    for &ev in self_edge {
        buckets.entry(bucket(ev.axis_param)).or_default().0 = Some(ev);
    }
    for &ev in neighbor_edge {
        let b = bucket(ev.axis_param);
        if b == 0 || b == max_bucket {
            continue; // corners are handled by stitch_corner
        }
        buckets.entry(b).or_default().1 = Some(ev);
    }

    let mut merged = Vec::with_capacity(buckets.len());
    let mut inserted_any = false;
    for (b, (self_v, neighbor_v)) in buckets {
        match (self_v, neighbor_v) {
            (Some(sv), Some(nv)) => {
                let idx = sv.vertex_index as usize;
                let n_idx = nv.vertex_index as usize;
                let height = (self_mesh.vertices[idx].height + neighbor_mesh.vertices[n_idx].height) / 2.0;
                let normal = average_normals(&[self_mesh.normals[idx], neighbor_mesh.normals[n_idx]]);
                self_mesh.vertices[idx].height = height;
                self_mesh.normals[idx] = normal;
                merged.push(sv);
            }
            (Some(sv), None) => merged.push(sv),
            (None, Some(nv)) => {
                let axis_param = b as f64 / QUANTIZATION;
                let (lon, lat) = interpolate_position(&original_points, axis_param);
                let n_idx = nv.vertex_index as usize;
                let height = neighbor_mesh.vertices[n_idx].height;
                let normal = neighbor_mesh.normals[n_idx];
                let new_idx = self_mesh.push_vertex(Vertex { lon, lat, height }, normal);
                merged.push(EdgeVertex { axis_param, vertex_index: new_idx });
                inserted_any = true;
            }
            (None, None) => unreachable!("bucket populated from at least one side"),
        }
    }
    merged.sort_by(|a, b| a.axis_param.partial_cmp(&b.axis_param).unwrap());
    (merged, inserted_any)
}

/// Re-triangulates the strip between consecutive *original* boundary
/// vertices that gained new vertices in between: finds the one existing
/// triangle that spans the original segment, removes it, and fans new
/// triangles from its interior apex to every vertex now on that segment,
/// preserving the original triangle's winding direction.
fn retriangulate_side(mesh: &mut Mesh, original: &[EdgeVertex], merged: &[EdgeVertex]) {
    if merged.len() == original.len() {
        return;
    }
    for w in original.windows(2) {
        let (a, b) = (w[0], w[1]);
        let between: Vec<EdgeVertex> = merged.iter().copied().filter(|v| v.axis_param > a.axis_param && v.axis_param < b.axis_param).collect();
        if between.is_empty() {
            continue;
        }
        let Some(pos) = mesh.triangles.iter().position(|tri| tri.contains(&a.vertex_index) && tri.contains(&b.vertex_index)) else {
            continue;
        };
        let tri = mesh.triangles.remove(pos);
        let anchor = *tri.iter().find(|&&v| v != a.vertex_index && v != b.vertex_index).unwrap();
        let forward = (0..3).any(|i| tri[i] == a.vertex_index && tri[(i + 1) % 3] == b.vertex_index);

        let mut chain = vec![a];
        chain.extend(between);
        chain.push(b);
        for pair in chain.windows(2) {
            let (x, y) = (pair[0].vertex_index, pair[1].vertex_index);
            if forward {
                mesh.triangles.push([anchor, x, y]);
            } else {
                mesh.triangles.push([anchor, y, x]);
            }
        }
    }
}

/// Overwrites the normal (never the height) of every non-corner vertex on
/// an edge with the geodetic surface normal, for edges with no neighbor at
/// all -- the "edge-of-world" convention (spec.md 3, `NeighborSet`).
fn apply_edge_of_world(mesh: &mut Mesh, edge: &[EdgeVertex]) {
    if edge.len() < 3 {
        return;
    }
    for ev in &edge[1..edge.len() - 1] {
        let v = mesh.vertices[ev.vertex_index as usize];
        mesh.normals[ev.vertex_index as usize] = geodetic_surface_normal(v.lon, v.lat);
    }
}

#[allow(clippy::too_many_arguments)]
fn stitch_corner(
    self_mesh: &mut Mesh,
    self_corner: Corner,
    vertical_neighbor: Option<&Mesh>,
    vertical_corner: Corner,
    horizontal_neighbor: Option<&Mesh>,
    horizontal_corner: Corner,
    diagonal_neighbor: Option<&Mesh>,
    diagonal_corner: Corner,
) {
    let Some(self_idx) = corner_index(self_mesh, self_corner) else { return };
    let self_idx = self_idx as usize;
    let (lon, lat) = (self_mesh.vertices[self_idx].lon, self_mesh.vertices[self_idx].lat);

    let mut heights = vec![self_mesh.vertices[self_idx].height];
    let mut normals = vec![self_mesh.normals[self_idx]];
    for (mesh_opt, corner) in [(vertical_neighbor, vertical_corner), (horizontal_neighbor, horizontal_corner), (diagonal_neighbor, diagonal_corner)] {
        if let Some(m) = mesh_opt {
            if let Some(idx) = corner_index(m, corner) {
                heights.push(m.vertices[idx as usize].height);
                normals.push(m.normals[idx as usize]);
            }
        }
    }

    if heights.len() > 1 {
        let avg_height = heights.iter().sum::<f64>() / heights.len() as f64;
        self_mesh.vertices[self_idx].height = avg_height;
        self_mesh.normals[self_idx] = average_normals(&normals);
    } else {
        self_mesh.normals[self_idx] = geodetic_surface_normal(lon, lat);
    }
}

/// Stitches `self_mesh` in place against every present neighbor in `neighbors`.
pub fn stitch(self_mesh: &mut Mesh, neighbors: &NeighborSet) {
    let orig_west = self_mesh.west.0.clone();
    let orig_south = self_mesh.south.0.clone();
    let orig_east = self_mesh.east.0.clone();
    let orig_north = self_mesh.north.0.clone();

    if let Some(neighbor) = &neighbors.west {
        let (merged, inserted) = merge_side(self_mesh, &orig_west, neighbor, &neighbor.east.0);
        if inserted {
            retriangulate_side(self_mesh, &orig_west, &merged);
        }
        self_mesh.west.0 = merged;
    } else {
        apply_edge_of_world(self_mesh, &orig_west);
    }

    if let Some(neighbor) = &neighbors.east {
        let (merged, inserted) = merge_side(self_mesh, &orig_east, neighbor, &neighbor.west.0);
        if inserted {
            retriangulate_side(self_mesh, &orig_east, &merged);
        }
        self_mesh.east.0 = merged;
    } else {
        apply_edge_of_world(self_mesh, &orig_east);
    }

    if let Some(neighbor) = &neighbors.north {
        let (merged, inserted) = merge_side(self_mesh, &orig_north, neighbor, &neighbor.south.0);
        if inserted {
            retriangulate_side(self_mesh, &orig_north, &merged);
        }
        self_mesh.north.0 = merged;
    } else {
        apply_edge_of_world(self_mesh, &orig_north);
    }

    if let Some(neighbor) = &neighbors.south {
        let (merged, inserted) = merge_side(self_mesh, &orig_south, neighbor, &neighbor.north.0);
        if inserted {
            retriangulate_side(self_mesh, &orig_south, &merged);
        }
        self_mesh.south.0 = merged;
    } else {
        apply_edge_of_world(self_mesh, &orig_south);
    }

    stitch_corner(
        self_mesh,
        Corner::NorthWest,
        neighbors.north.as_ref(),
        Corner::SouthWest,
        neighbors.west.as_ref(),
        Corner::NorthEast,
        neighbors.north_west.as_ref(),
        Corner::SouthEast,
    );
    stitch_corner(
        self_mesh,
        Corner::NorthEast,
        neighbors.north.as_ref(),
        Corner::SouthEast,
        neighbors.east.as_ref(),
        Corner::NorthWest,
        neighbors.north_east.as_ref(),
        Corner::SouthWest,
    );
    stitch_corner(
        self_mesh,
        Corner::SouthWest,
        neighbors.south.as_ref(),
        Corner::NorthWest,
        neighbors.west.as_ref(),
        Corner::SouthEast,
        neighbors.south_west.as_ref(),
        Corner::NorthEast,
    );
    stitch_corner(
        self_mesh,
        Corner::SouthEast,
        neighbors.south.as_ref(),
        Corner::NorthEast,
        neighbors.east.as_ref(),
        Corner::SouthWest,
        neighbors.south_east.as_ref(),
        Corner::NorthWest,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::NeighborSet;

    /// A flat 3x3 grid mesh spanning `[lon0, lon0+1] x [lat0, lat0+1]` at a
    /// constant height, with edge lists following the shared axis-parameter
    /// convention (north/south west-to-east, west/east north-to-south).
    fn flat_mesh(lon0: f64, lat0: f64, height: f64) -> Mesh {
        let mut mesh = Mesh::default();
        let mut idx = [[0u32; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                let lon = lon0 + col as f64 * 0.5;
                let lat = lat0 + 1.0 - row as f64 * 0.5;
                idx[row][col] = mesh.push_vertex(Vertex { lon, lat, height }, [0.0, 0.0, 1.0]);
            }
        }
        for row in 0..2 {
            for col in 0..2 {
                mesh.triangles.push([idx[row][col], idx[row][col + 1], idx[row + 1][col + 1]]);
                mesh.triangles.push([idx[row][col], idx[row + 1][col + 1], idx[row + 1][col]]);
            }
        }
        mesh.north.0 = vec![
            EdgeVertex { axis_param: 0.0, vertex_index: idx[0][0] },
            EdgeVertex { axis_param: 0.5, vertex_index: idx[0][1] },
            EdgeVertex { axis_param: 1.0, vertex_index: idx[0][2] },
        ];
        mesh.south.0 = vec![
            EdgeVertex { axis_param: 0.0, vertex_index: idx[2][0] },
            EdgeVertex { axis_param: 0.5, vertex_index: idx[2][1] },
            EdgeVertex { axis_param: 1.0, vertex_index: idx[2][2] },
        ];
        mesh.west.0 = vec![
            EdgeVertex { axis_param: 0.0, vertex_index: idx[0][0] },
            EdgeVertex { axis_param: 0.5, vertex_index: idx[1][0] },
            EdgeVertex { axis_param: 1.0, vertex_index: idx[2][0] },
        ];
        mesh.east.0 = vec![
            EdgeVertex { axis_param: 0.0, vertex_index: idx[0][2] },
            EdgeVertex { axis_param: 0.5, vertex_index: idx[1][2] },
            EdgeVertex { axis_param: 1.0, vertex_index: idx[2][2] },
        ];
        mesh
    }

    #[test]
    fn isolated_tile_gets_edge_of_world_normals_but_unchanged_heights() {
        let mut mesh = flat_mesh(0.0, 0.0, 10.0);
        let before_heights: Vec<f64> = mesh.vertices.iter().map(|v| v.height).collect();
        stitch(&mut mesh, &NeighborSet::default());
        let after_heights: Vec<f64> = mesh.vertices.iter().map(|v| v.height).collect();
        assert_eq!(before_heights, after_heights);
        for ev in &mesh.north.0 {
            let v = mesh.vertices[ev.vertex_index as usize];
            let expected = geodetic_surface_normal(v.lon, v.lat);
            assert_eq!(mesh.normals[ev.vertex_index as usize], expected);
        }
    }

    #[test]
    fn west_neighbor_averages_shared_edge_heights() {
        let mut self_mesh = flat_mesh(1.0, 0.0, 10.0);
        let west_neighbor = flat_mesh(0.5, 0.0, 20.0);
        let mut neighbors = NeighborSet::default();
        neighbors.west = Some(west_neighbor);
        stitch(&mut self_mesh, &neighbors);
        // interior (non-corner) west-edge vertex should average to 15.0
        let mid = self_mesh.west.0[1];
        assert_eq!(self_mesh.vertices[mid.vertex_index as usize].height, 15.0);
    }

    #[test]
    fn corner_averages_three_contributors() {
        let mut self_mesh = flat_mesh(1.0, 0.0, 0.0);
        let north = flat_mesh(1.0, 1.0, 10.0);
        let west = flat_mesh(0.5, 0.0, 20.0);
        let north_west = flat_mesh(0.5, 1.0, 30.0);
        let mut neighbors = NeighborSet::default();
        neighbors.north = Some(north);
        neighbors.west = Some(west);
        neighbors.north_west = Some(north_west);
        stitch(&mut self_mesh, &neighbors);
        let nw_idx = self_mesh.west.0.first().unwrap().vertex_index;
        // self (0) + north (10) + west (20) + north_west (30), averaged
        assert_eq!(self_mesh.vertices[nw_idx as usize].height, 15.0);
    }

    #[test]
    fn finer_neighbor_inserts_vertices_without_degenerate_triangles() {
        let mut self_mesh = flat_mesh(1.0, 0.0, 5.0);
        let mut west_neighbor = flat_mesh(0.5, 0.0, 5.0);
        // add an extra vertex on the neighbor's east edge at axis_param 0.25
        let extra_lat = west_neighbor.vertices[0].lat - 0.125;
        let extra = west_neighbor.push_vertex(Vertex { lon: west_neighbor.vertices[2].lon, lat: extra_lat, height: 50.0 }, [0.0, 0.0, 1.0]);
        west_neighbor.east.0.insert(1, EdgeVertex { axis_param: 0.25, vertex_index: extra });

        let before_triangle_count = self_mesh.triangles.len();
        let mut neighbors = NeighborSet::default();
        neighbors.west = Some(west_neighbor);
        stitch(&mut self_mesh, &neighbors);

        assert!(self_mesh.triangles.len() > before_triangle_count);
        assert_eq!(self_mesh.west.0.len(), 4);
        for &tri in &self_mesh.triangles {
            assert!(self_mesh.triangle_area(tri) > 0.0, "degenerate triangle after stitching: {tri:?}");
        }
    }
}
