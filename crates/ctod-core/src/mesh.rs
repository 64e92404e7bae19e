//! The `Mesh` type shared by every mesh producer, the edge stitcher and the
//! quantized-mesh encoder: a triangulated, per-vertex-normaled surface plus
//! the four boundary edge-vertex lists spec.md 3 requires for stitching.

/// A triangulated vertex: geographic position plus height in meters above
/// the reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
}

/// One entry in a boundary edge list: `axis_param` is the vertex's position
/// along the edge in `[0, 1]`, `vertex_index` indexes into `Mesh::vertices`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeVertex {
    pub axis_param: f64,
    pub vertex_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeList(pub Vec<EdgeVertex>);

impl EdgeList {
    pub fn sorted_by_axis_param(mut self) -> Self {
        self.0.sort_by(|a, b| a.axis_param.partial_cmp(&b.axis_param).unwrap());
        self
    }
}

/// A triangulated surface with per-vertex unit normals and explicit
/// boundary edge lists for the four sides of the tile. `triangles` indexes
/// into `vertices`/`normals` (always the same length).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub normals: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    pub west: EdgeList,
    pub south: EdgeList,
    pub east: EdgeList,
    pub north: EdgeList,
}

impl Mesh {
    pub fn push_vertex(&mut self, vertex: Vertex, normal: [f32; 3]) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        self.normals.push(normal);
        index
    }

    pub fn height_bounds(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in &self.vertices {
            min = min.min(v.height);
            max = max.max(v.height);
        }
        if !min.is_finite() {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }

    /// Recomputes every vertex normal by averaging incident face normals
    /// and renormalizing, skipping degenerate faces. Shared by every mesh
    /// producer (spec.md 4.F: "per-vertex normals are computed by averaging
    /// incident face normals ... degenerate faces are skipped").
    pub fn recompute_normals(&mut self, to_ecef: impl Fn(Vertex) -> [f64; 3]) {
        let mut accum = vec![[0.0f64; 3]; self.vertices.len()];
        for tri in &self.triangles {
            let p0 = to_ecef(self.vertices[tri[0] as usize]);
            let p1 = to_ecef(self.vertices[tri[1] as usize]);
            let p2 = to_ecef(self.vertices[tri[2] as usize]);
            let e1 = sub(p1, p0);
            let e2 = sub(p2, p0);
            let n = cross(e1, e2);
            let len = dot(n, n).sqrt();
            if len < 1e-12 {
                continue; // degenerate triangle, no contribution
            }
            let n = [n[0] / len, n[1] / len, n[2] / len];
            for idx in tri {
                let a = &mut accum[*idx as usize];
                a[0] += n[0];
                a[1] += n[1];
                a[2] += n[2];
            }
        }
        for (i, a) in accum.into_iter().enumerate() {
            let len = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
            self.normals[i] = if len < 1e-12 {
                [0.0, 0.0, 1.0]
            } else {
                [(a[0] / len) as f32, (a[1] / len) as f32, (a[2] / len) as f32]
            };
        }
    }

    /// Triangle area in the (lon, lat) plane, used to detect degenerate
    /// triangles (spec.md 3 invariant: area above a floor epsilon).
    pub fn triangle_area(&self, tri: [u32; 3]) -> f64 {
        let a = self.vertices[tri[0] as usize];
        let b = self.vertices[tri[1] as usize];
        let c = self.vertices[tri[2] as usize];
        0.5 * ((b.lon - a.lon) * (c.lat - a.lat) - (c.lon - a.lon) * (b.lat - a.lat)).abs()
    }

    /// The fixed empty-tile mesh (spec.md 4.E step 2, 8 invariant 4): four
    /// corner vertices at height 0, two triangles, each normal the geodetic
    /// surface normal at its own corner -- independent of meshing method.
    pub fn empty_tile(bounds: ctod_geo::LatLonBounds) -> Mesh {
        let mut mesh = Mesh::default();
        let corners = [
            (bounds.west, bounds.north),
            (bounds.east, bounds.north),
            (bounds.east, bounds.south),
            (bounds.west, bounds.south),
        ];
        let mut idx = [0u32; 4];
        for (i, &(lon, lat)) in corners.iter().enumerate() {
            let normal = crate::ellipsoid::geodetic_surface_normal(lon, lat);
            idx[i] = mesh.push_vertex(Vertex { lon, lat, height: 0.0 }, normal);
        }
        mesh.triangles.push([idx[0], idx[1], idx[2]]);
        mesh.triangles.push([idx[0], idx[2], idx[3]]);

        mesh.north.0 = vec![EdgeVertex { axis_param: 0.0, vertex_index: idx[0] }, EdgeVertex { axis_param: 1.0, vertex_index: idx[1] }];
        mesh.east.0 = vec![EdgeVertex { axis_param: 0.0, vertex_index: idx[1] }, EdgeVertex { axis_param: 1.0, vertex_index: idx[2] }];
        mesh.south.0 = vec![EdgeVertex { axis_param: 0.0, vertex_index: idx[3] }, EdgeVertex { axis_param: 1.0, vertex_index: idx[2] }];
        mesh.west.0 = vec![EdgeVertex { axis_param: 0.0, vertex_index: idx[0] }, EdgeVertex { axis_param: 1.0, vertex_index: idx[3] }];
        mesh
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipsoid::lon_lat_height_to_ecef;

    fn to_ecef(v: Vertex) -> [f64; 3] {
        lon_lat_height_to_ecef(v.lon, v.lat, v.height)
    }

    #[test]
    fn recompute_normals_gives_unit_length_normals() {
        let mut mesh = Mesh::default();
        mesh.push_vertex(Vertex { lon: 4.0, lat: 51.0, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.push_vertex(Vertex { lon: 4.1, lat: 51.0, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.push_vertex(Vertex { lon: 4.1, lat: 51.1, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.triangles.push([0, 1, 2]);
        mesh.recompute_normals(to_ecef);
        for n in &mesh.normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-3, "normal not unit length: {n:?}");
        }
    }

    #[test]
    fn degenerate_triangle_is_skipped_without_panicking() {
        let mut mesh = Mesh::default();
        mesh.push_vertex(Vertex { lon: 4.0, lat: 51.0, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.push_vertex(Vertex { lon: 4.0, lat: 51.0, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.push_vertex(Vertex { lon: 4.0, lat: 51.0, height: 0.0 }, [0.0, 0.0, 1.0]);
        mesh.triangles.push([0, 1, 2]);
        mesh.recompute_normals(to_ecef);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn height_bounds_tracks_min_and_max() {
        let mut mesh = Mesh::default();
        mesh.push_vertex(Vertex { lon: 0.0, lat: 0.0, height: -5.0 }, [0.0, 0.0, 1.0]);
        mesh.push_vertex(Vertex { lon: 0.0, lat: 0.0, height: 12.0 }, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.height_bounds(), (-5.0, 12.0));
    }

    #[test]
    fn empty_tile_has_four_corners_two_triangles_and_zero_height() {
        use crate::ellipsoid::geodetic_surface_normal;
        let bounds = ctod_geo::LatLonBounds::new(51.0, 4.0, 52.0, 5.0);
        let mesh = Mesh::empty_tile(bounds);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.height_bounds(), (0.0, 0.0));
        for (vertex, normal) in mesh.vertices.iter().zip(&mesh.normals) {
            assert_eq!(*normal, geodetic_surface_normal(vertex.lon, vertex.lat));
        }
    }
}
