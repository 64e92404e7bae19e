//! The Quantized-Mesh Encoder Facade (spec.md 4.H): serializes a stitched
//! `Mesh` to the quantized-mesh 1.0 binary layout with the
//! `octvertexnormals` extension. Byte-stable for a given input mesh: no
//! timestamps, no random IDs, no platform-dependent float formatting
//! (everything is written as fixed-width little-endian fields).

use std::io::Write;

use byteorder::{LittleEndian as LE, WriteBytesExt};
use ctod_geo::LatLonBounds;

use crate::ellipsoid::lon_lat_height_to_ecef;
use crate::error::{Error, Result};
use crate::mesh::Mesh;

const EXTENSION_ID_OCT_VERTEX_NORMALS: u8 = 1;

pub fn content_type() -> &'static str {
    "application/vnd.quantized-mesh;extensions=octvertexnormals"
}

fn zig_zag_encode(value: i32) -> u16 {
    ((value << 1) ^ (value >> 31)) as u16
}

fn oct_encode(n: [f32; 3]) -> (u8, u8) {
    let denom = n[0].abs() + n[1].abs() + n[2].abs();
    let (mut x, mut y) = if denom < 1e-20 { (0.0, 0.0) } else { (n[0] / denom, n[1] / denom) };
    if n[2] < 0.0 {
        let (ox, oy) = (x, y);
        x = (1.0 - oy.abs()) * if ox >= 0.0 { 1.0 } else { -1.0 };
        y = (1.0 - ox.abs()) * if oy >= 0.0 { 1.0 } else { -1.0 };
    }
    let to_byte = |v: f32| (((v * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0)) as u8;
    (to_byte(x), to_byte(y))
}

/// Reorders vertices into first-use order (the order in which the triangle
/// index array first references each one), which the high-water-mark index
/// encoding below requires: an index is only ever written as a *new*
/// high-water value the first time it appears.
fn first_use_order(mesh: &Mesh) -> Vec<u32> {
    let mut seen = vec![false; mesh.vertices.len()];
    let mut order = Vec::with_capacity(mesh.vertices.len());
    for tri in &mesh.triangles {
        for &idx in tri {
            if !seen[idx as usize] {
                seen[idx as usize] = true;
                order.push(idx);
            }
        }
    }
    for (idx, &was_seen) in seen.iter().enumerate() {
        if !was_seen {
            order.push(idx as u32);
        }
    }
    order
}

fn write_indices(out: &mut Vec<u8>, indices: &[u32], use_32_bit: bool) -> Result<()> {
    let mut highest: i64 = 0;
    for &idx in indices {
        let code = highest - idx as i64;
        if code < 0 {
            return Err(Error::EncodingFailed("index array violates first-use ordering".into()));
        }
        if use_32_bit {
            out.write_u32::<LE>(code as u32)?;
        } else {
            out.write_u16::<LE>(code as u16)?;
        }
        if idx as i64 == highest {
            highest += 1;
        }
    }
    Ok(())
}

/// Encodes `mesh` (already stitched) against the geographic bounds of the
/// tile it belongs to. `bounds` drives `u`/`v` quantization; height
/// quantization uses the mesh's own min/max height.
pub fn encode(mesh: &Mesh, bounds: LatLonBounds) -> Result<Vec<u8>> {
    let order = first_use_order(mesh);
    let mut old_to_new = vec![0u32; mesh.vertices.len()];
    for (new_idx, &old_idx) in order.iter().enumerate() {
        old_to_new[old_idx as usize] = new_idx as u32;
    }

    let vertex_count = order.len();
    let (min_height, max_height) = mesh.height_bounds();
    let height_span = (max_height - min_height).max(1e-6);
    let lon_span = (bounds.east - bounds.west).max(1e-12);
    let lat_span = (bounds.north - bounds.south).max(1e-12);

    let quantize = |v: f64, lo: f64, span: f64| -> i32 { (((v - lo) / span).clamp(0.0, 1.0) * 32767.0).round() as i32 };

    let mut us = Vec::with_capacity(vertex_count);
    let mut vs = Vec::with_capacity(vertex_count);
    let mut hs = Vec::with_capacity(vertex_count);
    let mut ecef_points = Vec::with_capacity(vertex_count);
    for &old_idx in &order {
        let vertex = mesh.vertices[old_idx as usize];
        us.push(quantize(vertex.lon, bounds.west, lon_span));
        vs.push(quantize(vertex.lat, bounds.south, lat_span));
        hs.push(quantize(vertex.height, min_height, height_span));
        ecef_points.push(lon_lat_height_to_ecef(vertex.lon, vertex.lat, vertex.height));
    }

    let center = bounding_sphere_center(&ecef_points);
    let radius = ecef_points.iter().map(|p| distance(*p, center)).fold(0.0f64, f64::max);

    let mut out = Vec::new();
    out.write_f64::<LE>(center[0])?;
    out.write_f64::<LE>(center[1])?;
    out.write_f64::<LE>(center[2])?;
    out.write_f32::<LE>(min_height as f32)?;
    out.write_f32::<LE>(max_height as f32)?;
    out.write_f64::<LE>(center[0])?;
    out.write_f64::<LE>(center[1])?;
    out.write_f64::<LE>(center[2])?;
    out.write_f64::<LE>(radius)?;
    // horizon occlusion point: approximated by the bounding sphere center
    // itself, which is always a conservative (never-occluding) choice.
    out.write_f64::<LE>(center[0])?;
    out.write_f64::<LE>(center[1])?;
    out.write_f64::<LE>(center[2])?;

    out.write_u32::<LE>(vertex_count as u32)?;
    write_delta_zigzag(&mut out, &us)?;
    write_delta_zigzag(&mut out, &vs)?;
    write_delta_zigzag(&mut out, &hs)?;

    let use_32_bit = vertex_count > u16::MAX as usize;
    let triangle_indices: Vec<u32> = mesh.triangles.iter().flat_map(|tri| tri.iter().map(|&i| old_to_new[i as usize])).collect();
    if use_32_bit {
        out.write_u32::<LE>(0)?; // padding so the index buffer is 4-byte aligned, per the wire format
    }
    out.write_u32::<LE>(mesh.triangles.len() as u32)?;
    write_indices(&mut out, &triangle_indices, use_32_bit)?;

    for edge in [&mesh.west, &mesh.south, &mesh.east, &mesh.north] {
        let remapped: Vec<u32> = edge.0.iter().map(|ev| old_to_new[ev.vertex_index as usize]).collect();
        out.write_u32::<LE>(remapped.len() as u32)?;
        for idx in remapped {
            if use_32_bit {
                out.write_u32::<LE>(idx)?;
            } else {
                out.write_u16::<LE>(idx as u16)?;
            }
        }
    }

    let mut normals_payload = Vec::with_capacity(vertex_count * 2);
    for &old_idx in &order {
        let (x, y) = oct_encode(mesh.normals[old_idx as usize]);
        normals_payload.push(x);
        normals_payload.push(y);
    }
    out.write_u8(EXTENSION_ID_OCT_VERTEX_NORMALS)?;
    out.write_u32::<LE>(normals_payload.len() as u32)?;
    out.write_all(&normals_payload)?;

    Ok(out)
}

fn write_delta_zigzag(out: &mut Vec<u8>, values: &[i32]) -> Result<()> {
    let mut previous = 0i32;
    for &value in values {
        let delta = value - previous;
        out.write_u16::<LE>(zig_zag_encode(delta))?;
        previous = value;
    }
    Ok(())
}

fn bounding_sphere_center(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0, 0.0, 0.0];
    }
    let mut sum = [0.0, 0.0, 0.0];
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    let n = points.len() as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// A lightweight etag derived from the encoded bytes, used for
/// `TileArtifact::etag` (spec.md 3) without pulling in a cryptographic hash.
pub fn etag(encoded: &[u8]) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = twox_hash::XxHash64::with_seed(0);
    encoded.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}
