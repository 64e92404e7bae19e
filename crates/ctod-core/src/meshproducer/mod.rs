//! Dispatches an `ElevationGrid` to one of the three meshing algorithms
//! (spec.md 4.F), each behind the same small capability: `mesh(grid,
//! geometry, params) -> Mesh`. The method tag lives in `DatasetConfig`;
//! this module just routes to the matching implementation.

pub mod delatin;
pub mod grid;
pub mod martini;

use ctod_geo::ElevationGrid;

use crate::dataset::MeshingMethod;
use crate::error::Result;
use crate::geometry::WindowGeometry;
use crate::mesh::Mesh;
use crate::windowkey::MeshParam;

pub fn produce_mesh(method: MeshingMethod, elevation: &ElevationGrid, geometry: WindowGeometry, param: MeshParam) -> Result<Mesh> {
    match (method, param) {
        (MeshingMethod::Grid, MeshParam::GridSize(n)) => grid::mesh(elevation, geometry, n),
        (MeshingMethod::Martini, MeshParam::MaxError(max_error)) => martini::mesh(elevation, geometry, max_error),
        (MeshingMethod::Delatin, MeshParam::MaxError(max_error)) => delatin::mesh(elevation, geometry, max_error),
        (method, param) => Err(crate::Error::Internal(format!(
            "meshing method {method} does not match its window parameter {param:?}"
        ))),
    }
}
