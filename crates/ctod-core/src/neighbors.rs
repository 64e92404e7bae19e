//! `NeighborSet`: the eight tiles (compass-rose) surrounding a self-tile,
//! each an already-meshed (but not yet stitched) `Mesh`. A side is `None`
//! when the tile sits on the dataset's edge or the neighbor's window fetch
//! failed softly (spec.md 4.E: `SourceUnavailable` on a neighbor is soft).

use ctod_geo::Tile;

use crate::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Side {
    pub const ALL: [Side; 8] = [
        Side::North,
        Side::South,
        Side::East,
        Side::West,
        Side::NorthEast,
        Side::NorthWest,
        Side::SouthEast,
        Side::SouthWest,
    ];

    pub fn is_straight(self) -> bool {
        matches!(self, Side::North | Side::South | Side::East | Side::West)
    }
}

#[derive(Debug, Default)]
pub struct NeighborSet {
    pub north: Option<Mesh>,
    pub south: Option<Mesh>,
    pub east: Option<Mesh>,
    pub west: Option<Mesh>,
    pub north_east: Option<Mesh>,
    pub north_west: Option<Mesh>,
    pub south_east: Option<Mesh>,
    pub south_west: Option<Mesh>,
}

impl NeighborSet {
    pub fn get(&self, side: Side) -> Option<&Mesh> {
        match side {
            Side::North => self.north.as_ref(),
            Side::South => self.south.as_ref(),
            Side::East => self.east.as_ref(),
            Side::West => self.west.as_ref(),
            Side::NorthEast => self.north_east.as_ref(),
            Side::NorthWest => self.north_west.as_ref(),
            Side::SouthEast => self.south_east.as_ref(),
            Side::SouthWest => self.south_west.as_ref(),
        }
    }

    pub fn set(&mut self, side: Side, mesh: Mesh) {
        match side {
            Side::North => self.north = Some(mesh),
            Side::South => self.south = Some(mesh),
            Side::East => self.east = Some(mesh),
            Side::West => self.west = Some(mesh),
            Side::NorthEast => self.north_east = Some(mesh),
            Side::NorthWest => self.north_west = Some(mesh),
            Side::SouthEast => self.south_east = Some(mesh),
            Side::SouthWest => self.south_west = Some(mesh),
        }
    }

    pub fn is_empty(&self) -> bool {
        Side::ALL.iter().all(|&s| self.get(s).is_none())
    }
}

/// The tile adjacent to `tile` on `side`, or `None` if it falls outside the
/// tile matrix (off the top/bottom of the world; `x` always wraps around
/// the antimeridian the way `Tile::east`/`Tile::west` do).
pub fn neighbor_tile(tile: Tile, side: Side) -> Option<Tile> {
    let width = tile.tms.matrix_width(tile.z);
    let wrap_x = |x: i64| x.rem_euclid(width);
    match side {
        Side::North => Tile::new(tile.tms, tile.z, tile.x, tile.y - 1).ok(),
        Side::South => Tile::new(tile.tms, tile.z, tile.x, tile.y + 1).ok(),
        Side::East => Tile::new(tile.tms, tile.z, wrap_x(tile.x + 1), tile.y).ok(),
        Side::West => Tile::new(tile.tms, tile.z, wrap_x(tile.x - 1), tile.y).ok(),
        Side::NorthEast => Tile::new(tile.tms, tile.z, wrap_x(tile.x + 1), tile.y - 1).ok(),
        Side::NorthWest => Tile::new(tile.tms, tile.z, wrap_x(tile.x - 1), tile.y - 1).ok(),
        Side::SouthEast => Tile::new(tile.tms, tile.z, wrap_x(tile.x + 1), tile.y + 1).ok(),
        Side::SouthWest => Tile::new(tile.tms, tile.z, wrap_x(tile.x - 1), tile.y + 1).ok(),
    }
}

#[cfg(test)]
mod neighbor_tile_tests {
    use super::*;
    use ctod_geo::TmsId;

    #[test]
    fn root_tile_has_no_north_or_south_neighbor() {
        let root = Tile::new(TmsId::WebMercatorQuad, 0, 0, 0).unwrap();
        assert!(neighbor_tile(root, Side::North).is_none());
        assert!(neighbor_tile(root, Side::South).is_none());
    }

    #[test]
    fn east_neighbor_wraps_around_the_antimeridian() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 2, 3, 1).unwrap();
        let east = neighbor_tile(tile, Side::East).unwrap();
        assert_eq!((east.x, east.y), (0, 1));
    }

    #[test]
    fn interior_tile_has_all_eight_neighbors() {
        let tile = Tile::new(TmsId::WebMercatorQuad, 4, 8, 8).unwrap();
        for side in Side::ALL {
            assert!(neighbor_tile(tile, side).is_some(), "missing neighbor {side:?}");
        }
    }
}
