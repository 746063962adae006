use crate::constants::ROOM_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Terrain {
    Plain,
    Swamp,
    Blocked,
}

impl Terrain {
    /// Base traversal cost, `None` for impassable tiles.
    pub fn cost(self) -> Option<u8> {
        match self {
            Terrain::Plain => Some(2),
            Terrain::Swamp => Some(10),
            Terrain::Blocked => None,
        }
    }
}

/// Per-room terrain layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainGrid {
    cells: Vec<Terrain>,
}

impl TerrainGrid {
    /// An all-plain room.
    pub fn open() -> TerrainGrid {
        TerrainGrid {
            cells: vec![Terrain::Plain; ROOM_SIZE as usize * ROOM_SIZE as usize],
        }
    }

    pub fn get(&self, x: u8, y: u8) -> Terrain {
        self.cells[y as usize * ROOM_SIZE as usize + x as usize]
    }

    pub fn set(&mut self, x: u8, y: u8, terrain: Terrain) {
        self.cells[y as usize * ROOM_SIZE as usize + x as usize] = terrain;
    }

    pub fn is_walkable(&self, x: u8, y: u8) -> bool {
        self.get(x, y) != Terrain::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_grid_is_walkable_everywhere() {
        let grid = TerrainGrid::open();

        assert!(grid.is_walkable(0, 0));
        assert!(grid.is_walkable(49, 49));
    }

    #[test]
    fn blocked_tiles_have_no_cost() {
        let mut grid = TerrainGrid::open();
        grid.set(3, 4, Terrain::Blocked);

        assert_eq!(grid.get(3, 4).cost(), None);
        assert_eq!(grid.get(3, 5).cost(), Some(2));
    }
}
