use crate::constants::ROOM_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid coordinate of a room on the world map.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct RoomCoord {
    pub x: i32,
    pub y: i32,
}

impl RoomCoord {
    pub fn new(x: i32, y: i32) -> RoomCoord {
        RoomCoord { x, y }
    }
}

impl fmt::Display for RoomCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}x{}", self.x, self.y)
    }
}

/// A tile position within a room.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Position {
    pub room: RoomCoord,
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(room: RoomCoord, x: u8, y: u8) -> Position {
        Position { room, x, y }
    }

    fn global_x(&self) -> i64 {
        self.room.x as i64 * ROOM_SIZE as i64 + self.x as i64
    }

    fn global_y(&self) -> i64 {
        self.room.y as i64 * ROOM_SIZE as i64 + self.y as i64
    }

    /// Chebyshev distance, valid across room borders.
    pub fn range_to(&self, other: Position) -> u32 {
        let dx = (self.global_x() - other.global_x()).unsigned_abs();
        let dy = (self.global_y() - other.global_y()).unsigned_abs();

        dx.max(dy) as u32
    }

    pub fn in_range_to(&self, other: Position, range: u32) -> bool {
        self.range_to(other) <= range
    }

    pub fn is_near_to(&self, other: Position) -> bool {
        self.in_range_to(other, 1)
    }

    /// True when the tile is within `margin + 1` tiles of a room border.
    /// `is_near_exit(0)` covers border tiles and their direct neighbors.
    pub fn is_near_exit(&self, margin: u8) -> bool {
        let limit = margin + 1;

        self.x <= limit || self.x >= ROOM_SIZE - 1 - limit || self.y <= limit || self.y >= ROOM_SIZE - 1 - limit
    }

    /// True when the tile sits on the room border itself.
    pub fn is_exit(&self) -> bool {
        self.x == 0 || self.x == ROOM_SIZE - 1 || self.y == 0 || self.y == ROOM_SIZE - 1
    }

    /// The eight surrounding tiles that stay within the same room.
    pub fn neighbors(&self) -> impl Iterator<Item = Position> + '_ {
        let room = self.room;
        let (x, y) = (self.x as i16, self.y as i16);

        DIRECTIONS.iter().filter_map(move |(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);

            if nx >= 0 && ny >= 0 && nx < ROOM_SIZE as i16 && ny < ROOM_SIZE as i16 {
                Some(Position::new(room, nx as u8, ny as u8))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{},{}", self.room, self.x, self.y)
    }
}

pub static DIRECTIONS: [(i16, i16); 8] = [(0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1)];
