use super::position::{Position, RoomCoord};
use super::terrain::TerrainGrid;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a world object (structure, work item, source or unit).
/// Lookups by id return `None` once the object is destroyed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub(crate) fn from_index(index: u128) -> ObjectId {
        ObjectId(Uuid::from_u128(index))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum StructureKind {
    Spawn,
    Extension,
    Storage,
    Terminal,
    Tower,
    Rampart,
    Wall,
    Road,
    Container,
}

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct KindFlags: u16 {
        const SPAWN = 1;
        const EXTENSION = 1 << 1;
        const STORAGE = 1 << 2;
        const TERMINAL = 1 << 3;
        const TOWER = 1 << 4;
        const RAMPART = 1 << 5;
        const WALL = 1 << 6;
        const ROAD = 1 << 7;
        const CONTAINER = 1 << 8;

        /// Work items built ahead of everything else.
        const PRIORITY_BUILD = Self::RAMPART.bits() | Self::WALL.bits() | Self::TOWER.bits();
        /// Defensive fortifications considered by wear-threshold targeting.
        const FORTIFICATION = Self::RAMPART.bits() | Self::WALL.bits();
        /// Bulk resource stores the combat pathfinder must not route through.
        const BULK_STORE = Self::STORAGE.bits() | Self::TERMINAL.bits();
    }
}

impl StructureKind {
    pub fn flag(self) -> KindFlags {
        match self {
            StructureKind::Spawn => KindFlags::SPAWN,
            StructureKind::Extension => KindFlags::EXTENSION,
            StructureKind::Storage => KindFlags::STORAGE,
            StructureKind::Terminal => KindFlags::TERMINAL,
            StructureKind::Tower => KindFlags::TOWER,
            StructureKind::Rampart => KindFlags::RAMPART,
            StructureKind::Wall => KindFlags::WALL,
            StructureKind::Road => KindFlags::ROAD,
            StructureKind::Container => KindFlags::CONTAINER,
        }
    }

    pub fn is(self, flags: KindFlags) -> bool {
        flags.contains(self.flag())
    }

    /// Wear ceiling of a finished structure of this kind.
    pub fn max_hits(self) -> u32 {
        match self {
            StructureKind::Spawn => 5_000,
            StructureKind::Extension => 1_000,
            StructureKind::Storage => 10_000,
            StructureKind::Terminal => 3_000,
            StructureKind::Tower => 3_000,
            StructureKind::Rampart => 300_000,
            StructureKind::Wall => 300_000,
            StructureKind::Road => 5_000,
            StructureKind::Container => 250_000,
        }
    }

    /// Wear a finished structure starts with. Fortifications come online
    /// nearly destroyed and rely on follow-up repair.
    pub fn initial_hits(self, hits_max: u32) -> u32 {
        if self.is(KindFlags::FORTIFICATION) {
            1
        } else {
            hits_max
        }
    }
}

/// A damageable / repairable structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Structure {
    pub id: ObjectId,
    pub kind: StructureKind,
    pub pos: Position,
    pub hits: u32,
    pub hits_max: u32,
    /// Stored energy, for kinds that hold any.
    pub store: u32,
    pub store_capacity: u32,
}

/// A pending work item: a structure under construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstructionSite {
    pub id: ObjectId,
    pub kind: StructureKind,
    pub pos: Position,
    pub progress: u32,
    pub progress_total: u32,
}

/// A resource-source node units can draw from directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Source {
    pub id: ObjectId,
    pub pos: Position,
    pub energy: u32,
}

/// The room's primary objective; upgraded until it reaches max level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Controller {
    pub pos: Position,
    pub level: u8,
    pub progress: u32,
}

pub const CONTROLLER_MAX_LEVEL: u8 = 8;

/// A mission anchor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub pos: Position,
}

/// One room of the world snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub coord: RoomCoord,
    pub terrain: TerrainGrid,
    pub structures: Vec<Structure>,
    pub construction_sites: Vec<ConstructionSite>,
    pub sources: Vec<Source>,
    pub controller: Option<Controller>,
    /// Budget source: currently spendable production energy.
    pub energy_available: u32,
    /// Budget source: per-unit production ceiling.
    pub energy_capacity: u32,
}

impl Room {
    pub fn new(coord: RoomCoord) -> Room {
        Room {
            coord,
            terrain: TerrainGrid::open(),
            structures: Vec::new(),
            construction_sites: Vec::new(),
            sources: Vec::new(),
            controller: None,
            energy_available: 0,
            energy_capacity: 0,
        }
    }

    pub fn structure(&self, id: ObjectId) -> Option<&Structure> {
        self.structures.iter().find(|s| s.id == id)
    }

    pub fn structure_mut(&mut self, id: ObjectId) -> Option<&mut Structure> {
        self.structures.iter_mut().find(|s| s.id == id)
    }

    pub fn structures_of(&self, flags: KindFlags) -> impl Iterator<Item = &Structure> {
        self.structures.iter().filter(move |s| s.kind.is(flags))
    }

    pub fn structure_at(&self, pos: Position) -> Option<&Structure> {
        self.structures.iter().find(|s| s.pos == pos)
    }

    /// Non-road structure occupying the tile, if any.
    pub fn blocking_structure_at(&self, pos: Position) -> Option<&Structure> {
        self.structures.iter().find(|s| s.pos == pos && s.kind != StructureKind::Road)
    }

    pub fn storage(&self) -> Option<&Structure> {
        self.structures_of(KindFlags::STORAGE).next()
    }
}
