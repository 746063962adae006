//! Mission-scoped persistent memory.
//!
//! Every mission owns one [`MissionMemory`] record keyed by its name. The
//! store survives across ticks and can be exported to / restored from a
//! compact string for external persistence.

use crate::transport::TransportAnalysis;
use crate::world::{ObjectId, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cross-tick mission state. Only the fields documented here persist;
/// everything else a mission uses is rebuilt from the snapshot every tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MissionMemory {
    /// Wear ceiling for fortification repair targeting. `None` means
    /// unset; the mission re-arms it to the base value.
    pub max_hits_to_build: Option<u32>,
    /// Cached relay sizing; recomputed when absent.
    pub transport: Option<TransportAnalysis>,
    /// Position of a freshly built fortification pinned for follow-up
    /// repair.
    pub fortification_pos: Option<Position>,
    /// Manually pinned target and the wear ceiling it stays valid under.
    pub manual_target: Option<ObjectId>,
    pub manual_target_hits: u32,
    /// Production lead time: how long a replacement needs to reach the
    /// workplace before its predecessor expires.
    pub prespawn: u32,
    /// Latched boost directive: the decision made at first sight of the
    /// target, so the squad stays uniform across replacements.
    pub boost: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    missions: HashMap<String, MissionMemory>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Memory record for a mission, created on first access.
    pub fn mission(&mut self, name: &str) -> &mut MissionMemory {
        self.missions.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&MissionMemory> {
        self.missions.get(name)
    }

    pub fn remove(&mut self, name: &str) {
        self.missions.remove(name);
    }

    /// Compact string snapshot for string-only persistence substrates.
    pub fn export(&self) -> Result<String, String> {
        crate::serialize::encode_to_string(self)
    }

    pub fn import(data: &str) -> Result<MemoryStore, String> {
        crate::serialize::decode_from_string(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::RoomCoord;

    #[test]
    fn mission_records_are_created_on_demand() {
        let mut store = MemoryStore::new();

        assert!(store.get("build_R0x0").is_none());

        store.mission("build_R0x0").max_hits_to_build = Some(2_000);

        assert_eq!(store.get("build_R0x0").unwrap().max_hits_to_build, Some(2_000));
    }

    #[test]
    fn export_and_import_preserve_state() {
        let mut store = MemoryStore::new();

        {
            let memory = store.mission("raid_R3x1");
            memory.prespawn = 120;
            memory.fortification_pos = Some(Position::new(RoomCoord::new(3, 1), 10, 12));
            memory.manual_target_hits = 50_000;
        }

        let exported = store.export().unwrap();
        let restored = MemoryStore::import(&exported).unwrap();

        let memory = restored.get("raid_R3x1").unwrap();
        assert_eq!(memory.prespawn, 120);
        assert_eq!(memory.manual_target_hits, 50_000);
        assert_eq!(memory.fortification_pos, Some(Position::new(RoomCoord::new(3, 1), 10, 12)));
    }

    #[test]
    fn removed_missions_leave_no_residue() {
        let mut store = MemoryStore::new();
        store.mission("build_R0x0").prespawn = 10;

        store.remove("build_R0x0");

        assert!(store.get("build_R0x0").is_none());
    }
}
