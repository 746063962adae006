use super::build::BuildMission;
use super::missionsystem::Mission;
use super::raid::RaidMission;

/// Concrete mission storage; dispatched through the [`Mission`] trait.
pub enum MissionData {
    Build(BuildMission),
    Raid(RaidMission),
}

impl MissionData {
    pub fn as_mission(&self) -> &dyn Mission {
        match self {
            MissionData::Build(mission) => mission,
            MissionData::Raid(mission) => mission,
        }
    }

    pub fn as_mission_mut(&mut self) -> &mut dyn Mission {
        match self {
            MissionData::Build(mission) => mission,
            MissionData::Raid(mission) => mission,
        }
    }
}
