//! The closed set of numeric memory-block IDs that make up the public
//! contract with the host engine (spec: external interfaces §6).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed memory region of the runtime. IDs are part of the external
/// contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i64)]
pub enum MemoryBlock {
    LevelMemory = 0,
    LevelData = 1,
    LevelOption = 2,
    LevelTransform = 3,
    LevelBackground = 4,
    LevelUi = 5,
    LevelBucket = 6,
    LevelScore = 7,
    LevelLife = 8,
    LevelUiConfiguration = 9,

    EntityInfoArray = 10,
    EntityDataArray = 11,
    EntitySharedMemoryArray = 12,

    EntityInfo = 20,
    EntityMemory = 21,
    EntityData = 22,
    EntityInput = 23,
    EntitySharedMemory = 24,

    ArchetypeLife = 30,

    EngineRom = 50,

    TemporaryMemory = 100,
    TemporaryData = 101,
}

impl MemoryBlock {
    /// All block IDs, in ascending numeric order.
    pub const ALL: &'static [MemoryBlock] = &[
        MemoryBlock::LevelMemory,
        MemoryBlock::LevelData,
        MemoryBlock::LevelOption,
        MemoryBlock::LevelTransform,
        MemoryBlock::LevelBackground,
        MemoryBlock::LevelUi,
        MemoryBlock::LevelBucket,
        MemoryBlock::LevelScore,
        MemoryBlock::LevelLife,
        MemoryBlock::LevelUiConfiguration,
        MemoryBlock::EntityInfoArray,
        MemoryBlock::EntityDataArray,
        MemoryBlock::EntitySharedMemoryArray,
        MemoryBlock::EntityInfo,
        MemoryBlock::EntityMemory,
        MemoryBlock::EntityData,
        MemoryBlock::EntityInput,
        MemoryBlock::EntitySharedMemory,
        MemoryBlock::ArchetypeLife,
        MemoryBlock::EngineRom,
        MemoryBlock::TemporaryMemory,
        MemoryBlock::TemporaryData,
    ];

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| *b as i64 == value)
    }

    pub fn id(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_the_external_contract() {
        assert_eq!(MemoryBlock::LevelMemory.id(), 0);
        assert_eq!(MemoryBlock::EntityInfoArray.id(), 10);
        assert_eq!(MemoryBlock::EntityInfo.id(), 20);
        assert_eq!(MemoryBlock::ArchetypeLife.id(), 30);
        assert_eq!(MemoryBlock::EngineRom.id(), 50);
        assert_eq!(MemoryBlock::TemporaryMemory.id(), 100);
        assert_eq!(MemoryBlock::TemporaryData.id(), 101);
    }

    #[test]
    fn from_i64_roundtrips_every_variant() {
        for block in MemoryBlock::ALL {
            assert_eq!(MemoryBlock::from_i64(block.id()), Some(*block));
        }
    }

    #[test]
    fn from_i64_rejects_unknown_ids() {
        assert_eq!(MemoryBlock::from_i64(13), None);
        assert_eq!(MemoryBlock::from_i64(-1), None);
    }
}
