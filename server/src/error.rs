use shared::ObjectGuid;
use thiserror::Error;

use crate::inventory::InventoryResult;

/// Errors raised while loading the module configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Reasons a single loot slot or loot container could not be processed.
///
/// These never leave the module: the sequencer reports them as debug
/// messages and keeps going with the next slot or corpse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LootError {
    #[error("player {0} is not in the world")]
    PlayerNotFound(u32),

    #[error("failed to find creature {0}")]
    CreatureNotFound(ObjectGuid),

    #[error("failed to find corpse {0}")]
    CorpseNotFound(ObjectGuid),

    #[error("failed to find item {0}")]
    ItemNotFound(ObjectGuid),

    #[error("skipping game object {0} - not supported for AOE loot")]
    GameObjectUnsupported(ObjectGuid),

    #[error("{0} cannot be looted right now")]
    NotLootable(ObjectGuid),

    #[error("{0} is too far away to loot")]
    OutOfRange(ObjectGuid),

    #[error("player {0} has no loot window open")]
    NoLootOpen(u32),

    #[error("no lootable item in slot {slot} of {loot_guid}")]
    EmptySlot { loot_guid: ObjectGuid, slot: u8 },

    #[error("failed to loot slot {slot} of {loot_guid}: inventory error {result:?}")]
    Inventory {
        loot_guid: ObjectGuid,
        slot: u8,
        result: InventoryResult,
    },
}
