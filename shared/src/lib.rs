use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const INTERACTION_DISTANCE: f32 = 5.0;
pub const MAX_LOOT_SLOTS: usize = 16;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Disconnect,
    Loot {
        target: ObjectGuid,
    },
    AutostoreLootItem {
        slot: u8,
    },
    LootMoney,
    LootRelease {
        target: ObjectGuid,
    },
    ChatCommand {
        text: String,
    },

    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    SystemMessage {
        text: String,
    },
    LootResponse {
        target: ObjectGuid,
        gold: u32,
        items: Vec<LootSlotView>,
    },
    LootMoneyNotify {
        amount: u32,
        solo: bool,
    },
    ItemPushed {
        item_id: u32,
        count: u32,
    },
    LootReleaseResponse {
        target: ObjectGuid,
    },
    LootRemoved {
        slot: u8,
    },
    LootClearMoney {
        target: ObjectGuid,
    },
    ItemRetrievalMail {
        item_id: u32,
        count: u32,
    },
}

/// One visible entry of a loot window.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LootSlotView {
    pub slot: u8,
    pub item_id: u32,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GuidKind {
    Player,
    Creature,
    Corpse,
    Item,
    GameObject,
}

impl GuidKind {
    fn tag(self) -> u64 {
        match self {
            GuidKind::Player => 0x00,
            GuidKind::Creature => 0xF1,
            GuidKind::Corpse => 0xF5,
            GuidKind::Item => 0x40,
            GuidKind::GameObject => 0xF4,
        }
    }
}

/// Identity of any world object. Objects are always re-resolved through the
/// host by guid, never held by reference across calls.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectGuid {
    pub kind: GuidKind,
    pub counter: u32,
}

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid {
        kind: GuidKind::Player,
        counter: 0,
    };

    pub fn new(kind: GuidKind, counter: u32) -> Self {
        Self { kind, counter }
    }

    pub fn player(id: u32) -> Self {
        Self::new(GuidKind::Player, id)
    }

    pub fn creature(counter: u32) -> Self {
        Self::new(GuidKind::Creature, counter)
    }

    pub fn corpse(counter: u32) -> Self {
        Self::new(GuidKind::Corpse, counter)
    }

    pub fn item(counter: u32) -> Self {
        Self::new(GuidKind::Item, counter)
    }

    pub fn game_object(counter: u32) -> Self {
        Self::new(GuidKind::GameObject, counter)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn is_creature(&self) -> bool {
        self.kind == GuidKind::Creature
    }

    pub fn is_corpse(&self) -> bool {
        self.kind == GuidKind::Corpse
    }

    pub fn is_item(&self) -> bool {
        self.kind == GuidKind::Item
    }

    pub fn is_game_object(&self) -> bool {
        self.kind == GuidKind::GameObject
    }

    pub fn raw(&self) -> u64 {
        (self.kind.tag() << 32) | self.counter as u64
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:016X})", self.kind, self.raw())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Position {
    pub map_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(map_id: u32, x: f32, y: f32, z: f32) -> Self {
        Self { map_id, x, y, z }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.map_id, self.x + dx, self.y + dy, self.z)
    }

    /// Distance between two positions, or `None` when they are on different maps.
    pub fn distance(&self, other: &Position) -> Option<f32> {
        if self.map_id != other.map_id {
            return None;
        }
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    pub fn is_within(&self, other: &Position, range: f32) -> bool {
        self.distance(other).map_or(false, |d| d <= range)
    }
}
