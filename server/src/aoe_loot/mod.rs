//! Area-of-effect looting
//!
//! Lets a player empty every eligible corpse around them with a single loot
//! request. The module owns no world state: everything it touches (creatures,
//! loot containers, bags, money, groups, chat) is reached through the
//! [`LootHost`] trait, and objects are always re-resolved by guid.
//!
//! A pass runs in three steps:
//! 1. [`discovery`] collects nearby dead creatures the player may loot.
//! 2. Below `AOELoot.CorpseThreshold` nothing happens and the normal
//!    single-target loot path handles the request.
//! 3. [`sequencer`] replays quest, free-for-all and regular slots of every
//!    corpse, hands remaining gold to [`money`], and releases emptied corpses.
//!
//! [`commands`] exposes the `.aoeloot` chat commands and the automatic
//! trigger fired by the loot opcode.

pub mod commands;
pub mod discovery;
pub mod money;
pub mod preferences;
pub mod sequencer;

use crate::config::AoeLootConfig;
use crate::error::LootError;
use crate::loot::{Loot, LootItem, PlayerId};
use log::debug;
use shared::{ObjectGuid, Position};

pub use commands::{handle_command, handle_loot_opcode, login_message, AoeLootCommand};
pub use discovery::{find_candidates, is_eligible};
pub use money::{distribute_gold, MoneyShare};
pub use preferences::LootPreferences;
pub use sequencer::{process_corpse, start_aoe_loot, CorpseReport};

pub const LOG_TARGET: &str = "module.aoe_loot";

/// What the module needs to know about a creature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatureStatus {
    pub position: Position,
    pub is_alive: bool,
    /// The lootable dynamic flag is still set
    pub is_lootable: bool,
    pub has_loot_recipient: bool,
}

/// Services the host server provides to the module.
pub trait LootHost {
    /// `None` when the player is not in the world.
    fn player_position(&self, player: PlayerId) -> Option<Position>;

    fn is_instanceable_map(&self, map_id: u32) -> bool;

    /// Instance loot permission check (loot mode, lockouts, ...).
    fn is_allowed_to_loot(&self, player: PlayerId, creature: ObjectGuid) -> bool;

    /// Members of the player's group, `None` when ungrouped.
    fn group_members(&self, player: PlayerId) -> Option<Vec<PlayerId>>;

    /// Dead creatures within `radius`, in grid order.
    fn dead_creatures_near(&self, player: PlayerId, radius: f32) -> Vec<ObjectGuid>;

    fn creature_status(&self, creature: ObjectGuid) -> Option<CreatureStatus>;

    fn is_tapped_by(&self, creature: ObjectGuid, player: PlayerId) -> bool;

    /// Resolves the loot container behind `guid` as seen by `player`.
    fn loot(&self, player: PlayerId, guid: ObjectGuid) -> Result<&Loot, LootError>;

    fn loot_mut(&mut self, player: PlayerId, guid: ObjectGuid) -> Result<&mut Loot, LootError>;

    /// Moves the item in `slot` into the player's bags and marks the slot looted.
    fn store_loot_item(
        &mut self,
        player: PlayerId,
        guid: ObjectGuid,
        slot: u8,
    ) -> Result<LootItem, LootError>;

    /// The player's currently open loot, `None` clears it.
    fn set_loot_guid(&mut self, player: PlayerId, guid: Option<ObjectGuid>);

    fn send_loot_release(&mut self, player: PlayerId, guid: ObjectGuid);

    /// Clears the lootable flag and lets the corpse decay.
    fn all_loot_removed_from_corpse(&mut self, creature: ObjectGuid);

    fn notify_money_removed(&mut self, guid: ObjectGuid);

    fn modify_money(&mut self, player: PlayerId, amount: u32);

    fn record_looted_money(&mut self, player: PlayerId, amount: u32);

    fn send_system_message(&mut self, player: PlayerId, text: String);

    fn send_loot_money_notify(&mut self, player: PlayerId, amount: u32, solo: bool);

    fn send_item_retrieval_mail(&mut self, player: PlayerId, item_id: u32, count: u32);
}

/// Per-invocation view of who is looting and under which settings.
#[derive(Debug, Clone, Copy)]
pub struct LootContext<'a> {
    pub config: &'a AoeLootConfig,
    pub player: PlayerId,
    pub prefs: LootPreferences,
}

impl<'a> LootContext<'a> {
    pub fn new(config: &'a AoeLootConfig, player: PlayerId, prefs: LootPreferences) -> Self {
        Self {
            config,
            player,
            prefs,
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.config.debug || self.prefs.is_debug()
    }

    /// Logs a diagnostic and echoes it to the player when debug output is on.
    pub fn debug(&self, host: &mut impl LootHost, message: &str) {
        debug!(target: LOG_TARGET, "player {}: {}", self.player, message);
        if self.debug_enabled() {
            host.send_system_message(self.player, format!("AOE Loot: {}", message));
        }
    }
}

/// Result of one `.aoeloot startaoeloot` or loot-opcode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AoeLootOutcome {
    Disabled,
    NoPlayer,
    BelowThreshold { eligible: usize, threshold: u32 },
    Looted(PassSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub corpses_processed: usize,
    pub corpses_skipped: usize,
    /// Corpses emptied and released during the pass
    pub released: Vec<ObjectGuid>,
    pub items_stored: usize,
    pub items_failed: usize,
    pub items_mailed: usize,
    pub gold_credited: u64,
    pub gold_dropped: u64,
}

impl PassSummary {
    pub fn was_released(&self, guid: ObjectGuid) -> bool {
        self.released.contains(&guid)
    }

    pub fn absorb(&mut self, report: &CorpseReport) {
        if !report.processed {
            self.corpses_skipped += 1;
            return;
        }
        self.corpses_processed += 1;
        self.items_stored += report.items_stored;
        self.items_failed += report.items_failed;
        self.items_mailed += report.items_mailed;
        if report.released {
            self.released.extend(report.corpse);
        }
        if let Some(share) = &report.money {
            self.gold_credited += share.credited();
            self.gold_dropped += share.dropped as u64;
        }
    }
}
