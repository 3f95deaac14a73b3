//! Nearby corpse discovery

use super::LootHost;
use crate::loot::PlayerId;
use shared::ObjectGuid;

/// Lazily yields the eligible corpses around `player`, in the host's grid order.
///
/// The sequence is single-pass; callers that need a count collect it first.
pub fn find_candidates<'a, H: LootHost>(
    host: &'a H,
    player: PlayerId,
    radius: f32,
) -> impl Iterator<Item = ObjectGuid> + 'a {
    host.dead_creatures_near(player, radius)
        .into_iter()
        .filter(move |creature| is_eligible(host, player, *creature))
}

/// Whether `player` may loot `creature` right now.
///
/// Checked at discovery and again right before a corpse is processed, since
/// tap rights and loot state can change in between.
pub fn is_eligible<H: LootHost>(host: &H, player: PlayerId, creature: ObjectGuid) -> bool {
    let status = match host.creature_status(creature) {
        Some(status) => status,
        None => return false,
    };
    if status.is_alive || !status.is_lootable {
        return false;
    }

    match host.loot(player, creature) {
        Ok(loot) if !loot.is_empty() && !loot.is_looted() => {}
        _ => return false,
    }

    if !status.has_loot_recipient || !host.is_tapped_by(creature, player) {
        return false;
    }

    let map_id = match host.player_position(player) {
        Some(position) => position.map_id,
        None => return false,
    };
    if host.is_instanceable_map(map_id) && !host.is_allowed_to_loot(player, creature) {
        return false;
    }

    true
}
