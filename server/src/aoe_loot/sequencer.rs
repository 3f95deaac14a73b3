//! Loot replay across every eligible corpse

use super::discovery::{find_candidates, is_eligible};
use super::money::{distribute_gold, MoneyShare};
use super::{AoeLootOutcome, LootContext, LootHost, PassSummary};
use crate::error::LootError;
use shared::ObjectGuid;

/// What happened to a single corpse during a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpseReport {
    pub corpse: Option<ObjectGuid>,
    /// False when the corpse stopped being eligible before its turn
    pub processed: bool,
    pub items_stored: usize,
    pub items_failed: usize,
    pub items_mailed: usize,
    pub money: Option<MoneyShare>,
    pub released: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotOutcome {
    Stored,
    Mailed,
}

/// Runs a full AOE loot pass for the player in `ctx`.
pub fn start_aoe_loot<H: LootHost>(host: &mut H, ctx: &LootContext<'_>) -> AoeLootOutcome {
    if !ctx.config.enable {
        return AoeLootOutcome::Disabled;
    }
    if host.player_position(ctx.player).is_none() {
        return AoeLootOutcome::NoPlayer;
    }

    let range = ctx.config.range;
    let nearby = host.dead_creatures_near(ctx.player, range).len();
    let candidates: Vec<ObjectGuid> = find_candidates(host, ctx.player, range).collect();
    ctx.debug(
        host,
        &format!("Found {} nearby corpses within range {}", nearby, range),
    );
    ctx.debug(host, &format!("Found {} valid corpses", candidates.len()));

    let threshold = ctx.config.corpse_threshold;
    if (candidates.len() as u64) < threshold as u64 {
        ctx.debug(
            host,
            "Not enough corpses for AOE loot. Defaulting to normal looting.",
        );
        return AoeLootOutcome::BelowThreshold {
            eligible: candidates.len(),
            threshold,
        };
    }

    let mut summary = PassSummary::default();
    for corpse in candidates {
        let report = process_corpse(host, ctx, corpse);
        summary.absorb(&report);
    }
    AoeLootOutcome::Looted(summary)
}

/// Loots quest, free-for-all and regular slots of one corpse, then its gold,
/// and releases it when nothing is left.
pub fn process_corpse<H: LootHost>(
    host: &mut H,
    ctx: &LootContext<'_>,
    corpse: ObjectGuid,
) -> CorpseReport {
    let player = ctx.player;
    let mut report = CorpseReport {
        corpse: Some(corpse),
        ..CorpseReport::default()
    };

    if !is_eligible(host, player, corpse) {
        ctx.debug(host, &format!("Skipping {} - no longer lootable", corpse));
        return report;
    }
    report.processed = true;

    host.set_loot_guid(player, Some(corpse));

    let (quest_slots, ffa_slots, regular_slots) = match host.loot(player, corpse) {
        Ok(loot) => (
            loot.player_quest_slots(player),
            loot.player_ffa_slots(player),
            loot.regular_slots(),
        ),
        Err(err) => {
            ctx.debug(host, &err.to_string());
            host.set_loot_guid(player, None);
            return report;
        }
    };

    let ordered = quest_slots
        .iter()
        .map(|slot| (*slot, "quest item"))
        .chain(ffa_slots.iter().map(|slot| (*slot, "FFA item")))
        .chain(regular_slots.iter().map(|slot| (*slot, "item")));

    for (slot, label) in ordered {
        match loot_slot(host, ctx, corpse, slot) {
            Ok(SlotOutcome::Stored) => {
                report.items_stored += 1;
                ctx.debug(host, &format!("Looted {} in slot {} of {}", label, slot, corpse));
            }
            Ok(SlotOutcome::Mailed) => {
                report.items_mailed += 1;
                ctx.debug(host, &format!("Mailed {} from slot {} of {}", label, slot, corpse));
            }
            Err(err) => {
                report.items_failed += 1;
                ctx.debug(host, &err.to_string());
            }
        }
    }

    let has_gold = host.loot(player, corpse).map_or(false, |loot| loot.gold > 0);
    if has_gold {
        report.money = distribute_gold(host, ctx, corpse);
    }

    let fully_looted = host.loot(player, corpse).map_or(false, |loot| loot.is_looted());
    if fully_looted {
        release_loot(host, ctx, corpse);
        report.released = true;
    } else {
        host.set_loot_guid(player, None);
    }

    report
}

/// Stores one slot through the host. Inventory failures leave the item in
/// the container unless mail fallback is configured.
fn loot_slot<H: LootHost>(
    host: &mut H,
    ctx: &LootContext<'_>,
    guid: ObjectGuid,
    slot: u8,
) -> Result<SlotOutcome, LootError> {
    let player = ctx.player;
    let item = host
        .loot(player, guid)?
        .item_in_slot(slot, player)
        .cloned()
        .ok_or(LootError::EmptySlot {
            loot_guid: guid,
            slot,
        })?;

    match host.store_loot_item(player, guid, slot) {
        Ok(_) => Ok(SlotOutcome::Stored),
        Err(LootError::Inventory { result, .. }) if ctx.config.mail_fallback => {
            ctx.debug(
                host,
                &format!(
                    "Inventory error {:?} for slot {} of {}, sending by mail",
                    result, slot, guid
                ),
            );
            host.loot_mut(player, guid)?.mark_slot_looted(slot, player);
            host.send_item_retrieval_mail(player, item.item_id, item.count);
            Ok(SlotOutcome::Mailed)
        }
        Err(err) => Err(err),
    }
}

fn release_loot<H: LootHost>(host: &mut H, ctx: &LootContext<'_>, guid: ObjectGuid) {
    let player = ctx.player;
    host.set_loot_guid(player, None);
    host.send_loot_release(player, guid);

    if guid.is_creature() {
        let looted = host.loot(player, guid).map_or(false, |loot| loot.is_looted());
        if looted {
            host.all_loot_removed_from_corpse(guid);
        }
    }
    ctx.debug(host, &format!("Released loot for {}", guid));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aoe_loot::LootPreferences;
    use crate::config::AoeLootConfig;
    use crate::game::GameState;
    use crate::loot::{Loot, LootType};
    use shared::{Packet, Position};

    fn origin() -> Position {
        Position::new(0, 0.0, 0.0, 0.0)
    }

    fn loot_with(items: &[u32], gold: u32) -> Loot {
        let mut loot = Loot::new(LootType::Corpse).with_gold(gold);
        for item in items {
            loot.add_item(*item, 1);
        }
        loot
    }

    fn setup(corpses: usize) -> (GameState, Vec<ObjectGuid>) {
        let mut state = GameState::new();
        state.add_player_at(1, origin());
        let guids = (0..corpses)
            .map(|i| {
                state.spawn_corpse(
                    origin().offset(i as f32, 0.0),
                    loot_with(&[100 + i as u32], 10),
                    &[1],
                )
            })
            .collect();
        (state, guids)
    }

    fn run(state: &mut GameState, config: &AoeLootConfig) -> AoeLootOutcome {
        let ctx = LootContext::new(config, 1, LootPreferences::new());
        start_aoe_loot(state, &ctx)
    }

    #[test]
    fn test_loots_every_corpse() {
        let (mut state, guids) = setup(3);
        let config = AoeLootConfig::default();

        let outcome = run(&mut state, &config);

        let summary = match outcome {
            AoeLootOutcome::Looted(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(summary.corpses_processed, 3);
        assert_eq!(summary.items_stored, 3);
        assert_eq!(summary.gold_credited, 30);
        assert_eq!(summary.released.len(), 3);
        assert_eq!(state.player_money(1), Some(30));
        for guid in guids {
            assert!(state.loot(1, guid).unwrap().is_looted());
            assert!(!state.creature_status(guid).unwrap().is_lootable);
        }
        assert_eq!(state.loot_guid(1), None);
    }

    #[test]
    fn test_below_threshold_changes_nothing() {
        let (mut state, guids) = setup(1);
        let config = AoeLootConfig::default();

        let outcome = run(&mut state, &config);

        assert_eq!(
            outcome,
            AoeLootOutcome::BelowThreshold {
                eligible: 1,
                threshold: 2
            }
        );
        let loot = state.loot(1, guids[0]).unwrap();
        assert_eq!(loot.gold, 10);
        assert!(!loot.is_looted());
        assert_eq!(state.player_money(1), Some(0));
    }

    #[test]
    fn test_disabled_module() {
        let (mut state, guids) = setup(3);
        let config = AoeLootConfig {
            enable: false,
            ..AoeLootConfig::default()
        };
        assert_eq!(run(&mut state, &config), AoeLootOutcome::Disabled);
        assert_eq!(state.loot(1, guids[0]).unwrap().gold, 10);
    }

    #[test]
    fn test_missing_player() {
        let (mut state, _) = setup(3);
        let config = AoeLootConfig::default();
        let ctx = LootContext::new(&config, 42, LootPreferences::new());
        assert_eq!(start_aoe_loot(&mut state, &ctx), AoeLootOutcome::NoPlayer);
    }

    #[test]
    fn test_second_pass_is_noop() {
        let (mut state, _) = setup(3);
        let config = AoeLootConfig::default();
        run(&mut state, &config);
        let money = state.player_money(1);
        let bag_slots = state.inventory(1).map(|i| i.used_slots());

        let outcome = run(&mut state, &config);

        assert!(matches!(outcome, AoeLootOutcome::BelowThreshold { eligible: 0, .. }));
        assert_eq!(state.player_money(1), money);
        assert_eq!(state.inventory(1).map(|i| i.used_slots()), bag_slots);
    }

    #[test]
    fn test_full_bags_keep_items_and_continue() {
        let mut state = GameState::new();
        state.add_player_with_bags(1, origin(), 1);
        let first = state.spawn_corpse(origin(), loot_with(&[10, 11], 5), &[1]);
        let second = state.spawn_corpse(origin(), loot_with(&[12], 7), &[1]);
        let config = AoeLootConfig::default();

        let summary = match run(&mut state, &config) {
            AoeLootOutcome::Looted(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(summary.corpses_processed, 2);
        assert_eq!(summary.items_stored, 1);
        assert_eq!(summary.items_failed, 2);
        assert_eq!(summary.gold_credited, 12);
        assert_eq!(summary.released.len(), 0);

        let first_loot = state.loot(1, first).unwrap();
        assert!(first_loot.items[0].is_looted);
        assert!(!first_loot.items[1].is_looted);
        assert!(!state.loot(1, second).unwrap().items[0].is_looted);
        assert!(state.creature_status(first).unwrap().is_lootable);
        assert_eq!(state.loot_guid(1), None);
    }

    #[test]
    fn test_mail_fallback() {
        let mut state = GameState::new();
        state.add_player_with_bags(1, origin(), 0);
        let first = state.spawn_corpse(origin(), loot_with(&[10], 0), &[1]);
        state.spawn_corpse(origin(), loot_with(&[11], 0), &[1]);
        let config = AoeLootConfig {
            mail_fallback: true,
            ..AoeLootConfig::default()
        };

        let summary = match run(&mut state, &config) {
            AoeLootOutcome::Looted(summary) => summary,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(summary.items_mailed, 2);
        assert_eq!(summary.released.len(), 2);
        assert!(state.loot(1, first).unwrap().is_looted());
        let mails = state
            .drain_outbox()
            .into_iter()
            .filter(|(_, p)| matches!(p, Packet::ItemRetrievalMail { .. }))
            .count();
        assert_eq!(mails, 2);
    }

    #[test]
    fn test_slot_order_quest_ffa_regular() {
        let mut state = GameState::new();
        state.add_player_with_bags(1, origin(), 2);
        let mut loot = Loot::new(LootType::Corpse);
        loot.add_item(500, 1);
        loot.add_ffa_item(600, 1, &[1]);
        loot.add_quest_item(700, 1, &[1]);
        let guid = state.spawn_corpse(origin(), loot, &[1]);
        state.spawn_corpse(origin(), loot_with(&[800], 0), &[1]);
        let config = AoeLootConfig::default();

        run(&mut state, &config);

        // Two bag slots: the quest item and the free-for-all copy win them
        let inventory = state.inventory(1).unwrap();
        assert_eq!(inventory.count_of(700), 1);
        assert_eq!(inventory.count_of(600), 1);
        assert_eq!(inventory.count_of(500), 0);
        assert!(!state.loot(1, guid).unwrap().items[0].is_looted);
    }

    #[test]
    fn test_corpse_lost_rights_before_turn_is_skipped() {
        let (mut state, guids) = setup(2);
        let config = AoeLootConfig::default();
        let ctx = LootContext::new(&config, 1, LootPreferences::new());
        state.revive_creature(guids[1]);

        let report = process_corpse(&mut state, &ctx, guids[1]);

        assert!(!report.processed);
        assert_eq!(state.loot(1, guids[1]).unwrap().gold, 10);
    }

    #[test]
    fn test_debug_messages_reach_player() {
        let (mut state, _) = setup(1);
        let config = AoeLootConfig::default();
        let mut prefs = LootPreferences::new();
        prefs.set_debug(true);
        let ctx = LootContext::new(&config, 1, prefs);

        start_aoe_loot(&mut state, &ctx);

        let texts: Vec<String> = state
            .drain_outbox()
            .into_iter()
            .filter_map(|(_, p)| match p {
                Packet::SystemMessage { text } => Some(text),
                _ => None,
            })
            .collect();
        assert!(texts.contains(&"AOE Loot: Found 1 valid corpses".to_string()));
        assert!(texts.contains(
            &"AOE Loot: Not enough corpses for AOE loot. Defaulting to normal looting.".to_string()
        ));
    }

    #[test]
    fn test_no_debug_messages_by_default() {
        let (mut state, _) = setup(1);
        let config = AoeLootConfig::default();
        run(&mut state, &config);
        assert!(state.drain_outbox().is_empty());
    }
}
