//! Gold distribution for AOE looted corpses

use super::{LootContext, LootHost};
use crate::loot::PlayerId;
use shared::ObjectGuid;

/// How the gold of one corpse was handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyShare {
    pub total: u32,
    pub per_recipient: u32,
    pub recipients: Vec<PlayerId>,
    /// Copper nobody received: the division remainder, or everything when
    /// no group member was in range.
    pub dropped: u32,
}

impl MoneyShare {
    pub fn credited(&self) -> u64 {
        self.per_recipient as u64 * self.recipients.len() as u64
    }
}

/// Credits the gold of `corpse` to the looter or their nearby group.
///
/// Gold is split by integer division and the remainder is dropped. The
/// container's gold is zeroed afterwards even when no one was in range.
pub fn distribute_gold<H: LootHost>(
    host: &mut H,
    ctx: &LootContext<'_>,
    corpse: ObjectGuid,
) -> Option<MoneyShare> {
    let player = ctx.player;
    let total = match host.loot(player, corpse) {
        Ok(loot) if loot.gold > 0 => loot.gold,
        _ => return None,
    };

    let group = if ctx.config.group {
        host.group_members(player)
    } else {
        None
    };

    let share = match group {
        Some(members) => {
            let recipients = members_in_range(host, player, &members, ctx.config.money_share_range());
            if recipients.is_empty() {
                ctx.debug(
                    host,
                    &format!("No group member in range for {} gold from {}", total, corpse),
                );
                MoneyShare {
                    total,
                    per_recipient: 0,
                    recipients,
                    dropped: total,
                }
            } else {
                let per_recipient = total / recipients.len() as u32;
                let solo = recipients.len() == 1;
                for member in &recipients {
                    credit(host, *member, per_recipient, solo);
                }
                MoneyShare {
                    total,
                    per_recipient,
                    dropped: total - per_recipient * recipients.len() as u32,
                    recipients,
                }
            }
        }
        None => {
            credit(host, player, total, true);
            MoneyShare {
                total,
                per_recipient: total,
                recipients: vec![player],
                dropped: 0,
            }
        }
    };

    if let Ok(loot) = host.loot_mut(player, corpse) {
        loot.gold = 0;
    }
    host.notify_money_removed(corpse);
    ctx.debug(host, &format!("Looted {} copper from {}", total, corpse));

    Some(share)
}

fn members_in_range<H: LootHost>(
    host: &H,
    player: PlayerId,
    members: &[PlayerId],
    range: f32,
) -> Vec<PlayerId> {
    let origin = match host.player_position(player) {
        Some(position) => position,
        None => return Vec::new(),
    };
    members
        .iter()
        .copied()
        .filter(|member| {
            host.player_position(*member)
                .map_or(false, |position| origin.is_within(&position, range))
        })
        .collect()
}

fn credit<H: LootHost>(host: &mut H, player: PlayerId, amount: u32, solo: bool) {
    host.modify_money(player, amount);
    host.record_looted_money(player, amount);
    host.send_loot_money_notify(player, amount, solo);
    host.send_system_message(player, format!("AOE Loot: +{} gold", amount));
}
