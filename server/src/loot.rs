//! Loot containers
//!
//! A `Loot` belongs to whatever dropped it (creature, player corpse, or a
//! lootable item). Slot numbering follows the client loot window: regular
//! items occupy `0..items.len()` and quest items follow at
//! `items.len() + index`. Free-for-all items sit in `items` but every
//! eligible player loots a private copy, tracked in a per-player list.

use shared::{LootSlotView, MAX_LOOT_SLOTS};
use std::collections::HashMap;

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootType {
    /// Creature remains or player bones
    Corpse,
    /// Contents of a bag item; the item goes away once emptied
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootItem {
    pub item_id: u32,
    pub count: u32,
    pub is_looted: bool,
    pub freeforall: bool,
}

impl LootItem {
    pub fn new(item_id: u32, count: u32) -> Self {
        Self {
            item_id,
            count,
            is_looted: false,
            freeforall: false,
        }
    }
}

/// A player's view of a quest or free-for-all entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestItem {
    pub index: u8,
    pub is_looted: bool,
}

#[derive(Debug, Clone)]
pub struct Loot {
    pub loot_type: LootType,
    pub items: Vec<LootItem>,
    pub quest_items: Vec<LootItem>,
    pub gold: u32,
    player_quest_items: HashMap<PlayerId, Vec<QuestItem>>,
    player_ffa_items: HashMap<PlayerId, Vec<QuestItem>>,
}

impl Loot {
    pub fn new(loot_type: LootType) -> Self {
        Self {
            loot_type,
            items: Vec::new(),
            quest_items: Vec::new(),
            gold: 0,
            player_quest_items: HashMap::new(),
            player_ffa_items: HashMap::new(),
        }
    }

    pub fn with_gold(mut self, gold: u32) -> Self {
        self.gold = gold;
        self
    }

    /// Adds a regular item and returns its slot, or `None` once the window is full.
    pub fn add_item(&mut self, item_id: u32, count: u32) -> Option<u8> {
        if self.items.len() + self.quest_items.len() >= MAX_LOOT_SLOTS {
            return None;
        }
        self.items.push(LootItem::new(item_id, count));
        Some((self.items.len() - 1) as u8)
    }

    /// Adds an item every listed player may loot once.
    pub fn add_ffa_item(&mut self, item_id: u32, count: u32, players: &[PlayerId]) -> Option<u8> {
        let slot = self.add_item(item_id, count)?;
        self.items[slot as usize].freeforall = true;
        for player in players {
            self.player_ffa_items
                .entry(*player)
                .or_default()
                .push(QuestItem {
                    index: slot,
                    is_looted: false,
                });
        }
        Some(slot)
    }

    /// Adds a quest item visible only to the listed players.
    pub fn add_quest_item(
        &mut self,
        item_id: u32,
        count: u32,
        players: &[PlayerId],
    ) -> Option<u8> {
        if self.items.len() + self.quest_items.len() >= MAX_LOOT_SLOTS {
            return None;
        }
        self.quest_items.push(LootItem::new(item_id, count));
        let index = (self.quest_items.len() - 1) as u8;
        for player in players {
            self.player_quest_items
                .entry(*player)
                .or_default()
                .push(QuestItem {
                    index,
                    is_looted: false,
                });
        }
        Some(index)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.quest_items.is_empty() && self.gold == 0
    }

    /// Number of entries still waiting for someone to loot them.
    pub fn unlooted_count(&self) -> usize {
        let regular = self
            .items
            .iter()
            .filter(|i| !i.freeforall && !i.is_looted)
            .count();
        let quest: usize = self
            .player_quest_items
            .values()
            .map(|entries| entries.iter().filter(|q| !q.is_looted).count())
            .sum();
        let ffa: usize = self
            .player_ffa_items
            .values()
            .map(|entries| entries.iter().filter(|q| !q.is_looted).count())
            .sum();
        regular + quest + ffa
    }

    pub fn is_looted(&self) -> bool {
        self.gold == 0 && self.unlooted_count() == 0
    }

    /// Loot window slots of the quest items this player still needs.
    pub fn player_quest_slots(&self, player: PlayerId) -> Vec<u8> {
        let base = self.items.len() as u8;
        self.player_quest_items
            .get(&player)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|q| !q.is_looted)
                    .map(|q| base + q.index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Slots of this player's free-for-all copies not yet taken.
    pub fn player_ffa_slots(&self, player: PlayerId) -> Vec<u8> {
        self.player_ffa_items
            .get(&player)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|q| !q.is_looted)
                    .map(|q| q.index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Shared slots nobody has looted yet.
    pub fn regular_slots(&self) -> Vec<u8> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.freeforall && !item.is_looted)
            .map(|(slot, _)| slot as u8)
            .collect()
    }

    /// The item `player` would receive from `slot`, if any is left.
    pub fn item_in_slot(&self, slot: u8, player: PlayerId) -> Option<&LootItem> {
        let slot_index = slot as usize;
        if slot_index >= self.items.len() {
            let quest_index = (slot_index - self.items.len()) as u8;
            let entry = self
                .player_quest_items
                .get(&player)?
                .iter()
                .find(|q| q.index == quest_index)?;
            if entry.is_looted {
                return None;
            }
            return self.quest_items.get(quest_index as usize);
        }

        let item = &self.items[slot_index];
        if item.freeforall {
            let entry = self
                .player_ffa_items
                .get(&player)?
                .iter()
                .find(|q| q.index == slot)?;
            if entry.is_looted {
                return None;
            }
            return Some(item);
        }
        if item.is_looted {
            None
        } else {
            Some(item)
        }
    }

    /// Marks `slot` as taken by `player`. Returns false when there was nothing to take.
    pub fn mark_slot_looted(&mut self, slot: u8, player: PlayerId) -> bool {
        let slot_index = slot as usize;
        if slot_index >= self.items.len() {
            let quest_index = (slot_index - self.items.len()) as u8;
            return mark_entry(self.player_quest_items.get_mut(&player), quest_index);
        }

        if self.items[slot_index].freeforall {
            return mark_entry(self.player_ffa_items.get_mut(&player), slot);
        }
        let item = &mut self.items[slot_index];
        if item.is_looted {
            return false;
        }
        item.is_looted = true;
        true
    }

    /// Everything `player` would see in the loot window.
    pub fn visible_slots(&self, player: PlayerId) -> Vec<LootSlotView> {
        let mut slots: Vec<u8> = self.regular_slots();
        slots.extend(self.player_ffa_slots(player));
        slots.extend(self.player_quest_slots(player));
        slots.sort_unstable();
        slots
            .into_iter()
            .filter_map(|slot| {
                self.item_in_slot(slot, player).map(|item| LootSlotView {
                    slot,
                    item_id: item.item_id,
                    count: item.count,
                })
            })
            .collect()
    }
}

fn mark_entry(entries: Option<&mut Vec<QuestItem>>, index: u8) -> bool {
    match entries.and_then(|e| e.iter_mut().find(|q| q.index == index)) {
        Some(entry) if !entry.is_looted => {
            entry.is_looted = true;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loot() -> Loot {
        let mut loot = Loot::new(LootType::Corpse).with_gold(100);
        loot.add_item(2589, 2);
        loot.add_ffa_item(6948, 1, &[1, 2]);
        loot.add_item(4306, 1);
        loot.add_quest_item(884, 1, &[1]);
        loot
    }

    #[test]
    fn test_slot_numbering() {
        let loot = sample_loot();
        assert_eq!(loot.regular_slots(), vec![0, 2]);
        assert_eq!(loot.player_ffa_slots(1), vec![1]);
        assert_eq!(loot.player_quest_slots(1), vec![3]);
        assert!(loot.player_quest_slots(2).is_empty());
    }

    #[test]
    fn test_item_in_slot_respects_quest_visibility() {
        let loot = sample_loot();
        assert_eq!(loot.item_in_slot(3, 1).map(|i| i.item_id), Some(884));
        assert!(loot.item_in_slot(3, 2).is_none());
        assert!(loot.item_in_slot(9, 1).is_none());
    }

    #[test]
    fn test_ffa_copies_are_per_player() {
        let mut loot = sample_loot();
        assert!(loot.mark_slot_looted(1, 1));
        assert!(loot.item_in_slot(1, 1).is_none());
        assert_eq!(loot.item_in_slot(1, 2).map(|i| i.item_id), Some(6948));
        assert!(!loot.mark_slot_looted(1, 1));
        assert!(loot.item_in_slot(1, 3).is_none());
    }

    #[test]
    fn test_mark_regular_slot_once() {
        let mut loot = sample_loot();
        assert!(loot.mark_slot_looted(0, 2));
        assert!(loot.item_in_slot(0, 1).is_none());
        assert!(!loot.mark_slot_looted(0, 1));
    }

    #[test]
    fn test_is_looted_needs_every_entry_and_gold() {
        let mut loot = sample_loot();
        assert_eq!(loot.unlooted_count(), 5);
        for (slot, player) in [(0, 1), (2, 1), (1, 1), (1, 2), (3, 1)] {
            assert!(loot.mark_slot_looted(slot, player));
        }
        assert_eq!(loot.unlooted_count(), 0);
        assert!(!loot.is_looted());
        loot.gold = 0;
        assert!(loot.is_looted());
        assert!(!loot.is_empty());
    }

    #[test]
    fn test_empty_loot() {
        let loot = Loot::new(LootType::Corpse);
        assert!(loot.is_empty());
        assert!(loot.is_looted());
    }

    #[test]
    fn test_visible_slots() {
        let loot = sample_loot();
        let view = loot.visible_slots(1);
        let slots: Vec<u8> = view.iter().map(|v| v.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);

        let view = loot.visible_slots(3);
        let slots: Vec<u8> = view.iter().map(|v| v.slot).collect();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn test_slot_capacity() {
        let mut loot = Loot::new(LootType::Corpse);
        for i in 0..MAX_LOOT_SLOTS {
            assert!(loot.add_item(i as u32 + 1, 1).is_some());
        }
        assert!(loot.add_item(99, 1).is_none());
        assert!(loot.add_quest_item(99, 1, &[1]).is_none());
    }
}
