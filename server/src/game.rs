//! In-memory world the loot server runs against
//!
//! Holds players, slain creatures, player bones, lootable bag items and
//! groups, and implements [`LootHost`] on top of them. Every packet the
//! world wants to send is queued in an outbox that the network layer
//! drains after each request.

use crate::aoe_loot::{CreatureStatus, LootHost};
use crate::error::LootError;
use crate::inventory::{Inventory, DEFAULT_BAG_SLOTS};
use crate::loot::{Loot, LootItem, LootType, PlayerId};
use log::{debug, info};
use rand::Rng;
use shared::{GuidKind, ObjectGuid, Packet, Position, INTERACTION_DISTANCE};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_TICK_RATE: u32 = 60;
/// Seconds an unlooted corpse stays in the world
pub const CORPSE_LIFETIME_SECS: u32 = 300;
/// Seconds an emptied corpse lingers before it decays
pub const LOOTED_CORPSE_DECAY_SECS: u32 = 30;

/// Demo loot table: (item id, max count)
const DEMO_ITEMS: [(u32, u32); 6] = [
    (2589, 4),  // Linen Cloth
    (2592, 3),  // Wool Cloth
    (4306, 2),  // Silk Cloth
    (769, 2),   // Chunk of Boar Meat
    (2318, 3),  // Light Leather
    (4865, 1),  // Ruined Pelt
];
const DEMO_QUEST_ITEM: u32 = 884;
/// Quest drops a player may hold at once
const DEMO_QUEST_ITEM_LIMIT: u32 = 10;
const DEMO_SPAWN_RADIUS: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PlayerId,
    pub position: Position,
    pub in_world: bool,
    pub money: u32,
    /// Lifetime copper picked up from loot
    pub money_looted: u64,
    pub inventory: Inventory,
    pub loot_guid: Option<ObjectGuid>,
    /// Lootable items (bags, clams, ...) carried by the player
    pub lootable_items: HashMap<ObjectGuid, Loot>,
}

impl PlayerState {
    pub fn new(id: PlayerId, position: Position, inventory: Inventory) -> Self {
        Self {
            id,
            position,
            in_world: true,
            money: 0,
            money_looted: 0,
            inventory,
            loot_guid: None,
            lootable_items: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Creature {
    pub guid: ObjectGuid,
    pub position: Position,
    pub is_alive: bool,
    pub is_lootable: bool,
    /// Players holding tap rights, empty when nobody tagged the creature
    pub tappers: Vec<PlayerId>,
    pub loot: Loot,
    /// Tick at which the corpse leaves the world
    pub despawn_tick: u64,
}

/// Bones left behind by a dead player.
#[derive(Debug, Clone)]
pub struct PlayerCorpse {
    pub owner: PlayerId,
    pub position: Position,
    pub loot: Loot,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    tick_rate: u32,
    players: HashMap<PlayerId, PlayerState>,
    /// Keyed by guid so iteration follows spawn order
    creatures: BTreeMap<ObjectGuid, Creature>,
    corpses: HashMap<ObjectGuid, PlayerCorpse>,
    groups: Vec<Vec<PlayerId>>,
    instance_maps: HashSet<u32>,
    instance_denials: HashSet<(PlayerId, ObjectGuid)>,
    next_counter: u32,
    outbox: Vec<(PlayerId, Packet)>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::with_tick_rate(DEFAULT_TICK_RATE)
    }

    pub fn with_tick_rate(tick_rate: u32) -> Self {
        Self {
            tick: 0,
            tick_rate: tick_rate.max(1),
            players: HashMap::new(),
            creatures: BTreeMap::new(),
            corpses: HashMap::new(),
            groups: Vec::new(),
            instance_maps: HashSet::new(),
            instance_denials: HashSet::new(),
            next_counter: 1,
            outbox: Vec::new(),
        }
    }

    fn secs_to_ticks(&self, secs: u32) -> u64 {
        secs as u64 * self.tick_rate as u64
    }

    fn next_guid(&mut self, kind: GuidKind) -> ObjectGuid {
        let guid = ObjectGuid::new(kind, self.next_counter);
        self.next_counter += 1;
        guid
    }

    fn push(&mut self, player: PlayerId, packet: Packet) {
        self.outbox.push((player, packet));
    }

    /// Takes every packet queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<(PlayerId, Packet)> {
        std::mem::take(&mut self.outbox)
    }

    // Players

    /// Adds a player at the default spawn point for their id.
    pub fn add_player(&mut self, client_id: PlayerId) {
        let spawn = Position::new(0, -8949.0 + (client_id % 10) as f32 * 3.0, -132.0, 83.5);
        self.add_player_at(client_id, spawn);
    }

    pub fn add_player_at(&mut self, client_id: PlayerId, position: Position) {
        self.add_player_with_bags(client_id, position, DEFAULT_BAG_SLOTS);
    }

    pub fn add_player_with_bags(&mut self, client_id: PlayerId, position: Position, bag_slots: usize) {
        let player = PlayerState::new(client_id, position, Inventory::new(bag_slots));
        info!(
            "Added player {} on map {} at ({:.1}, {:.1})",
            client_id, position.map_id, position.x, position.y
        );
        self.players.insert(client_id, player);
    }

    pub fn remove_player(&mut self, client_id: &PlayerId) {
        self.players.remove(client_id);
        for group in &mut self.groups {
            group.retain(|member| member != client_id);
        }
        self.groups.retain(|group| group.len() > 1);
        info!("Removed player {}", client_id);
    }

    /// Keeps the player's data but takes them out of the world.
    pub fn remove_from_world(&mut self, client_id: PlayerId) {
        if let Some(player) = self.players.get_mut(&client_id) {
            player.in_world = false;
            player.loot_guid = None;
        }
    }

    pub fn player(&self, client_id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&client_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_money(&self, client_id: PlayerId) -> Option<u32> {
        self.players.get(&client_id).map(|p| p.money)
    }

    pub fn money_looted(&self, client_id: PlayerId) -> Option<u64> {
        self.players.get(&client_id).map(|p| p.money_looted)
    }

    pub fn loot_guid(&self, client_id: PlayerId) -> Option<ObjectGuid> {
        self.players.get(&client_id).and_then(|p| p.loot_guid)
    }

    pub fn inventory(&self, client_id: PlayerId) -> Option<&Inventory> {
        self.players.get(&client_id).map(|p| &p.inventory)
    }

    pub fn inventory_mut(&mut self, client_id: PlayerId) -> Option<&mut Inventory> {
        self.players.get_mut(&client_id).map(|p| &mut p.inventory)
    }

    /// Puts every listed player in one group, pulling them out of any other.
    pub fn create_group(&mut self, members: &[PlayerId]) {
        for group in &mut self.groups {
            group.retain(|member| !members.contains(member));
        }
        self.groups.retain(|group| group.len() > 1);
        self.groups.push(members.to_vec());
    }

    // World objects

    /// Spawns a creature that has just been killed by `tappers`.
    pub fn spawn_corpse(&mut self, position: Position, loot: Loot, tappers: &[PlayerId]) -> ObjectGuid {
        let guid = self.next_guid(GuidKind::Creature);
        let despawn_tick = self.tick + self.secs_to_ticks(CORPSE_LIFETIME_SECS);
        self.creatures.insert(
            guid,
            Creature {
                guid,
                position,
                is_alive: false,
                is_lootable: true,
                tappers: tappers.to_vec(),
                loot,
                despawn_tick,
            },
        );
        guid
    }

    pub fn spawn_player_corpse(&mut self, owner: PlayerId, position: Position, loot: Loot) -> ObjectGuid {
        let guid = self.next_guid(GuidKind::Corpse);
        self.corpses.insert(
            guid,
            PlayerCorpse {
                owner,
                position,
                loot,
            },
        );
        guid
    }

    /// Gives the player a bag item with contents of its own.
    pub fn give_lootable_item(&mut self, client_id: PlayerId, mut loot: Loot) -> Option<ObjectGuid> {
        if !self.players.contains_key(&client_id) {
            return None;
        }
        loot.loot_type = LootType::Item;
        let guid = self.next_guid(GuidKind::Item);
        let player = self.players.get_mut(&client_id)?;
        player.lootable_items.insert(guid, loot);
        Some(guid)
    }

    pub fn creature(&self, guid: ObjectGuid) -> Option<&Creature> {
        self.creatures.get(&guid)
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn revive_creature(&mut self, guid: ObjectGuid) {
        if let Some(creature) = self.creatures.get_mut(&guid) {
            creature.is_alive = true;
        }
    }

    pub fn set_creature_lootable(&mut self, guid: ObjectGuid, lootable: bool) {
        if let Some(creature) = self.creatures.get_mut(&guid) {
            creature.is_lootable = lootable;
        }
    }

    pub fn add_instance_map(&mut self, map_id: u32) {
        self.instance_maps.insert(map_id);
    }

    /// Takes away the player's right to loot `creature` inside an instance.
    pub fn deny_instance_loot(&mut self, client_id: PlayerId, creature: ObjectGuid) {
        self.instance_denials.insert((client_id, creature));
    }

    /// Spawns `count` slain creatures with random loot around the player,
    /// all tapped by them.
    pub fn spawn_slain_creatures<R: Rng>(
        &mut self,
        client_id: PlayerId,
        count: usize,
        rng: &mut R,
    ) -> Vec<ObjectGuid> {
        let origin = match self.players.get_mut(&client_id) {
            Some(player) if player.in_world => {
                player
                    .inventory
                    .set_item_limit(DEMO_QUEST_ITEM, DEMO_QUEST_ITEM_LIMIT);
                player.position
            }
            _ => return Vec::new(),
        };

        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let position = origin.offset(
                rng.gen_range(-DEMO_SPAWN_RADIUS..DEMO_SPAWN_RADIUS),
                rng.gen_range(-DEMO_SPAWN_RADIUS..DEMO_SPAWN_RADIUS),
            );
            let loot = random_loot(client_id, rng);
            spawned.push(self.spawn_corpse(position, loot, &[client_id]));
        }
        info!("Spawned {} slain creatures around player {}", count, client_id);
        spawned
    }

    /// Advances one tick and removes corpses whose time is up.
    pub fn update(&mut self) -> Vec<ObjectGuid> {
        self.tick += 1;
        let tick = self.tick;
        let expired: Vec<ObjectGuid> = self
            .creatures
            .values()
            .filter(|c| !c.is_alive && c.despawn_tick <= tick)
            .map(|c| c.guid)
            .collect();

        for guid in &expired {
            self.creatures.remove(guid);
            for player in self.players.values_mut() {
                if player.loot_guid == Some(*guid) {
                    player.loot_guid = None;
                }
            }
            debug!("Corpse {} decayed", guid);
        }
        expired
    }

    // Normal single-target loot path

    /// Opens the loot window for `target` and sends its contents.
    pub fn open_loot(&mut self, client_id: PlayerId, target: ObjectGuid) -> Result<(), LootError> {
        let origin = self
            .player_position(client_id)
            .ok_or(LootError::PlayerNotFound(client_id))?;

        match target.kind {
            GuidKind::Creature => {
                let creature = self
                    .creatures
                    .get(&target)
                    .ok_or(LootError::CreatureNotFound(target))?;
                if creature.is_alive || !creature.is_lootable || !creature.tappers.contains(&client_id) {
                    return Err(LootError::NotLootable(target));
                }
                if !origin.is_within(&creature.position, INTERACTION_DISTANCE) {
                    return Err(LootError::OutOfRange(target));
                }
            }
            GuidKind::Corpse => {
                let corpse = self.corpses.get(&target).ok_or(LootError::CorpseNotFound(target))?;
                if !origin.is_within(&corpse.position, INTERACTION_DISTANCE) {
                    return Err(LootError::OutOfRange(target));
                }
            }
            _ => {}
        }

        let loot = self.loot(client_id, target)?;
        let packet = Packet::LootResponse {
            target,
            gold: loot.gold,
            items: loot.visible_slots(client_id),
        };
        self.set_loot_guid(client_id, Some(target));
        self.push(client_id, packet);
        Ok(())
    }

    /// Takes one slot from the open loot window.
    pub fn autostore_loot_item(&mut self, client_id: PlayerId, slot: u8) -> Result<LootItem, LootError> {
        let guid = self.loot_guid(client_id).ok_or(LootError::NoLootOpen(client_id))?;
        self.store_loot_item(client_id, guid, slot)
    }

    /// Takes the coins from the open loot window. Returns the amount credited.
    pub fn loot_money(&mut self, client_id: PlayerId) -> Result<u32, LootError> {
        let guid = self.loot_guid(client_id).ok_or(LootError::NoLootOpen(client_id))?;
        let loot = self.loot_mut(client_id, guid)?;
        let amount = std::mem::take(&mut loot.gold);
        if amount > 0 {
            self.modify_money(client_id, amount);
            self.record_looted_money(client_id, amount);
            self.send_loot_money_notify(client_id, amount, true);
            self.notify_money_removed(guid);
        }
        Ok(amount)
    }

    /// Closes the player's loot window and cleans up emptied containers.
    pub fn release_loot(&mut self, client_id: PlayerId, target: ObjectGuid) {
        if self.loot_guid(client_id) == Some(target) {
            self.set_loot_guid(client_id, None);
        }
        self.send_loot_release(client_id, target);

        let loot_type = match self.loot(client_id, target) {
            Ok(loot) if loot.is_looted() => loot.loot_type,
            _ => return,
        };
        match loot_type {
            LootType::Item => {
                if let Some(player) = self.players.get_mut(&client_id) {
                    player.lootable_items.remove(&target);
                }
            }
            LootType::Corpse if target.kind == GuidKind::Creature => {
                self.all_loot_removed_from_corpse(target)
            }
            LootType::Corpse => {}
        }
    }
}

fn random_loot<R: Rng>(client_id: PlayerId, rng: &mut R) -> Loot {
    let mut loot = Loot::new(LootType::Corpse).with_gold(rng.gen_range(0..=150));
    for _ in 0..rng.gen_range(0..=3) {
        let (item_id, max_count) = DEMO_ITEMS[rng.gen_range(0..DEMO_ITEMS.len())];
        loot.add_item(item_id, rng.gen_range(1..=max_count));
    }
    if rng.gen_bool(0.2) {
        loot.add_quest_item(DEMO_QUEST_ITEM, 1, &[client_id]);
    }
    loot
}

impl LootHost for GameState {
    fn player_position(&self, player: PlayerId) -> Option<Position> {
        self.players
            .get(&player)
            .filter(|p| p.in_world)
            .map(|p| p.position)
    }

    fn is_instanceable_map(&self, map_id: u32) -> bool {
        self.instance_maps.contains(&map_id)
    }

    fn is_allowed_to_loot(&self, player: PlayerId, creature: ObjectGuid) -> bool {
        !self.instance_denials.contains(&(player, creature))
    }

    fn group_members(&self, player: PlayerId) -> Option<Vec<PlayerId>> {
        self.groups
            .iter()
            .find(|group| group.contains(&player))
            .cloned()
    }

    fn dead_creatures_near(&self, player: PlayerId, radius: f32) -> Vec<ObjectGuid> {
        let origin = match self.player_position(player) {
            Some(position) => position,
            None => return Vec::new(),
        };
        self.creatures
            .values()
            .filter(|c| !c.is_alive && origin.is_within(&c.position, radius))
            .map(|c| c.guid)
            .collect()
    }

    fn creature_status(&self, creature: ObjectGuid) -> Option<CreatureStatus> {
        self.creatures.get(&creature).map(|c| CreatureStatus {
            position: c.position,
            is_alive: c.is_alive,
            is_lootable: c.is_lootable,
            has_loot_recipient: !c.tappers.is_empty(),
        })
    }

    fn is_tapped_by(&self, creature: ObjectGuid, player: PlayerId) -> bool {
        self.creatures
            .get(&creature)
            .map_or(false, |c| c.tappers.contains(&player))
    }

    fn loot(&self, player: PlayerId, guid: ObjectGuid) -> Result<&Loot, LootError> {
        match guid.kind {
            GuidKind::Creature => self
                .creatures
                .get(&guid)
                .map(|c| &c.loot)
                .ok_or(LootError::CreatureNotFound(guid)),
            GuidKind::Corpse => self
                .corpses
                .get(&guid)
                .map(|c| &c.loot)
                .ok_or(LootError::CorpseNotFound(guid)),
            GuidKind::Item => self
                .players
                .get(&player)
                .and_then(|p| p.lootable_items.get(&guid))
                .ok_or(LootError::ItemNotFound(guid)),
            GuidKind::GameObject => Err(LootError::GameObjectUnsupported(guid)),
            GuidKind::Player => Err(LootError::NotLootable(guid)),
        }
    }

    fn loot_mut(&mut self, player: PlayerId, guid: ObjectGuid) -> Result<&mut Loot, LootError> {
        match guid.kind {
            GuidKind::Creature => self
                .creatures
                .get_mut(&guid)
                .map(|c| &mut c.loot)
                .ok_or(LootError::CreatureNotFound(guid)),
            GuidKind::Corpse => self
                .corpses
                .get_mut(&guid)
                .map(|c| &mut c.loot)
                .ok_or(LootError::CorpseNotFound(guid)),
            GuidKind::Item => self
                .players
                .get_mut(&player)
                .and_then(|p| p.lootable_items.get_mut(&guid))
                .ok_or(LootError::ItemNotFound(guid)),
            GuidKind::GameObject => Err(LootError::GameObjectUnsupported(guid)),
            GuidKind::Player => Err(LootError::NotLootable(guid)),
        }
    }

    fn store_loot_item(
        &mut self,
        player: PlayerId,
        guid: ObjectGuid,
        slot: u8,
    ) -> Result<LootItem, LootError> {
        let item = self
            .loot(player, guid)?
            .item_in_slot(slot, player)
            .cloned()
            .ok_or(LootError::EmptySlot {
                loot_guid: guid,
                slot,
            })?;

        self.players
            .get_mut(&player)
            .ok_or(LootError::PlayerNotFound(player))?
            .inventory
            .store(item.item_id, item.count)
            .map_err(|result| LootError::Inventory {
                loot_guid: guid,
                slot,
                result,
            })?;

        self.loot_mut(player, guid)?.mark_slot_looted(slot, player);
        self.push(
            player,
            Packet::ItemPushed {
                item_id: item.item_id,
                count: item.count,
            },
        );
        self.push(player, Packet::LootRemoved { slot });
        Ok(item)
    }

    fn set_loot_guid(&mut self, player: PlayerId, guid: Option<ObjectGuid>) {
        if let Some(state) = self.players.get_mut(&player) {
            state.loot_guid = guid;
        }
    }

    fn send_loot_release(&mut self, player: PlayerId, guid: ObjectGuid) {
        self.push(player, Packet::LootReleaseResponse { target: guid });
    }

    fn all_loot_removed_from_corpse(&mut self, creature: ObjectGuid) {
        let decay_tick = self.tick + self.secs_to_ticks(LOOTED_CORPSE_DECAY_SECS);
        if let Some(creature) = self.creatures.get_mut(&creature) {
            creature.is_lootable = false;
            creature.despawn_tick = creature.despawn_tick.min(decay_tick);
        }
    }

    fn notify_money_removed(&mut self, guid: ObjectGuid) {
        let viewers: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.loot_guid == Some(guid))
            .map(|p| p.id)
            .collect();
        for viewer in viewers {
            self.push(viewer, Packet::LootClearMoney { target: guid });
        }
    }

    fn modify_money(&mut self, player: PlayerId, amount: u32) {
        if let Some(state) = self.players.get_mut(&player) {
            state.money = state.money.saturating_add(amount);
        }
    }

    fn record_looted_money(&mut self, player: PlayerId, amount: u32) {
        if let Some(state) = self.players.get_mut(&player) {
            state.money_looted += amount as u64;
        }
    }

    fn send_system_message(&mut self, player: PlayerId, text: String) {
        self.push(player, Packet::SystemMessage { text });
    }

    fn send_loot_money_notify(&mut self, player: PlayerId, amount: u32, solo: bool) {
        self.push(player, Packet::LootMoneyNotify { amount, solo });
    }

    fn send_item_retrieval_mail(&mut self, player: PlayerId, item_id: u32, count: u32) {
        info!("Mailing {}x item {} to player {}", count, item_id, player);
        self.push(player, Packet::ItemRetrievalMail { item_id, count });
    }
}
