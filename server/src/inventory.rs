//! Player bags
//!
//! A flat list of stacks bounded by a bag slot count. Items merge into
//! existing stacks of the same id before opening new slots.

use std::collections::HashMap;

pub const DEFAULT_BAG_SLOTS: usize = 16;
pub const DEFAULT_MAX_STACK: u32 = 20;

/// Result codes for a failed store, mirroring what the client is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryResult {
    InventoryFull,
    CantCarryMoreOfThis,
    ItemNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: u32,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    bag_slots: usize,
    max_stack: u32,
    stacks: Vec<ItemStack>,
    /// Per-item ownership caps, typically quest items
    item_limits: HashMap<u32, u32>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(DEFAULT_BAG_SLOTS)
    }
}

impl Inventory {
    pub fn new(bag_slots: usize) -> Self {
        Self {
            bag_slots,
            max_stack: DEFAULT_MAX_STACK,
            stacks: Vec::new(),
            item_limits: HashMap::new(),
        }
    }

    pub fn set_item_limit(&mut self, item_id: u32, max_count: u32) {
        self.item_limits.insert(item_id, max_count);
    }

    pub fn count_of(&self, item_id: u32) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.count)
            .sum()
    }

    pub fn used_slots(&self) -> usize {
        self.stacks.len()
    }

    pub fn free_slots(&self) -> usize {
        self.bag_slots.saturating_sub(self.stacks.len())
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    /// Checks whether `count` of `item_id` fits without changing anything.
    pub fn can_store(&self, item_id: u32, count: u32) -> Result<(), InventoryResult> {
        if let Some(limit) = self.item_limits.get(&item_id) {
            if self.count_of(item_id) + count > *limit {
                return Err(InventoryResult::CantCarryMoreOfThis);
            }
        }

        let room_in_stacks: u32 = self
            .stacks
            .iter()
            .filter(|s| s.item_id == item_id)
            .map(|s| self.max_stack.saturating_sub(s.count))
            .sum();
        let remaining = count.saturating_sub(room_in_stacks);
        let slots_needed = remaining.div_ceil(self.max_stack) as usize;

        if slots_needed > self.free_slots() {
            return Err(InventoryResult::InventoryFull);
        }
        Ok(())
    }

    pub fn store(&mut self, item_id: u32, count: u32) -> Result<(), InventoryResult> {
        self.can_store(item_id, count)?;

        let mut remaining = count;
        for stack in self.stacks.iter_mut().filter(|s| s.item_id == item_id) {
            let room = self.max_stack.saturating_sub(stack.count);
            let moved = room.min(remaining);
            stack.count += moved;
            remaining -= moved;
            if remaining == 0 {
                return Ok(());
            }
        }
        while remaining > 0 {
            let moved = remaining.min(self.max_stack);
            self.stacks.push(ItemStack {
                item_id,
                count: moved,
            });
            remaining -= moved;
        }
        Ok(())
    }
}
