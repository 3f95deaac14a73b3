/// Per-player AOE loot switches.
///
/// Owned by the player's session entry in the client manager, so the record
/// disappears with the connection. Both flags start off until the player
/// opts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LootPreferences {
    aoe_enabled: bool,
    debug_enabled: bool,
}

impl LootPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.aoe_enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.aoe_enabled = enabled;
    }

    /// Flips the AOE flag and returns the new value.
    pub fn toggle_enabled(&mut self) -> bool {
        self.aoe_enabled = !self.aoe_enabled;
        self.aoe_enabled
    }

    pub fn is_debug(&self) -> bool {
        self.debug_enabled
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug_enabled = enabled;
    }

    /// Flips the debug flag and returns the new value.
    pub fn toggle_debug(&mut self) -> bool {
        self.debug_enabled = !self.debug_enabled;
        self.debug_enabled
    }
}
