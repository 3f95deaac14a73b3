//! `.aoeloot` chat commands and the loot opcode trigger

use super::sequencer::start_aoe_loot;
use super::{AoeLootOutcome, LootContext, LootHost, LootPreferences};
use crate::client_manager::SecurityLevel;
use crate::config::AoeLootConfig;
use crate::loot::PlayerId;

pub const COMMAND_PREFIX: &str = ".aoeloot";

pub const MSG_DISABLED: &str = "AOE Loot is disabled by server configuration.";
pub const MSG_ENABLED: &str =
    "AOE looting has been enabled for your character. Type: '.aoeloot off' to turn AoE Looting Off.";
pub const MSG_OFF: &str = "AOE Loot disabled for your character.";
pub const MSG_TOGGLED: &str = "AOE Loot toggled for your character.";
pub const MSG_DEBUG_ON: &str = "AOE Loot debug mode enabled.";
pub const MSG_DEBUG_OFF: &str = "AOE Loot debug mode disabled.";
pub const MSG_DEBUG_TOGGLED: &str = "AOE Loot debug mode toggled.";
pub const MSG_NO_PERMISSION: &str = "You do not have permission to use this command.";
pub const MSG_USAGE: &str =
    "Usage: .aoeloot on | off | toggle | debug on | debug off | debug toggle | startaoeloot";
pub const MSG_LOGIN_HINT: &str =
    "This server is running the AOE Loot module. Type: '.aoeloot on' to loot all nearby corpses at once.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoeLootCommand {
    On,
    Off,
    Toggle,
    DebugOn,
    DebugOff,
    DebugToggle,
    StartAoeLoot,
    Help,
}

impl AoeLootCommand {
    /// Parses chat text. Returns `None` when the text is not an `.aoeloot` command.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        if !words.next()?.eq_ignore_ascii_case(COMMAND_PREFIX) {
            return None;
        }
        let args: Vec<String> = words.map(|w| w.to_ascii_lowercase()).collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let command = match args.as_slice() {
            ["on"] => AoeLootCommand::On,
            ["off"] => AoeLootCommand::Off,
            ["toggle"] => AoeLootCommand::Toggle,
            ["debug", "on"] => AoeLootCommand::DebugOn,
            ["debug", "off"] => AoeLootCommand::DebugOff,
            ["debug", "toggle"] => AoeLootCommand::DebugToggle,
            ["startaoeloot"] => AoeLootCommand::StartAoeLoot,
            _ => AoeLootCommand::Help,
        };
        Some(command)
    }

    pub fn required_security(&self) -> SecurityLevel {
        SecurityLevel::Player
    }
}

/// Runs a parsed command for `player`. Always reports the command as handled.
pub fn handle_command<H: LootHost>(
    host: &mut H,
    config: &AoeLootConfig,
    player: PlayerId,
    security: SecurityLevel,
    prefs: &mut LootPreferences,
    command: AoeLootCommand,
) -> bool {
    // Every subcommand currently requires `Player`, the lowest level
    if security < command.required_security() {
        host.send_system_message(player, MSG_NO_PERMISSION.to_string());
        return true;
    }
    if command == AoeLootCommand::StartAoeLoot {
        let ctx = LootContext::new(config, player, *prefs);
        start_aoe_loot(host, &ctx);
        return true;
    }
    if !config.enable {
        host.send_system_message(player, MSG_DISABLED.to_string());
        return true;
    }

    let reply = match command {
        AoeLootCommand::On => {
            prefs.set_enabled(true);
            MSG_ENABLED
        }
        AoeLootCommand::Off => {
            prefs.set_enabled(false);
            MSG_OFF
        }
        AoeLootCommand::Toggle => {
            prefs.toggle_enabled();
            MSG_TOGGLED
        }
        AoeLootCommand::DebugOn => {
            prefs.set_debug(true);
            MSG_DEBUG_ON
        }
        AoeLootCommand::DebugOff => {
            prefs.set_debug(false);
            MSG_DEBUG_OFF
        }
        AoeLootCommand::DebugToggle => {
            prefs.toggle_debug();
            MSG_DEBUG_TOGGLED
        }
        AoeLootCommand::Help | AoeLootCommand::StartAoeLoot => MSG_USAGE,
    };
    host.send_system_message(player, reply.to_string());
    true
}

/// Fired when the player sends the normal loot request. Runs an AOE pass
/// only for players who opted in; the host's own loot handling follows
/// either way.
pub fn handle_loot_opcode<H: LootHost>(
    host: &mut H,
    config: &AoeLootConfig,
    player: PlayerId,
    prefs: LootPreferences,
) -> Option<AoeLootOutcome> {
    if !prefs.is_enabled() {
        return None;
    }
    let ctx = LootContext::new(config, player, prefs);
    Some(start_aoe_loot(host, &ctx))
}

/// Hint shown at login, when both the module and the message are enabled.
pub fn login_message(config: &AoeLootConfig) -> Option<&'static str> {
    if config.enable && config.message {
        Some(MSG_LOGIN_HINT)
    } else {
        None
    }
}
