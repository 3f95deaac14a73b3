//! # Loot Server Library
//!
//! This library provides an authoritative game server built around
//! area-of-effect looting: a player who opted in empties every eligible
//! corpse around them with a single loot request instead of opening each
//! one in turn.
//!
//! ## Core Responsibilities
//!
//! ### World State
//! The server owns the canonical world: players with their bags and money,
//! slain creatures with their loot and tap rights, player bones, lootable
//! bag items and groups. Clients only ever send requests; every decision
//! about what may be looted is made here.
//!
//! ### AOE Looting
//! The `aoe_loot` module intercepts the normal loot request, discovers the
//! corpses the player may loot, and replays the regular per-slot loot logic
//! across all of them. It talks to the world exclusively through the
//! [`aoe_loot::LootHost`] trait and re-resolves every object by guid.
//!
//! ### Client Management
//! Handles the lifecycle of client connections, including:
//! - Connection establishment and player assignment
//! - Per-session loot preferences and account security level
//! - Disconnection handling and timeout cleanup
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All packets, world ticks and configuration reloads are processed
//! sequentially by one loop. An AOE pass runs to completion inside the
//! handling of a single request and never awaits.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets with bincode-encoded [`shared::Packet`] messages.
//!
//! ## Module Organization
//!
//! - `aoe_loot`: discovery, loot replay, gold distribution and `.aoeloot` commands
//! - `client_manager`: connected sessions and their preferences
//! - `config`: the `[AOELoot]` TOML configuration
//! - `error`: configuration and loot errors
//! - `game`: the in-memory world implementing `LootHost`
//! - `inventory`: player bags
//! - `loot`: loot containers and slot bookkeeping
//! - `network`: sockets, tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::AoeLootConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AoeLootConfig::load("aoe_loot.toml").await?;
//!
//!     // 60Hz world ticks, at most 32 clients, config hot reload and
//!     // ten slain creatures around every new player
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         32,
//!         config,
//!     )
//!     .await?
//!     .with_config_path("aoe_loot.toml")
//!     .with_demo_corpses(10);
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server runs internal async tasks for:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes the outgoing packet queue
//! - **Timeout Checker**: Removes inactive connections
//! - **Config Watcher**: Reloads the configuration file when it changes
//! - **Main Loop**: Handles requests, decays corpses and flushes replies

pub mod aoe_loot;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod inventory;
pub mod loot;
pub mod network;
