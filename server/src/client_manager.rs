//! Client session management for the loot server
//!
//! This module tracks connected clients and the state that belongs to a
//! session rather than to the world:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Account security level used to gate chat commands
//! - AOE loot preferences, which live and die with the session
//!
//! Preferences are not persisted; a reconnecting player starts with
//! AOE looting off until they opt in again.

use crate::aoe_loot::LootPreferences;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Clients silent for longer than this are dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Account privilege levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    #[default]
    Player,
    Moderator,
    GameMaster,
    Administrator,
}

/// Represents a connected client and their session state
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server, also the player id
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    pub security: SecurityLevel,
    pub preferences: LootPreferences,
}

impl Client {
    /// Creates a new client with default player privileges and AOE loot off
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            security: SecurityLevel::default(),
            preferences: LootPreferences::new(),
        }
    }

    /// Marks the client as recently active
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Lives behind the server's lock, which also serialises every read and
/// write of a session's loot preferences.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client and drops its session state
    ///
    /// Returns true if the client was found and removed, false if they
    /// were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Refreshes the activity timestamp; false for unknown clients
    pub fn touch(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    pub fn preferences(&self, client_id: u32) -> Option<LootPreferences> {
        self.clients.get(&client_id).map(|c| c.preferences)
    }

    pub fn preferences_mut(&mut self, client_id: u32) -> Option<&mut LootPreferences> {
        self.clients.get_mut(&client_id).map(|c| &mut c.preferences)
    }

    pub fn security(&self, client_id: u32) -> Option<SecurityLevel> {
        self.clients.get(&client_id).map(|c| c.security)
    }

    pub fn set_security(&mut self, client_id: u32, security: SecurityLevel) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.security = security;
            true
        } else {
            false
        }
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so the world can drop their players.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        self.check_timeouts_with(CLIENT_TIMEOUT)
    }

    pub fn check_timeouts_with(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Network address of a single client
    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
