//! Server network layer handling UDP communications and the world loop

use crate::aoe_loot::{self, AoeLootCommand, AoeLootOutcome, LootHost};
use crate::client_manager::ClientManager;
use crate::config::{self, AoeLootConfig};
use crate::game::GameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// How often the config file is checked for edits
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    ConfigReloaded {
        config: AoeLootConfig,
    },
}

/// Messages sent from the world loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Main server coordinating networking, the world and the AOE loot module
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    loot_config: AoeLootConfig,
    config_path: Option<PathBuf>,
    config_poll: Duration,
    demo_corpses: usize,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        loot_config: AoeLootConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let ticks_per_second = (1.0 / tick_duration.as_secs_f64().max(0.001)).round() as u32;

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state: GameState::with_tick_rate(ticks_per_second),
            loot_config,
            config_path: None,
            config_poll: CONFIG_POLL_INTERVAL,
            demo_corpses: 0,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Watches `path` and swaps in the new configuration when it changes.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Spawns `count` slain creatures around every player that connects.
    pub fn with_demo_corpses(mut self, count: usize) -> Self {
        self.demo_corpses = count;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn loot_config(&self) -> &AoeLootConfig {
        &self.loot_config
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Spawns task that reloads the config file whenever its mtime changes
    async fn spawn_config_watcher(&self) {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => return,
        };
        let server_tx = self.server_tx.clone();
        let poll = self.config_poll;
        let mut last_modified = config::modified_time(&path);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll);

            loop {
                interval.tick().await;

                let modified = config::modified_time(&path);
                if modified.is_none() || modified == last_modified {
                    continue;
                }
                last_modified = modified;

                match AoeLootConfig::load(&path).await {
                    Ok(config) => {
                        if server_tx.send(ServerMessage::ConfigReloaded { config }).is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("{}; keeping previous configuration", e),
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn broadcast_packet(&self, packet: &Packet, exclude: Option<u32>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket {
            packet: packet.clone(),
            exclude,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Sends everything the world queued to the owning clients
    async fn flush_outbox(&mut self) {
        let outgoing = self.game_state.drain_outbox();
        if outgoing.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for (client_id, packet) in outgoing {
            match clients.addr_of(client_id) {
                Some(addr) => {
                    if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
                        error!("Failed to queue packet for sending: {}", e);
                    }
                }
                None => debug!("Dropping packet for departed client {}", client_id),
            }
        }
    }

    /// Processes incoming packets and updates the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    self.game_state.remove_player(&client_id);
                }
            }

            packet => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr);
                    if let Some(id) = client_id {
                        clients.touch(id);
                    }
                    client_id
                };

                match client_id {
                    Some(client_id) => self.handle_client_packet(client_id, packet).await,
                    None => warn!("Packet from unknown client at {}", addr),
                }
            }
        }

        self.flush_outbox().await;
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            let response = Packet::Disconnected {
                reason: "Protocol version mismatch".to_string(),
            };
            self.send_packet(&response, addr).await;
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            let mut clients = self.clients.write().await;
            clients.remove_client(&existing_id);
            self.game_state.remove_player(&existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let client_id = match client_id {
            Some(client_id) => client_id,
            None => {
                let response = Packet::Disconnected {
                    reason: "Server full".to_string(),
                };
                self.send_packet(&response, addr).await;
                return;
            }
        };

        self.game_state.add_player(client_id);
        self.send_packet(&Packet::Connected { client_id }, addr).await;

        if let Some(hint) = aoe_loot::login_message(&self.loot_config) {
            self.game_state
                .send_system_message(client_id, hint.to_string());
        }

        if self.demo_corpses > 0 {
            let mut rng = rand::thread_rng();
            self.game_state
                .spawn_slain_creatures(client_id, self.demo_corpses, &mut rng);
        }
    }

    /// Handles requests from a connected player
    async fn handle_client_packet(&mut self, client_id: u32, packet: Packet) {
        match packet {
            Packet::Loot { target } => {
                let prefs = {
                    let clients = self.clients.read().await;
                    clients.preferences(client_id).unwrap_or_default()
                };

                let outcome =
                    aoe_loot::handle_loot_opcode(&mut self.game_state, &self.loot_config, client_id, prefs);
                let mut target_released = false;
                if let Some(AoeLootOutcome::Looted(summary)) = outcome {
                    debug!(
                        target: aoe_loot::LOG_TARGET,
                        "player {}: {} corpses, {} items, {} copper",
                        client_id,
                        summary.corpses_processed,
                        summary.items_stored,
                        summary.gold_credited
                    );
                    target_released = summary.was_released(target);
                }

                // The normal loot path always follows
                if let Err(e) = self.game_state.open_loot(client_id, target) {
                    debug!("Loot request from {} refused: {}", client_id, e);
                    // The pass already told the client this target is released
                    if !target_released {
                        self.game_state.send_loot_release(client_id, target);
                    }
                }
            }

            Packet::AutostoreLootItem { slot } => {
                if let Err(e) = self.game_state.autostore_loot_item(client_id, slot) {
                    debug!("Autostore for {} failed: {}", client_id, e);
                }
            }

            Packet::LootMoney => {
                if let Err(e) = self.game_state.loot_money(client_id) {
                    debug!("Loot money for {} failed: {}", client_id, e);
                }
            }

            Packet::LootRelease { target } => {
                self.game_state.release_loot(client_id, target);
            }

            Packet::ChatCommand { text } => match AoeLootCommand::parse(&text) {
                Some(command) => {
                    let mut clients = self.clients.write().await;
                    let security = clients.security(client_id).unwrap_or_default();
                    if let Some(prefs) = clients.preferences_mut(client_id) {
                        aoe_loot::handle_command(
                            &mut self.game_state,
                            &self.loot_config,
                            client_id,
                            security,
                            prefs,
                            command,
                        );
                    }
                }
                None => {
                    self.game_state
                        .send_system_message(client_id, format!("Unknown command: {}", text));
                }
            },

            _ => {
                warn!("Unexpected packet type from client {}", client_id);
            }
        }
    }

    fn apply_config(&mut self, config: AoeLootConfig) {
        if config != self.loot_config {
            info!("AOE loot configuration reloaded: {:?}", config);
            self.loot_config = config;
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;
        self.spawn_config_watcher().await;

        let mut tick_interval = interval(self.tick_duration);
        let ticks_per_second = (1.0 / self.tick_duration.as_secs_f64().max(0.001)).round() as u64;
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_player(&client_id);
                        },
                        Some(ServerMessage::ConfigReloaded { config }) => {
                            self.apply_config(config);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let decayed = self.game_state.update();
                    if !decayed.is_empty() {
                        debug!("{} corpses decayed", decayed.len());
                    }
                    self.flush_outbox().await;

                    // Periodic monitoring
                    if self.game_state.tick % (ticks_per_second.max(1) * 60) == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };

                        if client_count > 0 {
                            debug!("Tick {}: {} clients, {} creatures",
                                   self.game_state.tick, client_count, self.game_state.creature_count());
                        }
                    }
                },

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    let notice = Packet::Disconnected {
                        reason: "Server shutting down".to_string(),
                    };
                    self.broadcast_packet(&notice, None).await;
                    break;
                },
            }
        }

        Ok(())
    }
}
