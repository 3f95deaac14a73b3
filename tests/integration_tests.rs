//! Integration tests for the loot server
//!
//! These tests drive the AOE loot module against the in-memory world and a
//! real UDP server.

use bincode::{deserialize, serialize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::aoe_loot::commands::{MSG_ENABLED, MSG_LOGIN_HINT};
use server::aoe_loot::{
    find_candidates, handle_command, handle_loot_opcode, start_aoe_loot, AoeLootCommand,
    AoeLootOutcome, LootContext, LootHost, LootPreferences,
};
use server::client_manager::{ClientManager, SecurityLevel};
use server::config::AoeLootConfig;
use server::game::GameState;
use server::loot::{Loot, LootType};
use server::network::Server;
use shared::{ObjectGuid, Packet, Position, PROTOCOL_VERSION};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

fn origin() -> Position {
    Position::new(0, 0.0, 0.0, 0.0)
}

fn gold_loot(gold: u32) -> Loot {
    Loot::new(LootType::Corpse).with_gold(gold)
}

fn opted_in() -> LootPreferences {
    let mut prefs = LootPreferences::new();
    prefs.set_enabled(true);
    prefs
}

fn looted(outcome: AoeLootOutcome) -> server::aoe_loot::PassSummary {
    match outcome {
        AoeLootOutcome::Looted(summary) => summary,
        other => panic!("expected a loot pass, got {:?}", other),
    }
}

/// LOOT SCENARIOS
mod loot_scenarios {
    use super::*;

    /// A solo player gets all the gold of a corpse
    #[test]
    fn solo_player_receives_full_gold() {
        let mut state = GameState::new();
        state.add_player_at(1, origin());
        state.spawn_corpse(origin(), gold_loot(100), &[1]);
        state.spawn_corpse(origin(), gold_loot(0), &[1]);
        let mut extra = gold_loot(0);
        extra.add_item(2589, 1);
        state.spawn_corpse(origin(), extra, &[1]);
        let config = AoeLootConfig::default();

        let summary = looted(handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap());

        assert_eq!(summary.gold_credited, 100);
        assert_eq!(state.player_money(1), Some(100));
        assert_eq!(state.money_looted(1), Some(100));
    }

    /// Two nearby group members split 101 copper 50/50 and 1 is dropped
    #[test]
    fn group_split_drops_remainder() {
        let mut state = GameState::new();
        state.add_player_at(1, origin());
        state.add_player_at(2, origin().offset(20.0, 0.0));
        state.create_group(&[1, 2]);
        state.spawn_corpse(origin(), gold_loot(101), &[1, 2]);
        state.spawn_corpse(origin(), gold_loot(0), &[1]);
        let mut second = gold_loot(0);
        second.add_item(2592, 1);
        state.spawn_corpse(origin(), second, &[1, 2]);
        let config = AoeLootConfig::default();

        let summary = looted(handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap());

        assert_eq!(state.player_money(1), Some(50));
        assert_eq!(state.player_money(2), Some(50));
        assert_eq!(summary.gold_dropped, 1);
    }

    /// Every recipient gets floor(G / N)
    #[test]
    fn group_shares_are_floor_division() {
        let config = AoeLootConfig::default();
        for members in 1..=5u32 {
            for gold in [1u32, 7, 99, 100, 12345] {
                let mut state = GameState::new();
                let ids: Vec<u32> = (1..=members).collect();
                for id in &ids {
                    state.add_player_at(*id, origin());
                }
                if members > 1 {
                    state.create_group(&ids);
                }
                state.spawn_corpse(origin(), gold_loot(gold), &[1]);
                state.spawn_corpse(origin(), gold_loot(1), &[1]);

                let ctx = LootContext::new(&config, 1, LootPreferences::new());
                start_aoe_loot(&mut state, &ctx);

                let expected = gold / members + 1 / members;
                for id in &ids {
                    assert_eq!(state.player_money(*id), Some(expected), "gold {} members {}", gold, members);
                }
            }
        }
    }

    /// One eligible corpse with a threshold of two leaves everything alone
    #[test]
    fn threshold_not_met_is_noop() {
        let mut state = GameState::new();
        state.add_player_at(1, origin());
        let mut loot = gold_loot(40);
        loot.add_item(2589, 2);
        let guid = state.spawn_corpse(origin(), loot, &[1]);
        let config = AoeLootConfig::default();

        let outcome = handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap();

        assert_eq!(
            outcome,
            AoeLootOutcome::BelowThreshold {
                eligible: 1,
                threshold: 2
            }
        );
        assert_eq!(state.player_money(1), Some(0));
        assert_eq!(state.inventory(1).unwrap().used_slots(), 0);
        assert_eq!(state.loot(1, guid).unwrap().gold, 40);
    }

    /// A failed store keeps the slot and the pass carries on
    #[test]
    fn full_bags_do_not_stop_the_pass() {
        let mut state = GameState::new();
        state.add_player_with_bags(1, origin(), 1);
        let mut first = gold_loot(10);
        first.add_item(100, 1);
        first.add_item(101, 1);
        let first = state.spawn_corpse(origin(), first, &[1]);
        let mut second = gold_loot(15);
        second.add_item(102, 1);
        let second = state.spawn_corpse(origin(), second, &[1]);
        let config = AoeLootConfig::default();

        let summary = looted(handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap());

        assert_eq!(summary.corpses_processed, 2);
        assert_eq!(summary.items_stored, 1);
        assert_eq!(summary.items_failed, 2);
        assert_eq!(state.player_money(1), Some(25));
        assert!(!state.loot(1, first).unwrap().items[1].is_looted);
        assert!(!state.loot(1, second).unwrap().items[0].is_looted);
    }

    /// A second pass right after the first changes nothing
    #[test]
    fn second_pass_is_idempotent() {
        let mut state = GameState::new();
        state.add_player_with_bags(1, origin(), 64);
        let mut rng = StdRng::seed_from_u64(11);
        state.spawn_slain_creatures(1, 8, &mut rng);
        let config = AoeLootConfig::default();

        handle_loot_opcode(&mut state, &config, 1, opted_in());
        let money = state.player_money(1);
        let stacks = state.inventory(1).unwrap().stacks().to_vec();

        let outcome = handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap();

        assert!(matches!(outcome, AoeLootOutcome::BelowThreshold { eligible: 0, .. }));
        assert_eq!(state.player_money(1), money);
        assert_eq!(state.inventory(1).unwrap().stacks(), stacks.as_slice());
    }

    /// Discovery only yields dead, lootable, tapped corpses with contents
    #[test]
    fn discovery_invariant_holds_on_random_worlds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut state = GameState::new();
            state.add_player_at(1, origin());
            state.add_player_at(2, origin());
            for _ in 0..30 {
                let tapper = if rng.gen_bool(0.7) { 1 } else { 2 };
                let mut loot = gold_loot(rng.gen_range(0..3));
                if rng.gen_bool(0.5) {
                    loot.add_item(rng.gen_range(1..50), 1);
                }
                let position = origin().offset(rng.gen_range(-80.0..80.0), rng.gen_range(-80.0..80.0));
                let guid = state.spawn_corpse(position, loot, &[tapper]);
                if rng.gen_bool(0.1) {
                    state.revive_creature(guid);
                }
                if rng.gen_bool(0.1) {
                    state.set_creature_lootable(guid, false);
                }
            }

            let found: Vec<ObjectGuid> = find_candidates(&state, 1, 55.0).collect();
            for guid in found {
                let status = state.creature_status(guid).unwrap();
                assert!(!status.is_alive && status.is_lootable && status.has_loot_recipient);
                assert!(state.is_tapped_by(guid, 1));
                assert!(origin().is_within(&status.position, 55.0));
                let loot = state.loot(1, guid).unwrap();
                assert!(!loot.is_empty() && !loot.is_looted());
            }
        }
    }

    /// Preferences live with the session and commands flip them
    #[test]
    fn commands_update_session_preferences() {
        let mut clients = ClientManager::new(4);
        let client_id = clients.add_client("127.0.0.1:7000".parse().unwrap()).unwrap();
        let mut state = GameState::new();
        state.add_player_at(client_id, origin());
        let config = AoeLootConfig::default();

        let prefs = clients.preferences_mut(client_id).unwrap();
        let command = AoeLootCommand::parse(".aoeloot on").unwrap();
        handle_command(&mut state, &config, client_id, SecurityLevel::Player, prefs, command);

        assert!(clients.preferences(client_id).unwrap().is_enabled());
        clients.remove_client(&client_id);
        assert!(clients.preferences(client_id).is_none());
    }

    /// Emptied corpses lose the lootable flag and decay
    #[test]
    fn released_corpses_decay() {
        let mut state = GameState::with_tick_rate(1);
        state.add_player_at(1, origin());
        let guids = [
            state.spawn_corpse(origin(), gold_loot(5), &[1]),
            state.spawn_corpse(origin(), gold_loot(6), &[1]),
        ];
        let config = AoeLootConfig::default();

        let summary = looted(handle_loot_opcode(&mut state, &config, 1, opted_in()).unwrap());
        assert_eq!(summary.released.len(), 2);

        let mut decayed = Vec::new();
        for _ in 0..server::game::LOOTED_CORPSE_DECAY_SECS {
            decayed.extend(state.update());
        }
        assert_eq!(decayed, guids.to_vec());
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    async fn recv_all(socket: &UdpSocket) -> Vec<Packet> {
        let mut buf = [0u8; 2048];
        let mut packets = Vec::new();
        while let Ok(Ok((len, _))) = timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await {
            packets.push(deserialize::<Packet>(&buf[..len]).unwrap());
        }
        packets
    }

    async fn send(socket: &UdpSocket, packet: Packet, addr: std::net::SocketAddr) {
        socket.send_to(&serialize(&packet).unwrap(), addr).await.unwrap();
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = Packet::Loot {
            target: ObjectGuid::creature(5),
        };
        let valid_data = serialize(&valid_packet).unwrap();

        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<Packet, _> = deserialize(truncated_data);
        assert!(result.is_err(), "Should fail to deserialize truncated packet");

        let mut corrupted_data = valid_data.clone();
        corrupted_data[0] = 0xFF;
        let result: Result<Packet, _> = deserialize(&corrupted_data);
        assert!(result.is_err(), "Should fail to deserialize corrupted packet");

        let empty_data: Vec<u8> = vec![];
        let result: Result<Packet, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }

    /// Connects to a real server, opts in and loots the demo corpses
    #[tokio::test]
    async fn aoe_loot_over_udp() {
        let mut server = Server::new(
            "127.0.0.1:0",
            Duration::from_millis(16),
            4,
            AoeLootConfig::default(),
        )
        .await
        .unwrap()
        .with_demo_corpses(5);
        let server_addr = server.local_addr().unwrap();

        let client = async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

            send(&socket, Packet::Connect { client_version: PROTOCOL_VERSION }, server_addr).await;
            let replies = recv_all(&socket).await;
            assert!(matches!(replies.first(), Some(Packet::Connected { .. })));
            assert!(replies.contains(&Packet::SystemMessage {
                text: MSG_LOGIN_HINT.to_string()
            }));

            send(&socket, Packet::ChatCommand { text: ".aoeloot on".to_string() }, server_addr).await;
            assert_eq!(
                recv_all(&socket).await,
                vec![Packet::SystemMessage {
                    text: MSG_ENABLED.to_string()
                }]
            );

            send(&socket, Packet::Loot { target: ObjectGuid::EMPTY }, server_addr).await;
            let replies = recv_all(&socket).await;
            assert!(replies.iter().any(|p| matches!(
                p,
                Packet::ItemPushed { .. } | Packet::LootMoneyNotify { .. }
            )));
            assert_eq!(
                replies.last(),
                Some(&Packet::LootReleaseResponse {
                    target: ObjectGuid::EMPTY
                })
            );

            send(&socket, Packet::Disconnect, server_addr).await;
        };

        tokio::select! {
            result = server.run() => panic!("server stopped early: {:?}", result.err().map(|e| e.to_string())),
            _ = client => {}
        }
    }
}
