use bincode::{deserialize, serialize};
use shared::{ObjectGuid, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

// Print everything the server sends until it goes quiet
async fn drain_replies(socket: &UdpSocket, buf: &mut [u8]) {
    while let Ok(Ok((len, _))) = timeout(Duration::from_millis(500), socket.recv_from(buf)).await {
        match deserialize::<Packet>(&buf[0..len]) {
            Ok(Packet::SystemMessage { text }) => println!("  [system] {}", text),
            Ok(Packet::LootResponse { target, gold, items }) => {
                println!("  Loot window {}: {} copper, {} items", target, gold, items.len());
                for item in items {
                    println!("    slot {}: {}x item {}", item.slot, item.count, item.item_id);
                }
            }
            Ok(other) => println!("  {:?}", other),
            Err(e) => println!("  Failed to deserialize reply: {}", e),
        }
    }
}

async fn send(socket: &UdpSocket, packet: &Packet, server_addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sending {:?}", packet);
    socket.send_to(&serialize(packet)?, server_addr).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create local socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse::<SocketAddr>()?;

    let mut buf = [0u8; 2048];

    send(&socket, &Packet::Connect { client_version: PROTOCOL_VERSION }, server_addr).await?;

    println!("Waiting for server response...");
    let (len, _) = socket.recv_from(&mut buf).await?;
    let client_id = match deserialize::<Packet>(&buf[0..len])? {
        Packet::Connected { client_id } => client_id,
        other => {
            println!("Expected Connected but got: {:?}", other);
            return Ok(());
        }
    };
    println!("Connection accepted with client ID: {}", client_id);
    drain_replies(&socket, &mut buf).await;

    // Opt in, then fire a loot request. Start the server with
    // --demo-corpses to have something to loot.
    let steps = [
        Packet::ChatCommand { text: ".aoeloot debug on".to_string() },
        Packet::ChatCommand { text: ".aoeloot on".to_string() },
        Packet::Loot { target: ObjectGuid::EMPTY },
        Packet::Loot { target: ObjectGuid::EMPTY },
        Packet::ChatCommand { text: ".aoeloot off".to_string() },
    ];
    for packet in &steps {
        send(&socket, packet, server_addr).await?;
        drain_replies(&socket, &mut buf).await;
    }

    send(&socket, &Packet::Disconnect, server_addr).await?;
    println!("Test client finished");

    Ok(())
}
