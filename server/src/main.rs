use clap::Parser;
use log::{info, warn};
use server::config::AoeLootConfig;
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// World ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// AOE loot configuration file, reloaded when it changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Slain creatures spawned around every player that connects
    #[arg(short, long, default_value = "0")]
    demo_corpses: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let loot_config = match &args.config {
        Some(path) => AoeLootConfig::load(path).await?,
        None => {
            warn!("No config file given, using AOE loot defaults");
            AoeLootConfig::default()
        }
    };

    let tick_rate = args.tick_rate.max(1);
    let tick_duration = Duration::from_nanos(1_000_000_000 / tick_rate as u64);
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {} at {}Hz", address, tick_rate);
    info!(
        "AOE loot {} (range {}, threshold {})",
        if loot_config.enable { "enabled" } else { "disabled" },
        loot_config.range,
        loot_config.corpse_threshold
    );

    let mut server = Server::new(&address, tick_duration, args.max_clients, loot_config)
        .await?
        .with_demo_corpses(args.demo_corpses);
    if let Some(path) = args.config {
        server = server.with_config_path(path);
    }

    server.run().await?;

    Ok(())
}
