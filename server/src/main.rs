use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, MAX_TICK_RATE};
use server::network::Server;
use std::net::SocketAddr;

/// Main-method of the application.
/// Parses command-line arguments, then runs the arena server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Snapshot broadcasts per second
        #[clap(
            short,
            long,
            default_value = "20",
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TICK_RATE))
        )]
        tick_rate: u32,
        /// Maximum concurrent players
        #[clap(short, long, default_value = "64")]
        max_clients: usize,
        /// Seed for spawn points and tunneling rolls
        #[clap(long)]
        seed: Option<u64>,
    }

    let args = Args::parse();

    let bind_address: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let config = ServerConfig {
        bind_address,
        snapshot_interval: ServerConfig::interval_for_tick_rate(args.tick_rate),
        max_clients: args.max_clients,
        rng_seed: args.seed,
        ..ServerConfig::default()
    };
    info!(
        "Starting arena server on {} at {}Hz for up to {} players",
        config.bind_address, args.tick_rate, config.max_clients
    );

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
