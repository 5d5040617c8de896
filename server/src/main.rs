use clap::Parser;
use log::{debug, error, info};
use server::config::{GameConfig, ServerConfig};
use server::network::NetworkServer;
use server::session::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3003")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Points needed to win a match
    #[arg(short, long, default_value = "5")]
    winning_score: u32,

    /// Seconds a finished session stays up before it is removed
    #[arg(long, default_value = "10")]
    finished_grace_secs: u64,

    /// Seconds a session may sit without players before its game is ended
    #[arg(long, default_value = "120")]
    idle_timeout_secs: u64,

    /// Seconds between session summaries at debug level
    #[arg(long, default_value = "30")]
    report_interval_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            tick_rate: self.tick_rate,
            finished_grace: Duration::from_secs(self.finished_grace_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            game: GameConfig {
                winning_score: self.winning_score.max(1),
                ..GameConfig::default()
            },
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.server_config();
    info!(
        "Starting pong server: {} Hz, first to {}",
        config.tick_rate, config.game.winning_score
    );

    let address = config.bind_address();
    let registry = SessionRegistry::new(config);
    let server = NetworkServer::bind(&address, Arc::clone(&registry)).await?;

    let reporter = {
        let registry = Arc::clone(&registry);
        let period = Duration::from_secs(args.report_interval_secs.max(1));
        tokio::spawn(async move { report_sessions(registry, period).await })
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    reporter.abort();
    registry.shutdown().await;
    Ok(())
}

/// Periodically logs the registry's session listing.
async fn report_sessions(registry: Arc<SessionRegistry>, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer.tick().await;

    loop {
        timer.tick().await;
        let listing = registry.list().await;
        debug!(
            "{} session(s), {} player(s) connected",
            listing.len(),
            listing.endpoint_count()
        );
        for summary in &listing {
            debug!(
                "  [{}] {} with {} player(s)",
                summary.id, summary.status, summary.endpoint_count
            );
        }
    }
}
