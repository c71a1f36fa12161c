use anyhow::{anyhow, Result};
use argus_monitor::{
    BlockNumberFetcher, FactoryGameSource, GameMonitor, Scheduler, SystemClock, WsHeadSource,
};
use clap::{ArgAction, Parser};
use ethers::{
    providers::{Provider, Ws},
    types::Address,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Arguments for the `argus` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The Websocket RPC endpoint used to track the chain head and index games.
    #[arg(
        long,
        short,
        help = "The Websocket RPC endpoint used to track the chain head and index games.",
        env = "ARGUS_WS"
    )]
    ws_endpoint: String,

    /// The address of the dispute game factory contract.
    #[arg(
        long,
        short,
        help = "The address of the dispute game factory contract.",
        env = "ARGUS_DGF"
    )]
    dispute_game_factory: Address,

    /// The game discovery window, in seconds.
    #[arg(
        long,
        short = 'g',
        help = "The game discovery window, in seconds.",
        default_value = "604800",
        env = "ARGUS_GAME_WINDOW"
    )]
    game_window: u64,

    /// The games eligible for scheduling. An empty list monitors every game.
    #[arg(
        long,
        short = 'a',
        help = "The games eligible for scheduling. An empty list monitors every game.",
        value_delimiter = ',',
        env = "ARGUS_ALLOWED_GAMES"
    )]
    allowed_games: Vec<Address>,
}

/// A [Scheduler] that logs each dispatched batch, standing in for the game
/// progression layer at the driver boundary.
struct LogScheduler;

impl Scheduler for LogScheduler {
    fn schedule(&self, games: Vec<Address>) -> Result<()> {
        tracing::info!(target: "argus-cli", "Scheduling {} game(s): {:?}", games.len(), games);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        ws_endpoint,
        dispute_game_factory,
        game_window,
        allowed_games,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    // Connect to the websocket endpoint.
    let provider = Arc::new(Provider::<Ws>::connect(ws_endpoint.clone()).await?);
    tracing::info!(target: "argus-cli", "Websocket connected @ {}", &ws_endpoint);

    let monitor = GameMonitor::new(
        Arc::new(SystemClock),
        Arc::new(FactoryGameSource::new(
            dispute_game_factory,
            Arc::clone(&provider),
        )),
        Arc::new(LogScheduler),
        Duration::from_secs(game_window),
        Arc::clone(&provider) as Arc<dyn BlockNumberFetcher>,
        allowed_games,
        Arc::new(WsHeadSource::new(provider)),
    );
    tracing::info!(target: "argus-cli", "Game monitor created successfully, starting monitor loop.");

    // Release the monitor on ctrl-c.
    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "argus-cli", "Interrupt received, shutting down.");
                cancellation.cancel();
            }
        }
    });

    monitor.monitor_games(cancellation).await
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
