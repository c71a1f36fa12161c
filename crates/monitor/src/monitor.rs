//! The monitor module contains the [GameMonitor], the loop that discovers
//! active dispute games and dispatches them to the scheduler.

use crate::{BlockNumberFetcher, Clock, GameSource, HeadSource, HeadSubscription, Scheduler};
use anyhow::{Context, Result};
use ethers::types::Address;
use std::{sync::Arc, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Delay between resubscription attempts after the head subscription fails.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// How long the monitor waits for a header before polling on its own. Window
/// based rediscovery makes a late tick harmless.
const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(12);

/// The [GameMonitor] tracks chain head notifications and dispatches every
/// dispute game created within its window to the scheduler, one batch per
/// tick. Ticks are strictly sequential; the scheduler never sees concurrent
/// calls from a single monitor. The loop survives head subscription failures
/// by resubscribing and terminates only on cancellation.
pub struct GameMonitor {
    /// The clock used to anchor the discovery window.
    clock: Arc<dyn Clock>,
    /// The source of active dispute games.
    source: Arc<dyn GameSource>,
    /// The sink that discovered games are dispatched to.
    scheduler: Arc<dyn Scheduler>,
    /// How far back in time to discover games.
    game_window: Duration,
    /// The source for the chain height a tick reads factory state at.
    fetch_block_number: Arc<dyn BlockNumberFetcher>,
    /// The games eligible for scheduling. An empty list admits every game.
    allowed_games: Vec<Address>,
    /// The transport head subscriptions are opened against.
    head_source: Arc<dyn HeadSource>,
    /// How long to wait for a header before polling on its own.
    fallback_interval: Duration,
}

impl GameMonitor {
    /// Creates a new [GameMonitor].
    pub fn new(
        clock: Arc<dyn Clock>,
        source: Arc<dyn GameSource>,
        scheduler: Arc<dyn Scheduler>,
        game_window: Duration,
        fetch_block_number: Arc<dyn BlockNumberFetcher>,
        allowed_games: Vec<Address>,
        head_source: Arc<dyn HeadSource>,
    ) -> Self {
        Self {
            clock,
            source,
            scheduler,
            game_window,
            fetch_block_number,
            allowed_games,
            head_source,
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
        }
    }

    /// Overrides the fallback polling interval.
    pub fn with_fallback_interval(mut self, fallback_interval: Duration) -> Self {
        self.fallback_interval = fallback_interval;
        self
    }

    /// Runs the monitor until the cancellation token fires. Each delivered
    /// header triggers a synchronous discovery tick; a stalled subscription is
    /// covered by fallback polling; a failed subscription is replaced without
    /// terminating the loop.
    pub async fn monitor_games(&self, cancellation: CancellationToken) -> Result<()> {
        let mut subscription = self.head_source.subscribe_new_heads().await?;
        let mut fallback = time::interval_at(
            time::Instant::now() + self.fallback_interval,
            self.fallback_interval,
        );
        fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    tracing::info!(target: "game-monitor", "Cancellation requested, shutting down monitor loop.");
                    return Ok(());
                }
                err = subscription.errors.recv() => {
                    match err {
                        Some(err) => {
                            tracing::warn!(target: "game-monitor", "Head subscription failed: {}", err)
                        }
                        None => tracing::warn!(target: "game-monitor", "Head subscription closed."),
                    }
                    subscription = match self.resubscribe(&cancellation).await {
                        Some(subscription) => subscription,
                        None => return Ok(()),
                    };
                }
                header = subscription.headers.recv() => {
                    match header {
                        Some(_) => {
                            fallback.reset();
                            self.tick().await;
                        }
                        None => {
                            // A closed delivery channel is a transport failure too.
                            subscription = match self.resubscribe(&cancellation).await {
                                Some(subscription) => subscription,
                                None => return Ok(()),
                            };
                        }
                    }
                }
                _ = fallback.tick() => {
                    tracing::debug!(target: "game-monitor", "No header within the fallback interval, polling.");
                    self.tick().await;
                }
            }
        }
    }

    /// Discovers every game within the window as of `block_number` and
    /// dispatches the allowed subset to the scheduler as a single batch.
    pub async fn progress_games(&self, block_number: u64) -> Result<()> {
        let min_timestamp = self.min_game_timestamp();
        let games = self
            .source
            .fetch_all_games_at_block(min_timestamp, block_number)
            .await
            .context("failed to fetch games")?;

        let mut games_to_play = Vec::with_capacity(games.len());
        for game in games {
            if !self.allowed_game(&game.proxy) {
                tracing::debug!(target: "game-monitor", "Skipping game not on the allow list: {:?}", game.proxy);
                continue;
            }
            games_to_play.push(game.proxy);
        }

        self.scheduler
            .schedule(games_to_play)
            .context("failed to schedule games")?;
        Ok(())
    }

    /// Runs a single discovery tick. A failed tick is logged, never fatal; the
    /// next tick re-runs full discovery over the window.
    async fn tick(&self) {
        let block_number = match self.fetch_block_number.block_number().await {
            Ok(block_number) => block_number,
            Err(err) => {
                tracing::error!(target: "game-monitor", "Failed to fetch the block number: {}", err);
                return;
            }
        };
        if let Err(err) = self.progress_games(block_number).await {
            tracing::error!(target: "game-monitor", "Failed to progress games: {}", err);
        }
    }

    /// Replaces a failed subscription, retrying until the transport recovers or
    /// the monitor is cancelled. The coverage gap while resubscribing is healed
    /// by window based rediscovery on the next tick.
    async fn resubscribe(&self, cancellation: &CancellationToken) -> Option<HeadSubscription> {
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return None,
                result = self.head_source.subscribe_new_heads() => match result {
                    Ok(subscription) => {
                        tracing::info!(target: "game-monitor", "Resubscribed to new heads.");
                        return Some(subscription);
                    }
                    Err(err) => {
                        tracing::warn!(target: "game-monitor", "Resubscription failed: {}", err);
                        time::sleep(RESUBSCRIBE_DELAY).await;
                    }
                },
            }
        }
    }

    /// Returns `true` if the game is eligible for scheduling. An empty allow
    /// list admits every game.
    fn allowed_game(&self, game: &Address) -> bool {
        self.allowed_games.is_empty() || self.allowed_games.contains(game)
    }

    /// Returns the creation timestamp of the oldest game the monitor will
    /// schedule. A zero window pins the minimum to the genesis timestamp, and
    /// the subtraction saturates rather than underflowing young chains.
    fn min_game_timestamp(&self) -> u64 {
        if self.game_window.is_zero() {
            return 0;
        }
        self.clock.now().saturating_sub(self.game_window.as_secs())
    }
}
