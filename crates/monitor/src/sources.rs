//! The sources module contains the capability contracts consumed by the
//! [GameMonitor](crate::GameMonitor).

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, Block, H256};
use tokio::sync::mpsc;

/// The header type delivered by head subscriptions.
pub type Head = Block<H256>;

/// A single fault dispute game registered with the dispute game factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDisputeGame {
    /// The address of the dispute game proxy contract.
    pub proxy: Address,
    /// The UNIX timestamp of the game's creation.
    pub timestamp: u64,
}

/// The [GameSource] trait describes a source of active dispute games.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Fetches every game created at or after `min_timestamp`, as of
    /// `block_number`.
    ///
    /// ### Takes
    /// - `min_timestamp`: The creation timestamp of the oldest game to return.
    /// - `block_number`: The block to read the factory state at.
    ///
    /// ### Returns
    /// - `Ok(Vec<FaultDisputeGame>)`: The matching games, oldest first.
    /// - `Err(anyhow::Error)`: The games could not be fetched.
    async fn fetch_all_games_at_block(
        &self,
        min_timestamp: u64,
        block_number: u64,
    ) -> Result<Vec<FaultDisputeGame>>;
}

/// The [Scheduler] trait describes the sink that discovered games are
/// dispatched to, one batch per monitor tick.
pub trait Scheduler: Send + Sync {
    /// Schedules the given games for progression.
    fn schedule(&self, games: Vec<Address>) -> Result<()>;
}

/// The [BlockNumberFetcher] trait describes a source for the current chain
/// height.
#[async_trait]
pub trait BlockNumberFetcher: Send + Sync {
    /// Returns the current block number.
    async fn block_number(&self) -> Result<u64>;
}

/// A live subscription to new chain heads. The subscription is owned by the
/// monitor task and replaced wholesale when the transport signals a failure;
/// dropping it releases the underlying transport.
#[derive(Debug)]
pub struct HeadSubscription {
    /// Delivered headers.
    pub headers: mpsc::Receiver<Head>,
    /// Transport failures. A message here invalidates the subscription.
    pub errors: mpsc::Receiver<anyhow::Error>,
}

impl HeadSubscription {
    /// Creates a new [HeadSubscription] from its delivery channels.
    pub fn new(headers: mpsc::Receiver<Head>, errors: mpsc::Receiver<anyhow::Error>) -> Self {
        Self { headers, errors }
    }
}

/// The [HeadSource] trait describes a transport that can open new head
/// subscriptions.
#[async_trait]
pub trait HeadSource: Send + Sync {
    /// Opens a new head subscription.
    async fn subscribe_new_heads(&self) -> Result<HeadSubscription>;
}
