//! The chain module contains ethers backed implementations of the monitor's
//! consumed contracts.

use crate::{
    bindings::DisputeGameFactory, BlockNumberFetcher, FaultDisputeGame, GameSource, HeadSource,
    HeadSubscription,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::{
    providers::{Middleware, Provider, StreamExt, Ws},
    types::{Address, U256},
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Headers buffered per subscription before the forwarder backs off.
const HEAD_CHANNEL_CAPACITY: usize = 16;

#[async_trait]
impl<M> BlockNumberFetcher for M
where
    M: Middleware + 'static,
{
    async fn block_number(&self) -> Result<u64> {
        Ok(self
            .get_block_number()
            .await
            .map_err(|err| anyhow!(err))?
            .as_u64())
    }
}

/// A [GameSource] reading games from the `DisputeGameFactory` contract.
pub struct FactoryGameSource<M> {
    factory: DisputeGameFactory<M>,
}

impl<M> FactoryGameSource<M>
where
    M: Middleware,
{
    /// Creates a new [FactoryGameSource] for the factory at `address`.
    pub fn new(address: Address, provider: Arc<M>) -> Self {
        Self {
            factory: DisputeGameFactory::new(address, provider),
        }
    }
}

#[async_trait]
impl<M> GameSource for FactoryGameSource<M>
where
    M: Middleware + 'static,
{
    async fn fetch_all_games_at_block(
        &self,
        min_timestamp: u64,
        block_number: u64,
    ) -> Result<Vec<FaultDisputeGame>> {
        let count = self
            .factory
            .game_count()
            .block(block_number)
            .call()
            .await
            .map_err(|err| anyhow!(err))?
            .as_u64();

        // The factory registers games in creation order, so the walk backwards
        // can stop at the first game older than the window.
        let mut games = Vec::new();
        for index in (0..count).rev() {
            let (_, timestamp, proxy) = self
                .factory
                .game_at_index(U256::from(index))
                .block(block_number)
                .call()
                .await
                .map_err(|err| anyhow!(err))?;
            if timestamp < min_timestamp {
                break;
            }
            games.push(FaultDisputeGame { proxy, timestamp });
        }
        games.reverse();
        Ok(games)
    }
}

/// A [HeadSource] over a websocket provider. Every subscription is served by a
/// forwarding task that owns the underlying `eth_subscribe` stream; dropping
/// the subscription's receivers tears the task and the stream down.
pub struct WsHeadSource {
    provider: Arc<Provider<Ws>>,
}

impl WsHeadSource {
    /// Creates a new [WsHeadSource] over the given provider.
    pub fn new(provider: Arc<Provider<Ws>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl HeadSource for WsHeadSource {
    async fn subscribe_new_heads(&self) -> Result<HeadSubscription> {
        let provider = Arc::clone(&self.provider);
        let (header_tx, header_rx) = mpsc::channel(HEAD_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut stream = match provider.subscribe_blocks().await {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = error_tx.send(anyhow!(err)).await;
                    return;
                }
            };
            loop {
                match stream.next().await {
                    Some(header) => {
                        if header_tx.send(header).await.is_err() {
                            // The subscription was dropped; unsubscribe by
                            // dropping the stream.
                            break;
                        }
                    }
                    None => {
                        let _ = error_tx.send(anyhow!("new heads stream ended")).await;
                        break;
                    }
                }
            }
        });

        Ok(HeadSubscription::new(header_rx, error_rx))
    }
}
