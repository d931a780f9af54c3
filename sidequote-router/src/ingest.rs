//! The surface the chain ingest collaborator pushes state through.
//!
//! Ingest is a streaming producer external to this service: it decodes
//! chain state into pool simulations and calls into this handle. Pool and
//! fee pushes swap whole snapshots; block notifications drive the
//! background price refresher.

use std::{collections::HashMap, sync::Arc};

use sidequote_common::{Denom, PoolSim, TakerFeeMap};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    pricing::worker::BlockUpdate,
    registry::{PoolRegistry, TakerFeeTable},
    tokens::{TokenMetadata, TokenRegistry},
};

pub struct IngestUsecase {
    registry: Arc<PoolRegistry>,
    taker_fees: Arc<TakerFeeTable>,
    tokens: Arc<TokenRegistry>,
    block_updates: mpsc::Sender<BlockUpdate>,
}

impl IngestUsecase {
    pub fn new(
        registry: Arc<PoolRegistry>,
        taker_fees: Arc<TakerFeeTable>,
        tokens: Arc<TokenRegistry>,
        block_updates: mpsc::Sender<BlockUpdate>,
    ) -> Self {
        Self { registry, taker_fees, tokens, block_updates }
    }

    /// Installs a full pool snapshot atomically.
    pub fn replace_pools(&self, pools: Vec<Arc<dyn PoolSim>>) {
        self.registry.replace(pools);
    }

    pub fn set_taker_fees(&self, fees: TakerFeeMap) {
        debug!(pairs = fees.len(), "taker fees updated");
        self.taker_fees.set_fees(fees);
    }

    pub fn set_token_metadata(&self, tokens: HashMap<Denom, TokenMetadata>) {
        debug!(tokens = tokens.len(), "token metadata updated");
        self.tokens.set_tokens(tokens);
    }

    /// Hands a block notification to the price refresher. Ingest must not
    /// block on a slow consumer, so a full queue drops the update; the
    /// next block catches the affected denoms up.
    pub fn notify_block(&self, update: BlockUpdate) {
        if let Err(err) = self.block_updates.try_send(update) {
            warn!(%err, "dropping block update for price refresher");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::ConstantProductPool;

    fn ingest(queue: usize) -> (IngestUsecase, mpsc::Receiver<BlockUpdate>) {
        let (tx, rx) = mpsc::channel(queue);
        (
            IngestUsecase::new(
                Arc::new(PoolRegistry::new()),
                Arc::new(TakerFeeTable::new()),
                Arc::new(TokenRegistry::new()),
                tx,
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn forwards_block_updates() {
        let (ingest, mut rx) = ingest(4);
        let update = BlockUpdate { height: 7, updated_denoms: vec!["uatom".into()] };

        ingest.notify_block(update.clone());

        assert_eq!(rx.recv().await, Some(update));
    }

    #[tokio::test]
    async fn a_full_queue_drops_instead_of_blocking() {
        let (ingest, mut rx) = ingest(1);

        ingest.notify_block(BlockUpdate { height: 1, updated_denoms: vec![] });
        ingest.notify_block(BlockUpdate { height: 2, updated_denoms: vec![] });

        assert_eq!(rx.recv().await.map(|u| u.height), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn replace_pools_reaches_the_registry() {
        let registry = Arc::new(PoolRegistry::new());
        let (tx, _rx) = mpsc::channel(1);
        let ingest = IngestUsecase::new(
            Arc::clone(&registry),
            Arc::new(TakerFeeTable::new()),
            Arc::new(TokenRegistry::new()),
            tx,
        );

        ingest.replace_pools(vec![Arc::new(ConstantProductPool::new(
            1,
            &[("tokena", 1_000), ("tokenb", 1_000)],
        ))]);

        assert!(registry.get(1).is_some());
    }
}
