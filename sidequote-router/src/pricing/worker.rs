//! Block-driven refresh of default-quote prices.
//!
//! Prices against the default quote denom are cached with the no-expiry
//! sentinel; this worker is the only thing that rewrites them. Each block
//! notification names the denoms touched in the block, and only those are
//! recomputed. A failed or timed-out refresh leaves the previous cache
//! value in place.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

use crate::pricing::{PricingOptions, PricingSource};

/// Per-block notification from the ingest collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpdate {
    pub height: u64,
    /// Denoms whose pools changed within the block.
    pub updated_denoms: Vec<String>,
}

pub struct PriceRefresher {
    pricing: Arc<dyn PricingSource>,
    default_quote_denom: String,
    refresh_timeout: Duration,
    updates: mpsc::Receiver<BlockUpdate>,
}

impl PriceRefresher {
    pub fn new(
        pricing: Arc<dyn PricingSource>,
        default_quote_denom: impl Into<String>,
        refresh_timeout: Duration,
        updates: mpsc::Receiver<BlockUpdate>,
    ) -> Self {
        Self {
            pricing,
            default_quote_denom: default_quote_denom.into(),
            refresh_timeout,
            updates,
        }
    }

    /// Runs until the ingest side drops its sender.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        while let Some(update) = self.updates.recv().await {
            let mut refreshed = 0usize;
            for denom in &update.updated_denoms {
                if denom == &self.default_quote_denom {
                    continue;
                }
                let refresh = self.pricing.get_price(
                    denom,
                    &self.default_quote_denom,
                    PricingOptions { recompute_prices: true, ..PricingOptions::default() },
                );
                match timeout(self.refresh_timeout, refresh).await {
                    Ok(Ok(price)) => {
                        refreshed += 1;
                        debug!(%denom, %price, height = update.height, "price refreshed");
                    }
                    Ok(Err(err)) => {
                        warn!(%denom, height = update.height, %err, "price refresh failed; keeping previous value");
                    }
                    Err(_) => {
                        warn!(%denom, height = update.height, "price refresh timed out; keeping previous value");
                    }
                }
            }
            info!(
                height = update.height,
                refreshed,
                touched = update.updated_denoms.len(),
                "default quote prices refreshed"
            );
        }
        debug!("ingest channel closed; price refresher stopping");
    }
}
