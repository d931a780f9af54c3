//! The current snapshot of all routable pools and the taker-fee table.
//!
//! Both are published as immutable values behind a single pointer swap:
//! `replace` builds the full successor value and installs it atomically, so
//! a reader either sees the previous snapshot or the new one, never a torn
//! mix. Readers holding an earlier `Arc` keep it until they drop it.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use sidequote_common::{Denom, PoolId, PoolSim, TakerFeeMap};
use tracing::info;

/// An immutable set of pools with a denom adjacency index.
#[derive(Debug, Default)]
pub struct PoolSet {
    pools: HashMap<PoolId, Arc<dyn PoolSim>>,
    by_denom: HashMap<Denom, Vec<PoolId>>,
}

impl PoolSet {
    pub fn new(pools: Vec<Arc<dyn PoolSim>>) -> Self {
        let mut by_id: HashMap<PoolId, Arc<dyn PoolSim>> = HashMap::with_capacity(pools.len());
        let mut by_denom: HashMap<Denom, Vec<PoolId>> = HashMap::new();
        for pool in pools {
            for denom in pool.denoms() {
                by_denom
                    .entry(denom.clone())
                    .or_default()
                    .push(pool.id());
            }
            by_id.insert(pool.id(), pool);
        }
        for ids in by_denom.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        Self { pools: by_id, by_denom }
    }

    pub fn get(&self, pool_id: PoolId) -> Option<&Arc<dyn PoolSim>> {
        self.pools.get(&pool_id)
    }

    /// Pool ids supporting `denom`, ascending. A pool is listed under every
    /// denom it holds.
    pub fn neighbours(&self, denom: &str) -> &[PoolId] {
        self.by_denom
            .get(denom)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Shared handle to the live pool snapshot.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    current: RwLock<Arc<PoolSet>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. The returned value never changes under the
    /// caller; later `replace` calls publish a new one.
    pub fn snapshot(&self) -> Arc<PoolSet> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn get(&self, pool_id: PoolId) -> Option<Arc<dyn PoolSim>> {
        self.snapshot().get(pool_id).cloned()
    }

    pub fn neighbours(&self, denom: &str) -> Vec<PoolId> {
        self.snapshot().neighbours(denom).to_vec()
    }

    /// Installs a new snapshot. All-or-nothing: the successor set is built
    /// before the pointer swap, so no reader observes a partial update.
    pub fn replace(&self, pools: Vec<Arc<dyn PoolSim>>) {
        let next = Arc::new(PoolSet::new(pools));
        info!(pool_count = next.len(), "replacing pool snapshot");
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = next;
    }
}

/// Shared handle to the per-pair taker fees, same publishing discipline as
/// the pool registry.
#[derive(Debug, Default)]
pub struct TakerFeeTable {
    current: RwLock<Arc<TakerFeeMap>>,
}

impl TakerFeeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<TakerFeeMap> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn fee(&self, denom_a: &str, denom_b: &str) -> rust_decimal::Decimal {
        self.snapshot().fee(denom_a, denom_b)
    }

    pub fn set_fees(&self, fees: TakerFeeMap) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(fees);
    }
}
