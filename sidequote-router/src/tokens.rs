//! Token metadata: decimal precision and human-readable names per denom.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sidequote_common::Denom;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no metadata registered for denom {0}")]
    MetadataNotFound(String),
    #[error("no chain denom registered for human denom {0}")]
    HumanDenomNotFound(String),
    #[error("unsupported decimal precision {1} for denom {0}")]
    UnsupportedPrecision(String, u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub human_denom: String,
    pub decimals: u32,
}

impl TokenMetadata {
    pub fn new(human_denom: impl Into<String>, decimals: u32) -> Self {
        Self { human_denom: human_denom.into(), decimals }
    }
}

/// Registry of token metadata, swapped wholesale by ingest pushes.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    current: RwLock<Arc<HashMap<Denom, TokenMetadata>>>,
}

// Anything past this has no faithful fixed-scale representation.
const MAX_DECIMALS: u32 = 28;

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tokens(&self, tokens: HashMap<Denom, TokenMetadata>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(tokens);
    }

    pub fn metadata(&self, denom: &str) -> Option<TokenMetadata> {
        self.snapshot().get(denom).cloned()
    }

    /// `10^decimals` as a decimal, the power-of-ten multiplier encoding the
    /// denom's on-chain precision.
    pub fn scaling_factor(&self, denom: &str) -> Result<Decimal, TokenError> {
        let meta = self
            .metadata(denom)
            .ok_or_else(|| TokenError::MetadataNotFound(denom.to_string()))?;
        if meta.decimals > MAX_DECIMALS {
            return Err(TokenError::UnsupportedPrecision(denom.to_string(), meta.decimals));
        }
        Ok(Decimal::from_i128_with_scale(10i128.pow(meta.decimals), 0))
    }

    /// `10^decimals` as an integer amount, for building probe coins.
    pub fn scaling_factor_amount(&self, denom: &str) -> Result<BigUint, TokenError> {
        let meta = self
            .metadata(denom)
            .ok_or_else(|| TokenError::MetadataNotFound(denom.to_string()))?;
        Ok(BigUint::from(10u32).pow(meta.decimals))
    }

    /// Reverse lookup from a human-readable denom to its chain denom.
    pub fn chain_denom(&self, human_denom: &str) -> Result<Denom, TokenError> {
        self.snapshot()
            .iter()
            .find(|(_, meta)| meta.human_denom == human_denom)
            .map(|(denom, _)| denom.clone())
            .ok_or_else(|| TokenError::HumanDenomNotFound(human_denom.to_string()))
    }

    fn snapshot(&self) -> Arc<HashMap<Denom, TokenMetadata>> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }
}
