//! Shared domain types and primitives for the sidequote sidecar.
//!
//! This crate holds everything both the router service and external
//! integrations need to agree on: the coin and pool models, the abstract
//! pool simulation interface, the TTL cache substrate and the per-key
//! single-flight primitive.

pub mod cache;
pub mod models;
pub mod simulation;
pub mod singleflight;

pub use models::{Coin, Denom, DenomPair, PoolId, PoolType, TakerFeeMap};
pub use simulation::{errors::SimulationError, pool_sim::PoolSim};
