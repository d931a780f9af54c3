pub mod errors;
pub mod pool_sim;

pub use errors::SimulationError;
pub use pool_sim::PoolSim;
