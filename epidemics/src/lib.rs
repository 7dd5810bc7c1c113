// Stochastic SIS/SIR epidemics on contact networks.
//
// Life of a run:
// 1. A contact network and a rate model are built (rates resolve any
//    weight attributes up front)
// 2. The initial condition is applied at time 0
// 3. The engine pops the next valid event, applies it, and schedules the
//    events it enables
// 4. Every accepted event appends a sample to the trajectory
//
// System components:
//  - Event queue with lazy invalidation
//  - Node state store with generation counters
//  - Event-driven engine plus a Gillespie baseline
//  - Trajectory recorder
//
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::float_cmp))]

pub mod config;
pub mod error;
pub mod network;
pub mod queue;
pub mod rates;
pub mod runner;
pub mod simulation;
pub mod state;
pub mod trajectory;

pub use error::EpidemicError;
pub use network::{ContactNetwork, Graph, NodeId};
pub use rates::{RateConfig, RateModel, UniformRates, WeightedRates};
pub use simulation::{
    InitialInfected, Model, SimulationOptions, SimulationOutput, Termination, fast_sir, fast_sis,
    gillespie_sir, gillespie_sis,
};
pub use state::{NodeState, StateCounts};
pub use trajectory::{NodeHistory, Trajectory};
