//! Stochastic SIS/SIR simulation on contact networks.
//!
//! Two exact algorithms are provided, both taking the same inputs and
//! producing the same [`SimulationOutput`]:
//!
//! - [`fast_sis`] / [`fast_sir`]: event-driven. Each transmission and
//!   recovery gets its own exponentially distributed firing time; a state
//!   change only redraws the events around the node that changed.
//! - [`gillespie_sis`] / [`gillespie_sir`]: the direct method, recomputing
//!   the total event rate before every step. Kept as a baseline.
//!
//! # Determinism
//!
//! All randomness comes from a `StdRng` seeded with
//! [`SimulationOptions::seed`], and equal-time events fire in insertion
//! order. Given the same network, rates, options and seed, a run produces
//! the same output.
//!
//! # Usage
//!
//! ```
//! use epidemics::network::Graph;
//! use epidemics::rates::UniformRates;
//! use epidemics::simulation::{InitialInfected, SimulationOptions, fast_sir};
//!
//! let graph = Graph::from_edges(3, false, &[(0, 1), (1, 2)]).unwrap();
//! let rates = UniformRates::new(1.0, 0.5).unwrap();
//! let options = SimulationOptions::new(InitialInfected::Nodes(vec![0])).with_seed(7);
//!
//! let output = fast_sir(&graph, &rates, &options).unwrap();
//! assert_eq!(output.trajectory.samples()[0].counts.infected, 1);
//! ```

mod fast;
mod gillespie;

pub use fast::{Event, FastSimulation, fast_sir, fast_sis};
pub use gillespie::{gillespie_sir, gillespie_sis};

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};
use serde::Serialize;

use crate::error::EpidemicError;
use crate::network::NodeId;
use crate::state::NodeState;
use crate::trajectory::{NodeHistory, Trajectory};

/// Compartmental model being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Model {
    /// Recovery returns a node to susceptible.
    Sis,
    /// Recovery is permanent.
    Sir,
}

impl Model {
    /// State an infected node moves to when it recovers.
    #[must_use]
    pub const fn recovered_state(self) -> NodeState {
        match self {
            Self::Sis => NodeState::Susceptible,
            Self::Sir => NodeState::Recovered,
        }
    }
}

/// Which nodes start infected.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialInfected {
    /// Exactly these nodes.
    Nodes(Vec<NodeId>),
    /// `round(rho * node_count)` nodes chosen uniformly at random.
    Fraction(f64),
    /// Exactly this many nodes chosen uniformly at random.
    Count(usize),
}

/// Everything about a run except the network and the rates.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    /// Initially infected nodes.
    pub initial_infected: InitialInfected,
    /// Initially recovered nodes (SIR only).
    pub initial_recovered: Vec<NodeId>,
    /// Random seed.
    pub seed: u64,
    /// No event later than this time is applied.
    pub tmax: f64,
    /// Whether to keep every node's state changes.
    pub record_node_history: bool,
}

impl SimulationOptions {
    /// Options with seed 0, no horizon and no node history.
    #[must_use]
    pub const fn new(initial_infected: InitialInfected) -> Self {
        Self {
            initial_infected,
            initial_recovered: Vec::new(),
            seed: 0,
            tmax: f64::INFINITY,
            record_node_history: false,
        }
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub const fn with_tmax(mut self, tmax: f64) -> Self {
        self.tmax = tmax;
        self
    }

    #[must_use]
    pub fn with_initial_recovered(mut self, nodes: Vec<NodeId>) -> Self {
        self.initial_recovered = nodes;
        self
    }

    #[must_use]
    pub const fn with_node_history(mut self) -> Self {
        self.record_node_history = true;
        self
    }
}

/// Why a run stopped. All of these are normal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No infected node remains.
    Extinct,
    /// Infected nodes remain but no event can ever fire.
    Exhausted,
    /// The next event would happen after `tmax`.
    HorizonReached,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub trajectory: Trajectory,
    pub node_history: Option<NodeHistory>,
    pub termination: Termination,
    /// Events that changed a node's state.
    pub events_processed: u64,
    /// Stale events popped and dropped.
    pub events_discarded: u64,
}

/// Resolve the initial state of every node, validating the options.
fn initial_states(
    node_count: usize,
    model: Model,
    options: &SimulationOptions,
    rng: &mut StdRng,
) -> Result<Vec<NodeState>, EpidemicError> {
    if options.tmax.is_nan() || options.tmax < 0.0 {
        return Err(EpidemicError::configuration(
            "tmax",
            format!("{} must be a non-negative time", options.tmax),
        ));
    }

    let mut states = vec![NodeState::Susceptible; node_count];

    let infected = match &options.initial_infected {
        InitialInfected::Nodes(nodes) => {
            for &node in nodes {
                check_node("initial_infected", node, node_count)?;
            }
            nodes.clone()
        }
        InitialInfected::Fraction(rho) => {
            if !(0.0..=1.0).contains(rho) {
                return Err(EpidemicError::configuration(
                    "rho",
                    format!("{rho} must be between 0 and 1"),
                ));
            }
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )] // rho is in [0, 1], so the product is within 0..=node_count
            let amount = (rho * node_count as f64).round() as usize;
            rand::seq::index::sample(rng, node_count, amount.min(node_count)).into_vec()
        }
        InitialInfected::Count(count) => {
            let count = *count;
            if count > node_count {
                return Err(EpidemicError::configuration(
                    "initial_count",
                    format!("cannot infect {count} nodes (network has {node_count} nodes)"),
                ));
            }
            rand::seq::index::sample(rng, node_count, count).into_vec()
        }
    };
    for node in infected {
        states[node] = NodeState::Infected;
    }

    if !options.initial_recovered.is_empty() && model == Model::Sis {
        return Err(EpidemicError::configuration(
            "initial_recovered",
            "the SIS model has no recovered state",
        ));
    }
    for &node in &options.initial_recovered {
        check_node("initial_recovered", node, node_count)?;
        if states[node] == NodeState::Infected {
            return Err(EpidemicError::configuration(
                "initial_recovered",
                format!("node {node} is also initially infected"),
            ));
        }
        states[node] = NodeState::Recovered;
    }

    Ok(states)
}

fn check_node(parameter: &str, node: NodeId, node_count: usize) -> Result<(), EpidemicError> {
    if node < node_count {
        Ok(())
    } else {
        Err(EpidemicError::configuration(
            parameter,
            format!("node {node} out of range (network has {node_count} nodes)"),
        ))
    }
}

/// Exponential waiting time for `rate`, or `None` if the event can never
/// happen.
fn waiting_time<R: Rng>(rng: &mut R, rate: f64) -> Option<f64> {
    if rate > 0.0 {
        Exp::new(rate).ok().map(|distribution| distribution.sample(rng))
    } else {
        None
    }
}
