//! Gillespie direct-method simulation.
//!
//! Before every step the rate of every possible transition is collected:
//! one recovery per infected node and one transmission per infected to
//! susceptible edge. The waiting time is exponential in the total rate and
//! the transition is chosen proportionally to its rate. This costs
//! O(nodes + edges) per event, which is what the event-driven algorithm
//! avoids.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EpidemicError;
use crate::network::{ContactNetwork, NodeId};
use crate::rates::RateModel;
use crate::state::{NodeState, StateCounts};
use crate::trajectory::{NodeHistory, TrajectoryRecorder};

use super::{Model, SimulationOptions, SimulationOutput, Termination, initial_states, waiting_time};

/// Simulate SIS dynamics with the Gillespie direct method.
pub fn gillespie_sis<N: ContactNetwork, R: RateModel>(
    network: &N,
    rates: &R,
    options: &SimulationOptions,
) -> Result<SimulationOutput, EpidemicError> {
    simulate(network, rates, Model::Sis, options)
}

/// Simulate SIR dynamics with the Gillespie direct method.
pub fn gillespie_sir<N: ContactNetwork, R: RateModel>(
    network: &N,
    rates: &R,
    options: &SimulationOptions,
) -> Result<SimulationOutput, EpidemicError> {
    simulate(network, rates, Model::Sir, options)
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Recovery(NodeId),
    Transmission(NodeId),
}

fn simulate<N: ContactNetwork, R: RateModel>(
    network: &N,
    rates: &R,
    model: Model,
    options: &SimulationOptions,
) -> Result<SimulationOutput, EpidemicError> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut states = initial_states(network.node_count(), model, options, &mut rng)?;
    let mut counts = StateCounts::default();
    for &state in &states {
        counts.add(state);
    }

    let mut recorder = TrajectoryRecorder::new();
    recorder.record(0.0, counts)?;
    let mut history = options
        .record_node_history
        .then(|| NodeHistory::new(0.0, states.iter().copied()));
    tracing::debug!(
        ?model,
        nodes = network.node_count(),
        infected = counts.infected,
        seed = options.seed,
        "initialized gillespie simulation"
    );

    let mut clock = 0.0;
    let mut events_processed = 0;
    let mut candidates: Vec<(f64, Transition)> = Vec::new();
    let termination = loop {
        if counts.infected == 0 {
            break Termination::Extinct;
        }

        candidates.clear();
        let mut total_rate = 0.0;
        for node in 0..network.node_count() {
            if states[node] != NodeState::Infected {
                continue;
            }
            let rate = rates.recovery_rate(node);
            if rate > 0.0 {
                total_rate += rate;
                candidates.push((rate, Transition::Recovery(node)));
            }
            for target in network.successors(node) {
                if states[target] != NodeState::Susceptible {
                    continue;
                }
                let rate = rates.transmission_rate(node, target);
                if rate > 0.0 {
                    total_rate += rate;
                    candidates.push((rate, Transition::Transmission(target)));
                }
            }
        }

        let Some(delay) = waiting_time(&mut rng, total_rate) else {
            break Termination::Exhausted;
        };
        if clock + delay > options.tmax {
            break Termination::HorizonReached;
        }
        clock += delay;

        let (node, new_state) = match choose(&candidates, rng.random::<f64>() * total_rate) {
            Transition::Recovery(node) => (node, model.recovered_state()),
            Transition::Transmission(target) => (target, NodeState::Infected),
        };
        counts.transfer(states[node], new_state);
        states[node] = new_state;
        events_processed += 1;
        recorder.record(clock, counts)?;
        if let Some(history) = &mut history {
            history.push(node, clock, new_state);
        }
        tracing::trace!(time = clock, node, ?new_state, "applied event");
    };

    let trajectory = recorder.finalize()?;
    tracing::debug!(
        ?termination,
        clock,
        events_processed,
        "gillespie simulation finished"
    );
    Ok(SimulationOutput {
        trajectory,
        node_history: history,
        termination,
        events_processed,
        events_discarded: 0,
    })
}

/// Pick the candidate whose cumulative rate interval contains `point`.
///
/// `candidates` must be non-empty. Rounding can leave `point` just past the
/// last boundary, in which case the last candidate is chosen.
fn choose(candidates: &[(f64, Transition)], point: f64) -> Transition {
    let mut cumulative = 0.0;
    for &(rate, transition) in candidates {
        cumulative += rate;
        if point < cumulative {
            return transition;
        }
    }
    candidates[candidates.len() - 1].1
}
