//! Event-driven simulation.
//!
//! Every active infected→susceptible edge and every infected node owns one
//! scheduled event whose time was drawn from the rate in force when it was
//! scheduled. When a node changes state, the [`NodeStateStore`] invalidates
//! the events it takes part in and reports which edges became active; only
//! those get fresh draws. The rest of the schedule is untouched.
//!
//! Invalidated events stay in the queue's heap until they surface and are
//! skipped there; those skips are what `events_discarded` counts. Events
//! also carry the generation of each participant and are checked again when
//! popped, so an event that somehow outlived its invalidation is dropped
//! instead of applied.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::EpidemicError;
use crate::network::{ContactNetwork, NodeId};
use crate::queue::EventQueue;
use crate::rates::RateModel;
use crate::state::{NodeState, NodeStateStore};
use crate::trajectory::{NodeHistory, TrajectoryRecorder};

use super::{Model, SimulationOptions, SimulationOutput, Termination, initial_states, waiting_time};

/// A scheduled transition together with the generations it was drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `source` infects `target`.
    Transmission {
        source: NodeId,
        target: NodeId,
        source_generation: u64,
        target_generation: u64,
    },
    /// `node` recovers.
    Recovery { node: NodeId, generation: u64 },
}

/// Simulate SIS dynamics with the event-driven algorithm.
pub fn fast_sis<N: ContactNetwork, R: RateModel>(
    network: &N,
    rates: &R,
    options: &SimulationOptions,
) -> Result<SimulationOutput, EpidemicError> {
    FastSimulation::new(network, rates, Model::Sis, options)?.run()
}

/// Simulate SIR dynamics with the event-driven algorithm.
pub fn fast_sir<N: ContactNetwork, R: RateModel>(
    network: &N,
    rates: &R,
    options: &SimulationOptions,
) -> Result<SimulationOutput, EpidemicError> {
    FastSimulation::new(network, rates, Model::Sir, options)?.run()
}

/// A single event-driven run.
///
/// Built with [`FastSimulation::new`], advanced one event at a time with
/// [`step`](Self::step) or to completion with [`run`](Self::run).
pub struct FastSimulation<'a, N, R> {
    network: &'a N,
    rates: &'a R,
    model: Model,
    tmax: f64,
    rng: StdRng,
    queue: EventQueue<Event>,
    store: NodeStateStore,
    recorder: TrajectoryRecorder,
    history: Option<NodeHistory>,
    events_processed: u64,
    events_discarded: u64,
}

impl<'a, N: ContactNetwork, R: RateModel> FastSimulation<'a, N, R> {
    /// Apply the initial condition at time 0 and schedule the first events.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the options are invalid.
    pub fn new(
        network: &'a N,
        rates: &'a R,
        model: Model,
        options: &SimulationOptions,
    ) -> Result<Self, EpidemicError> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let initial = initial_states(network.node_count(), model, options, &mut rng)?;

        let mut simulation = Self {
            network,
            rates,
            model,
            tmax: options.tmax,
            rng,
            queue: EventQueue::new(0.0),
            store: NodeStateStore::new(network.node_count()),
            recorder: TrajectoryRecorder::new(),
            history: options
                .record_node_history
                .then(|| NodeHistory::new(0.0, initial.iter().copied())),
            events_processed: 0,
            events_discarded: 0,
        };

        for (node, &state) in initial.iter().enumerate() {
            simulation
                .store
                .set_state(node, state, &mut simulation.queue, network);
        }
        for node in 0..network.node_count() {
            if simulation.store.get_state(node) != NodeState::Infected {
                continue;
            }
            simulation.schedule_recovery(node)?;
            for target in network.successors(node) {
                if simulation.store.get_state(target) == NodeState::Susceptible {
                    simulation.schedule_transmission(node, target)?;
                }
            }
        }

        let counts = simulation.store.counts();
        simulation.recorder.record(0.0, counts)?;
        tracing::debug!(
            ?model,
            nodes = network.node_count(),
            infected = counts.infected,
            recovered = counts.recovered,
            seed = options.seed,
            pending = simulation.queue.len(),
            "initialized event-driven simulation"
        );
        Ok(simulation)
    }

    /// Current simulation time.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.queue.clock()
    }

    /// Current state of `node`.
    #[must_use]
    pub fn state(&self, node: NodeId) -> NodeState {
        self.store.get_state(node)
    }

    /// Stale events dropped so far.
    #[must_use]
    pub const fn events_discarded(&self) -> u64 {
        self.queue.discarded() + self.events_discarded
    }

    /// Number of valid pending events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Process the next event.
    ///
    /// Returns `Some(termination)` once the run is over; the terminating
    /// check happens before any event is popped, so calling `step` again
    /// after termination keeps returning the same answer.
    pub fn step(&mut self) -> Result<Option<Termination>, EpidemicError> {
        if self.store.counts().infected == 0 {
            return Ok(Some(Termination::Extinct));
        }
        match self.queue.peek_time() {
            None => return Ok(Some(Termination::Exhausted)),
            Some(time) if time > self.tmax => return Ok(Some(Termination::HorizonReached)),
            Some(_) => {}
        }
        let Some((time, event)) = self.queue.pop_next_valid() else {
            return Ok(Some(Termination::Exhausted));
        };

        let (node, new_state) = match event {
            Event::Transmission {
                source,
                target,
                source_generation,
                target_generation,
            } => {
                let current = source_generation == self.store.generation(source)
                    && target_generation == self.store.generation(target)
                    && self.store.get_state(source) == NodeState::Infected
                    && self.store.get_state(target) == NodeState::Susceptible;
                debug_assert!(current, "transmission outlived its invalidation");
                if !current {
                    self.discard(time, &event);
                    return Ok(None);
                }
                (target, NodeState::Infected)
            }
            Event::Recovery { node, generation } => {
                let current = generation == self.store.generation(node)
                    && self.store.get_state(node) == NodeState::Infected;
                debug_assert!(current, "recovery outlived its invalidation");
                if !current {
                    self.discard(time, &event);
                    return Ok(None);
                }
                (node, self.model.recovered_state())
            }
        };

        self.transition(node, new_state)?;
        self.events_processed += 1;
        self.recorder.record(time, self.store.counts())?;
        if let Some(history) = &mut self.history {
            history.push(node, time, new_state);
        }
        tracing::trace!(time, node, ?new_state, "applied event");
        Ok(None)
    }

    /// Run until the epidemic dies out, no event can fire, or the horizon
    /// is reached.
    pub fn run(mut self) -> Result<SimulationOutput, EpidemicError> {
        let termination = loop {
            if let Some(termination) = self.step()? {
                break termination;
            }
        };

        let trajectory = self.recorder.finalize()?;
        tracing::debug!(
            ?termination,
            clock = self.queue.clock(),
            events_processed = self.events_processed,
            events_discarded = self.events_discarded(),
            "event-driven simulation finished"
        );
        let events_discarded = self.events_discarded();
        Ok(SimulationOutput {
            trajectory,
            node_history: self.history,
            termination,
            events_processed: self.events_processed,
            events_discarded,
        })
    }

    fn discard(&mut self, time: f64, event: &Event) {
        self.events_discarded += 1;
        tracing::trace!(time, ?event, "discarded stale event");
    }

    /// Change `node`'s state and schedule the events the change enables.
    fn transition(&mut self, node: NodeId, new_state: NodeState) -> Result<(), EpidemicError> {
        let active = self
            .store
            .set_state(node, new_state, &mut self.queue, self.network);
        if new_state == NodeState::Infected {
            self.schedule_recovery(node)?;
        }
        for (source, target) in active {
            self.schedule_transmission(source, target)?;
        }
        Ok(())
    }

    fn schedule_recovery(&mut self, node: NodeId) -> Result<(), EpidemicError> {
        let Some(delay) = waiting_time(&mut self.rng, self.rates.recovery_rate(node)) else {
            return Ok(());
        };
        let event = Event::Recovery {
            node,
            generation: self.store.generation(node),
        };
        let handle = self.queue.schedule(self.queue.clock() + delay, event)?;
        self.store.register(node, handle, &self.queue);
        Ok(())
    }

    fn schedule_transmission(
        &mut self,
        source: NodeId,
        target: NodeId,
    ) -> Result<(), EpidemicError> {
        let rate = self.rates.transmission_rate(source, target);
        let Some(delay) = waiting_time(&mut self.rng, rate) else {
            return Ok(());
        };
        let event = Event::Transmission {
            source,
            target,
            source_generation: self.store.generation(source),
            target_generation: self.store.generation(target),
        };
        let handle = self.queue.schedule(self.queue.clock() + delay, event)?;
        self.store.register(source, handle, &self.queue);
        self.store.register(target, handle, &self.queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Graph;
    use crate::rates::{RateConfig, UniformRates};
    use crate::simulation::InitialInfected;
    use crate::state::StateCounts;

    fn path(n: usize) -> Graph {
        let edges: Vec<(NodeId, NodeId)> = (1..n).map(|i| (i - 1, i)).collect();
        Graph::from_edges(n, false, &edges).unwrap()
    }

    fn seeded(nodes: Vec<NodeId>, seed: u64) -> SimulationOptions {
        SimulationOptions::new(InitialInfected::Nodes(nodes)).with_seed(seed)
    }

    #[test]
    fn test_path_without_recovery_infects_everyone() {
        let graph = path(3);
        let rates = UniformRates::new(1.0, 0.0).unwrap();

        let output = fast_sir(&graph, &rates, &seeded(vec![0], 11)).unwrap();

        assert_eq!(output.termination, Termination::Exhausted);
        assert_eq!(output.trajectory.len(), 3);
        assert_eq!(
            output.trajectory.last().map(|s| s.counts),
            Some(StateCounts {
                susceptible: 0,
                infected: 3,
                recovered: 0
            })
        );
        assert_eq!(output.events_processed, 2);
    }

    #[test]
    fn test_isolated_node_recovers_once_sir() {
        let graph = Graph::undirected(1);
        let rates = UniformRates::new(5.0, 1.0).unwrap();

        let output = fast_sir(&graph, &rates, &seeded(vec![0], 1)).unwrap();

        assert_eq!(output.termination, Termination::Extinct);
        assert_eq!(output.trajectory.len(), 2);
        assert_eq!(output.events_processed, 1);
        let last = output.trajectory.last().unwrap();
        assert!(last.time > 0.0);
        assert_eq!(last.counts.recovered, 1);
    }

    #[test]
    fn test_isolated_node_recovers_once_sis() {
        let graph = Graph::undirected(1);
        let rates = UniformRates::new(5.0, 1.0).unwrap();

        let output = fast_sis(&graph, &rates, &seeded(vec![0], 1)).unwrap();

        assert_eq!(output.termination, Termination::Extinct);
        assert_eq!(output.trajectory.len(), 2);
        assert_eq!(output.trajectory.last().unwrap().counts.susceptible, 1);
    }

    #[test]
    fn test_no_initial_infection_is_extinct_immediately() {
        let graph = path(4);
        let rates = UniformRates::new(1.0, 1.0).unwrap();

        let output = fast_sis(&graph, &rates, &seeded(vec![], 0)).unwrap();

        assert_eq!(output.termination, Termination::Extinct);
        assert_eq!(output.trajectory.len(), 1);
        assert_eq!(output.trajectory.samples()[0].time, 0.0);
    }

    #[test]
    fn test_horizon_stops_before_later_events() {
        let graph = path(50);
        let rates = UniformRates::new(1.0, 0.0).unwrap();
        let options = seeded(vec![0], 5).with_tmax(3.0);

        let output = fast_sir(&graph, &rates, &options).unwrap();

        assert_eq!(output.termination, Termination::HorizonReached);
        assert!(output.trajectory.times().iter().all(|&t| t <= 3.0));
        assert!(output.trajectory.last().unwrap().counts.susceptible > 0);
    }

    #[test]
    fn test_zero_horizon_records_only_initial_state() {
        let graph = path(3);
        let rates = UniformRates::new(1.0, 1.0).unwrap();
        let options = seeded(vec![1], 5).with_tmax(0.0);

        let output = fast_sis(&graph, &rates, &options).unwrap();

        assert_eq!(output.termination, Termination::HorizonReached);
        assert_eq!(output.trajectory.len(), 1);
    }

    #[test]
    fn test_step_reports_termination_repeatedly() {
        let graph = Graph::undirected(1);
        let rates = UniformRates::new(1.0, 1.0).unwrap();
        let options = seeded(vec![0], 2);
        let mut simulation = FastSimulation::new(&graph, &rates, Model::Sir, &options).unwrap();

        assert_eq!(simulation.pending_events(), 1);
        assert_eq!(simulation.step().unwrap(), None);
        assert_eq!(simulation.state(0), NodeState::Recovered);
        assert_eq!(simulation.step().unwrap(), Some(Termination::Extinct));
        assert_eq!(simulation.step().unwrap(), Some(Termination::Extinct));
    }

    #[test]
    fn test_recovery_invalidates_outgoing_transmissions() {
        // Recovery is far faster than transmission, so the hub almost always
        // recovers first; its pending transmissions must then be dropped.
        let graph = Graph::from_edges(4, false, &[(0, 1), (0, 2), (0, 3)]).unwrap();
        let rates = UniformRates::new(1e-6, 1e6).unwrap();
        let options = seeded(vec![0], 9).with_node_history();

        let output = fast_sir(&graph, &rates, &options).unwrap();

        let history = output.node_history.unwrap();
        assert_eq!(output.termination, Termination::Extinct);
        assert_eq!(output.events_processed, 1);
        assert_eq!(history.node(0).len(), 2);
        for leaf in 1..4 {
            assert_eq!(history.node(leaf), &[(0.0, NodeState::Susceptible)]);
        }

        let mut simulation = FastSimulation::new(&graph, &rates, Model::Sir, &options).unwrap();
        while simulation.step().unwrap().is_none() {}
        assert_eq!(simulation.pending_events(), 0);
    }

    #[test]
    fn test_sis_reinfection_reschedules_transmissions() {
        // Two nodes, both start infected. In SIS each recovery re-exposes the
        // node to its infected neighbour, and with near-instant transmission
        // it is reinfected long before the neighbour recovers too.
        let graph = Graph::from_edges(2, false, &[(0, 1)]).unwrap();
        let rates = UniformRates::new(1e6, 1.0).unwrap();
        let options = seeded(vec![0, 1], 21).with_tmax(20.0).with_node_history();

        let output = fast_sis(&graph, &rates, &options).unwrap();

        assert_eq!(output.termination, Termination::HorizonReached);
        assert!(output.events_processed > 2);
        let history = output.node_history.unwrap();
        for node in 0..2 {
            assert!(
                history
                    .node(node)
                    .iter()
                    .all(|&(_, state)| state != NodeState::Recovered)
            );
        }
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let graph = Graph::from_edges(
            6,
            false,
            &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (0, 3)],
        )
        .unwrap();
        let rates = UniformRates::new(1.5, 1.0).unwrap();
        let options = seeded(vec![0], 77).with_tmax(30.0);

        let first = fast_sis(&graph, &rates, &options).unwrap();
        let second = fast_sis(&graph, &rates, &options).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_directed_edge_only_transmits_forward() {
        let graph = Graph::from_edges(2, true, &[(1, 0)]).unwrap();
        let rates = UniformRates::new(10.0, 0.0).unwrap();

        let output = fast_sir(&graph, &rates, &seeded(vec![0], 4)).unwrap();

        assert_eq!(output.termination, Termination::Exhausted);
        assert_eq!(output.trajectory.len(), 1);
    }

    #[test]
    fn test_invalidated_events_are_counted_when_skipped() {
        // Node 0 recovers almost at once, leaving its transmission to node 1
        // stale in the queue ahead of node 2's slow recovery.
        let mut graph = Graph::from_edges(3, false, &[(0, 1)]).unwrap();
        for (node, speed) in [(0, 1e9), (1, 1.0), (2, 1e-3)] {
            graph.set_node_attribute(node, "speed", speed).unwrap();
        }
        let rates = RateConfig::new(1e3, 1.0)
            .with_recovery_weight("speed")
            .build(&graph)
            .unwrap();

        let output = fast_sir(&graph, &rates, &seeded(vec![0, 2], 13)).unwrap();

        assert_eq!(output.termination, Termination::Extinct);
        assert_eq!(output.events_processed, 2);
        assert_eq!(output.events_discarded, 1);
        assert_eq!(output.trajectory.last().unwrap().counts.susceptible, 1);
    }

    #[test]
    fn test_persistent_hub_keeps_handle_list_bounded() {
        let leaves = 10;
        let edges: Vec<(NodeId, NodeId)> = (1..=leaves).map(|leaf| (0, leaf)).collect();
        let mut graph = Graph::from_edges(leaves + 1, false, &edges).unwrap();
        graph.set_node_attribute(0, "recovery", 0.0).unwrap();
        for leaf in 1..=leaves {
            graph.set_node_attribute(leaf, "recovery", 1.0).unwrap();
        }
        let rates = RateConfig::new(1.0, 1.0)
            .with_recovery_weight("recovery")
            .build(&graph)
            .unwrap();
        let options = seeded(vec![0], 3).with_tmax(2000.0);
        let mut simulation = FastSimulation::new(&graph, &rates, Model::Sis, &options).unwrap();

        let mut steps = 0;
        while simulation.step().unwrap().is_none() {
            steps += 1;
            // At most one pending transmission per leaf involves the hub.
            assert!(simulation.store.tracked_handles(0) <= 2 * leaves);
        }

        assert!(steps > 1000);
        assert_eq!(simulation.state(0), NodeState::Infected);
    }
}
