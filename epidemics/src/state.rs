//! Per-node epidemic state.
//!
//! [`NodeStateStore`] is what lets the event-driven engine touch only the
//! neighbourhood of a node when it changes state. For every node it keeps
//! the current [`NodeState`], a generation counter bumped on every change,
//! and the handles of every scheduled event the node takes part in.

use serde::{Deserialize, Serialize};

use crate::network::{ContactNetwork, NodeId};
use crate::queue::{EventHandle, EventQueue};

/// Compartment of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Susceptible,
    Infected,
    Recovered,
}

/// Number of nodes in each compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl StateCounts {
    /// Count for one compartment.
    #[must_use]
    pub const fn get(&self, state: NodeState) -> usize {
        match state {
            NodeState::Susceptible => self.susceptible,
            NodeState::Infected => self.infected,
            NodeState::Recovered => self.recovered,
        }
    }

    /// Total number of nodes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }

    const fn slot(&mut self, state: NodeState) -> &mut usize {
        match state {
            NodeState::Susceptible => &mut self.susceptible,
            NodeState::Infected => &mut self.infected,
            NodeState::Recovered => &mut self.recovered,
        }
    }

    pub(crate) const fn add(&mut self, state: NodeState) {
        *self.slot(state) += 1;
    }

    /// Move one node from `from` to `to`.
    ///
    /// # Pre-conditions
    /// - At least one node is in `from`
    ///
    /// # Post-conditions
    /// - `total()` is unchanged
    ///
    /// # Panics
    /// Panics if `from` is empty (indicates a bug in the caller).
    pub(crate) const fn transfer(&mut self, from: NodeState, to: NodeState) {
        assert!(*self.slot(from) > 0, "state count underflow");
        *self.slot(from) -= 1;
        *self.slot(to) += 1;
    }
}

/// Handle lists shorter than this are never pruned.
const MIN_PRUNE_LEN: usize = 8;

/// State, generation and outstanding events of every node.
///
/// # Invariants
///
/// - `counts()` always matches `states`, so `counts().total() == len()`.
/// - A node's handle list never holds more than
///   `max(2 * pending, MIN_PRUNE_LEN)` entries, where `pending` is the
///   number of its events still pending at the last prune.
#[derive(Debug)]
pub struct NodeStateStore {
    states: Vec<NodeState>,
    generations: Vec<u64>,
    handles: Vec<Vec<EventHandle>>,
    prune_at: Vec<usize>,
    counts: StateCounts,
}

impl NodeStateStore {
    /// Create a store with every node susceptible at generation 0.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            states: vec![NodeState::Susceptible; node_count],
            generations: vec![0; node_count],
            handles: vec![Vec::new(); node_count],
            prune_at: vec![MIN_PRUNE_LEN; node_count],
            counts: StateCounts {
                susceptible: node_count,
                ..StateCounts::default()
            },
        }
    }

    /// Current state of `node`.
    #[must_use]
    pub fn get_state(&self, node: NodeId) -> NodeState {
        self.states[node]
    }

    /// Number of state changes `node` has gone through.
    #[must_use]
    pub fn generation(&self, node: NodeId) -> u64 {
        self.generations[node]
    }

    /// Current compartment counts.
    #[must_use]
    pub const fn counts(&self) -> StateCounts {
        self.counts
    }

    /// Number of nodes tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the store tracks no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of event handles currently tracked for `node`, including
    /// ones that already fired or were invalidated through another node.
    #[must_use]
    pub fn tracked_handles(&self, node: NodeId) -> usize {
        self.handles[node].len()
    }

    /// Record that the event behind `handle` involves `node`.
    ///
    /// Handles whose events already fired, or were invalidated through the
    /// other endpoint, are only dropped here or in
    /// [`set_state`](Self::set_state). When the list doubles since its last
    /// prune, entries no longer pending in `queue` are removed, which keeps
    /// the cost amortised O(1) and the list proportional to the node's
    /// pending events.
    pub fn register<E>(&mut self, node: NodeId, handle: EventHandle, queue: &EventQueue<E>) {
        let handles = &mut self.handles[node];
        handles.push(handle);
        if handles.len() >= self.prune_at[node] {
            handles.retain(|&handle| queue.is_pending(handle));
            self.prune_at[node] = (2 * handles.len()).max(MIN_PRUNE_LEN);
        }
    }

    /// Move `node` to `new_state`.
    ///
    /// Bumps the node's generation and invalidates every outstanding event
    /// the node takes part in. Returns the directed pairs
    /// `(infected source, susceptible target)` incident to `node` that are
    /// active after the change; those are the edges whose transmission
    /// events need to be drawn again. Setting a node to the state it is
    /// already in changes nothing and returns no pairs.
    ///
    /// # Post-conditions
    /// - `generation(node)` increased by 1 if the state changed
    /// - No event registered for `node` is pending in `queue`
    /// - `counts().total() == len()`
    pub fn set_state<E, N: ContactNetwork>(
        &mut self,
        node: NodeId,
        new_state: NodeState,
        queue: &mut EventQueue<E>,
        network: &N,
    ) -> Vec<(NodeId, NodeId)> {
        let old_state = self.states[node];
        if old_state == new_state {
            return Vec::new();
        }

        self.states[node] = new_state;
        self.generations[node] += 1;
        self.counts.transfer(old_state, new_state);
        for handle in self.handles[node].drain(..) {
            queue.invalidate(handle);
        }
        self.prune_at[node] = MIN_PRUNE_LEN;
        debug_assert_eq!(self.counts.total(), self.states.len());

        let mut active = Vec::new();
        if new_state == NodeState::Infected {
            active.extend(
                network
                    .successors(node)
                    .filter(|&target| self.states[target] == NodeState::Susceptible)
                    .map(|target| (node, target)),
            );
        } else if new_state == NodeState::Susceptible {
            active.extend(
                network
                    .predecessors(node)
                    .filter(|&source| self.states[source] == NodeState::Infected)
                    .map(|source| (source, node)),
            );
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Graph;

    fn star() -> Graph {
        Graph::from_edges(4, false, &[(0, 1), (0, 2), (0, 3)]).unwrap()
    }

    #[test]
    fn test_new_store_is_all_susceptible() {
        let store = NodeStateStore::new(3);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get_state(2), NodeState::Susceptible);
        assert_eq!(store.generation(2), 0);
        assert_eq!(
            store.counts(),
            StateCounts {
                susceptible: 3,
                infected: 0,
                recovered: 0
            }
        );
    }

    #[test]
    fn test_infecting_hub_returns_susceptible_leaves() {
        let graph = star();
        let mut queue: EventQueue<()> = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        store.set_state(2, NodeState::Recovered, &mut queue, &graph);
        let active = store.set_state(0, NodeState::Infected, &mut queue, &graph);

        let mut active = active;
        active.sort_unstable();
        assert_eq!(active, vec![(0, 1), (0, 3)]);
        assert_eq!(store.generation(0), 1);
        assert_eq!(store.counts().infected, 1);
        assert_eq!(store.counts().recovered, 1);
        assert_eq!(store.counts().total(), 4);
    }

    #[test]
    fn test_leaf_becoming_susceptible_returns_infected_hub() {
        let graph = star();
        let mut queue: EventQueue<()> = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        store.set_state(0, NodeState::Infected, &mut queue, &graph);
        store.set_state(1, NodeState::Infected, &mut queue, &graph);
        let active = store.set_state(1, NodeState::Susceptible, &mut queue, &graph);

        assert_eq!(active, vec![(0, 1)]);
        assert_eq!(store.generation(1), 2);
    }

    #[test]
    fn test_state_change_invalidates_registered_events() {
        let graph = star();
        let mut queue = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        let touching = queue.schedule(1.0, "touching node 1").unwrap();
        let unrelated = queue.schedule(2.0, "unrelated").unwrap();
        store.register(1, touching, &queue);
        store.register(2, unrelated, &queue);

        store.set_state(1, NodeState::Infected, &mut queue, &graph);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_next_valid(), Some((2.0, "unrelated")));
    }

    #[test]
    fn test_setting_same_state_is_noop() {
        let graph = star();
        let mut queue: EventQueue<()> = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        let active = store.set_state(3, NodeState::Susceptible, &mut queue, &graph);

        assert!(active.is_empty());
        assert_eq!(store.generation(3), 0);
    }

    #[test]
    fn test_recovered_node_activates_nothing() {
        let graph = star();
        let mut queue: EventQueue<()> = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        store.set_state(0, NodeState::Infected, &mut queue, &graph);
        let active = store.set_state(0, NodeState::Recovered, &mut queue, &graph);

        assert!(active.is_empty());
        assert_eq!(store.counts().recovered, 1);
        assert_eq!(store.counts().infected, 0);
    }

    #[test]
    fn test_handle_list_stays_bounded_while_node_keeps_state() {
        // Node 0 stays infected while events involving it keep firing or
        // getting invalidated elsewhere; its list must not keep them all.
        let mut queue = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(2);
        let mut time = 0.0;

        for _ in 0..1_000 {
            time += 1.0;
            let handle = queue.schedule(time, ()).unwrap();
            store.register(0, handle, &queue);
            store.register(1, handle, &queue);
            assert!(queue.pop_next_valid().is_some());
        }

        assert!(store.tracked_handles(0) <= MIN_PRUNE_LEN);
        assert!(store.tracked_handles(1) <= MIN_PRUNE_LEN);
    }

    #[test]
    fn test_pruning_keeps_pending_handles() {
        let graph = star();
        let mut queue = EventQueue::new(0.0);
        let mut store = NodeStateStore::new(4);

        let kept: Vec<EventHandle> = (0..5)
            .map(|i| queue.schedule(100.0 + f64::from(i), "kept").unwrap())
            .collect();
        for &handle in &kept {
            store.register(0, handle, &queue);
        }
        for i in 0..50 {
            let handle = queue.schedule(f64::from(i), "fired").unwrap();
            store.register(0, handle, &queue);
            queue.invalidate(handle);
        }

        assert!(store.tracked_handles(0) <= 2 * kept.len() + MIN_PRUNE_LEN);
        store.set_state(0, NodeState::Infected, &mut queue, &graph);
        assert!(queue.is_empty());
        assert_eq!(store.tracked_handles(0), 0);
    }
}
