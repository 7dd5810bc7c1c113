//! Time series produced by a simulation run.

use serde::Serialize;

use crate::error::EpidemicError;
use crate::network::NodeId;
use crate::state::{NodeState, StateCounts};

/// Compartment counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub counts: StateCounts,
}

/// Ordered samples: the initial condition followed by one sample per
/// accepted event.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    /// All samples in time order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample times.
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.time).collect()
    }

    /// Counts of one compartment over time.
    #[must_use]
    pub fn series(&self, state: NodeState) -> Vec<usize> {
        self.samples
            .iter()
            .map(|sample| sample.counts.get(state))
            .collect()
    }

    /// The last sample, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Append-only builder for a [`Trajectory`].
///
/// The recorder is a one-shot consumer: once [`finalize`](Self::finalize)
/// has handed out the trajectory it refuses further use.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    samples: Vec<Sample>,
    finalized: bool,
}

impl TrajectoryRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.
    ///
    /// # Errors
    ///
    /// Returns [`EpidemicError::Use`] after finalization and
    /// [`EpidemicError::InvalidTime`] if `time` is earlier than the last
    /// sample.
    pub fn record(&mut self, time: f64, counts: StateCounts) -> Result<(), EpidemicError> {
        if self.finalized {
            return Err(EpidemicError::Use(
                "cannot record into a finalized trajectory".to_string(),
            ));
        }
        if let Some(last) = self.samples.last() {
            if time.is_nan() || time < last.time {
                return Err(EpidemicError::InvalidTime {
                    time,
                    clock: last.time,
                });
            }
        }
        self.samples.push(Sample { time, counts });
        Ok(())
    }

    /// Number of samples recorded so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Hand out the completed trajectory.
    ///
    /// # Errors
    ///
    /// Returns [`EpidemicError::Use`] when called a second time.
    pub fn finalize(&mut self) -> Result<Trajectory, EpidemicError> {
        if self.finalized {
            return Err(EpidemicError::Use(
                "trajectory already finalized".to_string(),
            ));
        }
        self.finalized = true;
        Ok(Trajectory {
            samples: std::mem::take(&mut self.samples),
        })
    }
}

/// Every state change of every node, for consumers that need more than
/// compartment counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeHistory {
    transitions: Vec<Vec<(f64, NodeState)>>,
}

impl NodeHistory {
    /// Start a history with each node's state at `time`.
    #[must_use]
    pub fn new(time: f64, initial_states: impl IntoIterator<Item = NodeState>) -> Self {
        Self {
            transitions: initial_states
                .into_iter()
                .map(|state| vec![(time, state)])
                .collect(),
        }
    }

    pub(crate) fn push(&mut self, node: NodeId, time: f64, state: NodeState) {
        self.transitions[node].push((time, state));
    }

    /// `(time, state)` pairs for `node`, starting with its initial state.
    #[must_use]
    pub fn node(&self, node: NodeId) -> &[(f64, NodeState)] {
        &self.transitions[node]
    }

    /// State of `node` at `time`.
    #[must_use]
    pub fn state_at(&self, node: NodeId, time: f64) -> Option<NodeState> {
        self.transitions
            .get(node)?
            .iter()
            .take_while(|(changed_at, _)| *changed_at <= time)
            .last()
            .map(|&(_, state)| state)
    }

    /// Number of nodes covered.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.transitions.len()
    }
}
