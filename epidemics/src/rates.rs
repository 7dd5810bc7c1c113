//! Transmission and recovery rates.
//!
//! A [`RateModel`] answers two questions: how fast does `source` infect
//! `target` across their edge, and how fast does `node` recover. Two
//! implementations exist:
//!
//! - [`UniformRates`]: the same `tau` on every edge and `gamma` on every node.
//! - [`WeightedRates`]: `tau` and `gamma` scaled by per-edge and per-node
//!   attributes, resolved once at construction.
//!
//! [`RateConfig`] is the plain configuration that picks between them.

use std::collections::HashMap;

use crate::error::EpidemicError;
use crate::network::{ContactNetwork, NodeId};

/// Rates of the two transitions of SIS/SIR dynamics.
///
/// Implementations must be deterministic and side-effect free, and must
/// never return a negative or non-finite rate.
pub trait RateModel {
    /// Rate at which an infected `source` infects a susceptible `target`.
    fn transmission_rate(&self, source: NodeId, target: NodeId) -> f64;

    /// Rate at which an infected `node` recovers.
    fn recovery_rate(&self, node: NodeId) -> f64;
}

/// Identical rates on every edge and node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRates {
    tau: f64,
    gamma: f64,
}

impl UniformRates {
    /// Create uniform rates.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either rate is negative or not
    /// finite.
    pub fn new(tau: f64, gamma: f64) -> Result<Self, EpidemicError> {
        Ok(Self {
            tau: check_rate("tau", tau)?,
            gamma: check_rate("gamma", gamma)?,
        })
    }
}

impl RateModel for UniformRates {
    fn transmission_rate(&self, _source: NodeId, _target: NodeId) -> f64 {
        self.tau
    }

    fn recovery_rate(&self, _node: NodeId) -> f64 {
        self.gamma
    }
}

/// Rates scaled by edge and node attributes of a particular network.
///
/// Every rate is computed when the value is built, so a missing attribute is
/// reported up front instead of in the middle of a run. Pairs that are not
/// edges of the network have a transmission rate of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRates {
    transmission: HashMap<(NodeId, NodeId), f64>,
    recovery: Vec<f64>,
}

impl WeightedRates {
    /// Resolve weighted rates against `network`.
    ///
    /// With `transmission_weight = Some(name)` the rate on edge `u -> v` is
    /// `tau * network.edge_attribute(u, v, name)`; with `None` it is `tau`.
    /// `recovery_weight` scales `gamma` per node in the same way.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `tau` or `gamma` is invalid, or if a
    /// named attribute is absent, negative or not finite on any edge or node.
    pub fn new<N: ContactNetwork>(
        network: &N,
        tau: f64,
        gamma: f64,
        transmission_weight: Option<&str>,
        recovery_weight: Option<&str>,
    ) -> Result<Self, EpidemicError> {
        let tau = check_rate("tau", tau)?;
        let gamma = check_rate("gamma", gamma)?;

        let mut transmission = HashMap::new();
        for source in 0..network.node_count() {
            for target in network.successors(source) {
                let scale = match transmission_weight {
                    Some(name) => {
                        let weight = network.edge_attribute(source, target, name).ok_or_else(|| {
                            EpidemicError::configuration(
                                "transmission_weight",
                                format!("edge {source} -> {target} has no attribute '{name}'"),
                            )
                        })?;
                        check_rate("transmission_weight", weight)?
                    }
                    None => 1.0,
                };
                transmission.insert((source, target), tau * scale);
            }
        }

        let recovery = (0..network.node_count())
            .map(|node| -> Result<f64, EpidemicError> {
                let Some(name) = recovery_weight else {
                    return Ok(gamma);
                };
                let weight = network.node_attribute(node, name).ok_or_else(|| {
                    EpidemicError::configuration(
                        "recovery_weight",
                        format!("node {node} has no attribute '{name}'"),
                    )
                })?;
                Ok(gamma * check_rate("recovery_weight", weight)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transmission,
            recovery,
        })
    }
}

impl RateModel for WeightedRates {
    fn transmission_rate(&self, source: NodeId, target: NodeId) -> f64 {
        self.transmission
            .get(&(source, target))
            .copied()
            .unwrap_or(0.0)
    }

    fn recovery_rate(&self, node: NodeId) -> f64 {
        self.recovery.get(node).copied().unwrap_or(0.0)
    }
}

/// Rate configuration: base rates plus optional weight attribute names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateConfig {
    /// Base transmission rate per edge.
    pub tau: f64,
    /// Base recovery rate per node.
    pub gamma: f64,
    /// Edge attribute scaling `tau`.
    pub transmission_weight: Option<String>,
    /// Node attribute scaling `gamma`.
    pub recovery_weight: Option<String>,
}

impl RateConfig {
    /// Unweighted configuration.
    #[must_use]
    pub const fn new(tau: f64, gamma: f64) -> Self {
        Self {
            tau,
            gamma,
            transmission_weight: None,
            recovery_weight: None,
        }
    }

    /// Scale `tau` by the named edge attribute.
    #[must_use]
    pub fn with_transmission_weight(mut self, name: impl Into<String>) -> Self {
        self.transmission_weight = Some(name.into());
        self
    }

    /// Scale `gamma` by the named node attribute.
    #[must_use]
    pub fn with_recovery_weight(mut self, name: impl Into<String>) -> Self {
        self.recovery_weight = Some(name.into());
        self
    }

    /// Build the rate model this configuration describes.
    pub fn build<N: ContactNetwork>(&self, network: &N) -> Result<Rates, EpidemicError> {
        if self.transmission_weight.is_none() && self.recovery_weight.is_none() {
            return Ok(Rates::Uniform(UniformRates::new(self.tau, self.gamma)?));
        }
        Ok(Rates::Weighted(WeightedRates::new(
            network,
            self.tau,
            self.gamma,
            self.transmission_weight.as_deref(),
            self.recovery_weight.as_deref(),
        )?))
    }
}

/// Rate model produced by [`RateConfig::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum Rates {
    Uniform(UniformRates),
    Weighted(WeightedRates),
}

impl RateModel for Rates {
    fn transmission_rate(&self, source: NodeId, target: NodeId) -> f64 {
        match self {
            Self::Uniform(rates) => rates.transmission_rate(source, target),
            Self::Weighted(rates) => rates.transmission_rate(source, target),
        }
    }

    fn recovery_rate(&self, node: NodeId) -> f64 {
        match self {
            Self::Uniform(rates) => rates.recovery_rate(node),
            Self::Weighted(rates) => rates.recovery_rate(node),
        }
    }
}

fn check_rate(parameter: &str, value: f64) -> Result<f64, EpidemicError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EpidemicError::configuration(
            parameter,
            format!("{value} must be finite and non-negative"),
        ))
    }
}
