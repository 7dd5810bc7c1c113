//! One simulation run driven by a [`CliConfig`].

use std::path::PathBuf;

use crate::config::{Algorithm, CliConfig};
use crate::error::EpidemicError;
use crate::network::{ContactNetwork, Graph};
use crate::simulation::{
    Model, SimulationOutput, fast_sir, fast_sis, gillespie_sir, gillespie_sis,
};

/// Errors from a command-line run.
#[derive(Debug)]
pub enum RunError {
    /// The edge list could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The network, rates or simulation rejected the input.
    Simulation(EpidemicError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Simulation(e) => write!(f, "simulation error: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Simulation(e) => Some(e),
        }
    }
}

impl From<EpidemicError> for RunError {
    fn from(e: EpidemicError) -> Self {
        Self::Simulation(e)
    }
}

/// Load the network, build the rates and run the configured simulation.
pub fn run(config: &CliConfig) -> Result<SimulationOutput, RunError> {
    let text = std::fs::read_to_string(&config.edge_list).map_err(|source| RunError::Io {
        path: config.edge_list.clone(),
        source,
    })?;
    let graph = Graph::parse_edge_list(&text, config.directed)?;
    let rates = config.rates.build(&graph)?;
    let options = config.options(&graph)?;

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        model = ?config.model,
        algorithm = ?config.algorithm,
        "starting simulation"
    );

    let output = match (config.algorithm, config.model) {
        (Algorithm::Fast, Model::Sis) => fast_sis(&graph, &rates, &options)?,
        (Algorithm::Fast, Model::Sir) => fast_sir(&graph, &rates, &options)?,
        (Algorithm::Gillespie, Model::Sis) => gillespie_sis(&graph, &rates, &options)?,
        (Algorithm::Gillespie, Model::Sir) => gillespie_sir(&graph, &rates, &options)?,
    };

    tracing::info!(
        termination = ?output.termination,
        samples = output.trajectory.len(),
        events = output.events_processed,
        "simulation finished"
    );
    Ok(output)
}
